use super::{AssetClassConfig, MediaType};
use crate::errors::AssetError;
use base64::{Engine as _, engine::general_purpose};
use mime::Mime;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Decodes `data:<media-type>;base64,<data>` payloads for one asset class.
#[derive(Debug, Clone)]
pub struct PayloadDecoder {
    media_types: Vec<MediaType>,
    max_bytes: usize,
}

impl PayloadDecoder {
    pub fn new(config: &AssetClassConfig) -> Self {
        Self {
            media_types: config.media_types.clone(),
            max_bytes: config.max_bytes,
        }
    }

    pub fn decode(&self, payload: &str) -> Result<DecodedPayload, AssetError> {
        let (header, data) = payload
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(|| invalid("expected a data URL"))?;

        let declared = header
            .strip_suffix(BASE64_MARKER)
            .ok_or_else(|| invalid("data URL must be base64 encoded"))?;

        let extension = self.extension_for(declared)?;

        let bytes = general_purpose::STANDARD
            .decode(data)
            .map_err(|e| invalid(&format!("malformed base64: {e}")))?;

        if bytes.is_empty() {
            return Err(invalid("payload decodes to zero bytes"));
        }

        if bytes.len() > self.max_bytes {
            return Err(AssetError::PayloadTooLarge {
                limit: self.max_bytes,
                actual: bytes.len(),
            });
        }

        Ok(DecodedPayload { bytes, extension })
    }

    fn extension_for(&self, declared: &str) -> Result<&'static str, AssetError> {
        if declared.is_empty() {
            return Err(invalid("missing media type"));
        }

        // Parameters such as `;charset=` are outside the accepted grammar.
        let parsed: Mime = declared
            .parse()
            .map_err(|_| invalid(&format!("unparseable media type {declared:?}")))?;
        if parsed.params().next().is_some() {
            return Err(invalid(&format!("unsupported media type {declared:?}")));
        }

        self.media_types
            .iter()
            .find(|t| t.matches(&parsed))
            .map(|t| t.extension)
            .ok_or_else(|| invalid(&format!("unsupported media type {declared:?}")))
    }
}

/// Payloads arrive as arbitrary JSON; anything but a string is invalid.
pub fn payload_text(value: &serde_json::Value) -> Result<&str, AssetError> {
    value
        .as_str()
        .ok_or_else(|| invalid("payload must be a string"))
}

fn invalid(reason: &str) -> AssetError {
    AssetError::InvalidPayload(reason.to_string())
}
