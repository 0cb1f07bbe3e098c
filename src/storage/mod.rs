mod local_fs;
mod paths;
mod payload;

pub use local_fs::LocalAssetStore;
pub use paths::{PathResolver, normalize_prefix};
pub use payload::{DecodedPayload, PayloadDecoder, payload_text};

use crate::errors::{AssetError, ConfigError};
use async_trait::async_trait;
use mime::Mime;
use serde::Deserialize;
use std::{
    fmt,
    path::{Path, PathBuf},
};

const MIB: usize = 1024 * 1024;

/// A named category of stored media with its own directory, prefixes and limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Avatar,
    Gallery,
}

impl AssetClass {
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetClass::Avatar => "avatars",
            AssetClass::Gallery => "establishments",
        }
    }

    pub fn default_prefix(self) -> &'static str {
        match self {
            AssetClass::Avatar => "/uploads/avatars",
            AssetClass::Gallery => "/uploads/establishments",
        }
    }

    /// Prefixes earlier deployments emitted. Accepted on resolve, never emitted.
    pub fn legacy_prefixes(self) -> &'static [&'static str] {
        match self {
            AssetClass::Avatar => &["/avatars"],
            AssetClass::Gallery => &["/establishment-images", "/uploads/gallery"],
        }
    }

    pub fn default_max_bytes(self) -> usize {
        match self {
            AssetClass::Avatar => 2 * MIB,
            AssetClass::Gallery => 3 * MIB,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Avatar => f.write_str("avatar"),
            AssetClass::Gallery => f.write_str("gallery"),
        }
    }
}

/// A supported media type, keyed by its `type/subtype` essence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaType {
    pub essence: &'static str,
    pub extension: &'static str,
}

impl MediaType {
    pub fn matches(&self, declared: &Mime) -> bool {
        self.essence.eq_ignore_ascii_case(declared.essence_str())
    }
}

pub fn image_media_types() -> Vec<MediaType> {
    [
        ("image/png", ".png"),
        ("image/jpeg", ".jpg"),
        ("image/jpg", ".jpg"),
        ("image/webp", ".webp"),
    ]
    .into_iter()
    .map(|(essence, extension)| MediaType { essence, extension })
    .collect()
}

/// Immutable per-class settings, built once at start-up.
#[derive(Debug, Clone)]
pub struct AssetClassConfig {
    pub class: AssetClass,
    pub storage_root: PathBuf,
    pub preferred_prefix: String,
    pub legacy_prefixes: Vec<String>,
    pub max_bytes: usize,
    pub media_types: Vec<MediaType>,
}

impl AssetClassConfig {
    pub fn new(
        class: AssetClass,
        uploads_root: &Path,
        prefix_override: Option<&str>,
        max_bytes_override: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let preferred_prefix = match prefix_override {
            Some(raw) => normalize_prefix(raw).ok_or_else(|| ConfigError::Invalid {
                key: "public prefix",
                reason: format!("{raw:?} does not name a path prefix"),
            })?,
            None => class.default_prefix().to_string(),
        };

        let max_bytes = max_bytes_override.unwrap_or_else(|| class.default_max_bytes());
        if max_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "max bytes",
                reason: "must be positive".to_string(),
            });
        }

        let mut legacy_prefixes = Vec::new();
        let builtin = std::iter::once(class.default_prefix())
            .chain(class.legacy_prefixes().iter().copied())
            .filter_map(normalize_prefix);
        for prefix in builtin {
            if prefix != preferred_prefix && !legacy_prefixes.contains(&prefix) {
                legacy_prefixes.push(prefix);
            }
        }

        Ok(Self {
            class,
            storage_root: uploads_root.join(class.dir_name()),
            preferred_prefix,
            legacy_prefixes,
            max_bytes,
            media_types: image_media_types(),
        })
    }

    /// Preferred prefix first, then legacy ones in configured order.
    pub fn accepted_prefixes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.preferred_prefix.as_str())
            .chain(self.legacy_prefixes.iter().map(String::as_str))
    }
}

/// Identifier of the record owning an asset; embedded in generated filenames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(String);

impl OwnerId {
    const MAX_LEN: usize = 64;

    pub fn parse(raw: &str) -> Result<Self, AssetError> {
        let valid = !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(AssetError::InvalidPayload(format!(
                "owner id {raw:?} is not a valid identifier"
            )))
        }
    }
}

impl From<u64> for OwnerId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait AssetStore: Send + Sync + 'static {
    /// Persist a new asset and return its public path. A superseded
    /// `previous` asset is removed on a best-effort basis.
    async fn store(
        &self,
        payload: &str,
        owner: &OwnerId,
        previous: Option<&str>,
    ) -> Result<String, AssetError>;

    /// Delete the asset behind `public_path`. Unknown or missing paths succeed.
    async fn remove(&self, public_path: &str) -> Result<(), AssetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_keeps_preferred_out_of_legacy() {
        let config = AssetClassConfig::new(AssetClass::Avatar, Path::new("/srv/up"), None, None)
            .unwrap();
        assert_eq!(config.preferred_prefix, "/uploads/avatars");
        assert_eq!(config.legacy_prefixes, vec!["/avatars".to_string()]);
        assert_eq!(config.storage_root, PathBuf::from("/srv/up/avatars"));
        assert_eq!(config.max_bytes, 2 * MIB);
    }

    #[test]
    fn prefix_override_retains_default_as_legacy() {
        let config = AssetClassConfig::new(
            AssetClass::Gallery,
            Path::new("/srv/up"),
            Some(" media\\gallery/ "),
            Some(10),
        )
        .unwrap();
        let accepted: Vec<_> = config.accepted_prefixes().collect();
        assert_eq!(
            accepted,
            vec![
                "/media/gallery",
                "/uploads/establishments",
                "/establishment-images",
                "/uploads/gallery"
            ]
        );
        assert_eq!(config.max_bytes, 10);
    }

    #[test]
    fn override_equal_to_legacy_is_not_duplicated() {
        let config =
            AssetClassConfig::new(AssetClass::Avatar, Path::new("/x"), Some("avatars/"), None)
                .unwrap();
        assert_eq!(config.preferred_prefix, "/avatars");
        assert_eq!(config.legacy_prefixes, vec!["/uploads/avatars".to_string()]);
    }

    #[test]
    fn rejects_empty_prefix_and_zero_limit() {
        assert!(AssetClassConfig::new(AssetClass::Avatar, Path::new("/x"), Some("  "), None).is_err());
        assert!(AssetClassConfig::new(AssetClass::Avatar, Path::new("/x"), None, Some(0)).is_err());
    }

    #[test]
    fn image_media_types_are_well_formed() {
        for media_type in image_media_types() {
            let parsed: Mime = media_type.essence.parse().unwrap();
            assert_eq!(parsed.type_(), mime::IMAGE, "{}", media_type.essence);
            assert_eq!(parsed.essence_str(), media_type.essence);
            assert!(parsed.params().next().is_none());
            assert!(media_type.matches(&parsed));
        }
        assert!(image_media_types().iter().any(|t| t.matches(&mime::IMAGE_PNG)));
        assert!(image_media_types().iter().any(|t| t.matches(&mime::IMAGE_JPEG)));
        assert!(!image_media_types().iter().any(|t| t.matches(&mime::IMAGE_GIF)));
    }

    #[test]
    fn owner_ids_are_filename_safe() {
        assert_eq!(OwnerId::from(42).to_string(), "42");
        assert!(OwnerId::parse("user_7-a").is_ok());
        assert!(OwnerId::parse("").is_err());
        assert!(OwnerId::parse("../etc").is_err());
        assert!(OwnerId::parse("a/b").is_err());
        assert!(OwnerId::parse(&"x".repeat(65)).is_err());
    }

    #[test]
    fn class_deserializes_from_route_segment() {
        let class: AssetClass = serde_json::from_str("\"gallery\"").unwrap();
        assert_eq!(class, AssetClass::Gallery);
        assert!(serde_json::from_str::<AssetClass>("\"banner\"").is_err());
    }
}
