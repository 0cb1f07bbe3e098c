use crate::errors::ConfigError;
use crate::storage::{AssetClass, AssetClassConfig};
use dotenvy::dotenv;
use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth_token: String,
    pub host: String,
    pub port: u16,
    pub log_level: tracing::Level,
    pub avatars: AssetClassConfig,
    pub gallery: AssetClassConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let uploads_root =
            PathBuf::from(var("UPLOADS_ROOT").unwrap_or_else(|| "./uploads".to_string()));

        Ok(Self {
            auth_token: var("AUTH_TOKEN").ok_or(ConfigError::Missing("AUTH_TOKEN"))?,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", var("PORT"), 8080)?,
            log_level: parse_or("LOG_LEVEL", var("LOG_LEVEL"), tracing::Level::INFO)?,
            avatars: class_config(
                AssetClass::Avatar,
                &uploads_root,
                &var,
                ("AVATAR_PUBLIC_PREFIX", "AVATAR_MAX_BYTES"),
            )?,
            gallery: class_config(
                AssetClass::Gallery,
                &uploads_root,
                &var,
                ("GALLERY_PUBLIC_PREFIX", "GALLERY_MAX_BYTES"),
            )?,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                key: "HOST",
                reason: format!("{e}"),
            })
    }

    /// Request body ceiling: the largest class limit after base64 expansion,
    /// plus room for the JSON envelope.
    pub fn body_limit(&self) -> usize {
        const ENVELOPE_SLACK: usize = 64 * 1024;
        let largest = self.avatars.max_bytes.max(self.gallery.max_bytes);
        largest.div_ceil(3).saturating_mul(4).saturating_add(ENVELOPE_SLACK)
    }
}

fn class_config(
    class: AssetClass,
    uploads_root: &std::path::Path,
    var: &impl Fn(&str) -> Option<String>,
    (prefix_key, size_key): (&'static str, &'static str),
) -> Result<AssetClassConfig, ConfigError> {
    let prefix = var(prefix_key);
    let max_bytes = var(size_key)
        .map(|raw| parse_value::<usize>(size_key, &raw))
        .transpose()?;

    // Report the offending variable rather than the generic field name.
    AssetClassConfig::new(class, uploads_root, prefix.as_deref(), max_bytes).map_err(|e| match e {
        ConfigError::Invalid { key: "max bytes", reason } => ConfigError::Invalid {
            key: size_key,
            reason,
        },
        ConfigError::Invalid { reason, .. } => ConfigError::Invalid {
            key: prefix_key,
            reason,
        },
        other => other,
    })
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => {
            tracing::debug!("{key} not set, using default");
            Ok(default)
        }
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: format!("{raw:?}: {e}"),
    })
}
