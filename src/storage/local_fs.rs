use super::*;
use std::io::ErrorKind;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Filesystem-backed store for one asset class.
pub struct LocalAssetStore {
    config: AssetClassConfig,
    resolver: PathResolver,
    decoder: PayloadDecoder,
}

impl LocalAssetStore {
    pub fn new(config: AssetClassConfig) -> Result<Self, ConfigError> {
        let resolver = PathResolver::new(&config).map_err(|source| ConfigError::StorageRoot {
            path: config.storage_root.display().to_string(),
            source,
        })?;
        let decoder = PayloadDecoder::new(&config);

        tracing::info!(
            class = %config.class,
            root = %resolver.root().display(),
            prefix = %config.preferred_prefix,
            max_bytes = config.max_bytes,
            "Initialized asset store"
        );

        Ok(Self {
            config,
            resolver,
            decoder,
        })
    }

    async fn write_new_file(
        &self,
        owner: &OwnerId,
        decoded: &DecodedPayload,
    ) -> Result<String, AssetError> {
        self.write_new_file_with(decoded, || generate_filename(owner, decoded.extension))
            .await
    }

    /// Writes the payload under a fresh name, retrying once on a name collision.
    /// A second collision fails with `StorageUnavailable`.
    async fn write_new_file_with(
        &self,
        decoded: &DecodedPayload,
        mut next_name: impl FnMut() -> String,
    ) -> Result<String, AssetError> {
        let mut collided = false;
        loop {
            let filename = next_name();
            let path = self.resolver.root().join(&filename);

            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            let mut file = match file {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists && !collided => {
                    tracing::warn!(%filename, "Asset filename collision, regenerating");
                    collided = true;
                    continue;
                }
                Err(e) => return Err(AssetError::StorageUnavailable(e)),
            };

            let written = async {
                file.write_all(&decoded.bytes).await?;
                file.sync_all().await
            }
            .await;

            if let Err(e) = written {
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(AssetError::StorageUnavailable(e));
            }

            return Ok(filename);
        }
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    #[tracing::instrument(skip(self, payload, owner), fields(owner = %owner))]
    async fn store(
        &self,
        payload: &str,
        owner: &OwnerId,
        previous: Option<&str>,
    ) -> Result<String, AssetError> {
        let decoded = self.decoder.decode(payload)?;

        fs::create_dir_all(self.resolver.root()).await?;

        let filename = self.write_new_file(owner, &decoded).await?;
        let public_path = self.resolver.public_path(&filename);

        tracing::info!(
            class = %self.config.class,
            %public_path,
            size = decoded.bytes.len(),
            "Stored asset"
        );

        if let Some(previous) = previous.filter(|p| *p != public_path) {
            // The new file is already durable; a leftover old one is only an orphan.
            if let Err(e) = self.remove(previous).await {
                tracing::warn!(previous, error = %e, "Failed to remove superseded asset");
            }
        }

        Ok(public_path)
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, public_path: &str) -> Result<(), AssetError> {
        let Some(path) = self.resolver.resolve(public_path) else {
            tracing::debug!("Path is not an asset of this class, ignoring");
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(class = %self.config.class, "Removed asset");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AssetError::StorageUnavailable(e)),
        }
    }
}

/// `<owner>-<unix millis>-<8 hex chars><ext>`
fn generate_filename(owner: &OwnerId, extension: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix = Uuid::new_v4().as_u128() as u32;
    format!("{owner}-{millis}-{suffix:08x}{extension}")
}
