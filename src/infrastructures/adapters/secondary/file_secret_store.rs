use crate::domain::external_apis::secret_store::SecretStore;
use anyhow::{Context, Error};
use async_trait::async_trait;

/// Reads secrets from local files, the secret name being the path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSecretStore;

#[async_trait]
impl SecretStore for FileSecretStore {
    #[tracing::instrument(name = "FileSecretStore::access_secret_version", skip(self))]
    async fn access_secret_version(&self, name: &str) -> Result<Vec<u8>, Error> {
        tokio::fs::read(name)
            .await
            .with_context(|| format!("Failed to read secret file {name}"))
    }
}
