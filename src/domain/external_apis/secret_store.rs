use anyhow::Error;
use async_trait::async_trait;

#[async_trait]
pub trait SecretStore {
    /// Returns the raw payload of a secret version, e.g. `projects/p/secrets/s/versions/latest`.
    async fn access_secret_version(&self, name: &str) -> Result<Vec<u8>, Error>;
}
