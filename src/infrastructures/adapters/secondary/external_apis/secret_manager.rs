use crate::domain::external_apis::secret_store::SecretStore;
use anyhow::{Context, Error};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";
pub const DEFAULT_SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Deserialize, Debug)]
struct MetadataTokenResponse {
    access_token: String,
}

#[derive(Deserialize, Debug)]
struct SecretPayload {
    data: String,
}

#[derive(Deserialize, Debug)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

/// Google Secret Manager, authenticated with the runtime service account from the metadata server.
pub struct SecretManagerAdapter {
    client: Client,
    metadata_url: String,
    secret_manager_url: String,
}

impl SecretManagerAdapter {
    pub fn new(metadata_url: String, secret_manager_url: String) -> Self {
        Self {
            client: Client::new(),
            metadata_url,
            secret_manager_url,
        }
    }

    async fn access_token(&self) -> Result<String, Error> {
        let token: MetadataTokenResponse = self
            .client
            .get(format!("{}{}", self.metadata_url, TOKEN_PATH))
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("Failed to reach metadata server")?
            .error_for_status()
            .context("Metadata server returned an error")?
            .json()
            .await
            .context("Failed to deserialize metadata token")?;
        Ok(token.access_token)
    }
}

impl Default for SecretManagerAdapter {
    fn default() -> Self {
        Self::new(
            DEFAULT_METADATA_URL.to_string(),
            DEFAULT_SECRET_MANAGER_URL.to_string(),
        )
    }
}

#[async_trait]
impl SecretStore for SecretManagerAdapter {
    #[tracing::instrument(name = "SecretManagerAdapter::access_secret_version", skip(self))]
    async fn access_secret_version(&self, name: &str) -> Result<Vec<u8>, Error> {
        let access_token = self.access_token().await?;
        let response: AccessSecretVersionResponse = self
            .client
            .get(format!("{}/v1/{}:access", self.secret_manager_url, name))
            .bearer_auth(access_token)
            .send()
            .await
            .with_context(|| format!("Failed to send access request for {name}"))?
            .error_for_status()
            .with_context(|| format!("Secret Manager returned an error for {name}"))?
            .json()
            .await
            .with_context(|| format!("Failed to deserialize secret {name}"))?;

        let payload = STANDARD
            .decode(response.payload.data)
            .with_context(|| format!("Secret {name} payload is not valid base64"))?;
        tracing::info!("Retrieved secret {} ({} bytes)", name, payload.len());
        Ok(payload)
    }
}
