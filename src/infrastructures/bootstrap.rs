use crate::domain::external_apis::secret_store::SecretStore;
use crate::infrastructures::adapters::secondary::external_apis::github::GitHubAppAdapter;
use crate::infrastructures::adapters::secondary::external_apis::secret_manager::SecretManagerAdapter;
use crate::infrastructures::adapters::secondary::file_secret_store::FileSecretStore;
use crate::infrastructures::config::{Config, PrivateKeySource};
use anyhow::{Context, Error};

/// Loads the private key from the configured source.
///
/// # Errors
///
/// Returns an error if the secret cannot be read.
pub async fn load_private_key(source: &PrivateKeySource) -> Result<Vec<u8>, Error> {
    match source {
        PrivateKeySource::SecretManager(name) => {
            SecretManagerAdapter::default()
                .access_secret_version(name)
                .await
        }
        PrivateKeySource::File(path) => FileSecretStore.access_secret_version(path).await,
    }
}

/// Builds the process-wide GitHub App authentication from `config`.
///
/// # Errors
///
/// Any failure here is unrecoverable: the key cannot be fetched or is not a usable RSA key.
#[tracing::instrument(name = "bootstrap::github_app", skip(config), fields(app_id = config.app_id))]
pub async fn github_app(config: &Config) -> Result<GitHubAppAdapter, Error> {
    let private_key = load_private_key(&config.private_key)
        .await
        .context("Failed to retrieve GitHub private key")?;
    GitHubAppAdapter::new(config.github_api_url.clone(), config.app_id, &private_key)
        .context("Failed to create GitHub App authentication")
}
