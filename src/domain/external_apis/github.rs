use crate::domain::models::repository::RepositoryRef;
use crate::domain::models::run::{Artifact, WorkflowRun};
use anyhow::Error;
use async_trait::async_trait;

/// App-level access to GitHub, shared by every request.
#[async_trait]
pub trait GitHubApp {
    type Installation: InstallationApi + Send + Sync;

    /// Looks up the installation covering `repo`, returning `None` if the app is not installed there.
    async fn find_repository_installation(&self, repo: &RepositoryRef)
    -> Result<Option<u64>, Error>;

    /// Derives a client authenticated as the given installation.
    async fn installation(&self, installation_id: u64) -> Result<Self::Installation, Error>;
}

/// Repository-scoped calls made on behalf of one installation.
#[async_trait]
pub trait InstallationApi {
    /// Lists successful push-triggered runs on `branch` (first page only).
    async fn list_successful_push_runs(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<Vec<WorkflowRun>, Error>;

    async fn list_run_artifacts(
        &self,
        repo: &RepositoryRef,
        run_id: u64,
    ) -> Result<Vec<Artifact>, Error>;

    /// Downloads at most `limit` bytes of the artifact archive.
    async fn download_artifact(&self, artifact: &Artifact, limit: usize) -> Result<Vec<u8>, Error>;
}
