use crate::domain::external_apis::github::{GitHubApp, InstallationApi};
use crate::domain::models::badge::Badge;
use crate::domain::models::repository::RepositoryRef;
use crate::domain::models::run::Artifact;
use crate::domain::services::artifact_status::{MAX_ARCHIVE_BYTES, extract_status};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Badge artifacts are published as `badge_<name>`.
pub const ARTIFACT_PREFIX: &str = "badge_";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateBadgeUseCaseInput {
    pub repo: RepositoryRef,
    pub branch: String,
    pub run: String,
    pub badge: String,
    pub subject: String,
    pub color: String,
    pub label: String,
    pub list: String,
    pub icon: String,
}

/// Every variant is reported to the caller as a bad request with its message as the body.
#[derive(Debug, Error)]
pub enum GenerateBadgeError {
    #[error("Can't find installation for repo")]
    InstallationNotFound,
    #[error("Failed to list runs")]
    ListRuns,
    #[error("No run found")]
    RunNotFound,
    #[error("Failed to get artifacts")]
    ListArtifacts,
    #[error("Artifact not found in {run_id}")]
    ArtifactNotFound { run_id: u64 },
    #[error("Failed to download artifact: {0}")]
    Download(String),
}

#[async_trait]
pub trait GenerateBadgeUseCase {
    async fn execute(&self, input: GenerateBadgeUseCaseInput) -> Result<Badge, GenerateBadgeError>;
}

pub struct GenerateBadgeInteractor<G: GitHubApp + Send + Sync + 'static> {
    github_app: Arc<G>,
}

impl<G: GitHubApp + Send + Sync + 'static> GenerateBadgeInteractor<G> {
    pub fn new(github_app: Arc<G>) -> Self {
        Self { github_app }
    }
}

#[async_trait]
impl<G: GitHubApp + Send + Sync + 'static> GenerateBadgeUseCase for GenerateBadgeInteractor<G> {
    #[tracing::instrument(
        name = "GenerateBadgeInteractor::execute",
        skip(self, input),
        fields(repo = %input.repo, branch = %input.branch, run = %input.run, badge = %input.badge)
    )]
    async fn execute(&self, input: GenerateBadgeUseCaseInput) -> Result<Badge, GenerateBadgeError> {
        let installation_id = match self
            .github_app
            .find_repository_installation(&input.repo)
            .await
        {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::warn!("No installation for {}", input.repo);
                return Err(GenerateBadgeError::InstallationNotFound);
            }
            Err(e) => {
                tracing::warn!("Installation lookup for {} failed: {:?}", input.repo, e);
                return Err(GenerateBadgeError::InstallationNotFound);
            }
        };
        let installation = self
            .github_app
            .installation(installation_id)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to authenticate installation {}: {:?}", installation_id, e);
                GenerateBadgeError::InstallationNotFound
            })?;

        let runs = installation
            .list_successful_push_runs(&input.repo, &input.branch)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to list runs: {:?}", e);
                GenerateBadgeError::ListRuns
            })?;
        tracing::debug!("Fetched {} runs", runs.len());
        let Some(run) = runs.iter().find(|run| run.matches_name(&input.run)) else {
            tracing::warn!("No run named {} on {}", input.run, input.branch);
            return Err(GenerateBadgeError::RunNotFound);
        };

        let artifacts = installation
            .list_run_artifacts(&input.repo, run.id)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to list artifacts of run {}: {:?}", run.id, e);
                GenerateBadgeError::ListArtifacts
            })?;
        let Some(artifact) = find_badge_artifact(&artifacts, &input.badge) else {
            tracing::warn!("No artifact {}{} in run {}", ARTIFACT_PREFIX, input.badge, run.id);
            return Err(GenerateBadgeError::ArtifactNotFound { run_id: run.id });
        };

        let archive = installation
            .download_artifact(artifact, MAX_ARCHIVE_BYTES)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to download artifact {}: {:?}", artifact.id, e);
                GenerateBadgeError::Download(format!("{e:#}"))
            })?;
        let status = extract_status(&archive).map_err(|e| {
            tracing::warn!("Failed to read artifact {}: {}", artifact.id, e);
            GenerateBadgeError::Download(e.to_string())
        })?;
        tracing::info!("Resolved status {:?} from artifact {}", status, artifact.id);

        Ok(Badge {
            subject: input.subject,
            status,
            color: input.color,
            label: input.label,
            list: input.list,
            icon: input.icon,
        })
    }
}

/// Picks the artifact named `badge_<badge>`. A later duplicate replaces an earlier one.
fn find_badge_artifact<'a>(artifacts: &'a [Artifact], badge: &str) -> Option<&'a Artifact> {
    let wanted = format!("{ARTIFACT_PREFIX}{badge}");
    artifacts.iter().rev().find(|a| a.name == wanted)
}
