use crate::domain::external_apis::github::{GitHubApp, InstallationApi};
use crate::domain::models::repository::RepositoryRef;
use crate::domain::models::run::{Artifact, WorkflowRun};
use anyhow::{Context, Error, anyhow};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url, header};
use serde::{Deserialize, Serialize};

const USER_AGENT: &str = "gha-badge-rust-app";
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";

/// Lifetime of an app JWT (GitHub allows at most 10 minutes).
const JWT_LIFETIME_SECS: i64 = 600;

/// Backdating of `iat` to tolerate clock drift.
const JWT_CLOCK_DRIFT_SECS: i64 = 60;

const RUN_EVENT: &str = "push";
const RUN_STATUS: &str = "success";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Deserialize, Debug)]
struct GitHubInstallationResponse {
    id: u64,
}

#[derive(Deserialize, Debug)]
struct GitHubAccessTokenResponse {
    token: String,
}

#[derive(Deserialize, Debug, Clone)]
struct GitHubWorkflowRunResponse {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GitHubWorkflowRunsApiResponse {
    workflow_runs: Vec<GitHubWorkflowRunResponse>,
}

#[derive(Deserialize, Debug, Clone)]
struct GitHubArtifactResponse {
    id: u64,
    name: String,
    archive_download_url: String,
}

#[derive(Deserialize, Debug)]
struct GitHubArtifactsApiResponse {
    artifacts: Vec<GitHubArtifactResponse>,
}

/// Appends `segments` to the API base URL, escaping each one.
fn api_url(base_url: &str, segments: &[&str]) -> Result<Url, Error> {
    let mut url =
        Url::parse(base_url).with_context(|| format!("Invalid GitHub API URL {base_url}"))?;
    url.path_segments_mut()
        .map_err(|()| anyhow!("GitHub API URL {base_url} cannot have a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn github_request(client: &Client, method: Method, url: Url, bearer: &str) -> RequestBuilder {
    client
        .request(method, url)
        .bearer_auth(bearer)
        .header(header::ACCEPT, ACCEPT)
        .header(header::USER_AGENT, USER_AGENT)
        .header(API_VERSION_HEADER, API_VERSION)
}

/// Authenticates as a GitHub App. Built once at startup and shared across requests.
pub struct GitHubAppAdapter {
    client: Client,
    base_url: String,
    app_id: u64,
    key: EncodingKey,
}

impl GitHubAppAdapter {
    /// # Errors
    ///
    /// Fails if `private_key` is not an RSA private key in PEM format.
    pub fn new(base_url: String, app_id: u64, private_key: &[u8]) -> Result<Self, Error> {
        let key = EncodingKey::from_rsa_pem(private_key)
            .context("Failed to parse GitHub App private key")?;
        let adapter = Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id,
            key,
        };
        // PEM parsing alone accepts public keys; make sure the key can sign.
        adapter.app_jwt()?;
        Ok(adapter)
    }

    fn app_jwt(&self) -> Result<String, Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iat: now - JWT_CLOCK_DRIFT_SECS,
            exp: now + JWT_LIFETIME_SECS,
            iss: self.app_id.to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .context("Failed to sign GitHub App JWT")
    }
}

#[async_trait]
impl GitHubApp for GitHubAppAdapter {
    type Installation = InstallationClient;

    #[tracing::instrument(name = "GitHubAppAdapter::find_repository_installation", skip(self))]
    async fn find_repository_installation(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Option<u64>, Error> {
        let url = api_url(
            &self.base_url,
            &["repos", &repo.owner, &repo.name, "installation"],
        )?;
        let response = github_request(&self.client, Method::GET, url, &self.app_jwt()?)
            .send()
            .await
            .with_context(|| format!("Failed to send installation request for {repo}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let installation: GitHubInstallationResponse = response
            .error_for_status()
            .with_context(|| format!("API returned an error for installation of {repo}"))?
            .json()
            .await
            .with_context(|| format!("Failed to deserialize installation of {repo}"))?;

        tracing::debug!("Found installation {} for {}", installation.id, repo);
        Ok(Some(installation.id))
    }

    #[tracing::instrument(name = "GitHubAppAdapter::installation", skip(self))]
    async fn installation(&self, installation_id: u64) -> Result<InstallationClient, Error> {
        let id_segment = installation_id.to_string();
        let url = api_url(
            &self.base_url,
            &["app", "installations", &id_segment, "access_tokens"],
        )?;
        let access_token: GitHubAccessTokenResponse =
            github_request(&self.client, Method::POST, url, &self.app_jwt()?)
                .send()
                .await
                .context("Failed to send access token request")?
                .error_for_status()
                .context("API returned an error for access token request")?
                .json()
                .await
                .context("Failed to deserialize access token")?;

        Ok(InstallationClient {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: access_token.token,
        })
    }
}

/// GitHub client authenticated as a single installation. Lives for one request.
pub struct InstallationClient {
    client: Client,
    base_url: String,
    token: String,
}

impl InstallationClient {
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation_name: &str,
        url: Url,
    ) -> Result<T, Error> {
        github_request(&self.client, Method::GET, url, &self.token)
            .send()
            .await
            .with_context(|| format!("Failed to send request for {operation_name}"))?
            .error_for_status()
            .with_context(|| format!("API returned an error for {operation_name}"))?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize response for {operation_name}"))
    }
}

#[async_trait]
impl InstallationApi for InstallationClient {
    #[tracing::instrument(name = "InstallationClient::list_successful_push_runs", skip(self))]
    async fn list_successful_push_runs(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<Vec<WorkflowRun>, Error> {
        let mut url = api_url(
            &self.base_url,
            &["repos", &repo.owner, &repo.name, "actions", "runs"],
        )?;
        url.query_pairs_mut().extend_pairs([
            ("branch", branch),
            ("event", RUN_EVENT),
            ("status", RUN_STATUS),
        ]);

        let api_response: GitHubWorkflowRunsApiResponse = self
            .get_json(&format!("workflow runs for {repo}"), url)
            .await?;

        Ok(api_response
            .workflow_runs
            .into_iter()
            .map(|run_res| WorkflowRun {
                id: run_res.id,
                name: run_res.name.unwrap_or_default(),
            })
            .collect())
    }

    #[tracing::instrument(name = "InstallationClient::list_run_artifacts", skip(self))]
    async fn list_run_artifacts(
        &self,
        repo: &RepositoryRef,
        run_id: u64,
    ) -> Result<Vec<Artifact>, Error> {
        let run_id_segment = run_id.to_string();
        let url = api_url(
            &self.base_url,
            &[
                "repos",
                &repo.owner,
                &repo.name,
                "actions",
                "runs",
                &run_id_segment,
                "artifacts",
            ],
        )?;

        let api_response: GitHubArtifactsApiResponse = self
            .get_json(&format!("artifacts of run {run_id}"), url)
            .await?;

        Ok(api_response
            .artifacts
            .into_iter()
            .map(|artifact_res| Artifact {
                id: artifact_res.id,
                name: artifact_res.name,
                archive_download_url: artifact_res.archive_download_url,
            })
            .collect())
    }

    #[tracing::instrument(
        name = "InstallationClient::download_artifact",
        skip(self, artifact),
        fields(artifact_id = artifact.id)
    )]
    async fn download_artifact(&self, artifact: &Artifact, limit: usize) -> Result<Vec<u8>, Error> {
        let url = Url::parse(&artifact.archive_download_url)
            .with_context(|| format!("Invalid download URL {}", artifact.archive_download_url))?;
        let mut response = github_request(&self.client, Method::GET, url, &self.token)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(anyhow!("status {status}"));
        }

        // Stop pulling chunks once the limit is reached.
        let mut body = Vec::with_capacity(limit);
        while body.len() < limit {
            let Some(chunk) = response.chunk().await? else {
                break;
            };
            let remaining = limit - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
        }

        tracing::debug!("Read {} bytes of artifact {}", body.len(), artifact.id);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const PRIVATE_KEY: &[u8] =
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/app-key.pem"));
    const PUBLIC_KEY: &[u8] =
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/app-key.pub.pem"));

    fn repo() -> RepositoryRef {
        RepositoryRef {
            owner: "octo".to_string(),
            name: "widgets".to_string(),
        }
    }

    fn installation_client(server: &MockServer) -> InstallationClient {
        InstallationClient {
            client: Client::new(),
            base_url: server.uri(),
            token: "ghs_installation".to_string(),
        }
    }

    fn artifact_at(url: String) -> Artifact {
        Artifact {
            id: 5,
            name: "badge_coverage".to_string(),
            archive_download_url: url,
        }
    }

    #[test]
    fn test_rejects_invalid_private_key() {
        assert!(GitHubAppAdapter::new("https://api.github.com".to_string(), 1, b"nope").is_err());
    }

    #[test]
    fn test_app_jwt_is_signed_for_app_id() -> anyhow::Result<()> {
        let adapter =
            GitHubAppAdapter::new("https://api.github.com".to_string(), 4242, PRIVATE_KEY)?;
        let jwt = adapter.app_jwt()?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&["4242"]);
        let decoded = jsonwebtoken::decode::<Claims>(
            &jwt,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY)?,
            &validation,
        )?;
        assert_eq!(
            decoded.claims.exp - decoded.claims.iat,
            JWT_LIFETIME_SECS + JWT_CLOCK_DRIFT_SECS
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_find_repository_installation() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/installation"))
            .and(header_exists("authorization"))
            .and(header("x-github-api-version", API_VERSION))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": 42, "app_id": 4242 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let adapter = GitHubAppAdapter::new(server.uri(), 4242, PRIVATE_KEY)?;
        assert_eq!(adapter.find_repository_installation(&repo()).await?, Some(42));
        Ok(())
    }

    #[test]
    fn test_api_url_escapes_segments() -> anyhow::Result<()> {
        let url = api_url("https://ghe.example.com/api/v3", &["repos", "octo", "x#1?y/z"])?;
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/octo/x%231%3Fy%2Fz"
        );
        let url = api_url("http://127.0.0.1:8080", &["app", "installations"])?;
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/app/installations");
        Ok(())
    }

    #[tokio::test]
    async fn test_installation_lookup_keeps_repo_name_in_path() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/x%231/installation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 43 })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = GitHubAppAdapter::new(server.uri(), 4242, PRIVATE_KEY)?;
        let repo = RepositoryRef {
            owner: "octo".to_string(),
            name: "x#1".to_string(),
        };
        assert_eq!(adapter.find_repository_installation(&repo).await?, Some(43));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_installation_is_none() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/installation"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })),
            )
            .mount(&server)
            .await;

        let adapter = GitHubAppAdapter::new(server.uri(), 4242, PRIVATE_KEY)?;
        assert_eq!(adapter.find_repository_installation(&repo()).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_installation_lookup_error() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/installation"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let adapter = GitHubAppAdapter::new(server.uri(), 4242, PRIVATE_KEY)?;
        assert!(adapter.find_repository_installation(&repo()).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_installation_client_uses_access_token() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/42/access_tokens"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "token": "ghs_scoped",
                "expires_at": "2030-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/actions/runs/9/artifacts"))
            .and(header("authorization", "Bearer ghs_scoped"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 0,
                "artifacts": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = GitHubAppAdapter::new(server.uri(), 4242, PRIVATE_KEY)?;
        let installation = adapter.installation(42).await?;
        assert!(installation.list_run_artifacts(&repo(), 9).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_successful_push_runs_filters_query() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/actions/runs"))
            .and(query_param("branch", "release/1.x"))
            .and(query_param("event", "push"))
            .and(query_param("status", "success"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 2,
                "workflow_runs": [
                    { "id": 1, "name": "Build", "status": "completed" },
                    { "id": 2, "name": null }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let runs = installation_client(&server)
            .list_successful_push_runs(&repo(), "release/1.x")
            .await?;
        assert_eq!(
            runs,
            vec![
                WorkflowRun { id: 1, name: "Build".to_string() },
                WorkflowRun { id: 2, name: String::new() },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_list_run_artifacts() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/actions/runs/77/artifacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "artifacts": [{
                    "id": 5,
                    "name": "badge_coverage",
                    "size_in_bytes": 120,
                    "archive_download_url": "https://api.github.com/repos/octo/widgets/actions/artifacts/5/zip",
                    "expired": false
                }]
            })))
            .mount(&server)
            .await;

        let artifacts = installation_client(&server).list_run_artifacts(&repo(), 77).await?;
        assert_eq!(
            artifacts,
            vec![artifact_at(
                "https://api.github.com/repos/octo/widgets/actions/artifacts/5/zip".to_string()
            )]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_download_is_truncated_at_limit() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifacts/5/zip"))
            .and(header("authorization", "Bearer ghs_installation"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let artifact = artifact_at(format!("{}/artifacts/5/zip", server.uri()));
        let body = installation_client(&server)
            .download_artifact(&artifact, 1024)
            .await?;
        assert_eq!(body, vec![7u8; 1024]);
        Ok(())
    }

    #[tokio::test]
    async fn test_download_follows_redirect() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifacts/5/zip"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/blob/5", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blob/5"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK small".to_vec()))
            .mount(&server)
            .await;

        let artifact = artifact_at(format!("{}/artifacts/5/zip", server.uri()));
        let body = installation_client(&server)
            .download_artifact(&artifact, 1024)
            .await?;
        assert_eq!(body, b"PK small".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn test_download_non_ok_status_is_error() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifacts/5/zip"))
            .respond_with(|_: &Request| ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let artifact = artifact_at(format!("{}/artifacts/5/zip", server.uri()));
        let result = installation_client(&server)
            .download_artifact(&artifact, 1024)
            .await;
        match result {
            Err(e) => assert_eq!(e.to_string(), "status 410 Gone"),
            Ok(body) => panic!("unexpected body of {} bytes", body.len()),
        }
        Ok(())
    }
}
