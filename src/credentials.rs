//! Remote credential providers, tried after the environment and the shared
//! credentials file: the ECS/EKS container endpoint, then EC2 instance
//! metadata (IMDSv2).

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AwsCredentials;

const CONTAINER_HOST: &str = "http://169.254.170.2";
const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_TTL_SECS: &str = "21600";
const IMDS_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("credential endpoint unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("credential endpoint returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed credential response: {0}")]
    Decode(String),

    #[error("failed to read container authorization token {path}: {source}")]
    TokenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no IAM role attached to this instance")]
    NoRole,
}

/// Shape shared by the container endpoint and the IMDS role document.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteCredentials {
    code: Option<String>,
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
}

/// Asks the container endpoint and then instance metadata for credentials.
/// Returns `None` when neither answers; failures are logged, never raised.
pub async fn load_remote<F>(env: F) -> Option<AwsCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let http = match reqwest::Client::builder()
        .use_rustls_tls()
        .connect_timeout(Duration::from_secs(1))
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(http) => http,
        Err(e) => {
            warn!("Failed to build credential provider client: {}", e);
            return None;
        }
    };

    if let Some(url) = container_url(&non_empty) {
        match from_container(&http, &url, &non_empty).await {
            Ok(creds) => {
                debug!("Using credentials from container endpoint");
                return Some(creds);
            }
            Err(e) => warn!("Container credentials unavailable: {}", e),
        }
    }

    if non_empty("AWS_EC2_METADATA_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        debug!("Instance metadata lookup disabled");
        return None;
    }
    let endpoint =
        non_empty("AWS_EC2_METADATA_SERVICE_ENDPOINT").unwrap_or_else(|| IMDS_ENDPOINT.to_string());
    match from_imds(&http, &endpoint).await {
        Ok(creds) => {
            debug!("Using credentials from instance metadata");
            Some(creds)
        }
        Err(e) => {
            debug!("Instance metadata credentials unavailable: {}", e);
            None
        }
    }
}

/// The relative URI (ECS) wins over the full URI (EKS pod identity).
fn container_url<F>(env: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(relative) = env("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
        return Some(format!("{}{}", CONTAINER_HOST, relative));
    }
    env("AWS_CONTAINER_CREDENTIALS_FULL_URI")
}

fn container_auth_token<F>(env: F) -> Result<Option<String>, CredentialsError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = env("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE") {
        let token = std::fs::read_to_string(&path)
            .map_err(|source| CredentialsError::TokenFile { path, source })?;
        return Ok(Some(token.trim().to_string()));
    }
    Ok(env("AWS_CONTAINER_AUTHORIZATION_TOKEN"))
}

async fn from_container<F>(
    http: &reqwest::Client,
    url: &str,
    env: F,
) -> Result<AwsCredentials, CredentialsError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut req = http.get(url);
    if let Some(token) = container_auth_token(env)? {
        req = req.header(AUTHORIZATION, token);
    }
    let body = success_text(req.send().await?).await?;
    parse_credentials(&body)
}

async fn from_imds(
    http: &reqwest::Client,
    endpoint: &str,
) -> Result<AwsCredentials, CredentialsError> {
    let base = endpoint.trim_end_matches('/');

    let token = success_text(
        http.put(format!("{}/latest/api/token", base))
            .header("x-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL_SECS)
            .send()
            .await?,
    )
    .await?;

    let roles = success_text(
        http.get(format!("{}{}", base, IMDS_CREDENTIALS_PATH))
            .header("x-aws-ec2-metadata-token", token.as_str())
            .send()
            .await?,
    )
    .await?;
    let role = roles
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or(CredentialsError::NoRole)?;

    let body = success_text(
        http.get(format!("{}{}{}", base, IMDS_CREDENTIALS_PATH, role))
            .header("x-aws-ec2-metadata-token", token.as_str())
            .send()
            .await?,
    )
    .await?;
    parse_credentials(&body)
}

async fn success_text(resp: reqwest::Response) -> Result<String, CredentialsError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(CredentialsError::Status(status));
    }
    Ok(resp.text().await?)
}

fn parse_credentials(body: &str) -> Result<AwsCredentials, CredentialsError> {
    let remote: RemoteCredentials =
        serde_json::from_str(body).map_err(|e| CredentialsError::Decode(e.to_string()))?;
    if let Some(code) = remote.code.as_deref() {
        if code != "Success" {
            return Err(CredentialsError::Decode(format!("status code {}", code)));
        }
    }
    Ok(AwsCredentials {
        access_key_id: remote.access_key_id,
        secret_access_key: remote.secret_access_key,
        session_token: remote.token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn credentials_body() -> serde_json::Value {
        serde_json::json!({
            "AccessKeyId": "ASIAREMOTE",
            "SecretAccessKey": "remote-secret",
            "Token": "remote-token",
            "Expiration": "2030-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_relative_uri_uses_container_host() {
        let url = container_url(lookup(&[
            ("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", "/v2/credentials/abc"),
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", "http://localhost:8080/creds"),
        ]));
        assert_eq!(url.as_deref(), Some("http://169.254.170.2/v2/credentials/abc"));
        assert!(container_url(lookup(&[])).is_none());
    }

    #[test]
    fn test_failed_imds_status_is_rejected() {
        let body = r#"{"Code":"AssumeRoleUnauthorizedAccess","AccessKeyId":"","SecretAccessKey":""}"#;
        let err = parse_credentials(body).unwrap_err();
        assert!(matches!(err, CredentialsError::Decode(_)), "{}", err);
    }

    #[tokio::test]
    async fn test_container_full_uri_with_auth_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/creds"))
            .and(header("authorization", "Bearer pod-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(credentials_body()))
            .expect(1)
            .mount(&server)
            .await;

        let full_uri = format!("{}/creds", server.uri());
        let creds = load_remote(lookup(&[
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", full_uri.as_str()),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN", "Bearer pod-token"),
            ("AWS_EC2_METADATA_DISABLED", "true"),
        ]))
        .await
        .unwrap();

        assert_eq!(creds.access_key_id, "ASIAREMOTE");
        assert_eq!(creds.secret_access_key, "remote-secret");
        assert_eq!(creds.session_token.as_deref(), Some("remote-token"));
    }

    #[tokio::test]
    async fn test_container_token_file_wins_over_inline_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/creds"))
            .and(header("authorization", "from-file"))
            .respond_with(ResponseTemplate::new(200).set_body_json(credentials_body()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join("token");
        std::fs::write(&token_file, "from-file\n").unwrap();

        let full_uri = format!("{}/creds", server.uri());
        let creds = load_remote(lookup(&[
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", full_uri.as_str()),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN", "inline"),
            ("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE", token_file.to_str().unwrap()),
            ("AWS_EC2_METADATA_DISABLED", "true"),
        ]))
        .await;

        assert!(creds.is_some());
    }

    #[tokio::test]
    async fn test_imds_token_role_and_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .and(header("x-aws-ec2-metadata-token-ttl-seconds", "21600"))
            .respond_with(ResponseTemplate::new(200).set_body_string("imds-session"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/iam/security-credentials/"))
            .and(header("x-aws-ec2-metadata-token", "imds-session"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ci-runner\n"))
            .expect(1)
            .mount(&server)
            .await;
        let mut body = credentials_body();
        body["Code"] = serde_json::json!("Success");
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/iam/security-credentials/ci-runner"))
            .and(header("x-aws-ec2-metadata-token", "imds-session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = server.uri();
        let creds = load_remote(lookup(&[(
            "AWS_EC2_METADATA_SERVICE_ENDPOINT",
            endpoint.as_str(),
        )]))
        .await
        .unwrap();

        assert_eq!(creds.access_key_id, "ASIAREMOTE");
        assert_eq!(creds.session_token.as_deref(), Some("remote-token"));
    }

    #[tokio::test]
    async fn test_imds_without_role_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("imds-session"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/iam/security-credentials/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let endpoint = server.uri();
        let creds = load_remote(lookup(&[(
            "AWS_EC2_METADATA_SERVICE_ENDPOINT",
            endpoint.as_str(),
        )]))
        .await;
        assert!(creds.is_none());
    }

    #[tokio::test]
    async fn test_imds_disabled_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_string("imds-session"))
            .expect(0)
            .mount(&server)
            .await;

        let endpoint = server.uri();
        let creds = load_remote(lookup(&[
            ("AWS_EC2_METADATA_SERVICE_ENDPOINT", endpoint.as_str()),
            ("AWS_EC2_METADATA_DISABLED", "TRUE"),
        ]))
        .await;
        assert!(creds.is_none());
    }
}
