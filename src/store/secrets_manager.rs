//! AWS Secrets Manager client speaking the JSON 1.1 protocol directly.
//! One signed `GetSecretValue` call per lookup; no retries, no caching.
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{sigv4, SecretStore, SecretStoreError, SecretValue};
use crate::config::{AwsCredentials, Config};

const SERVICE: &str = "secretsmanager";
const CONTENT_TYPE_AMZ_JSON: &str = "application/x-amz-json-1.1";
const TARGET_GET_SECRET_VALUE: &str = "secretsmanager.GetSecretValue";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueRequest<'a> {
    secret_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    #[serde(default)]
    secret_string: Option<String>,
    #[serde(default)]
    version_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

pub struct SecretsManagerClient {
    http: reqwest::Client,
    endpoint: String,
    region: String,
    credentials: Option<AwsCredentials>,
}

impl SecretsManagerClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/", config.endpoint_url.trim_end_matches('/')),
            region: config.region.clone(),
            credentials: config.credentials.clone(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl SecretStore for SecretsManagerClient {
    async fn get_secret_value(&self, secret_id: &str) -> Result<SecretValue, SecretStoreError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(SecretStoreError::MissingCredentials)?;

        let body = serde_json::to_vec(&GetSecretValueRequest { secret_id })
            .map_err(|e| SecretStoreError::Decode(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_AMZ_JSON));
        headers.insert("x-amz-target", HeaderValue::from_static(TARGET_GET_SECRET_VALUE));
        sigv4::sign_request(
            "POST",
            &self.endpoint,
            &mut headers,
            &body,
            credentials,
            &self.region,
            SERVICE,
            chrono::Utc::now(),
        )?;

        let resp = self
            .http
            .post(&self.endpoint)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| SecretStoreError::Transport(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SecretStoreError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(status, &bytes));
        }

        let parsed: GetSecretValueResponse =
            serde_json::from_slice(&bytes).map_err(|e| SecretStoreError::Decode(e.to_string()))?;
        debug!(
            "Fetched secret {} (version {})",
            secret_id,
            parsed.version_id.as_deref().unwrap_or("unknown")
        );

        parsed
            .secret_string
            .map(SecretValue::from)
            .ok_or(SecretStoreError::NoStringPayload)
    }
}

/// Turns a non-2xx response into a classified error. The service code in
/// `__type` may carry a namespace prefix (`com.amazonaws...#Code`).
fn classify_error(status: reqwest::StatusCode, body: &[u8]) -> SecretStoreError {
    let parsed: Option<ErrorResponse> = serde_json::from_slice(body).ok();
    let (code, message) = match parsed {
        Some(err) => (err.error_type, err.message),
        None => (None, None),
    };
    let message = message.unwrap_or_else(|| format!("HTTP {}", status));

    match code {
        Some(code) => {
            let code = code.rsplit('#').next().unwrap_or(&code).to_string();
            SecretStoreError::from_service(&code, message)
        }
        None if status == reqwest::StatusCode::TOO_MANY_REQUESTS => {
            SecretStoreError::Throttled(message)
        }
        None if status == reqwest::StatusCode::FORBIDDEN => SecretStoreError::AccessDenied(message),
        None => SecretStoreError::Service {
            code: status.as_u16().to_string(),
            message,
        },
    }
}
