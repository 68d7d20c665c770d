use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::credentials;

const SERVICE: &str = "secretsmanager";

/// Static AWS credentials used to sign Secrets Manager requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Drop for AwsCredentials {
    fn drop(&mut self) {
        self.secret_access_key.zeroize();
        if let Some(token) = self.session_token.as_mut() {
            token.zeroize();
        }
    }
}

/// Everything the secret store client needs, resolved up front so the
/// resolver never reads ambient state.
#[derive(Debug, Clone)]
pub struct Config {
    pub region: String,
    pub endpoint_url: String,
    /// `None` when discovery found nothing; every retrieval then fails.
    pub credentials: Option<AwsCredentials>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn new(region: impl Into<String>, credentials: Option<AwsCredentials>) -> Self {
        let region = region.into();
        Self {
            endpoint_url: default_endpoint(&region),
            region,
            credentials,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_endpoint(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = endpoint_url.into();
        self
    }
}

/// Regional Secrets Manager endpoint.
/// E.g. `us-east-1` → `https://secretsmanager.us-east-1.amazonaws.com`
pub fn default_endpoint(region: &str) -> String {
    let suffix = if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    };
    format!("https://{}.{}.{}", SERVICE, region, suffix)
}

/// Loads configuration from `.env`, the process environment, the shared
/// credentials file and, failing those, the container or instance metadata
/// endpoints. Never fails: missing pieces fall back to defaults.
pub async fn load(region: &str) -> Config {
    dotenvy::dotenv().ok();
    let env = |key: &str| std::env::var(key).ok();

    let mut config = load_from(region, &env);
    if config.credentials.is_none() {
        config.credentials = credentials::load_remote(&env).await;
    }
    if config.credentials.is_none() {
        warn!("No AWS credentials found; every secret lookup will fail");
    }
    config
}

/// Local part of [`load`] (environment and shared credentials file) with an
/// injectable variable lookup.
pub fn load_from<F>(region: &str, env: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let credentials = credentials_from_env(&non_empty).or_else(|| {
        let path = non_empty("AWS_SHARED_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".aws").join("credentials")))?;
        let profile = non_empty("AWS_PROFILE").unwrap_or_else(|| "default".to_string());
        credentials_from_file(&path, &profile)
    });

    let mut config = Config::new(region, credentials);
    if let Some(endpoint) = non_empty("AWS_ENDPOINT_URL_SECRETS_MANAGER")
        .or_else(|| non_empty("AWS_ENDPOINT_URL"))
    {
        debug!("Using Secrets Manager endpoint override {}", endpoint);
        config = config.with_endpoint(endpoint);
    }
    config
}

fn credentials_from_env<F>(env: F) -> Option<AwsCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    Some(AwsCredentials {
        access_key_id: env("AWS_ACCESS_KEY_ID")?,
        secret_access_key: env("AWS_SECRET_ACCESS_KEY")?,
        session_token: env("AWS_SESSION_TOKEN"),
    })
}

fn credentials_from_file(path: &Path, profile: &str) -> Option<AwsCredentials> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read AWS credentials file {}: {}", path.display(), e);
            return None;
        }
    };
    let creds = parse_credentials_profile(&content, profile);
    if creds.is_none() {
        debug!("Profile '{}' not usable in {}", profile, path.display());
    }
    creds
}

/// Extracts one profile from an INI-style shared credentials file.
pub fn parse_credentials_profile(content: &str, profile: &str) -> Option<AwsCredentials> {
    let mut in_profile = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "aws_access_key_id" => access_key_id = Some(value),
            "aws_secret_access_key" => secret_access_key = Some(value),
            "aws_session_token" => session_token = Some(value),
            _ => {}
        }
    }

    Some(AwsCredentials {
        access_key_id: access_key_id?,
        secret_access_key: secret_access_key?,
        session_token,
    })
}
