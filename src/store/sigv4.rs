// ═══════════════════════════════════════════════════════════════
// AWS Signature Version 4 (SigV4) Signing
// ═══════════════════════════════════════════════════════════════
//
// Signs Secrets Manager requests. The signature covers:
//   - HTTP method, canonical URI, query string
//   - Sorted signed headers (host, content-type, x-amz-*)
//   - SHA-256 hash of the request body
//
// Reference: https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_aws-signing.html

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::AwsCredentials;
use crate::store::SecretStoreError;

type HmacSha256 = Hmac<Sha256>;

/// Headers included in the signature when present on the request.
const SIGNABLE_HEADERS: &[&str] = &[
    "content-type",
    "host",
    "x-amz-content-sha256",
    "x-amz-date",
    "x-amz-security-token",
    "x-amz-target",
];

/// SHA-256 hash of data, returned as lowercase hex string.
fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Result<Vec<u8>, SecretStoreError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SecretStoreError::Signing(e.to_string()))?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// key = HMAC("AWS4" + secret, date) → HMAC(_, region) → HMAC(_, service) → HMAC(_, "aws4_request")
fn derive_signing_key(
    secret: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SecretStoreError> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn header_value(value: &str) -> Result<HeaderValue, SecretStoreError> {
    HeaderValue::from_str(value).map_err(|e| SecretStoreError::Signing(e.to_string()))
}

/// Sign a request and inject the `Authorization`, `X-Amz-Date`,
/// `X-Amz-Content-Sha256` (and `X-Amz-Security-Token` for temporary
/// credentials) headers into `headers`.
#[allow(clippy::too_many_arguments)]
pub fn sign_request(
    method: &str,
    url: &str,
    headers: &mut HeaderMap,
    body: &[u8],
    credentials: &AwsCredentials,
    region: &str,
    service: &str,
    now: DateTime<Utc>,
) -> Result<(), SecretStoreError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let parsed_url =
        Url::parse(url).map_err(|e| SecretStoreError::Signing(format!("invalid URL: {}", e)))?;
    let host = match (parsed_url.host_str(), parsed_url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(SecretStoreError::Signing("URL has no host".into())),
    };
    let canonical_uri = if parsed_url.path().is_empty() { "/" } else { parsed_url.path() };

    let mut query_pairs: Vec<(String, String)> = parsed_url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    query_pairs.sort();
    let canonical_querystring: String = query_pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let payload_hash = sha256_hex(body);

    headers.insert(HeaderName::from_static("x-amz-date"), header_value(&amz_date)?);
    headers.insert(
        HeaderName::from_static("x-amz-content-sha256"),
        header_value(&payload_hash)?,
    );
    if let Some(token) = credentials.session_token.as_deref() {
        headers.insert(HeaderName::from_static("x-amz-security-token"), header_value(token)?);
    }
    headers.insert(reqwest::header::HOST, header_value(&host)?);

    // SIGNABLE_HEADERS is already sorted.
    let signed_header_list: Vec<&str> = SIGNABLE_HEADERS
        .iter()
        .copied()
        .filter(|name| headers.contains_key(*name))
        .collect();
    let signed_headers = signed_header_list.join(";");

    let mut canonical_headers_str = String::new();
    for &name in &signed_header_list {
        let value = headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("");
        canonical_headers_str.push_str(&format!("{}:{}\n", name, value.trim()));
    }

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method, canonical_uri, canonical_querystring, canonical_headers_str, signed_headers, payload_hash
    );

    let credential_scope = format!("{}/{}/{}/aws4_request", date_stamp, region, service);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let signing_key =
        derive_signing_key(&credentials.secret_access_key, &date_stamp, region, service)?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        credentials.access_key_id, credential_scope, signed_headers, signature
    );
    headers.insert(reqwest::header::AUTHORIZATION, header_value(&authorization)?);

    Ok(())
}
