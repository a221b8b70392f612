//! AWS Signature V4 presigning.
//!
//! The S3 SDK presigns GET and PUT requests itself but has no POST-policy
//! support, so browser-form policies are signed here. The in-memory backend
//! uses the query-string presigner as well, so both backends hand out URLs
//! of the same shape.
//!
//! Based on: <https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-query-string-auth.html>
//! and <https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-post-example.html>

use crate::models::{
    object::ObjectRef,
    presigned::{PresignedTarget, SizeRange},
};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, fmt, time::Duration};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Endpoint and key pair used to sign requests.
///
/// `endpoint` is `scheme://host[:port]`; requests are addressed path-style.
#[derive(Clone)]
pub struct SigningCredentials {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl SigningCredentials {
    fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    fn host(&self) -> &str {
        let without_scheme = self
            .endpoint
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.endpoint);
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }

    fn scope(&self, date: &str) -> String {
        format!("{date}/{}/{SERVICE}/aws4_request", self.region)
    }
}

/// Build a query-string-signed URL for `method` on `object`.
pub fn presign_url(
    creds: &SigningCredentials,
    method: &str,
    object: &ObjectRef,
    expiry: Duration,
    now: DateTime<Utc>,
) -> String {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let path = format!(
        "/{}/{}",
        uri_encode(object.bucket().name(), true),
        uri_encode(object.key(), false)
    );

    let mut query = BTreeMap::new();
    query.insert("X-Amz-Algorithm", ALGORITHM.to_string());
    query.insert(
        "X-Amz-Credential",
        format!("{}/{}", creds.access_key, creds.scope(&date)),
    );
    query.insert("X-Amz-Date", amz_date.clone());
    query.insert("X-Amz-Expires", expiry.as_secs().to_string());
    query.insert("X-Amz-SignedHeaders", "host".to_string());
    let canonical_query = query
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k, true), uri_encode(v, true)))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "{method}\n{path}\n{canonical_query}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
        creds.host()
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{}\n{:x}",
        creds.scope(&date),
        Sha256::digest(canonical_request.as_bytes())
    );
    let signature = hex::encode(hmac_sha256(
        &signing_key(&creds.secret_key, &date, &creds.region),
        string_to_sign.as_bytes(),
    ));

    format!(
        "{}{path}?{canonical_query}&X-Amz-Signature={signature}",
        creds.base_url()
    )
}

/// Sign a browser-form POST policy restricting uploads to `object.key()` and `range`.
pub fn post_policy(
    creds: &SigningCredentials,
    object: &ObjectRef,
    expiry: Duration,
    range: SizeRange,
    now: DateTime<Utc>,
) -> PresignedTarget {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let credential = format!("{}/{}", creds.access_key, creds.scope(&date));
    let expiration = now + chrono::Duration::seconds(expiry.as_secs() as i64);

    let policy = json!({
        "expiration": expiration.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "conditions": [
            { "bucket": object.bucket().name() },
            { "key": object.key() },
            ["content-length-range", range.min, range.max],
            { "x-amz-algorithm": ALGORITHM },
            { "x-amz-credential": credential },
            { "x-amz-date": amz_date },
        ],
    });
    let encoded_policy = general_purpose::STANDARD.encode(policy.to_string());
    let signature = hex::encode(hmac_sha256(
        &signing_key(&creds.secret_key, &date, &creds.region),
        encoded_policy.as_bytes(),
    ));

    let fields = BTreeMap::from([
        ("bucket".to_string(), object.bucket().name().to_string()),
        ("key".to_string(), object.key().to_string()),
        ("policy".to_string(), encoded_policy),
        ("x-amz-algorithm".to_string(), ALGORITHM.to_string()),
        ("x-amz-credential".to_string(), credential),
        ("x-amz-date".to_string(), amz_date),
        ("x-amz-signature".to_string(), signature),
    ]);

    PresignedTarget {
        url: format!(
            "{}/{}",
            creds.base_url(),
            uri_encode(object.bucket().name(), true)
        ),
        fields,
    }
}

/// kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), "s3"), "aws4_request")
fn signing_key(secret_key: &str, date: &str, region: &str) -> Vec<u8> {
    let k_secret = format!("AWS4{secret_key}");
    let k_date = hmac_sha256(k_secret.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// RFC 3986 percent-encoding as SigV4 expects it.
///
/// Unreserved characters pass through; `/` is kept unless `encode_slash` is set.
pub(crate) fn uri_encode(value: &str, encode_slash: bool) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b'/' if !encode_slash => encoded.push('/'),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
