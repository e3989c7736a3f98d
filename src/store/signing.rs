//! AWS Signature Version 4
//!
//! Signs S3 requests with the `Authorization` header scheme. Only the
//! single-chunk form is implemented: the payload hash is sent in
//! `x-amz-content-sha256` and covered by the signature.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Hex SHA-256 of an empty body
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// A request reduced to the parts SigV4 covers
#[derive(Debug)]
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    /// Already URI-encoded path, starting with `/`
    pub uri: &'a str,
    /// Already encoded and sorted query string, possibly empty
    pub query: &'a str,
    /// Lowercase header names with trimmed values
    pub headers: Vec<(String, String)>,
    pub payload_sha256: &'a str,
}

impl CanonicalRequest<'_> {
    fn sorted_headers(&self) -> Vec<(&str, &str)> {
        let mut headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.trim()))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(b.0));
        headers
    }

    /// `;`-joined list of signed header names
    pub fn signed_headers(&self) -> String {
        self.sorted_headers()
            .iter()
            .map(|(k, _)| *k)
            .collect::<Vec<_>>()
            .join(";")
    }

    fn to_canonical_string(&self) -> String {
        let mut canonical_headers = String::new();
        for (name, value) in self.sorted_headers() {
            canonical_headers.push_str(name);
            canonical_headers.push(':');
            canonical_headers.push_str(value);
            canonical_headers.push('\n');
        }

        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            self.uri,
            self.query,
            canonical_headers,
            self.signed_headers(),
            self.payload_sha256
        )
    }
}

/// Hex-encoded SHA-256 of a payload
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the signing key for a date (`YYYYMMDD`), region and service
pub fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Build the `Authorization` header value for a request
///
/// `amz_date` is the `x-amz-date` value (`YYYYMMDDTHHMMSSZ`) and must also
/// appear among the request's signed headers.
pub fn authorization(
    access_key: &str,
    secret_key: &str,
    region: &str,
    amz_date: &str,
    request: &CanonicalRequest<'_>,
) -> String {
    let date = &amz_date[..8.min(amz_date.len())];
    let scope = format!("{}/{}/{}/aws4_request", date, region, SERVICE);

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(request.to_canonical_string().as_bytes())
    );

    let key = signing_key(secret_key, date, region, SERVICE);
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM,
        access_key,
        scope,
        request.signed_headers(),
        signature
    )
}

/// URI-encode an object key for the request path, keeping `/` separators
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Encode and sort query parameters into canonical form
pub fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
