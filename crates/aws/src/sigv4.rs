//! AWS Signature Version 4.
//!
//! Only header-based signing is implemented (no presigned URLs, no chunked
//! payload signing). Requests are signed over `host`, `x-amz-date`, the
//! session token when present, and for S3 the `x-amz-content-sha256` header.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::AwsError;
use crate::credentials::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// The parts of an HTTP request that go into a signature.
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    /// The path exactly as sent on the wire (already percent-encoded once).
    pub path: &'a str,
    /// Unencoded query parameters.
    pub query: &'a [(String, String)],
    pub payload: &'a [u8],
}

/// Percent-encode per RFC 3986 the way SigV4 expects: unreserved characters
/// pass through, everything else becomes `%XX` with uppercase hex.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AwsError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| AwsError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the signing key for one day, region and service.
pub fn signing_key(
    secret_access_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, AwsError> {
    let k_date = hmac(format!("AWS4{secret_access_key}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn canonical_uri(path: &str, service: &str) -> String {
    let path = if path.is_empty() { "/" } else { path };
    // S3 is the one service whose canonical URI is not encoded a second time.
    if service == "s3" {
        path.to_string()
    } else {
        path.split('/')
            .map(|segment| uri_encode(segment, true))
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign `request` and return the headers to attach to it.
///
/// The returned list always contains `x-amz-date` and `authorization`, plus
/// `x-amz-security-token` for temporary credentials and
/// `x-amz-content-sha256` for S3.
pub fn sign(
    request: &SignableRequest<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>, AwsError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let payload_hash = sha256_hex(request.payload);

    // Kept sorted by name.
    let mut headers: Vec<(String, String)> = vec![("host".into(), request.host.to_string())];
    if service == "s3" {
        headers.push(("x-amz-content-sha256".into(), payload_hash.clone()));
    }
    headers.push(("x-amz-date".into(), amz_date.clone()));
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token".into(), token.clone()));
    }

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{k}:{}\n", v.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        canonical_uri(request.path, service),
        canonical_query(request.query),
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &date, region, service)?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    tracing::trace!(%scope, %signed_headers, "signed request");

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    );

    // `host` is set by the HTTP client from the URL.
    let mut out: Vec<(String, String)> = headers.into_iter().filter(|(k, _)| k != "host").collect();
    out.push(("authorization".into(), authorization));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> Credentials {
        Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
        )
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn uri_encode_rules() {
        assert_eq!(uri_encode("us.amazon.nova-micro-v1:0", true), "us.amazon.nova-micro-v1%3A0");
        assert_eq!(uri_encode("a b/c~", true), "a%20b%2Fc~");
        assert_eq!(uri_encode("alice/session_1", false), "alice/session_1");
    }

    #[test]
    fn signing_key_matches_aws_example() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn get_vanilla_signature() {
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let request = SignableRequest {
            method: "GET",
            host: "example.amazonaws.com",
            path: "/",
            query: &[],
            payload: b"",
        };
        let headers = sign(&request, &example_credentials(), "us-east-1", "service", now).unwrap();

        assert_eq!(header(&headers, "x-amz-date"), Some("20150830T123600Z"));
        assert_eq!(
            header(&headers, "authorization"),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
                 SignedHeaders=host;x-amz-date, \
                 Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
            )
        );
        assert!(header(&headers, "host").is_none());
    }

    #[test]
    fn s3_signs_content_hash() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = SignableRequest {
            method: "PUT",
            host: "s3.us-east-1.amazonaws.com",
            path: "/bucket/alice/session_1/messages.json",
            query: &[],
            payload: b"[]",
        };
        let headers = sign(&request, &example_credentials(), "us-east-1", "s3", now).unwrap();
        assert_eq!(header(&headers, "x-amz-content-sha256"), Some(sha256_hex(b"[]").as_str()));
        assert!(
            header(&headers, "authorization")
                .unwrap()
                .contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date,")
        );
    }

    #[test]
    fn session_token_is_signed() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let creds = Credentials::new("AKID", "secret", Some("token".into()));
        let request = SignableRequest {
            method: "POST",
            host: "bedrock-runtime.us-east-1.amazonaws.com",
            path: "/model/us.amazon.nova-micro-v1%3A0/converse-stream",
            query: &[],
            payload: b"{}",
        };
        let headers = sign(&request, &creds, "us-east-1", "bedrock", now).unwrap();
        assert_eq!(header(&headers, "x-amz-security-token"), Some("token"));
        assert!(
            header(&headers, "authorization")
                .unwrap()
                .contains("SignedHeaders=host;x-amz-date;x-amz-security-token,")
        );
    }

    #[test]
    fn non_s3_paths_are_encoded_twice() {
        assert_eq!(
            canonical_uri("/model/us.amazon.nova-micro-v1%3A0/converse-stream", "bedrock"),
            "/model/us.amazon.nova-micro-v1%253A0/converse-stream"
        );
        assert_eq!(canonical_uri("/bucket/a%20b", "s3"), "/bucket/a%20b");
        assert_eq!(canonical_uri("", "s3"), "/");
    }

    #[test]
    fn query_is_sorted_and_encoded() {
        let query = vec![
            ("prefix".to_string(), "a b".to_string()),
            ("list-type".to_string(), "2".to_string()),
        ];
        assert_eq!(canonical_query(&query), "list-type=2&prefix=a%20b");
    }
}
