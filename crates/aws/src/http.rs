//! Attach AWS authentication to outgoing `reqwest` requests.

use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Url};

use crate::AwsError;
use crate::credentials::AwsAuth;
use crate::sigv4::SignableRequest;

/// The `Host` header value for `url`, including a non-default port.
pub fn host_header(url: &Url) -> Result<String, AwsError> {
    let host = url
        .host_str()
        .ok_or_else(|| AwsError::Signing(format!("URL has no host: {url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Build a request for `url` carrying `body`, authenticated for `service`.
///
/// The URL's path must already be percent-encoded the way it will be sent.
pub fn authorized_request(
    client: &Client,
    method: Method,
    url: Url,
    body: Vec<u8>,
    auth: &AwsAuth,
    region: &str,
    service: &str,
) -> Result<RequestBuilder, AwsError> {
    let host = host_header(&url)?;
    let query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let signable = SignableRequest {
        method: method.as_str(),
        host: &host,
        path: url.path(),
        query: &query,
        payload: &body,
    };
    let headers = auth.headers(&signable, region, service, Utc::now())?;

    let mut builder = client.request(method, url);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    Ok(builder.body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;

    #[test]
    fn host_header_keeps_custom_port() {
        let url = Url::parse("http://127.0.0.1:4566/bucket/key").unwrap();
        assert_eq!(host_header(&url).unwrap(), "127.0.0.1:4566");

        let url = Url::parse("https://s3.us-east-1.amazonaws.com/bucket").unwrap();
        assert_eq!(host_header(&url).unwrap(), "s3.us-east-1.amazonaws.com");
    }

    #[test]
    fn signed_request_carries_auth_headers() {
        let client = Client::new();
        let auth = AwsAuth::SigV4(Credentials::new("AKID", "secret", None));
        let url = Url::parse("https://s3.us-east-1.amazonaws.com/bucket/key.json").unwrap();
        let request = authorized_request(&client, Method::PUT, url, b"[]".to_vec(), &auth, "us-east-1", "s3")
            .unwrap()
            .build()
            .unwrap();

        let headers = request.headers();
        assert!(
            headers["authorization"]
                .to_str()
                .unwrap()
                .starts_with("AWS4-HMAC-SHA256 Credential=AKID/")
        );
        assert!(headers.contains_key("x-amz-date"));
        assert!(headers.contains_key("x-amz-content-sha256"));
    }
}
