//! # chatrelay AWS plumbing
//!
//! The smallest slice of AWS needed to talk to Bedrock, Bedrock Knowledge
//! Bases and S3 over plain HTTPS, without the AWS SDK:
//!
//! - [`credentials`]: access keys and Bedrock API keys
//! - [`sigv4`]: Signature Version 4 request signing
//! - [`eventstream`]: the `application/vnd.amazon.eventstream` binary framing
//! - [`http`]: attaching authentication to a `reqwest` request

pub mod credentials;
pub mod eventstream;
pub mod http;
pub mod sigv4;

pub use credentials::{AwsAuth, Credentials};
pub use eventstream::{EventStreamDecoder, Frame, HeaderValue};
pub use http::authorized_request;
pub use sigv4::{SignableRequest, sha256_hex, uri_encode};

/// Errors from credential handling, signing, or frame decoding.
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Malformed event-stream frame: {0}")]
    Frame(String),
}
