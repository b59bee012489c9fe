//! AWS credentials and request authentication.

use chrono::{DateTime, Utc};

use crate::AwsError;
use crate::sigv4::{self, SignableRequest};

/// Long- or short-term access keys used for SigV4.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    /// Build credentials from optional parts; both key halves must be present.
    pub fn from_parts(
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
        session_token: Option<&str>,
    ) -> Option<Self> {
        match (access_key_id, secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(Self::new(
                id,
                secret,
                session_token.filter(|t| !t.is_empty()).map(str::to_string),
            )),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// How an outgoing request proves who it is.
#[derive(Clone)]
pub enum AwsAuth {
    /// SigV4 with access keys.
    SigV4(Credentials),
    /// Bedrock API key, sent as `Authorization: Bearer <key>`.
    Bearer(String),
}

impl AwsAuth {
    /// Pick the authentication for Bedrock calls: an API key wins over
    /// access keys. `None` when neither is configured.
    pub fn for_bedrock(bearer_token: Option<&str>, credentials: Option<Credentials>) -> Option<Self> {
        match bearer_token.filter(|t| !t.is_empty()) {
            Some(token) => Some(Self::Bearer(token.to_string())),
            None => credentials.map(Self::SigV4),
        }
    }

    /// Headers that authenticate `request` for `service` in `region`.
    pub fn headers(
        &self,
        request: &SignableRequest<'_>,
        region: &str,
        service: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, AwsError> {
        match self {
            Self::Bearer(token) => Ok(vec![("authorization".into(), format!("Bearer {token}"))]),
            Self::SigV4(credentials) => sigv4::sign(request, credentials, region, service, now),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SigV4(_) => "sigv4",
            Self::Bearer(_) => "bearer",
        }
    }
}

impl std::fmt::Debug for AwsAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SigV4(credentials) => f.debug_tuple("SigV4").field(credentials).finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
        }
    }
}
