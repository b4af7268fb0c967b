//! Bearer credential issuance and verification.
//!
//! Credentials are HS256 JWTs carrying `{username, scope, iat, exp, iss}`.
//! Nothing is stored server side: a credential is valid iff its signature
//! matches the configured secret, it has not expired and its issuer matches.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sse_mcp_types::Claims;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Lifetime of an issued credential unless configured otherwise.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Longest credential lifetime accepted from configuration.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Errors produced by the credential authority.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{0} must not be empty")]
    EmptyClaim(&'static str),
    #[error("Signing secret must not be empty")]
    EmptySecret,
    #[error("Invalid credential signature")]
    InvalidSignature,
    #[error("Credential expired")]
    Expired,
    #[error("Credential expiry is out of range")]
    ExpiryOverflow,
    #[error("Failed to sign credential: {0}")]
    Signing(String),
}

/// A signed bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Issues and verifies signed, expiring bearer tokens.
#[derive(Clone)]
pub struct CredentialAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

impl fmt::Debug for CredentialAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialAuthority")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialAuthority {
    /// Create an authority signing with `secret` and stamping `issuer`.
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        ttl: Duration,
    ) -> Result<Self, CredentialError> {
        if secret.is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer,
            ttl,
        })
    }

    /// Issue a credential for `identity` with `scope`, valid from now.
    pub fn issue(&self, identity: &str, scope: &str) -> Result<Credential, CredentialError> {
        self.issue_at(identity, scope, unix_now())
    }

    /// Issue a credential as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        identity: &str,
        scope: &str,
        issued_at: u64,
    ) -> Result<Credential, CredentialError> {
        if identity.is_empty() {
            return Err(CredentialError::EmptyClaim("identity"));
        }
        if scope.is_empty() {
            return Err(CredentialError::EmptyClaim("scope"));
        }

        let claims = Claims {
            username: identity.to_string(),
            scope: scope.to_string(),
            iat: issued_at,
            exp: issued_at
                .checked_add(self.ttl.as_secs())
                .ok_or(CredentialError::ExpiryOverflow)?,
            iss: self.issuer.clone(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map(Credential)
            .map_err(|e| CredentialError::Signing(e.to_string()))
    }

    /// Verify a presented token and return its claims.
    ///
    /// Anything that is not a well-formed token signed by this authority,
    /// including arbitrary strings and foreign issuers, is `InvalidSignature`.
    pub fn verify(&self, token: &str) -> Result<Claims, CredentialError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => CredentialError::Expired,
                _ => CredentialError::InvalidSignature,
            })
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
