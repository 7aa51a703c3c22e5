//! Stream Authentication
//!
//! Credentials for the key/secret handshake and the error taxonomy the
//! server answers it with. The server drops connections that have not
//! authenticated within [`AUTH_TIMEOUT`] of opening; the client uses
//! the same window for its own connect deadline.
//!
//! The handshake itself is one round trip: after the transport opens
//! (and the server acknowledges with `{"T":"success","msg":"connected"}`),
//! the client sends the auth action and waits for
//! `{"T":"success","msg":"authenticated"}`. Anything else arrives as an
//! `error` record carrying one of the codes mapped below.

use std::time::Duration;

use thiserror::Error;

use super::messages::{AuthRequest, ErrorMessage};

/// How long the server allows between connecting and authenticating.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Error Types
// =============================================================================

/// Authentication failures, mapped from the vendor's error codes.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Code 401: a request arrived before the handshake completed.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Code 402: the server rejected the key/secret pair.
    #[error("auth failed: key or secret rejected")]
    InvalidCredentials,

    /// Code 403: a second auth action on an authenticated connection.
    #[error("already authenticated")]
    AlreadyAuthenticated,

    /// Code 404, or the client-side connect deadline expiring.
    #[error("authentication not confirmed within the allowed window")]
    Timeout,

    /// Code 406: the account's connection quota is in use.
    #[error("connection limit exceeded")]
    ConnectionLimitExceeded,

    /// The credentials were unusable before any request was made.
    #[error("invalid credentials: {0}")]
    InvalidConfiguration(String),

    /// Any other error code the server reports during the handshake.
    #[error("server error ({code}): {message}")]
    ServerError {
        /// Vendor error code.
        code: i32,
        /// Vendor error text.
        message: String,
    },
}

impl From<&ErrorMessage> for AuthError {
    fn from(err: &ErrorMessage) -> Self {
        match err.code {
            401 => Self::NotAuthenticated,
            402 => Self::InvalidCredentials,
            403 => Self::AlreadyAuthenticated,
            404 => Self::Timeout,
            406 => Self::ConnectionLimitExceeded,
            code => Self::ServerError {
                code,
                message: err.msg.clone(),
            },
        }
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// API key/secret pair for the handshake.
///
/// `Debug` and `Display` redact the secret so credentials can appear
/// in log fields without leaking.
#[derive(Clone)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    /// Build credentials, rejecting empty values up front.
    ///
    /// # Errors
    ///
    /// Returns an error if either the key or the secret is empty.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Result<Self, AuthError> {
        let key = key.into();
        let secret = secret.into();

        if key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "API key cannot be empty".to_string(),
            ));
        }
        if secret.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "API secret cannot be empty".to_string(),
            ));
        }

        Ok(Self { key, secret })
    }

    /// Read credentials from `ALPACA_KEY` and `ALPACA_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is unset or empty.
    pub fn from_env() -> Result<Self, AuthError> {
        let key = std::env::var("ALPACA_KEY").map_err(|_| {
            AuthError::InvalidConfiguration("ALPACA_KEY environment variable not set".to_string())
        })?;
        let secret = std::env::var("ALPACA_SECRET").map_err(|_| {
            AuthError::InvalidConfiguration(
                "ALPACA_SECRET environment variable not set".to_string(),
            )
        })?;

        Self::new(key, secret)
    }

    /// The API key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The API secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Create an authentication request for the stream.
    #[must_use]
    pub fn to_auth_request(&self) -> AuthRequest {
        AuthRequest::new(self.key.clone(), self.secret.clone())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Display for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials(key={})", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_new() {
        let creds = Credentials::new("my_key", "my_secret").unwrap();
        assert_eq!(creds.key(), "my_key");
        assert_eq!(creds.secret(), "my_secret");
    }

    #[test]
    fn credentials_empty_key_fails() {
        assert!(Credentials::new("", "secret").is_err());
    }

    #[test]
    fn credentials_empty_secret_fails() {
        assert!(Credentials::new("key", "").is_err());
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = Credentials::new("my_key", "super_secret").unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("my_key"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super_secret"));
    }

    #[test]
    fn auth_request_carries_credentials() {
        let creds = Credentials::new("test_key", "test_secret").unwrap();
        let json = serde_json::to_string(&creds.to_auth_request()).unwrap();
        assert!(json.contains(r#""action":"auth""#));
        assert!(json.contains(r#""key":"test_key""#));
        assert!(json.contains(r#""secret":"test_secret""#));
    }

    #[test]
    fn auth_error_from_error_message() {
        let test_cases = [
            (401, AuthError::NotAuthenticated),
            (402, AuthError::InvalidCredentials),
            (403, AuthError::AlreadyAuthenticated),
            (404, AuthError::Timeout),
            (406, AuthError::ConnectionLimitExceeded),
        ];

        for (code, expected) in test_cases {
            let msg = ErrorMessage {
                msg_type: "error".to_string(),
                code,
                msg: "test".to_string(),
            };
            let err = AuthError::from(&msg);
            assert_eq!(
                std::mem::discriminant(&err),
                std::mem::discriminant(&expected)
            );
        }
    }

    #[test]
    fn unknown_code_maps_to_server_error() {
        let msg = ErrorMessage {
            msg_type: "error".to_string(),
            code: 500,
            msg: "internal error".to_string(),
        };
        match AuthError::from(&msg) {
            AuthError::ServerError { code, message } => {
                assert_eq!(code, 500);
                assert_eq!(message, "internal error");
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }
}
