//! Bearer token authentication.
//!
//! # Responsibilities
//! - Extract the bearer token from `Authorization`
//! - Verify it against the configured public key
//! - Enforce expiry
//! - Project the fixed claim set into forwarding headers
//!
//! # Design Decisions
//! - Routes marked `skip_auth` bypass verification entirely
//! - String claims are forwarded raw, other JSON values as compact JSON
//! - Unknown claims are ignored

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::routing::ServiceRoute;
use crate::security::headers::{
    strip_forwarding_headers, X_CUSTOM_CLAIMS, X_EXP, X_ISSUED_AT, X_IS_ADMIN, X_SESSION_ID,
    X_USER_ID,
};
use crate::security::token::{PublicKey, TokenError};

/// Authentication failure. The message is returned to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authorization header is required")]
    MissingCredential,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("failed to parse token claims: {0}")]
    InvalidClaims(String),

    #[error("token has no expiration")]
    MissingExpiration,

    #[error("token expiration is not a valid RFC 3339 time: {0}")]
    InvalidExpiration(String),

    #[error("token has expired")]
    Expired,

    #[error("public key is not configured")]
    KeyNotConfigured,
}

impl AuthError {
    /// Label for the `reason` dimension of failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::InvalidClaims(_) => "invalid_claims",
            AuthError::MissingExpiration => "missing_expiration",
            AuthError::InvalidExpiration(_) => "invalid_expiration",
            AuthError::Expired => "expired",
            AuthError::KeyNotConfigured => "key_not_configured",
        }
    }
}

/// Identity attributes carried by a verified token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Option<String>,
    pub is_admin: Option<String>,
    pub issued_at: Option<String>,
    pub session_id: Option<String>,
    pub custom_claims: Option<String>,
    pub expires_at: Option<String>,
}

impl Claims {
    fn from_map(map: &Map<String, Value>) -> Self {
        let get = |name: &str| map.get(name).map(render);
        Self {
            user_id: get("userId"),
            is_admin: get("isAdmin"),
            issued_at: get("iat"),
            session_id: get("sessionId"),
            custom_claims: get("customClaims"),
            expires_at: get("exp"),
        }
    }

    /// Header/value pairs for every claim that was present.
    pub fn headers(&self) -> impl Iterator<Item = (HeaderName, &str)> + '_ {
        [
            (X_USER_ID, &self.user_id),
            (X_IS_ADMIN, &self.is_admin),
            (X_ISSUED_AT, &self.issued_at),
            (X_SESSION_ID, &self.session_id),
            (X_CUSTOM_CLAIMS, &self.custom_claims),
            (X_EXP, &self.expires_at),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
    }

    /// Replace any inbound forwarding headers with these claims.
    pub fn apply(&self, headers: &mut HeaderMap) {
        let stripped = strip_forwarding_headers(headers);
        if stripped > 0 {
            tracing::debug!(stripped, "Removed caller-supplied forwarding headers");
        }

        for (name, value) in self.headers() {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(_) => {
                    tracing::warn!(header = %name, "Claim value is not a valid header value, skipping");
                }
            }
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Verifies bearer tokens for routes that require them.
#[derive(Debug, Clone)]
pub struct Authenticator {
    key: Option<PublicKey>,
    require_expiration: bool,
}

impl Authenticator {
    pub fn new(key: Option<PublicKey>, require_expiration: bool) -> Self {
        Self {
            key,
            require_expiration,
        }
    }

    /// An empty key is allowed; every protected route then fails with
    /// [`AuthError::KeyNotConfigured`].
    pub fn from_config(config: &AuthConfig) -> Result<Self, TokenError> {
        let key = match config.public_key_hex.trim() {
            "" => None,
            hex_key => Some(PublicKey::from_hex(hex_key)?),
        };
        Ok(Self::new(key, config.require_expiration))
    }

    /// Authenticate a request for `route`.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        route: &ServiceRoute,
    ) -> Result<Claims, AuthError> {
        if route.skip_auth {
            return Ok(Claims::default());
        }

        let token = bearer_token(headers).ok_or(AuthError::MissingCredential)?;
        let key = self.key.as_ref().ok_or(AuthError::KeyNotConfigured)?;
        let message = key.verify(token)?;

        let map: Map<String, Value> = serde_json::from_slice(&message)
            .map_err(|e| AuthError::InvalidClaims(e.to_string()))?;
        self.check_expiration(map.get("exp"), Utc::now())?;

        Ok(Claims::from_map(&map))
    }

    fn check_expiration(&self, exp: Option<&Value>, now: DateTime<Utc>) -> Result<(), AuthError> {
        let exp = match exp {
            Some(exp) => exp,
            None if self.require_expiration => return Err(AuthError::MissingExpiration),
            None => return Ok(()),
        };

        let raw = exp
            .as_str()
            .ok_or_else(|| AuthError::InvalidExpiration(exp.to_string()))?;
        let expires_at = DateTime::parse_from_rfc3339(raw)
            .map_err(|_| AuthError::InvalidExpiration(raw.to_string()))?;

        if expires_at <= now {
            return Err(AuthError::Expired);
        }
        Ok(())
    }
}

/// Token from `Authorization`, with an optional `Bearer ` prefix removed.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim_start();
    let token = match (value.get(..7), value.get(7..)) {
        (Some(prefix), Some(rest)) if prefix.eq_ignore_ascii_case("bearer ") => rest,
        _ => value,
    }
    .trim();
    (!token.is_empty()).then_some(token)
}
