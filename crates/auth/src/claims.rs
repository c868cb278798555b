use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradedesk_core::PrincipalId;

/// Session token claims model (transport-agnostic).
///
/// This is the minimal set of claims the engine expects once a token has been
/// decoded/verified by whatever transport/security layer is in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Email the principal signed in with (used for staff lookups by email).
    #[serde(default)]
    pub email: Option<String>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

/// An active, validated session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    pub principal_id: PrincipalId,
    pub email: Option<String>,
}

impl Session {
    pub fn new(principal_id: PrincipalId, email: Option<String>) -> Self {
        Self {
            principal_id,
            email: email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()),
        }
    }
}

impl From<SessionClaims> for Session {
    fn from(claims: SessionClaims) -> Self {
        Session::new(claims.sub, claims.email)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed session token: {0}")]
    Malformed(String),
}

/// Deterministically validate session claims.
///
/// Note: this validates the *claims* only. Signature verification is done by a
/// [`SessionValidator`].
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), SessionValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(SessionValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(SessionValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(SessionValidationError::Expired);
    }
    Ok(())
}

/// Verifies a bearer token and returns its claims.
pub trait SessionValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionValidationError>;
}

/// HMAC-SHA256 signed session tokens.
pub struct Hs256SessionValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256SessionValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        // Time window checks are done by `validate_claims` on our own claim names.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl SessionValidator for Hs256SessionValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionValidationError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.key, &self.validation)
            .map_err(|e| SessionValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    fn claims(now: DateTime<Utc>) -> SessionClaims {
        SessionClaims {
            sub: PrincipalId::new(),
            email: Some(" Staff@Example.com ".to_string()),
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn time_window_checks() {
        let now = Utc::now();
        let ok = claims(now);
        assert_eq!(validate_claims(&ok, now), Ok(()));
        assert_eq!(
            validate_claims(&ok, ok.expires_at),
            Err(SessionValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&ok, ok.issued_at - Duration::seconds(1)),
            Err(SessionValidationError::NotYetValid)
        );

        let inverted = SessionClaims {
            expires_at: ok.issued_at,
            ..ok
        };
        assert_eq!(
            validate_claims(&inverted, now),
            Err(SessionValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn hs256_roundtrip_and_session_email_normalized() {
        let now = Utc::now();
        let c = claims(now);
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &c,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let validator = Hs256SessionValidator::new(b"secret");
        let decoded = validator.validate(&token, now).unwrap();
        assert_eq!(decoded, c);

        let session = Session::from(decoded);
        assert_eq!(session.email.as_deref(), Some("staff@example.com"));

        let wrong = Hs256SessionValidator::new(b"other");
        assert!(matches!(
            wrong.validate(&token, now),
            Err(SessionValidationError::Malformed(_))
        ));
    }
}
