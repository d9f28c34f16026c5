//! HS256-signed tokens.
//!
//! Short-lived credentials the server hands out and later accepts back
//! (part-upload URLs, browser sessions) are JWTs signed with the control
//! plane's signing key. Every claims type carries an `exp` Unix timestamp,
//! which is always validated.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Unix timestamp `ttl` from now, for an `exp` claim.
pub fn expires_in(ttl: Duration) -> u64 {
    let now = Utc::now().timestamp().max(0) as u64;
    now.saturating_add(ttl.as_secs())
}

/// Sign `claims` with `key`.
pub fn sign<T: Serialize>(key: &str, claims: &T) -> Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(key.as_bytes()),
    )
    .map_err(|e| Error::Config(format!("failed to sign token: {}", e)))
}

/// Check the signature and expiry of `token` and return its claims.
///
/// `what` names the credential in the error message.
pub fn verify<T: DeserializeOwned>(key: &str, token: &str, what: &str) -> Result<T> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;

    decode::<T>(token, &DecodingKey::from_secret(key.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => Error::Unauthorized(format!("{} has expired", what)),
            _ => Error::Unauthorized(format!("invalid {}", what)),
        })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Claims {
        sub: String,
        exp: u64,
    }

    #[test]
    fn test_sign_and_verify() {
        let claims = Claims {
            sub: "alice".to_string(),
            exp: expires_in(Duration::from_secs(60)),
        };
        let token = sign("secret", &claims).unwrap();
        let verified: Claims = verify("secret", &token, "session").unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let claims = Claims {
            sub: "alice".to_string(),
            exp: expires_in(Duration::from_secs(60)),
        };
        let token = sign("secret", &claims).unwrap();
        let err = verify::<Claims>("other", &token, "session").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(msg) if msg == "invalid session"));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let claims = Claims {
            sub: "alice".to_string(),
            exp: (Utc::now().timestamp() - 10) as u64,
        };
        let token = sign("secret", &claims).unwrap();
        let err = verify::<Claims>("secret", &token, "session").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(msg) if msg == "session has expired"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(verify::<Claims>("secret", "alice", "session").is_err());
        assert!(verify::<Claims>("secret", "", "session").is_err());
    }
}
