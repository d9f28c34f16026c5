//! Request authentication.
//!
//! A request is authenticated by an API token in the
//! `X-Modelyard-Api-Token` header, or else by the session cookie set at
//! login. The session is an HS256 JWT `{sub, exp}` signed with the control
//! plane's signing key; a cookie that does not verify is rejected, never
//! ignored.

use std::time::Duration;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use modelyard_core::services::{api_token, user};
use modelyard_core::{signing, ApiToken, User};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::AppState;

/// Header carrying an API token.
pub const API_TOKEN_HEADER: &str = "x-modelyard-api-token";

/// Cookie carrying the signed session.
pub const SESSION_COOKIE: &str = "modelyard-session";

/// Lifetime of a login session.
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Claims of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Username.
    pub sub: String,
    /// Expiry, Unix seconds.
    pub exp: u64,
}

/// Sign a session for `user`.
pub fn issue_session(key: &str, user: &User) -> Result<String, AppError> {
    let claims = SessionClaims {
        sub: user.name.clone(),
        exp: signing::expires_in(SESSION_TTL),
    };
    Ok(signing::sign(key, &claims)?)
}

/// Verify a session token and return its claims.
pub fn verify_session(key: &str, token: &str) -> Result<SessionClaims, AppError> {
    Ok(signing::verify(key, token, "session")?)
}

/// `Set-Cookie` value carrying `token`.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        SESSION_TTL.as_secs()
    )
}

/// `Set-Cookie` value that removes the session.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// The token the request was made with, if any.
    pub api_token: Option<ApiToken>,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let mut conn = state.cp.pool.acquire().await?;

        if let Some(token) = header_value(&parts.headers, API_TOKEN_HEADER) {
            let (api_token, user) = api_token::authenticate(&mut conn, token).await?;
            return Ok(CurrentUser {
                user,
                api_token: Some(api_token),
            });
        }

        if let Some(token) = cookie_value(&parts.headers, SESSION_COOKIE) {
            let claims = verify_session(&state.cp.signing_key, token)?;
            let user = user::get_by_name(&mut conn, &claims.sub).await.map_err(|err| {
                if err.is_not_found() {
                    AppError::Unauthorized(format!("unknown user {}", claims.sub))
                } else {
                    err.into()
                }
            })?;
            return Ok(CurrentUser {
                user,
                api_token: None,
            });
        }

        Err(AppError::Unauthorized("authentication required".to_string()))
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Value of the named cookie across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; modelyard-session=abc.def.ghi"),
        );
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), Some("abc.def.ghi"));
        assert_eq!(cookie_value(&headers, "theme"), Some("dark"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_empty_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("modelyard-session="));
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), None);
    }

    fn alice() -> User {
        User {
            id: 1,
            uid: "u-1".to_string(),
            name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_session_round_trip() {
        let token = issue_session("key", &alice()).unwrap();
        let claims = verify_session("key", &token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.exp > signing::expires_in(Duration::ZERO));
    }

    #[test]
    fn test_session_signed_with_other_key_is_rejected() {
        let token = issue_session("other-key", &alice()).unwrap();
        assert!(matches!(
            verify_session("key", &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_bare_username_is_not_a_session() {
        assert!(matches!(
            verify_session("key", "alice"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("t0k");
        assert!(cookie.starts_with("modelyard-session=t0k;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
