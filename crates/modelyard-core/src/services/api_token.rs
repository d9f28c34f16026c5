//! Personal API tokens.
//!
//! Only the SHA-256 hash of a token is stored; the plaintext is returned
//! once, at creation.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::types::Json;
use sqlx::SqliteConnection;

use super::{user, validate_name};
use crate::error::{Context, Error, Result};
use crate::records::{new_uid, ApiToken, Id, User};

/// Prefix of every issued token.
pub const TOKEN_PREFIX: &str = "myd_";

const TOKEN_RANDOM_LENGTH: usize = 40;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiTokenOption {
    #[serde(skip)]
    pub user_id: Id,
    #[serde(default)]
    pub organization_id: Option<Id>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
}

/// Generate a fresh plaintext token.
pub fn generate_token() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_RANDOM_LENGTH)
        .map(char::from)
        .collect();
    format!("{}{}", TOKEN_PREFIX, random)
}

/// Hex SHA-256 of a plaintext token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a token and return it with its plaintext value.
pub async fn create(
    conn: &mut SqliteConnection,
    opt: CreateApiTokenOption,
) -> Result<(ApiToken, String)> {
    validate_name("api token", &opt.name)?;
    if opt.expired_at.is_some_and(|at| at <= Utc::now()) {
        return Err(Error::InvalidArgument(
            "api token expiry must be in the future".into(),
        ));
    }

    let token = generate_token();
    let now = Utc::now();
    let record = sqlx::query_as::<_, ApiToken>(
        "INSERT INTO api_token (uid, user_id, organization_id, name, description, token_hash,
                                scopes, expired_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new_uid())
    .bind(opt.user_id)
    .bind(opt.organization_id)
    .bind(&opt.name)
    .bind(&opt.description)
    .bind(hash_token(&token))
    .bind(Json(&opt.scopes))
    .bind(opt.expired_at)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to create api token {}", opt.name))?;

    tracing::info!(user_id = opt.user_id, token = %record.name, "api token created");
    Ok((record, token))
}

pub async fn list(conn: &mut SqliteConnection, user_id: Id) -> Result<Vec<ApiToken>> {
    Ok(
        sqlx::query_as::<_, ApiToken>("SELECT * FROM api_token WHERE user_id = ? ORDER BY id DESC")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?,
    )
}

pub async fn get_by_name(conn: &mut SqliteConnection, user_id: Id, name: &str) -> Result<ApiToken> {
    sqlx::query_as::<_, ApiToken>("SELECT * FROM api_token WHERE user_id = ? AND name = ?")
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("api token {}", name)))
}

pub async fn delete(conn: &mut SqliteConnection, user_id: Id, name: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM api_token WHERE user_id = ? AND name = ?")
        .bind(user_id)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::not_found(format!("api token {}", name)));
    }
    tracing::info!(user_id, token = name, "api token deleted");
    Ok(())
}

/// Resolve a plaintext token to its owner, recording the use.
pub async fn authenticate(conn: &mut SqliteConnection, token: &str) -> Result<(ApiToken, User)> {
    let mut record = sqlx::query_as::<_, ApiToken>("SELECT * FROM api_token WHERE token_hash = ?")
        .bind(hash_token(token))
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::Unauthorized("invalid api token".into()))?;
    if record.is_expired() {
        return Err(Error::Unauthorized(format!(
            "api token {} has expired",
            record.name
        )));
    }

    let now = Utc::now();
    sqlx::query("UPDATE api_token SET last_used_at = ? WHERE id = ?")
        .bind(now)
        .bind(record.id)
        .execute(&mut *conn)
        .await?;
    record.last_used_at = Some(now);

    let owner = user::get(conn, record.user_id).await?;
    Ok((record, owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_prefixed_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert!(a.starts_with(TOKEN_PREFIX));
        assert_eq!(a.len(), TOKEN_PREFIX.len() + TOKEN_RANDOM_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = hash_token("myd_example");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("myd_example"));
        assert_ne!(hash, hash_token("myd_other"));
    }
}
