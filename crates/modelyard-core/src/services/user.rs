use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;

use super::validate_name;
use crate::error::{Context, Error, Result};
use crate::records::{new_uid, Id, User};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserOption {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

pub async fn create(conn: &mut SqliteConnection, opt: CreateUserOption) -> Result<User> {
    validate_name("user", &opt.name)?;
    let now = Utc::now();
    let user = sqlx::query_as::<_, User>(
        r#"INSERT INTO "user" (uid, name, email, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?) RETURNING *"#,
    )
    .bind(new_uid())
    .bind(&opt.name)
    .bind(&opt.email)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to create user {}", opt.name))?;

    tracing::info!(user = %user.name, "user created");
    Ok(user)
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<User> {
    sqlx::query_as::<_, User>(r#"SELECT * FROM "user" WHERE id = ?"#)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {}", id)))
}

pub async fn get_by_name(conn: &mut SqliteConnection, name: &str) -> Result<User> {
    sqlx::query_as::<_, User>(r#"SELECT * FROM "user" WHERE name = ?"#)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {}", name)))
}

/// Number of registered users.
pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "user""#)
        .fetch_one(&mut *conn)
        .await?)
}

pub async fn list_by_ids(conn: &mut SqliteConnection, ids: &[Id]) -> Result<Vec<User>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = sqlx::QueryBuilder::new(r#"SELECT * FROM "user" WHERE 1 = 1"#);
    crate::db::push_in(&mut qb, "id", ids);
    qb.push(" ORDER BY id");
    Ok(qb.build_query_as::<User>().fetch_all(&mut *conn).await?)
}
