//! Database pool, migrations, and list-query helpers.

use std::str::FromStr;

use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::schemas::ResourceType;

/// Default page size for list operations.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Open a connection pool and apply pending migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| Error::Config(format!("invalid database url {}: {}", config.url, e)))?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);
    // An in-memory database lives only as long as its connection.
    if config.url.contains(":memory:") {
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }
    let pool = pool_options.connect_with(options).await?;

    migrate(&pool).await?;
    tracing::info!(url = %config.url, "database ready");
    Ok(pool)
}

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Pagination and keyword search shared by list operations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListOptions {
    /// Offset of the first row.
    #[serde(default)]
    pub start: Option<u32>,
    /// Maximum number of rows.
    #[serde(default)]
    pub count: Option<u32>,
    /// Substring matched against the resource name.
    #[serde(default)]
    pub search: Option<String>,
}

impl ListOptions {
    pub fn new(start: u32, count: u32) -> Self {
        Self {
            start: Some(start),
            count: Some(count),
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn start(&self) -> u32 {
        self.start.unwrap_or(0)
    }

    pub fn count(&self) -> u32 {
        self.count.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Append `AND <column> LIKE '%search%'` when a keyword is set.
    pub fn push_keyword(&self, qb: &mut QueryBuilder<'_, Sqlite>, column: &str) {
        if let Some(search) = self.search.as_ref().filter(|s| !s.trim().is_empty()) {
            qb.push(format!(" AND {} LIKE ", column));
            qb.push_bind(format!("%{}%", search.trim()));
        }
    }

    /// Append `LIMIT ? OFFSET ?`.
    pub fn push_limit(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" LIMIT ");
        qb.push_bind(self.count() as i64);
        qb.push(" OFFSET ");
        qb.push_bind(self.start() as i64);
    }
}

/// Build an `ORDER BY` clause from a caller-supplied `"<column> [asc|desc]"`.
///
/// Only columns in `allowed` are accepted; `None` yields `default`.
pub fn order_clause(
    order: Option<&str>,
    table: &str,
    allowed: &[&str],
    default: &str,
) -> Result<String> {
    let Some(order) = order.map(str::trim).filter(|o| !o.is_empty()) else {
        return Ok(format!(" ORDER BY {}", default));
    };

    let mut parts = order.split_whitespace();
    let column = parts.next().unwrap_or_default();
    let column = column
        .strip_prefix(&format!("{}.", table))
        .unwrap_or(column);
    if !allowed.contains(&column) {
        return Err(Error::InvalidArgument(format!(
            "cannot order by {}",
            column
        )));
    }
    let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => "ASC",
        Some("desc") => "DESC",
        Some(other) => {
            return Err(Error::InvalidArgument(format!(
                "invalid order direction {}",
                other
            )))
        }
    };
    if parts.next().is_some() {
        return Err(Error::InvalidArgument(format!("invalid order {}", order)));
    }
    Ok(format!(" ORDER BY {}.{} {}", table, column, direction))
}

/// Label selector operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOperator {
    Eq,
    NotEq,
    In,
    Exists,
    DoesNotExist,
}

/// One label selector clause, e.g. `team=nlp`, `stage!=dev`,
/// `tier in (gold,silver)`, `owner`, or `!deprecated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
    pub key: String,
    pub operator: LabelOperator,
    pub values: Vec<String>,
}

impl LabelFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: LabelOperator::Eq,
            values: vec![value.into()],
        }
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: LabelOperator::Exists,
            values: Vec::new(),
        }
    }

    /// Parse a single selector clause.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidArgument("empty label selector".into()));
        }

        if let Some(key) = input.strip_prefix('!') {
            return Ok(Self {
                key: non_empty_key(key)?,
                operator: LabelOperator::DoesNotExist,
                values: Vec::new(),
            });
        }

        if let Some((key, value)) = input.split_once("!=") {
            return Ok(Self {
                key: non_empty_key(key)?,
                operator: LabelOperator::NotEq,
                values: vec![value.trim().to_string()],
            });
        }

        if let Some((key, value)) = input.split_once('=') {
            return Ok(Self {
                key: non_empty_key(key)?,
                operator: LabelOperator::Eq,
                values: vec![value.trim().to_string()],
            });
        }

        if let Some((key, rest)) = input.split_once(" in ") {
            let list = rest
                .trim()
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .ok_or_else(|| {
                    Error::InvalidArgument(format!("malformed label selector: {}", input))
                })?;
            let values: Vec<String> = list
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            if values.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "label selector has no values: {}",
                    input
                )));
            }
            return Ok(Self {
                key: non_empty_key(key)?,
                operator: LabelOperator::In,
                values,
            });
        }

        Ok(Self::exists(non_empty_key(input)?))
    }

    /// Parse a comma-free list of clauses separated by `;`.
    pub fn parse_all(input: &str) -> Result<Vec<Self>> {
        input
            .split(';')
            .filter(|s| !s.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

fn non_empty_key(key: &str) -> Result<String> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidArgument("label key is empty".into()));
    }
    Ok(key.to_string())
}

/// Append one `EXISTS`/`NOT EXISTS` clause per label filter, matching
/// labels attached to `<table>.id`.
pub fn push_label_filters(
    qb: &mut QueryBuilder<'_, Sqlite>,
    table: &str,
    resource_type: ResourceType,
    filters: &[LabelFilter],
) {
    for filter in filters {
        let negate = matches!(
            filter.operator,
            LabelOperator::NotEq | LabelOperator::DoesNotExist
        );
        qb.push(if negate { " AND NOT EXISTS (" } else { " AND EXISTS (" });
        qb.push("SELECT 1 FROM label WHERE label.resource_type = ");
        qb.push_bind(resource_type.as_str());
        qb.push(format!(" AND label.resource_id = {}.id AND label.key = ", table));
        qb.push_bind(filter.key.clone());

        match filter.operator {
            LabelOperator::Eq | LabelOperator::NotEq => {
                qb.push(" AND label.value = ");
                qb.push_bind(filter.values.first().cloned().unwrap_or_default());
            }
            LabelOperator::In => {
                qb.push(" AND label.value IN (");
                let mut separated = qb.separated(", ");
                for value in &filter.values {
                    separated.push_bind(value.clone());
                }
                qb.push(")");
            }
            LabelOperator::Exists | LabelOperator::DoesNotExist => {}
        }
        qb.push(")");
    }
}

/// Append `AND <column> IN (?, ?, ...)`. An empty list matches nothing.
pub fn push_in<T>(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, values: &[T])
where
    T: Clone + Send + for<'q> sqlx::Encode<'q, Sqlite> + sqlx::Type<Sqlite> + 'static,
{
    if values.is_empty() {
        qb.push(" AND 1 = 0");
        return;
    }
    qb.push(format!(" AND {} IN (", column));
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    qb.push(")");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_selectors() {
        assert_eq!(
            LabelFilter::parse("team=nlp").unwrap(),
            LabelFilter::eq("team", "nlp")
        );
        assert_eq!(
            LabelFilter::parse("stage != dev").unwrap().operator,
            LabelOperator::NotEq
        );
        let filter = LabelFilter::parse("tier in (gold, silver)").unwrap();
        assert_eq!(filter.operator, LabelOperator::In);
        assert_eq!(filter.values, vec!["gold", "silver"]);
        assert_eq!(
            LabelFilter::parse("!deprecated").unwrap().operator,
            LabelOperator::DoesNotExist
        );
        assert_eq!(LabelFilter::parse("owner").unwrap(), LabelFilter::exists("owner"));
    }

    #[test]
    fn test_parse_rejects_malformed_selectors() {
        assert!(LabelFilter::parse("").is_err());
        assert!(LabelFilter::parse("=value").is_err());
        assert!(LabelFilter::parse("tier in gold").is_err());
        assert!(LabelFilter::parse("tier in ()").is_err());
    }

    #[test]
    fn test_parse_all_splits_on_semicolon() {
        let filters = LabelFilter::parse_all("team=nlp; owner").unwrap();
        assert_eq!(filters.len(), 2);
    }

    #[test]
    fn test_list_options_clamps_count() {
        assert_eq!(ListOptions::default().count(), DEFAULT_PAGE_SIZE);
        assert_eq!(ListOptions::new(0, 0).count(), 1);
        assert_eq!(ListOptions::new(0, 100_000).count(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_order_clause_whitelists_columns() {
        let allowed = ["build_at", "version"];
        assert_eq!(
            order_clause(None, "model", &allowed, "model.build_at DESC").unwrap(),
            " ORDER BY model.build_at DESC"
        );
        assert_eq!(
            order_clause(Some("version asc"), "model", &allowed, "").unwrap(),
            " ORDER BY model.version ASC"
        );
        assert_eq!(
            order_clause(Some("model.build_at DESC"), "model", &allowed, "").unwrap(),
            " ORDER BY model.build_at DESC"
        );
        assert!(order_clause(Some("id; DROP TABLE model"), "model", &allowed, "").is_err());
        assert!(order_clause(Some("version sideways"), "model", &allowed, "").is_err());
    }

    #[tokio::test]
    async fn test_in_memory_migrations_apply() {
        let pool = connect(&DatabaseConfig::in_memory()).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM model")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
