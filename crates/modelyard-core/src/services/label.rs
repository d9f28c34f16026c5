use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sqlx::{Connection, QueryBuilder, SqliteConnection};

use crate::db::push_in;
use crate::error::{Error, Result};
use crate::records::{Id, Label, Labelable};
use crate::schemas::{LabelItem, ResourceType};

/// Replace the label set of `resource` with `items`.
///
/// Later items win when a key repeats. Existing labels whose keys are absent
/// from `items` are removed.
pub async fn create_or_update_labels<R: Labelable>(
    conn: &mut SqliteConnection,
    items: &[LabelItem],
    creator_id: Id,
    organization_id: Id,
    resource: &R,
) -> Result<Vec<Label>> {
    let mut wanted: BTreeMap<&str, &str> = BTreeMap::new();
    for item in items {
        if item.key.trim().is_empty() {
            return Err(Error::InvalidArgument("label key is empty".into()));
        }
        wanted.insert(item.key.as_str(), item.value.as_str());
    }

    let resource_type = resource.resource_type();
    let resource_id = resource.resource_id();
    let mut tx = conn.begin().await?;

    sqlx::query("DELETE FROM label WHERE resource_type = ? AND resource_id = ?")
        .bind(resource_type)
        .bind(resource_id)
        .execute(&mut *tx)
        .await?;

    let now = Utc::now();
    let mut labels = Vec::with_capacity(wanted.len());
    for (key, value) in wanted {
        let label = sqlx::query_as::<_, Label>(
            "INSERT INTO label (organization_id, resource_type, resource_id, key, value, creator_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(organization_id)
        .bind(resource_type)
        .bind(resource_id)
        .bind(key)
        .bind(value)
        .bind(creator_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        labels.push(label);
    }

    tx.commit().await?;
    tracing::debug!(
        resource_type = resource_type.as_str(),
        resource_id,
        count = labels.len(),
        "labels replaced"
    );
    Ok(labels)
}

pub async fn list_by_resource(
    conn: &mut SqliteConnection,
    resource_type: ResourceType,
    resource_id: Id,
) -> Result<Vec<Label>> {
    Ok(sqlx::query_as::<_, Label>(
        "SELECT * FROM label WHERE resource_type = ? AND resource_id = ? ORDER BY key",
    )
    .bind(resource_type)
    .bind(resource_id)
    .fetch_all(&mut *conn)
    .await?)
}

/// Labels of many resources of one type, keyed by resource id.
pub async fn list_by_resources(
    conn: &mut SqliteConnection,
    resource_type: ResourceType,
    resource_ids: &[Id],
) -> Result<HashMap<Id, Vec<Label>>> {
    let mut grouped: HashMap<Id, Vec<Label>> = HashMap::new();
    if resource_ids.is_empty() {
        return Ok(grouped);
    }

    let mut qb = QueryBuilder::new("SELECT * FROM label WHERE resource_type = ");
    qb.push_bind(resource_type);
    push_in(&mut qb, "resource_id", resource_ids);
    qb.push(" ORDER BY key");
    for label in qb.build_query_as::<Label>().fetch_all(&mut *conn).await? {
        grouped.entry(label.resource_id).or_default().push(label);
    }
    Ok(grouped)
}

/// Convert stored labels back into key/value items.
pub fn to_items(labels: &[Label]) -> Vec<LabelItem> {
    labels
        .iter()
        .map(|l| LabelItem::new(&l.key, &l.value))
        .collect()
}
