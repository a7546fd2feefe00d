use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::columns::snake_keys;
use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::filter_where::quote_column;
use crate::filter::{Condition, FilterData, FilterWhereOptions};
use crate::models::Entity;

/// Columns never rewritten by an update
const IMMUTABLE_COLUMNS: &[&str] = &["id", "created_at", "created_by"];

pub struct Repository<E> {
    pool: PgPool,
    _phantom: std::marker::PhantomData<E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Any record by id, soft-deleted ones included
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<E>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        find_by_id::<E>(&mut conn, id, true).await
    }

    /// Active record by id or `NotFound("<Label> not found")`
    pub async fn select_404(&self, id: Uuid) -> Result<E, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        active_404::<E>(&mut conn, id).await
    }
}

pub async fn select_one<E: Entity>(conn: &mut PgConnection, filter_data: FilterData) -> Result<Option<E>, DatabaseError> {
    QueryBuilder::<E>::new(E::TABLE)?
        .filter(FilterData {
            limit: Some(1),
            ..filter_data
        })?
        .select_optional(conn)
        .await
}

pub async fn find_by_id<E: Entity>(
    conn: &mut PgConnection,
    id: Uuid,
    include_inactive: bool,
) -> Result<Option<E>, DatabaseError> {
    select_one::<E>(
        conn,
        FilterData {
            where_clause: Some(Condition::eq("id", id)),
            options: FilterWhereOptions { include_inactive },
            ..Default::default()
        },
    )
    .await
}

pub async fn active_404<E: Entity>(conn: &mut PgConnection, id: Uuid) -> Result<E, DatabaseError> {
    find_by_id::<E>(conn, id, false)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("{} not found", E::LABEL)))
}

/// Row lock for read-modify-write inside a transaction
pub async fn lock_active_404<E: Entity>(conn: &mut PgConnection, id: Uuid) -> Result<E, DatabaseError> {
    let sql = format!(
        "SELECT * FROM \"{}\" WHERE \"id\" = $1 AND \"is_active\" = true FOR UPDATE",
        E::TABLE
    );
    sqlx::query_as::<_, E>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("{} not found", E::LABEL)))
}

/// Storage document: top-level keys as column names
fn storage_doc<E: Entity>(record: &E) -> Result<serde_json::Map<String, Value>, DatabaseError> {
    let value = serde_json::to_value(record).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
    match snake_keys(value) {
        Value::Object(map) => Ok(map),
        _ => Err(DatabaseError::QueryError(format!("{} did not serialize to an object", E::LABEL))),
    }
}

fn column_list(columns: &[&String]) -> Result<String, DatabaseError> {
    let quoted = columns
        .iter()
        .map(|c| quote_column(c))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(quoted.join(", "))
}

/// Inserts every non-null field; omitted columns take their database defaults.
pub async fn insert_record<E: Entity>(conn: &mut PgConnection, record: &E) -> Result<E, DatabaseError> {
    let doc = storage_doc(record)?;
    let columns: Vec<&String> = doc.iter().filter(|(_, v)| !v.is_null()).map(|(k, _)| k).collect();
    let list = column_list(&columns)?;
    let sql = format!(
        "INSERT INTO \"{table}\" ({list}) SELECT {list} FROM jsonb_populate_record(NULL::\"{table}\", $1) RETURNING *",
        table = E::TABLE,
        list = list
    );
    tracing::debug!(table = E::TABLE, id = %record.id(), "insert");
    Ok(sqlx::query_as::<_, E>(&sql)
        .bind(sqlx::types::Json(Value::Object(doc.clone())))
        .fetch_one(&mut *conn)
        .await?)
}

/// Rewrites every mutable column from the record.
pub async fn save_record<E: Entity>(conn: &mut PgConnection, record: &E) -> Result<E, DatabaseError> {
    let doc = storage_doc(record)?;
    let columns: Vec<&String> = doc
        .keys()
        .filter(|k| !IMMUTABLE_COLUMNS.contains(&k.as_str()))
        .collect();
    let list = column_list(&columns)?;
    let sql = format!(
        "UPDATE \"{table}\" SET ({list}) = (SELECT {list} FROM jsonb_populate_record(NULL::\"{table}\", $1)) \
         WHERE \"id\" = $2 RETURNING *",
        table = E::TABLE,
        list = list
    );
    tracing::debug!(table = E::TABLE, id = %record.id(), "update");
    sqlx::query_as::<_, E>(&sql)
        .bind(sqlx::types::Json(Value::Object(doc.clone())))
        .bind(record.id())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("{} not found", E::LABEL)))
}

pub async fn delete_record<E: Entity>(conn: &mut PgConnection, id: Uuid) -> Result<(), DatabaseError> {
    let sql = format!("DELETE FROM \"{}\" WHERE \"id\" = $1", E::TABLE);
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("{} not found", E::LABEL)));
    }
    Ok(())
}

/// True when `table` holds an active row with this id
pub async fn reference_exists(conn: &mut PgConnection, table: &str, id: Uuid) -> Result<bool, DatabaseError> {
    let table = quote_column(table)?;
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE \"id\" = $1 AND \"is_active\" = true)",
        table
    );
    Ok(sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(&mut *conn).await?)
}
