//! Replaces foreign-key ids in API documents with projections of the referenced rows.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::columns::{to_camel_case, to_snake_case};
use crate::database::manager::DatabaseError;
use crate::filter::filter_where::quote_column;

#[derive(Debug, Clone, Copy)]
pub enum Slot {
    /// `doc[field]` holds one id
    Field,
    /// `doc[field]` is an array of ids
    Ids,
    /// `doc[within][*][field]` holds one id per array element
    Nested(&'static str),
}

/// One reference kind on an entity: where the id sits and what to project.
#[derive(Debug, Clone, Copy)]
pub struct Populate {
    pub field: &'static str,
    pub slot: Slot,
    pub table: &'static str,
    /// Wire names of the projected fields; `id` is always included
    pub fields: &'static [&'static str],
}

impl Populate {
    pub const fn field(field: &'static str, table: &'static str, fields: &'static [&'static str]) -> Self {
        Self { field, slot: Slot::Field, table, fields }
    }

    pub const fn ids(field: &'static str, table: &'static str, fields: &'static [&'static str]) -> Self {
        Self { field, slot: Slot::Ids, table, fields }
    }

    pub const fn nested(
        within: &'static str,
        field: &'static str,
        table: &'static str,
        fields: &'static [&'static str],
    ) -> Self {
        Self { field, slot: Slot::Nested(within), table, fields }
    }

    fn collect_ids(&self, doc: &Value, out: &mut HashSet<Uuid>) {
        let parse = |v: &Value| v.as_str().and_then(|s| Uuid::parse_str(s).ok());
        match self.slot {
            Slot::Field => out.extend(doc.get(self.field).and_then(parse)),
            Slot::Ids => {
                if let Some(items) = doc.get(self.field).and_then(Value::as_array) {
                    out.extend(items.iter().filter_map(parse));
                }
            }
            Slot::Nested(within) => {
                if let Some(items) = doc.get(within).and_then(Value::as_array) {
                    out.extend(items.iter().filter_map(|item| item.get(self.field).and_then(parse)));
                }
            }
        }
    }

    fn apply(&self, doc: &mut Value, found: &HashMap<Uuid, Value>) {
        let resolve = |v: &Value| -> Value {
            v.as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .and_then(|id| found.get(&id).cloned())
                .unwrap_or(Value::Null)
        };
        match self.slot {
            Slot::Field => {
                if let Some(slot) = doc.get_mut(self.field) {
                    *slot = resolve(&*slot);
                }
            }
            Slot::Ids => {
                if let Some(Value::Array(items)) = doc.get_mut(self.field) {
                    *items = items.iter().map(resolve).filter(|v| !v.is_null()).collect();
                }
            }
            Slot::Nested(within) => {
                if let Some(Value::Array(items)) = doc.get_mut(within) {
                    for item in items.iter_mut() {
                        if let Some(slot) = item.get_mut(self.field) {
                            *slot = resolve(&*slot);
                        }
                    }
                }
            }
        }
    }

    fn projection_sql(&self) -> Result<String, DatabaseError> {
        let mut pairs = vec!["'id', \"id\"".to_string()];
        for field in self.fields {
            let column = quote_column(&to_snake_case(field))?;
            pairs.push(format!("'{}', {}", to_camel_case(field), column));
        }
        Ok(format!(
            "SELECT \"id\", json_build_object({}) AS doc FROM {} WHERE \"id\" = ANY($1)",
            pairs.join(", "),
            quote_column(self.table)?
        ))
    }
}

/// Resolves every reference kind across a page of documents, one query per kind.
/// Ids that no longer resolve become `null`.
pub async fn populate_all(pool: &PgPool, specs: &[Populate], docs: &mut [Value]) -> Result<(), DatabaseError> {
    if docs.is_empty() {
        return Ok(());
    }
    for spec in specs {
        let mut ids = HashSet::new();
        for doc in docs.iter() {
            spec.collect_ids(doc, &mut ids);
        }

        let found = if ids.is_empty() {
            HashMap::new()
        } else {
            let ids: Vec<Uuid> = ids.into_iter().collect();
            sqlx::query_as::<_, (Uuid, sqlx::types::Json<Value>)>(&spec.projection_sql()?)
                .bind(ids)
                .fetch_all(pool)
                .await?
                .into_iter()
                .map(|(id, doc)| (id, doc.0))
                .collect()
        };

        for doc in docs.iter_mut() {
            spec.apply(doc, &found);
        }
    }
    Ok(())
}

pub async fn populate_one(pool: &PgPool, specs: &[Populate], doc: Value) -> Result<Value, DatabaseError> {
    let mut docs = [doc];
    populate_all(pool, specs, &mut docs).await?;
    let [doc] = docs;
    Ok(doc)
}
