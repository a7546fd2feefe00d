// handlers/protected/crud.rs - GET/POST /api/<entity>, GET/PUT/DELETE /api/<entity>/:id

use std::collections::HashMap;

use axum::extract::{Query, State};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};

use crate::database::manager::DatabaseError;
use crate::database::repository::{insert_record, lock_active_404, reference_exists, save_record};
use crate::database::Repository;
use crate::error::ApiError;
use crate::listing::list_entities;
use crate::listing::populate::populate_one;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, IdPath, ValidJson};
use crate::models::{Entity, Reference, Writable};
use crate::state::AppState;

/// GET /api/<entity> - one page of active records
pub async fn list<E: Entity>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let page = list_entities::<E>(&state.pool, params).await?;
    Ok(ApiResponse::page(page))
}

/// GET /api/<entity>/:id - soft-deleted records stay addressable
pub async fn get<E: Entity>(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<Value> {
    let record = Repository::<E>::new(state.pool.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", E::LABEL)))?;
    Ok(ApiResponse::success(present(&state.pool, &record).await?))
}

/// POST /api/<entity>
pub async fn create<E: Writable>(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<E::Create>,
) -> ApiResult<Value> {
    let mut record = E::create(input, user.user_id)?;
    if E::USES_SETTINGS {
        let settings = state.settings.get().await?;
        record.apply_settings(&settings);
    }

    let mut conn = state.pool.acquire().await.map_err(DatabaseError::from)?;
    check_references(&mut conn, &record.references()).await?;
    let saved = insert_record(&mut conn, &record).await.map_err(duplicate::<E>)?;
    drop(conn);

    tracing::info!(entity = E::TABLE, id = %saved.id(), user = %user.user_id, "Created");
    Ok(ApiResponse::created(present(&state.pool, &saved).await?))
}

/// PUT /api/<entity>/:id
pub async fn update<E: Writable>(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidJson(input): ValidJson<E::Update>,
) -> ApiResult<Value> {
    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    let mut record = lock_active_404::<E>(&mut *tx, id).await?;
    let before = record.references();

    record.update(input)?;
    record.audit_mut().touch(user.user_id);

    let added: Vec<Reference> = record.references().into_iter().filter(|r| !before.contains(r)).collect();
    check_references(&mut *tx, &added).await?;
    let saved = save_record(&mut *tx, &record).await.map_err(duplicate::<E>)?;
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(entity = E::TABLE, id = %id, user = %user.user_id, "Updated");
    Ok(ApiResponse::success(present(&state.pool, &saved).await?))
}

/// DELETE /api/<entity>/:id - soft delete
pub async fn remove<E: Entity>(State(state): State<AppState>, user: AuthUser, IdPath(id): IdPath) -> ApiResult<()> {
    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    let mut record = lock_active_404::<E>(&mut *tx, id).await?;
    record.audit_mut().deactivate(user.user_id);
    save_record(&mut *tx, &record).await?;
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(entity = E::TABLE, id = %id, user = %user.user_id, "Soft deleted");
    Ok(ApiResponse::message(format!("{} deleted successfully", E::LABEL)))
}

/// Client document with references populated
pub async fn present<E: Entity>(pool: &PgPool, record: &E) -> Result<Value, ApiError> {
    Ok(populate_one(pool, E::populate(), record.to_api_value()).await?)
}

/// Every reference must point at an active row, else 404 "<Label> not found".
pub async fn check_references(conn: &mut PgConnection, references: &[Reference]) -> Result<(), ApiError> {
    for reference in references {
        if !reference_exists(conn, reference.table, reference.id).await? {
            return Err(ApiError::not_found(format!("{} not found", reference.label)));
        }
    }
    Ok(())
}

/// Natural-key collisions carry the entity's own message.
pub fn duplicate<E: Entity>(err: DatabaseError) -> ApiError {
    match err {
        DatabaseError::UniqueViolation(constraint) => {
            tracing::debug!(entity = E::TABLE, constraint = %constraint, "Duplicate key");
            ApiError::duplicate(E::DUPLICATE_MESSAGE)
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Customer, User};
    use axum::http::StatusCode;

    #[test]
    fn unique_violations_use_entity_message() {
        let err = duplicate::<Customer>(DatabaseError::UniqueViolation("customers_email_key".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Customer with this email already exists");

        let err = duplicate::<User>(DatabaseError::UniqueViolation("users_email_key".into()));
        assert_eq!(err.message(), "User with this email already exists");
    }

    #[test]
    fn other_database_errors_stay_generic() {
        let err = duplicate::<Customer>(DatabaseError::NotFound("Customer not found".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let err = duplicate::<Customer>(DatabaseError::QueryError("boom".into()));
        assert_eq!(err.message(), "Server error");
    }
}
