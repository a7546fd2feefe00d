// handlers/protected/sales_outlets.rs - POST/PUT/DELETE /api/sales-outlets
//
// Staff roster edits are mirrored onto each user's `outlet` field.

use axum::extract::State;
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::repository::{insert_record, lock_active_404, save_record};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, IdPath, ValidJson};
use crate::models::sales_outlet::{CreateSalesOutlet, UpdateSalesOutlet};
use crate::models::{Entity, Reference, SalesOutlet, User, Writable};
use crate::state::AppState;

use super::crud::{check_references, duplicate, present};
use super::users::{leave_outlet, lock_rosters};

/// Points a new roster member at `outlet`, pulling them off any other roster.
async fn enlist(conn: &mut PgConnection, outlet: Uuid, member: Uuid, actor: Uuid) -> Result<(), ApiError> {
    let mut user = lock_active_404::<User>(conn, member).await?;
    if user.outlet == Some(outlet) {
        return Ok(());
    }
    if let Some(previous) = user.outlet.replace(outlet) {
        leave_outlet(conn, previous, member, actor).await?;
    }
    user.audit_mut().touch(actor);
    save_record(conn, &user).await?;
    Ok(())
}

/// Clears `outlet` on a member dropped from the roster, unless they moved elsewhere.
async fn discharge(conn: &mut PgConnection, outlet: Uuid, member: Uuid, actor: Uuid) -> Result<(), ApiError> {
    let mut user = match lock_active_404::<User>(conn, member).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound(_)) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if user.outlet == Some(outlet) {
        user.outlet = None;
        user.audit_mut().touch(actor);
        save_record(conn, &user).await?;
    }
    Ok(())
}

/// POST /api/sales-outlets
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<CreateSalesOutlet>,
) -> ApiResult<Value> {
    let record = SalesOutlet::create(input, user.user_id)?;

    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    lock_rosters(&mut *tx).await?;
    check_references(&mut *tx, &record.references()).await?;
    let saved = insert_record(&mut *tx, &record).await.map_err(duplicate::<SalesOutlet>)?;
    for member in &saved.staff.0 {
        enlist(&mut *tx, saved.id, *member, user.user_id).await?;
    }
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(id = %saved.id, code = %saved.code, staff = saved.staff.0.len(), "Sales outlet created");
    Ok(ApiResponse::created(present(&state.pool, &saved).await?))
}

/// PUT /api/sales-outlets/:id
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidJson(input): ValidJson<UpdateSalesOutlet>,
) -> ApiResult<Value> {
    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    lock_rosters(&mut *tx).await?;
    let mut record = lock_active_404::<SalesOutlet>(&mut *tx, id).await?;
    let before = record.references();
    let roster = record.staff.0.clone();

    record.update(input)?;
    record.audit_mut().touch(user.user_id);

    let added: Vec<Reference> = record.references().into_iter().filter(|r| !before.contains(r)).collect();
    check_references(&mut *tx, &added).await?;
    let saved = save_record(&mut *tx, &record).await.map_err(duplicate::<SalesOutlet>)?;

    for member in roster.iter().filter(|m| !saved.staff.0.contains(m)) {
        discharge(&mut *tx, id, *member, user.user_id).await?;
    }
    for member in saved.staff.0.iter().filter(|m| !roster.contains(m)) {
        enlist(&mut *tx, id, *member, user.user_id).await?;
    }
    tx.commit().await.map_err(DatabaseError::from)?;

    Ok(ApiResponse::success(present(&state.pool, &saved).await?))
}

/// DELETE /api/sales-outlets/:id - soft delete; members no longer point at it
pub async fn remove(State(state): State<AppState>, user: AuthUser, IdPath(id): IdPath) -> ApiResult<()> {
    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    lock_rosters(&mut *tx).await?;
    let mut record = lock_active_404::<SalesOutlet>(&mut *tx, id).await?;
    record.audit_mut().deactivate(user.user_id);
    save_record(&mut *tx, &record).await?;
    for member in &record.staff.0 {
        discharge(&mut *tx, id, *member, user.user_id).await?;
    }
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(id = %id, staff = record.staff.0.len(), "Sales outlet deactivated");
    Ok(ApiResponse::message(format!("{} deleted successfully", SalesOutlet::LABEL)))
}
