// handlers/protected/users.rs - POST/PUT/DELETE /api/users (admin)
//
// A user's `outlet` and the outlet's `staff` roster are written together.

use axum::extract::State;
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::repository::{insert_record, lock_active_404, save_record};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, IdPath, ValidJson};
use crate::models::user::{CreateUser, UpdateUser, UserRole};
use crate::models::{Entity, SalesOutlet, User, Writable};
use crate::state::AppState;

use super::crud::{check_references, duplicate, present};

const ADMIN: &[UserRole] = &[UserRole::Admin];

/// Advisory key held for the rest of any transaction that writes user outlets and outlet rosters together
const ROSTER_LOCK: i64 = 0x5253_5452;

/// Taken before any user or outlet row lock, so roster writes queue instead of deadlocking.
pub(super) async fn lock_rosters(conn: &mut PgConnection) -> Result<(), ApiError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(ROSTER_LOCK)
        .execute(&mut *conn)
        .await
        .map_err(DatabaseError::from)?;
    Ok(())
}

/// Adds the user to the outlet roster; a missing outlet is a 404.
pub(super) async fn join_outlet(conn: &mut PgConnection, outlet: Uuid, user: Uuid, actor: Uuid) -> Result<(), ApiError> {
    let mut record = lock_active_404::<SalesOutlet>(conn, outlet).await?;
    if record.add_staff(user) {
        record.audit_mut().touch(actor);
        save_record(conn, &record).await?;
    }
    Ok(())
}

/// Removes the user from the roster; an outlet that is already gone is skipped.
pub(super) async fn leave_outlet(conn: &mut PgConnection, outlet: Uuid, user: Uuid, actor: Uuid) -> Result<(), ApiError> {
    let mut record = match lock_active_404::<SalesOutlet>(conn, outlet).await {
        Ok(record) => record,
        Err(DatabaseError::NotFound(_)) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if record.remove_staff(user) {
        record.audit_mut().touch(actor);
        save_record(conn, &record).await?;
    }
    Ok(())
}

/// POST /api/users
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<CreateUser>,
) -> ApiResult<Value> {
    user.require(ADMIN)?;
    let record = User::create(input, user.user_id)?;

    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    lock_rosters(&mut *tx).await?;
    check_references(&mut *tx, &record.references()).await?;
    let saved = insert_record(&mut *tx, &record).await.map_err(duplicate::<User>)?;
    if let Some(outlet) = saved.outlet {
        join_outlet(&mut *tx, outlet, saved.id, user.user_id).await?;
    }
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(id = %saved.id, role = saved.role.as_str(), "User created");
    Ok(ApiResponse::created(present(&state.pool, &saved).await?))
}

/// PUT /api/users/:id
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidJson(input): ValidJson<UpdateUser>,
) -> ApiResult<Value> {
    user.require(ADMIN)?;

    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    lock_rosters(&mut *tx).await?;
    let mut record = lock_active_404::<User>(&mut *tx, id).await?;
    let previous = record.outlet;

    record.update(input)?;
    record.audit_mut().touch(user.user_id);
    let saved = save_record(&mut *tx, &record).await.map_err(duplicate::<User>)?;

    if saved.outlet != previous {
        if let Some(old) = previous {
            leave_outlet(&mut *tx, old, id, user.user_id).await?;
        }
        if let Some(new) = saved.outlet {
            join_outlet(&mut *tx, new, id, user.user_id).await?;
        }
    }
    tx.commit().await.map_err(DatabaseError::from)?;

    Ok(ApiResponse::success(present(&state.pool, &saved).await?))
}

/// DELETE /api/users/:id - soft delete, off the roster
pub async fn remove(State(state): State<AppState>, user: AuthUser, IdPath(id): IdPath) -> ApiResult<()> {
    user.require(ADMIN)?;

    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    lock_rosters(&mut *tx).await?;
    let mut record = lock_active_404::<User>(&mut *tx, id).await?;
    record.audit_mut().deactivate(user.user_id);
    save_record(&mut *tx, &record).await?;
    if let Some(outlet) = record.outlet {
        leave_outlet(&mut *tx, outlet, id, user.user_id).await?;
    }
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(id = %id, "User deactivated");
    Ok(ApiResponse::message("User deleted successfully"))
}
