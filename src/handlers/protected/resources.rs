// handlers/protected/resources.rs - booking and maintenance for machines, tools and workstations

use axum::extract::State;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::repository::{lock_active_404, save_record};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, IdPath, OptionalJson, ValidJson};
use crate::models::resource::{BookRequest, Bookable, Booking, CompleteMaintenance};
use crate::state::AppState;

use super::crud::present;

/// Locks the resource, applies `change` to its booking block and saves it.
async fn with_booking<B, F>(state: &AppState, user: &AuthUser, id: Uuid, change: F) -> ApiResult<Value>
where
    B: Bookable,
    F: FnOnce(&mut Booking) -> Result<(), ApiError> + Send,
{
    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    let mut record = lock_active_404::<B>(&mut *tx, id).await?;
    change(record.booking_mut())?;
    record.audit_mut().touch(user.user_id);
    let saved = save_record(&mut *tx, &record).await?;
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(entity = B::TABLE, id = %id, status = ?saved.booking().status, "Resource status changed");
    Ok(ApiResponse::success(present(&state.pool, &saved).await?))
}

/// POST /api/<resource>/:id/book
pub async fn book_post<B: Bookable>(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidJson(request): ValidJson<BookRequest>,
) -> ApiResult<Value> {
    let by = user.user_id;
    with_booking::<B, _>(&state, &user, id, move |booking| booking.book(B::LABEL, by, request, Utc::now())).await
}

/// POST /api/<resource>/:id/release
pub async fn release_post<B: Bookable>(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> ApiResult<Value> {
    with_booking::<B, _>(&state, &user, id, |booking| booking.release(B::LABEL)).await
}

/// POST /api/<resource>/:id/maintenance/start
pub async fn maintenance_start_post<B: Bookable>(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> ApiResult<Value> {
    with_booking::<B, _>(&state, &user, id, |booking| booking.start_maintenance(B::LABEL)).await
}

/// POST /api/<resource>/:id/maintenance/complete
pub async fn maintenance_complete_post<B: Bookable>(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    OptionalJson(request): OptionalJson<CompleteMaintenance>,
) -> ApiResult<Value> {
    with_booking::<B, _>(&state, &user, id, move |booking| {
        booking.complete_maintenance(B::LABEL, request, Utc::now())
    })
    .await
}
