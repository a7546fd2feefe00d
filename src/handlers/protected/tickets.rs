// handlers/protected/tickets.rs - ticket workflow: assign, status, rating, comments

use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::repository::{lock_active_404, save_record};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, IdPath, ValidJson};
use crate::models::ticket::{AddComment, AssignTicket, ChangeTicketStatus, RateTicket};
use crate::models::{Entity, Reference, SupportTicket};
use crate::state::AppState;

use super::crud::{check_references, present};

async fn with_ticket<F>(state: &AppState, user: &AuthUser, id: Uuid, change: F) -> ApiResult<Value>
where
    F: FnOnce(&mut SupportTicket) -> Result<(), ApiError> + Send,
{
    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    let mut ticket = lock_active_404::<SupportTicket>(&mut *tx, id).await?;
    change(&mut ticket)?;
    ticket.audit_mut().touch(user.user_id);
    let saved = save_record(&mut *tx, &ticket).await?;
    tx.commit().await.map_err(DatabaseError::from)?;

    Ok(ApiResponse::success(present(&state.pool, &saved).await?))
}

/// PUT /api/tickets/:id/assign
pub async fn assign_put(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidJson(body): ValidJson<AssignTicket>,
) -> ApiResult<Value> {
    let mut conn = state.pool.acquire().await.map_err(DatabaseError::from)?;
    check_references(&mut conn, &[Reference::new("users", "User", body.assigned_to)]).await?;
    drop(conn);

    tracing::info!(ticket = %id, assignee = %body.assigned_to, "Ticket assigned");
    with_ticket(&state, &user, id, |ticket| {
        ticket.assign(body.assigned_to, Utc::now());
        Ok(())
    })
    .await
}

/// PUT /api/tickets/:id/status
pub async fn status_put(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidJson(body): ValidJson<ChangeTicketStatus>,
) -> ApiResult<Value> {
    with_ticket(&state, &user, id, |ticket| ticket.change_status(body.status, Utc::now())).await
}

/// PUT /api/tickets/:id/rating
pub async fn rating_put(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidJson(body): ValidJson<RateTicket>,
) -> ApiResult<Value> {
    with_ticket(&state, &user, id, move |ticket| {
        ticket.rate(body);
        Ok(())
    })
    .await
}

/// POST /api/tickets/:id/comments
pub async fn comments_post(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidJson(body): ValidJson<AddComment>,
) -> ApiResult<Value> {
    let author = user.user_id;
    let mut response = with_ticket(&state, &user, id, move |ticket| {
        ticket.add_comment(author, body, Utc::now());
        Ok(())
    })
    .await?;
    response.status_code = StatusCode::CREATED;
    Ok(response)
}
