// handlers/protected/transactions.rs - approve/post/reconcile and status-aware delete

use axum::extract::State;
use serde_json::Value;

use crate::database::manager::DatabaseError;
use crate::database::repository::{delete_record, lock_active_404, save_record};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, IdPath};
use crate::models::user::UserRole;
use crate::models::{Entity, Transaction};
use crate::services::ledger;
use crate::state::AppState;
use crate::workflow::{DeletePolicy, TransactionAction};

use super::crud::present;

const APPROVERS: &[UserRole] = &[UserRole::Admin, UserRole::Manager];

async fn advance(state: AppState, user: AuthUser, id: uuid::Uuid, action: TransactionAction) -> ApiResult<Value> {
    user.require(APPROVERS)?;
    let record = ledger::advance(&state.pool, id, action, user.user_id).await?;
    Ok(ApiResponse::success(present(&state.pool, &record).await?))
}

/// PUT /api/transactions/:id/approve
pub async fn approve_put(State(state): State<AppState>, user: AuthUser, IdPath(id): IdPath) -> ApiResult<Value> {
    advance(state, user, id, TransactionAction::Approve).await
}

/// PUT /api/transactions/:id/post
pub async fn post_put(State(state): State<AppState>, user: AuthUser, IdPath(id): IdPath) -> ApiResult<Value> {
    advance(state, user, id, TransactionAction::Post).await
}

/// PUT /api/transactions/:id/reconcile
pub async fn reconcile_put(State(state): State<AppState>, user: AuthUser, IdPath(id): IdPath) -> ApiResult<Value> {
    advance(state, user, id, TransactionAction::Reconcile).await
}

/// DELETE /api/transactions/:id - drafts are removed, approved ones soft deleted, posted ones kept
pub async fn delete(State(state): State<AppState>, user: AuthUser, IdPath(id): IdPath) -> ApiResult<()> {
    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    let mut record = lock_active_404::<Transaction>(&mut *tx, id).await?;

    match record.status.delete_policy()? {
        DeletePolicy::Hard => delete_record::<Transaction>(&mut *tx, id).await?,
        DeletePolicy::Soft => {
            record.audit_mut().deactivate(user.user_id);
            save_record(&mut *tx, &record).await?;
        }
    }
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(transaction = %id, user = %user.user_id, status = %record.status, "Transaction deleted");
    Ok(ApiResponse::message(format!("{} deleted successfully", Transaction::LABEL)))
}
