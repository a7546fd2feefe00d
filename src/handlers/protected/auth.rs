// handlers/protected/auth.rs - GET /api/auth/me

use axum::extract::State;
use serde_json::Value;

use crate::database::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::User;
use crate::state::AppState;

use super::crud::present;

pub async fn me_get(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    // Token outlives a deactivation; treat that as unauthenticated
    let record = Repository::<User>::new(state.pool.clone())
        .select_404(user.user_id)
        .await
        .map_err(|_| ApiError::unauthorized("Not authorized"))?;
    Ok(ApiResponse::success(present(&state.pool, &record).await?))
}
