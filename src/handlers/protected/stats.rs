// handlers/protected/stats.rs - GET /api/<entity>/stats

use std::collections::HashMap;

use axum::extract::{Query, State};
use serde_json::Value;

use crate::middleware::{ApiResponse, ApiResult};
use crate::models::resource::Bookable;
use crate::state::AppState;
use crate::stats;

type Params = Query<HashMap<String, String>>;

pub async fn accounts(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::accounts(&state.pool).await?))
}

/// Accepts the same `startDate`/`endDate` bounds as the list endpoint.
pub async fn transactions(State(state): State<AppState>, Query(params): Params) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::transactions(&state.pool, params).await?))
}

pub async fn customers(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::customers(&state.pool).await?))
}

pub async fn suppliers(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::suppliers(&state.pool).await?))
}

pub async fn products(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::products(&state.pool).await?))
}

pub async fn resources<B: Bookable>(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::resources(&state.pool, B::TABLE).await?))
}

pub async fn attendance(State(state): State<AppState>, Query(params): Params) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::attendance(&state.pool, params).await?))
}

pub async fn tickets(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::tickets(&state.pool).await?))
}

pub async fn users(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::users(&state.pool).await?))
}

pub async fn sales_outlets(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::sales_outlets(&state.pool).await?))
}

pub async fn service_templates(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(stats::service_templates(&state.pool).await?))
}
