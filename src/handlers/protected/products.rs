// handlers/protected/products.rs - POST /api/products/:id/stock

use axum::extract::State;
use serde_json::Value;

use crate::database::manager::DatabaseError;
use crate::database::repository::{lock_active_404, save_record};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, IdPath, ValidJson};
use crate::models::product::StockAdjustment;
use crate::models::{Entity, Product};
use crate::state::AppState;

use super::crud::present;

pub async fn stock_post(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    ValidJson(adjustment): ValidJson<StockAdjustment>,
) -> ApiResult<Value> {
    let mut tx = state.pool.begin().await.map_err(DatabaseError::from)?;
    let mut product = lock_active_404::<Product>(&mut *tx, id).await?;
    let before = product.current_stock;

    product.adjust_stock(&adjustment)?;
    product.audit_mut().touch(user.user_id);
    let saved = save_record(&mut *tx, &product).await?;
    tx.commit().await.map_err(DatabaseError::from)?;

    tracing::info!(
        product = %id,
        user = %user.user_id,
        from = before,
        to = saved.current_stock,
        reason = adjustment.reason.as_deref().unwrap_or(""),
        "Stock adjusted"
    );
    Ok(ApiResponse::success(present(&state.pool, &saved).await?))
}
