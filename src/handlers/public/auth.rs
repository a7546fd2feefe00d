// handlers/public/auth.rs - POST /api/auth/login

use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::auth::{generate_jwt, verify_password, Claims};
use crate::database::repository::select_one;
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::filter::{Condition, FilterData};
use crate::middleware::{ApiResponse, ApiResult, ValidJson};
use crate::models::{Entity, User};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Exchanges credentials for a bearer token. Unknown, inactive and wrong-password
/// logins are indistinguishable to the caller.
pub async fn login_post(State(state): State<AppState>, ValidJson(body): ValidJson<LoginRequest>) -> ApiResult<Value> {
    let email = body.email.trim().to_lowercase();
    let mut conn = state.pool.acquire().await.map_err(DatabaseError::from)?;

    let user = select_one::<User>(
        &mut conn,
        FilterData {
            where_clause: Some(Condition::eq("email", email.as_str())),
            ..Default::default()
        },
    )
    .await?;

    let Some(mut user) = user.filter(|u| verify_password(&body.password, &u.password_hash)) else {
        tracing::warn!(email = %email, "Failed login");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    // Only the login stamp is written
    let stamped: Option<chrono::DateTime<Utc>> =
        sqlx::query_scalar("UPDATE users SET last_login_at = $1 WHERE id = $2 RETURNING last_login_at")
            .bind(Utc::now())
            .bind(user.id)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from)?;
    user.last_login_at = stamped;

    let token = generate_jwt(&Claims::new(user.id, user.email.clone(), user.role)).map_err(ApiError::internal)?;
    tracing::info!(user = %user.id, "User logged in");

    Ok(ApiResponse::success(json!({
        "token": token,
        "user": user.to_api_value(),
    })))
}
