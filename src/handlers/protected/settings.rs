// handlers/protected/settings.rs - GET/PUT /api/settings, POST /api/settings/logo

use axum::extract::{Multipart, State};
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ValidJson};
use crate::models::settings::UpdateSettings;
use crate::models::user::UserRole;
use crate::services::UploadError;
use crate::state::AppState;

const LOGO_FIELD: &str = "logo";

/// GET /api/settings
pub async fn get(State(state): State<AppState>) -> ApiResult<Value> {
    let settings = state.settings.get().await?;
    Ok(ApiResponse::success(serde_json::to_value(settings).map_err(ApiError::internal)?))
}

/// PUT /api/settings
pub async fn put(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<UpdateSettings>,
) -> ApiResult<Value> {
    user.require(&[UserRole::Admin])?;
    let settings = state.settings.update(input, user.user_id).await?;
    tracing::info!(user = %user.user_id, "Settings updated");
    Ok(ApiResponse::success(serde_json::to_value(settings).map_err(ApiError::internal)?)
        .with_message("Settings updated successfully"))
}

/// POST /api/settings/logo - multipart, field `logo`
pub async fn logo_post(State(state): State<AppState>, user: AuthUser, mut multipart: Multipart) -> ApiResult<Value> {
    user.require(&[UserRole::Admin])?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Malformed(e.body_text()))?
    {
        if field.name() != Some(LOGO_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| UploadError::Malformed(e.body_text()))?;
        upload = Some((content_type, bytes));
        break;
    }
    let (content_type, bytes) = upload.ok_or(UploadError::MissingFile)?;

    let stored = state.uploads.save_logo(content_type.as_deref(), &bytes).await?;
    let (settings, previous) = match state.settings.set_logo(stored.url, stored.filename.clone(), user.user_id).await {
        Ok(result) => result,
        Err(e) => {
            state.uploads.remove_logo(&stored.filename).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous {
        state.uploads.remove_logo(&previous).await;
    }

    Ok(ApiResponse::success(serde_json::to_value(settings).map_err(ApiError::internal)?)
        .with_message("Logo uploaded successfully"))
}
