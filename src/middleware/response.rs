use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::listing::{ListPage, Pagination};

/// Success envelope: `{ success: true, message?, data?, pagination? }`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub message: Option<String>,
    pub pagination: Option<Pagination>,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            message: None,
            pagination: None,
            status_code: StatusCode::OK,
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self {
            status_code: StatusCode::CREATED,
            ..Self::success(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Message-only body, e.g. after a delete
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            data: None,
            message: Some(message.into()),
            pagination: None,
            status_code: StatusCode::OK,
        }
    }
}

impl ApiResponse<Vec<Value>> {
    pub fn page(page: ListPage) -> Self {
        Self {
            pagination: Some(page.pagination),
            ..Self::success(page.data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let mut envelope = Map::new();
        envelope.insert("success".to_string(), Value::Bool(true));

        if let Some(message) = self.message {
            envelope.insert("message".to_string(), Value::String(message));
        }

        if let Some(data) = &self.data {
            match serde_json::to_value(data) {
                Ok(value) => {
                    envelope.insert("data".to_string(), value);
                }
                Err(e) => {
                    tracing::error!("Failed to serialize response data: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({
                            "success": false,
                            "message": "Server error"
                        })),
                    )
                        .into_response();
                }
            }
        }

        if let Some(pagination) = self.pagination {
            envelope.insert("pagination".to_string(), json!(pagination));
        }

        (self.status_code, Json(Value::Object(envelope))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn created_wraps_data() {
        let response = ApiResponse::created(json!({ "id": 1 })).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body(response).await;
        assert_eq!(body, json!({ "success": true, "data": { "id": 1 } }));
    }

    #[tokio::test]
    async fn message_only_has_no_data() {
        let body = body(ApiResponse::message("Account deleted successfully").into_response()).await;
        assert_eq!(body, json!({ "success": true, "message": "Account deleted successfully" }));
    }

    #[tokio::test]
    async fn pages_carry_pagination() {
        let page = ListPage {
            data: vec![json!({ "a": 1 })],
            pagination: Pagination::new(1, 10, 1),
        };
        let body = body(ApiResponse::page(page).into_response()).await;
        assert_eq!(body["pagination"], json!({ "page": 1, "limit": 10, "total": 1, "pages": 1 }));
        assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));
    }
}
