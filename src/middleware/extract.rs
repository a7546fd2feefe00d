//! Request extractors that reject with the JSON failure envelope.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::database::columns::to_camel_case;
use crate::error::ApiError;

/// JSON body that has been deserialized and validated.
///
/// Malformed JSON and unknown fields are a 400 `BadRequest`; failed field
/// rules are one 400 `Validation` carrying every message.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Like `ValidJson`, but an empty body yields `T::default()`.
#[derive(Debug)]
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for OptionalJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Default,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }
        let value: T = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::bad_request(format!("Failed to parse the request body as JSON: {}", e)))?;
        value.validate()?;
        Ok(OptionalJson(value))
    }
}

/// `:id` path segment parsed as a UUID
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::bad_request("Invalid id"))?;
        Ok(IdPath(id))
    }
}

/// Flattens validator output into sorted `"field: message"` lines with wire (camelCase) paths.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort();
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            to_camel_case(field)
        } else {
            format!("{}.{}", prefix, to_camel_case(field))
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|e| format!("{}: {}", path, describe(e))));
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    match error.code.as_ref() {
        "email" => "must be a valid email".to_string(),
        "length" => "has an invalid length".to_string(),
        "range" => "is out of range".to_string(),
        code => format!("is invalid ({})", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Line {
        #[validate(range(min = 0))]
        unit_price: i64,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Order {
        #[validate(email)]
        contact_email: String,
        #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
        rating: i32,
        #[validate]
        lines: Vec<Line>,
    }

    #[test]
    fn messages_use_wire_paths() {
        let order = Order {
            contact_email: "nope".into(),
            rating: 9,
            lines: vec![Line { unit_price: 1 }, Line { unit_price: -1 }],
        };
        let errors = order.validate().unwrap_err();
        let messages = validation_messages(&errors);
        assert_eq!(
            messages,
            vec![
                "contactEmail: must be a valid email".to_string(),
                "lines[1].unitPrice: is out of range".to_string(),
                "rating: Rating must be between 1 and 5".to_string(),
            ]
        );
    }

    #[test]
    fn validation_errors_become_one_envelope() {
        let order = Order { contact_email: "a@b.com".into(), rating: 0, lines: vec![] };
        let err = ApiError::from(order.validate().unwrap_err());
        let body = err.to_json();
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"][0], "rating: Rating must be between 1 and 5");
    }
}
