// handlers/utils.rs - Extraction helpers shared by the database handlers

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ApiError;

/// Parse a UUID path segment, reporting the offending parameter by name
pub fn parse_uuid(field: &str, value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|_| {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), format!("Invalid UUID format: {}", value));
        ApiError::validation_error("Invalid path parameter", Some(field_errors))
    })
}

/// Unwrap a JSON body, turning axum's rejection into a validation error
pub fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            let mut field_errors = HashMap::new();
            field_errors.insert("body".to_string(), rejection.body_text());
            Err(ApiError::validation_error("Invalid JSON body", Some(field_errors)))
        }
    }
}
