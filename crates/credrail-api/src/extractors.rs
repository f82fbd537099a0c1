//! # Validated JSON Extraction
//!
//! Request bodies are extracted as `Result<Json<T>, JsonRejection>` so a
//! malformed body becomes a structured 400 envelope instead of Axum's plain
//! text rejection, then validated through the [`Validate`] trait before the
//! handler sees them.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Request-body validation, applied after deserialization.
pub trait Validate {
    /// Check field-level constraints; the error names the offending field.
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON body extraction and run its validation.
pub fn extract_validated_json<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = body.map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")))?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        ok: bool,
    }

    impl Validate for Probe {
        fn validate(&self) -> Result<(), String> {
            if self.ok {
                Ok(())
            } else {
                Err("probe must be ok".to_string())
            }
        }
    }

    #[test]
    fn test_valid_body_passes() {
        let result = extract_validated_json(Ok(Json(Probe { ok: true })));
        assert!(result.is_ok());
    }

    #[test]
    fn test_failed_validation_becomes_validation_error() {
        let result = extract_validated_json(Ok(Json(Probe { ok: false })));
        match result {
            Err(AppError::Validation(msg)) => assert!(msg.contains("probe must be ok")),
            other => panic!("expected Validation, got: {:?}", other.is_ok()),
        }
    }
}
