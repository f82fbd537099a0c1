//! # Route Modules
//!
//! Each module defines an Axum router for one API surface area. Routers
//! are assembled in `lib.rs` into the application.
//!
//! Every success response is the envelope `{"success": true, "data": …}`;
//! failures are produced by [`crate::error::AppError`].

pub mod admin;
pub mod enrollment;
pub mod proofs;
pub mod sessions;

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON success envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessBody<T> {
    /// Always `true` on this envelope.
    pub success: bool,
    /// The operation's payload.
    pub data: T,
}

/// Wrap a payload in the success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<SuccessBody<T>> {
    Json(SuccessBody {
        success: true,
        data,
    })
}
