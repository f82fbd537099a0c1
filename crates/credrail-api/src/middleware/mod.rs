//! # Middleware Modules
//!
//! Tower/Axum middleware for the API service.

pub mod metrics;
