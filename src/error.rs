//! Error types for the load and probe simulator.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::collections::TryReserveError;
use thiserror::Error;

/// Rejected `/load` input. Always a 400, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing 'type' or 'value' parameters. Usage: /load?type={{cpu|memory}}&value={{seconds|MB}}&cores={{1..N}}")]
    MissingParameter,

    #[error("Invalid 'type' '{0}'. Must be 'cpu' or 'memory'.")]
    InvalidKind(String),

    #[error("Invalid 'value' '{0}'. Must be a positive integer.")]
    InvalidValue(String),

    #[error("Invalid 'cores' '{0}'. Must be a positive integer no greater than {max}.", max = crate::load_controller::MAX_CORES)]
    InvalidCores(String),
}

/// Memory arena failures. These only ever reach the logs.
#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("requested allocation of {requested_mb}MB exceeds limit: {current_mb}MB in use, cap is {cap_mb}MB")]
    CapacityExceeded {
        current_mb: usize,
        requested_mb: usize,
        cap_mb: usize,
    },

    #[error("allocation size must be at least 1MB")]
    ZeroSize,

    #[error("allocator refused {requested_mb}MB: {source}")]
    AllocationFailed {
        requested_mb: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Toggle target that is neither liveness nor readiness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid state type '{0}'. Use /toggle/liveness or /toggle/readiness")]
pub struct InvalidFlag(pub String);

impl ResponseError for ValidationError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().body(format!("{}\n", self))
    }
}

impl ResponseError for InvalidFlag {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().body(format!("{}\n", self))
    }
}
