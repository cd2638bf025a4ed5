//! Shared handler utilities
//!
//! Caller identification and metrics helpers used across handlers.

use std::time::Instant;

use axum::http::HeaderMap;
use splitfee_types::UserId;

use crate::error::ApiError;

/// Header the gateway sets to the authenticated user
pub const USER_ID_HEADER: &str = "x-user-id";

// ============================================================================
// Caller Identity
// ============================================================================

/// The user a request acts for.
///
/// Authentication happens upstream; this only checks the gateway passed a
/// well-formed ID.
pub fn user_id_from_headers(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let value = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {USER_ID_HEADER} header")))?;

    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {USER_ID_HEADER} header")))?;

    UserId::parse(value.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid {USER_ID_HEADER} header")))
}

// ============================================================================
// Metrics Helpers
// ============================================================================

/// Record HTTP operation duration with result label.
///
/// Labels: operation, result (ok/err)
#[inline]
pub fn record_op_duration(operation: &'static str, start: Instant, success: bool) {
    let result = if success { "ok" } else { "err" };
    metrics::histogram!(
        "billing_operation_duration_seconds",
        "operation" => operation,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}

// ============================================================================
// Tests
// ============================================================================
