//! Common error classification

use serde::{Deserialize, Serialize};

/// Error categories surfaced to presentation layers.
///
/// Each category implies a different user-facing treatment: validation and
/// conflict errors are actionable, upstream errors become a retry prompt and
/// everything else is a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input; rejected before any mutation
    Validation,
    /// Duplicate, stale or racing write; caller should retry
    Conflict,
    /// Payment processor unreachable
    UpstreamUnavailable,
    /// Unknown identifier
    NotFound,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable code for API responses
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Conflict => "CONFLICT",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}
