//! Error types for load-generator probes.

use std::time::Duration;

use thiserror::Error;

/// Why a probe produced no usable sample (or a suspicious one).
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("load generator {program} failed: {reason}")]
    InvocationFailed { program: String, reason: String },

    #[error("load generator did not finish within {0:?}")]
    Timeout(Duration),

    #[error("no average latency in report: {0}")]
    ParseFailed(String),

    #[error("expected {expected} successful responses, got {received}")]
    ResponseCountMismatch { expected: u32, received: u32 },
}
