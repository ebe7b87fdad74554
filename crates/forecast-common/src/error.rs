//! Error types for forecast-evolution services.

use thiserror::Error;

/// Result type alias using ForecastError.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// Primary error type for forecast-evolution operations.
#[derive(Debug, Error)]
pub enum ForecastError {
    // === Request Errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error(
        "Only {found} valid run(s) found for the target time. \
         Try a closer target time or fewer days of lookback."
    )]
    InsufficientRuns { found: usize },

    // === Per-candidate Errors ===
    #[error("Fetch failed: {0}")]
    FetchFailure(String),

    #[error("Failed to decode grid file: {0}")]
    DecodeFailure(String),

    // === Aggregate Errors ===
    #[error("No file downloaded successfully ({attempted} attempted)")]
    NoSuccessfulFetches { attempted: usize },

    #[error("Only {usable} usable dataset(s) out of {attempted} runs, at least 2 are required")]
    InsufficientDatasets { attempted: usize, usable: usize },

    // === Output Errors ===
    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ForecastError {
    /// Shorthand for building an `InvalidParameter` error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        ForecastError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// True for failures that only affect a single candidate run.
    ///
    /// The pipeline skips these and keeps going; everything else aborts the request.
    pub fn is_per_candidate(&self) -> bool {
        matches!(
            self,
            ForecastError::FetchFailure(_) | ForecastError::DecodeFailure(_)
        )
    }

    /// Process exit code used by the command-line front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            ForecastError::InvalidParameter { .. } => 2,
            ForecastError::InsufficientRuns { .. }
            | ForecastError::NoSuccessfulFetches { .. }
            | ForecastError::InsufficientDatasets { .. } => 3,
            ForecastError::Cancelled => 130,
            _ => 1,
        }
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::RenderError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_runs_message_reports_count() {
        let err = ForecastError::InsufficientRuns { found: 1 };
        let msg = err.to_string();
        assert!(msg.contains("Only 1 valid run"));
        assert!(msg.contains("closer target"));
    }

    #[test]
    fn test_per_candidate_classification() {
        assert!(ForecastError::FetchFailure("timeout".into()).is_per_candidate());
        assert!(ForecastError::DecodeFailure("bad".into()).is_per_candidate());
        assert!(!ForecastError::InsufficientRuns { found: 0 }.is_per_candidate());
        assert!(!ForecastError::Cancelled.is_per_candidate());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ForecastError::invalid_parameter("lookback_days", "must be positive").exit_code(), 2);
        assert_eq!(ForecastError::InsufficientRuns { found: 1 }.exit_code(), 3);
        assert_eq!(ForecastError::Cancelled.exit_code(), 130);
        assert_eq!(ForecastError::RenderError("x".into()).exit_code(), 1);
    }
}
