//! Error types and exit code constants for seam.
//!
//! Two of the five failure kinds in the analysis are fatal and become `Err`
//! values of [`SeamError`]: a loader that produced no usable packages, and a
//! call lowering that produced no program. Everything else (missing type
//! info, unresolvable positions, duplicate keys) degrades the report and is
//! logged as a warning, never an error.
//!
//! ## Exit Code Mapping
//!
//! - `2`: invalid arguments (bad input from the caller)
//! - `3`: loader failure (directory missing, no manifest, nothing usable)
//! - `4`: call analysis failure (lowering yielded no program)
//! - `10`: internal errors (bugs, IO/JSON faults, unexpected state)

use std::fmt;
use std::io;

use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Stable process exit codes for CLI consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from the caller.
    InvalidArguments = 2,
    /// The loader produced no usable packages.
    LoaderFailure = 3,
    /// Lowering to control-flow form produced no program.
    CallAnalysisFailure = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the CLI surface.
///
/// Subsystem errors (loader, lowering) are bridged into this type before the
/// binary maps them to an exit code and a single-line diagnostic.
#[derive(Debug, Error)]
pub enum SeamError {
    /// Invalid arguments from the caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The loader could not produce a usable package universe.
    #[error("loader failure: {message}")]
    LoaderFailure { message: String },

    /// Lowering to control-flow form failed outright.
    #[error("call analysis failure: {message}")]
    CallAnalysisFailure { message: String },

    /// IO error surfaced through analysis.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl SeamError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        SeamError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a loader failure.
    pub fn loader(message: impl Into<String>) -> Self {
        SeamError::LoaderFailure {
            message: message.into(),
        }
    }

    /// Create a call analysis failure.
    pub fn call_analysis(message: impl Into<String>) -> Self {
        SeamError::CallAnalysisFailure {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        SeamError::InternalError {
            message: message.into(),
        }
    }

    /// Get the exit code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

impl From<&SeamError> for OutputErrorCode {
    fn from(err: &SeamError) -> Self {
        match err {
            SeamError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            SeamError::LoaderFailure { .. } => OutputErrorCode::LoaderFailure,
            SeamError::CallAnalysisFailure { .. } => OutputErrorCode::CallAnalysisFailure,
            SeamError::Io(_) => OutputErrorCode::InternalError,
            SeamError::Json(_) => OutputErrorCode::InternalError,
            SeamError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<SeamError> for OutputErrorCode {
    fn from(err: SeamError) -> Self {
        OutputErrorCode::from(&err)
    }
}

/// Result type for fatal analysis outcomes.
pub type SeamResult<T> = Result<T, SeamError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn loader_failure_maps_to_3() {
            let err = SeamError::loader("no packages under /tmp/none");
            assert_eq!(err.error_code(), OutputErrorCode::LoaderFailure);
            assert_eq!(err.error_code().code(), 3);
        }

        #[test]
        fn call_analysis_failure_maps_to_4() {
            let err = SeamError::call_analysis("lowering produced no program");
            assert_eq!(err.error_code(), OutputErrorCode::CallAnalysisFailure);
            assert_eq!(err.error_code().code(), 4);
        }

        #[test]
        fn invalid_arguments_maps_to_2() {
            let err = SeamError::invalid_args("missing path");
            assert_eq!(err.error_code().code(), 2);
        }

        #[test]
        fn io_and_internal_map_to_10() {
            let io_err: SeamError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
            assert_eq!(io_err.error_code().code(), 10);
            assert_eq!(SeamError::internal("bug").error_code().code(), 10);
        }
    }

    mod error_display {
        use super::*;

        #[test]
        fn loader_failure_display() {
            let err = SeamError::loader("no go.mod found under /tmp/x");
            assert_eq!(
                err.to_string(),
                "loader failure: no go.mod found under /tmp/x"
            );
        }

        #[test]
        fn invalid_arguments_display() {
            let err = SeamError::invalid_args("missing path");
            assert_eq!(err.to_string(), "invalid arguments: missing path");
        }
    }

    mod output_error_code {
        use super::*;

        #[test]
        fn code_values_are_stable() {
            assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
            assert_eq!(OutputErrorCode::LoaderFailure.code(), 3);
            assert_eq!(OutputErrorCode::CallAnalysisFailure.code(), 4);
            assert_eq!(OutputErrorCode::InternalError.code(), 10);
        }

        #[test]
        fn display_shows_code() {
            assert_eq!(format!("{}", OutputErrorCode::LoaderFailure), "3");
        }
    }
}
