//! # Relay error handling
//!
//! Every failure the relay can report is a [`RelayError`] variant carrying an
//! [`ErrorContext`]: when it happened, what operation was running, how severe
//! it is and what the user can do about it. Front ends show the message plus
//! the recovery suggestion; nothing in the library panics on bad input.
//!
//! ## Usage
//!
//! ```rust
//! use ipcam_relay::error::{HasRecoverySuggestion, RelayError};
//!
//! let error = RelayError::validation("frame_width", "must be a positive integer", "abc")
//!     .with_recovery_suggestion("Enter the width in pixels, e.g. 1280");
//!
//! assert_eq!(error.category(), "validation");
//! assert!(error.recovery_suggestion().is_some());
//! ```

use std::time::SystemTime;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that stop the current relay run
    Error,
    /// Errors that prevent the program from starting
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_severity(severity: ErrorSeverity) -> Self {
        Self {
            severity,
            ..Self::default()
        }
    }
}

/// Base error type for the relay
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Config file present but unusable
    #[error("Configuration error in '{field}': {reason}")]
    Config {
        field: String,
        reason: String,
        context: ErrorContext,
    },
    /// User-supplied value rejected
    #[error("Validation failed for '{field}': {constraint} (value: {value})")]
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// The capture handle could not be opened
    #[error("Failed to open video source {source_url}: {reason}")]
    CaptureInit {
        source_url: String,
        reason: String,
        context: ErrorContext,
    },
    /// A frame pull failed (disconnect, decode error)
    #[error("Frame capture failed: {reason}")]
    FrameCapture { reason: String, context: ErrorContext },
    /// A bounded wait expired
    #[error("Timeout during {operation} after {duration_ms}ms")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },
    /// Resize or channel conversion failed
    #[error("Processing failed during {operation}: {reason}")]
    Processing {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// The virtual camera could not be opened or rejected a frame
    #[error("Virtual camera {target} failed: {reason}")]
    Sink {
        target: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Invalid state transitions
    #[error("Invalid state transition from '{current_state}' when attempting '{attempted_operation}': {reason}")]
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
}

impl RelayError {
    /// Create a configuration error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a capture initialization error
    pub fn capture_init(source_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CaptureInit {
            source_url: source_url.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a frame capture error
    pub fn frame_capture(reason: impl Into<String>) -> Self {
        Self::FrameCapture {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
            context: ErrorContext::new(),
        }
    }

    /// Create a processing error
    pub fn processing(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Processing {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a virtual camera error
    pub fn sink(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Sink {
            target: target.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create a state error
    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::CaptureInit { context, .. } => context,
            Self::FrameCapture { context, .. } => context,
            Self::Timeout { context, .. } => context,
            Self::Processing { context, .. } => context,
            Self::Sink { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::State { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::CaptureInit { context, .. } => context,
            Self::FrameCapture { context, .. } => context,
            Self::Timeout { context, .. } => context,
            Self::Processing { context, .. } => context,
            Self::Sink { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::State { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Validation { .. } => "validation",
            Self::CaptureInit { .. } => "capture_init",
            Self::FrameCapture { .. } => "frame_capture",
            Self::Timeout { .. } => "timeout",
            Self::Processing { .. } => "processing",
            Self::Sink { .. } => "sink",
            Self::Io { .. } => "io",
            Self::State { .. } => "state",
        }
    }
}

/// Result type alias using the relay error type
pub type RelayResult<T> = Result<T, RelayError>;

/// Trait for errors with severity levels
pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for RelayError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for RelayError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Errors caused by what the user typed or stored; fixing the input fixes them.
    pub fn is_user_error(error: &RelayError) -> bool {
        matches!(error, RelayError::Config { .. } | RelayError::Validation { .. })
    }

    /// Errors that end a relay run because the camera stopped delivering.
    pub fn is_source_failure(error: &RelayError) -> bool {
        matches!(
            error,
            RelayError::CaptureInit { .. }
                | RelayError::FrameCapture { .. }
                | RelayError::Timeout { .. }
        )
    }

    /// Errors that must abort startup.
    pub fn is_fatal(error: &RelayError) -> bool {
        error.severity() == ErrorSeverity::Fatal
    }
}

impl From<std::io::Error> for RelayError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        Self::config("json", error.to_string())
    }
}

impl From<relay_scale::cpu::ScaleError> for RelayError {
    fn from(error: relay_scale::cpu::ScaleError) -> Self {
        Self::processing("resize", error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = RelayError::config("config.json", "expected value at line 1 column 1");
        assert_eq!(error.category(), "config");
        assert!(classify::is_fatal(&error));
        assert!(classify::is_user_error(&error));
        assert_eq!(
            error.to_string(),
            "Configuration error in 'config.json': expected value at line 1 column 1"
        );
    }

    #[test]
    fn test_error_with_context() {
        let error = RelayError::processing("resize", "invalid dimensions")
            .with_context("resizing frame to 1280x720")
            .with_operation("relay")
            .with_recovery_suggestion("check frame dimensions");

        assert_eq!(error.category(), "processing");
        assert_eq!(error.recovery_suggestion(), Some("check frame dimensions"));
        assert_eq!(error.context().operation.as_deref(), Some("relay"));
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_error_classification() {
        let timeout = RelayError::timeout("frame pull", 5000);
        assert!(classify::is_source_failure(&timeout));
        assert!(!classify::is_fatal(&timeout));
        assert_eq!(timeout.to_string(), "Timeout during frame pull after 5000ms");

        let validation = RelayError::validation("fps", "must be greater than 0", "0");
        assert!(classify::is_user_error(&validation));
        assert_eq!(validation.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_io_conversion_keeps_source() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: RelayError = io.into();
        assert_eq!(error.category(), "io");
        assert!(error.source().is_some());
    }
}
