//! Error types for the conformance autopilot
//!
//! Engine failures carry the identifiers needed to find the failing step
//! (module, action, runner id) and keep their underlying cause as a source.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the autopilot
#[derive(Error, Debug)]
pub enum Error {
    // === Engine Errors ===
    #[error("[{action}:{action_type}] {message}")]
    ActionExecution {
        action: String,
        action_type: String,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("[{module}] {message}")]
    ModuleExecution {
        module: String,
        state: String,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("Module {runner_id} timed out after {timeout_ms}ms in state {last_state}")]
    StateTimeout {
        runner_id: String,
        last_state: String,
        timeout_ms: u64,
    },

    #[error("Browser navigation failed for {url}: {message}")]
    BrowserNavigation { url: String, message: String },

    #[error("Execution stopped by user")]
    Cancelled,

    // === Remote API Errors ===
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an action execution error
    pub fn action_failed(
        action: &str,
        action_type: &str,
        message: &str,
        source: Option<Error>,
    ) -> Self {
        Self::ActionExecution {
            action: action.to_string(),
            action_type: action_type.to_string(),
            message: message.to_string(),
            source: source.map(Box::new),
        }
    }

    /// Create a module execution error wrapping the failure that ended the module
    pub fn module_failed(module: &str, state: &str, source: Error) -> Self {
        Self::ModuleExecution {
            module: module.to_string(),
            state: state.to_string(),
            message: format!("Module execution failed: {source}"),
            source: Some(Box::new(source)),
        }
    }

    /// Create a state timeout error
    pub fn state_timeout(runner_id: &str, last_state: &str, timeout_ms: u64) -> Self {
        Self::StateTimeout {
            runner_id: runner_id.to_string(),
            last_state: last_state.to_string(),
            timeout_ms,
        }
    }

    /// Create a browser navigation error
    pub fn navigation_failed(url: &str, message: impl std::fmt::Display) -> Self {
        Self::BrowserNavigation {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error (or the cause it wraps) is a user stop request
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::ModuleExecution { source: Some(inner), .. }
            | Self::ActionExecution { source: Some(inner), .. } => inner.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_module_error_includes_module_name() {
        let err = Error::module_failed("oidcc-server", "WAITING", Error::Internal("boom".into()));
        assert_eq!(
            err.to_string(),
            "[oidcc-server] Module execution failed: Internal error: boom"
        );
        match &err {
            Error::ModuleExecution { state, .. } => assert_eq!(state, "WAITING"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_action_error_preserves_cause() {
        let cause = Error::HttpStatus {
            status: 500,
            body: "oops".into(),
        };
        let err = Error::action_failed("callback", "api", "Action execution failed: HTTP 500: oops", Some(cause));
        assert_eq!(err.to_string(), "[callback:api] Action execution failed: HTTP 500: oops");
        let source = err.source().expect("cause should be kept");
        assert_eq!(source.to_string(), "HTTP 500: oops");
    }

    #[test]
    fn test_action_error_without_cause() {
        let err = Error::action_failed("missing", "UNKNOWN", "Action 'missing' not found in config", None);
        assert!(err.source().is_none());
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::state_timeout("runner-1", "RUNNING", 5000);
        assert_eq!(
            err.to_string(),
            "Module runner-1 timed out after 5000ms in state RUNNING"
        );
    }

    #[test]
    fn test_navigation_message() {
        let err = Error::navigation_failed("https://rp.example/cb", "net::ERR_NAME_NOT_RESOLVED");
        assert_eq!(
            err.to_string(),
            "Browser navigation failed for https://rp.example/cb: net::ERR_NAME_NOT_RESOLVED"
        );
    }

    #[test]
    fn test_cancelled_is_detected_through_wrapping() {
        let err = Error::module_failed("m", "RUNNING", Error::Cancelled);
        assert!(err.is_cancelled());
        assert!(!Error::Internal("x".into()).is_cancelled());
    }
}
