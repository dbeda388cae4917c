//! Error types for the simulator client.
//!
//! Every failure the client can observe is a [`SimError`]. The `Display` text of
//! each variant is exactly what gets appended to the user-visible error log, so
//! the shell never has to format errors itself.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: opening the session or registering the data definition failed
//! - **Request Errors**: issuing the periodic telemetry request failed
//! - **Receive Errors**: draining pending host messages failed
//! - **Host Errors**: the simulator reported an exception, quit, or answered a request we never made
//! - **Decode Errors**: a host message or reply payload did not match the expected layout
//! - **Config Errors**: invalid configuration or an unreadable config file
//! - **Windows API Errors**: platform-specific failures in the SimConnect backend
//!
//! ## Recovery
//!
//! ```rust
//! use simwatch::SimError;
//!
//! let error = SimError::connection_failed("SimConnect_Open returned E_FAIL");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

use crate::types::RequestId;

/// Result type alias for client operations.
pub type Result<T, E = SimError> = std::result::Result<T, E>;

/// Main error type for client operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SimError {
    #[error("Failed to connect to simulator: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to request telemetry: {reason}")]
    Request {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to receive simulator messages: {reason}")]
    Receive {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Exception received: {code}")]
    HostException { code: u32, send_id: u32, index: u32 },

    #[error("Unknown request ID: {request_id}")]
    UnknownRequestId { request_id: RequestId },

    #[error("Sim has exited")]
    HostQuit,

    #[error("Failed to decode {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Config file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl SimError {
    /// Returns whether this error is potentially recoverable by connecting again.
    pub fn is_retryable(&self) -> bool {
        match self {
            SimError::Connection { .. } => true,
            SimError::Request { .. } => true,
            SimError::Receive { .. } => true,
            SimError::HostQuit => true,
            SimError::HostException { .. } => false,
            SimError::UnknownRequestId { .. } => false,
            SimError::Decode { .. } => false,
            SimError::Config { .. } => false,
            SimError::File { .. } => false,
            SimError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            SimError::WindowsApi { .. } => true,
        }
    }

    /// Returns whether the client drops its session after this error.
    pub fn closes_session(&self) -> bool {
        matches!(self, SimError::Request { .. } | SimError::Receive { .. } | SimError::HostQuit)
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SimError::Connection { .. } => vec![
                "Ensure the simulator is running",
                "Check that the SimConnect library is installed",
                "Verify the configured application name and config index",
            ],
            SimError::Request { .. } => vec![
                "Reconnect once the simulator is responsive again",
                "Check whether the simulator process is still running",
            ],
            SimError::Receive { .. } => vec![
                "Reconnect once the simulator is responsive again",
                "Check whether the simulator process is still running",
            ],
            SimError::HostException { .. } => vec![
                "Check the data definition field names and units",
                "Inspect the simulator log for the failing request",
            ],
            SimError::UnknownRequestId { .. } => vec![
                "Check for other clients sharing this session",
                "Verify request identifiers are not reused",
            ],
            SimError::HostQuit => {
                vec!["Restart the simulator", "Connect again once the simulator is loaded"]
            }
            SimError::Decode { .. } => vec![
                "Verify the SimConnect SDK version matches the simulator",
                "Check the data definition layout",
            ],
            SimError::Config { .. } => vec![
                "Check the configuration values",
                "Remove invalid keys to fall back to defaults",
            ],
            SimError::File { .. } => {
                vec!["Check the config file exists and is readable", "Check file permissions"]
            }
            SimError::UnsupportedPlatform { .. } => vec![
                "Use platform-appropriate features",
                "Provide a custom Host implementation for testing",
            ],
            #[cfg(windows)]
            SimError::WindowsApi { .. } => vec![
                "Check that SimConnect.dll is on the library search path",
                "Verify system resources availability",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        SimError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SimError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for request errors.
    pub fn request_failed(reason: impl Into<String>) -> Self {
        SimError::Request { reason: reason.into(), source: None }
    }

    /// Helper constructor for request errors with source.
    pub fn request_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SimError::Request { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for receive errors with source.
    pub fn receive_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SimError::Receive { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for decode errors.
    pub fn decode_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        SimError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        SimError::Config { reason: reason.into() }
    }

    /// Helper constructor for config file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        SimError::File { path, source }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        SimError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        SimError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(windows)]
impl From<core::Error> for SimError {
    fn from(err: core::Error) -> Self {
        SimError::WindowsApi { operation: "Unknown Windows operation".to_string(), source: err }
    }
}
