//! Error handling for the deskgauge monitor
//!
//! This module provides the error types for metric sources, sampling
//! streams, and configuration loading.

use std::io;

use thiserror::Error;

use crate::metric::MetricKind;

/// The main error type for the monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Metric source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid sampling schedules or sampler lifecycle misuse
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Generic(String),
}

/// Errors raised by a [`MetricSource`](crate::source::MetricSource)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("{kind} source unavailable: {reason}")]
    Unavailable { kind: MetricKind, reason: String },

    #[error("{kind} read failed: {reason}")]
    ReadFailed { kind: MetricKind, reason: String },

    #[error("Blocking read task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration file permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Configuration parsing error: {reason}")]
    ParseError { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MonitorError>;

/// A specialized result type for metric source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// A specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl MonitorError {
    /// Check if this error is recoverable
    ///
    /// A failed read is retried on the stream's next tick; an unavailable
    /// source or a bad configuration is not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MonitorError::Source(SourceError::Unavailable { .. }) => false,
            MonitorError::Source(_) => true,
            MonitorError::Config(_) => false,
            MonitorError::Scheduling(_) => false,
            MonitorError::Io(io_error) => {
                matches!(io_error.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock)
            }
            _ => true,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            MonitorError::Source(_) => "source",
            MonitorError::Config(_) => "config",
            MonitorError::Scheduling(_) => "scheduling",
            MonitorError::Io(_) => "io",
            MonitorError::Serialization(_) => "serialization",
            MonitorError::Generic(_) => "generic",
        }
    }
}

impl SourceError {
    /// The metric kind the error was raised for, if any
    pub fn kind(&self) -> Option<MetricKind> {
        match self {
            SourceError::Unavailable { kind, .. } | SourceError::ReadFailed { kind, .. } => {
                Some(*kind)
            }
            SourceError::TaskFailed { .. } => None,
        }
    }
}

impl From<String> for MonitorError {
    fn from(msg: String) -> Self {
        MonitorError::Generic(msg)
    }
}

impl From<&str> for MonitorError {
    fn from(msg: &str) -> Self {
        MonitorError::Generic(msg.to_string())
    }
}

impl From<tokio::task::JoinError> for SourceError {
    fn from(err: tokio::task::JoinError) -> Self {
        SourceError::TaskFailed { reason: err.to_string() }
    }
}
