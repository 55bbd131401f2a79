//! Unified error handling for Pciewatch
//!
//! This crate provides a single error type used across all Pciewatch components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using PciewatchError
pub type Result<T> = std::result::Result<T, PciewatchError>;

/// Unified error type for all Pciewatch operations
#[derive(thiserror::Error, Debug)]
pub enum PciewatchError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to list PCI devices in {path}: {source}")]
    Enumerate {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to open device {device}: {source}")]
    DeviceOpen {
        device: String,
        source: io::Error,
    },

    #[error("Failed to read from log file {path}: {source}")]
    LogRead {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Device Errors
    // ============================================================================
    #[error("No PCI Express devices found in {0}")]
    NoDevices(PathBuf),

    #[error("Invalid PCI device address: {0}")]
    InvalidDeviceAddress(String),

    #[error("Failed to read devices state")]
    DevicePoll,

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Invalid regular expression {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl PciewatchError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-config error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
