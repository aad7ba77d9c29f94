//! Error types for the notice registry.
//!
//! Only faults live here. Expected outcomes such as "already joined" or
//! "no such subject" are returned as values from the registry.

use thiserror::Error;

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid table format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Table is locked by another process")]
    Locked,

    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Config(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for RegistryError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RegistryError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        RegistryError::Deserialization(e.to_string())
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
