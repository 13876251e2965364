//! Error types for commitment and proof-input operations.

use residency_core::ErrorKind;
use thiserror::Error;

/// Result type for ZK operations
pub type ZkResult<T> = std::result::Result<T, ZkError>;

/// Error types for commitment and proof-input operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZkError {
    /// Only two-tree credentials can feed the two-tree circuit
    #[error("Invalid credential type: {0}")]
    InvalidCredentialType(String),

    /// Credential carries no identity commitment
    #[error("Unverified identity: credential has no identity commitment")]
    UnverifiedIdentity,

    /// Every required field that was empty or absent
    #[error("missing required fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// Authority level outside the supported tiers
    #[error("Invalid authority level: {0} (expected 1..=5)")]
    InvalidAuthorityLevel(u8),

    /// Credential storage had nothing for the identifier, or failed
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// Hash computation error
    #[error("Hash error: {0}")]
    HashError(String),
}

impl ZkError {
    /// Failure kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZkError::InvalidCredentialType(_) => ErrorKind::InvalidCredentialType,
            ZkError::UnverifiedIdentity => ErrorKind::UnverifiedIdentity,
            ZkError::MissingFields { .. } => ErrorKind::MissingFields,
            ZkError::InvalidAuthorityLevel(_) => ErrorKind::InvalidAuthorityLevel,
            ZkError::CredentialUnavailable(_) => ErrorKind::CredentialUnavailable,
            ZkError::HashError(_) => ErrorKind::HashError,
        }
    }
}
