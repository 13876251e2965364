//! Core error types and the shared failure taxonomy.
//!
//! Every crate in the workspace keeps its own `thiserror` enum, but all of
//! them report an [`ErrorKind`] so that callers can branch on the kind of
//! failure without matching on message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tagged failure kinds surfaced to callers of the verifier.
///
/// All kinds are terminal for the request that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Truncated or malformed CBOR / base64url / JSON input
    DecodeError,
    /// No P-256 public key found in a certificate
    KeyNotFound,
    /// Signature or digest algorithm other than the supported ones
    UnsupportedAlgorithm,
    /// COSE_Sign1 without an x5chain certificate
    MissingCertificate,
    /// Signature does not verify under the certificate key
    SignatureInvalid,
    /// Signature is not a 64-byte r||s value
    BadSignatureLength,
    /// Certificate verified but is not a trust anchor
    UntrustedIssuer,
    /// One or more required fields absent
    MissingFields,
    /// Structurally wrong input
    InvalidFormat,
    /// Transport protocol not recognised
    UnsupportedProtocol,
    /// District lookup failed or timed out
    DistrictLookupFailed,
    /// Session credential is not a two-tree credential
    InvalidCredentialType,
    /// Session credential has no identity commitment
    UnverifiedIdentity,
    /// Disclosed element does not match the signed digest table
    DigestMismatch,
    /// Current time outside the MSO validity window
    CredentialExpired,
    /// Credential storage returned nothing or failed
    CredentialUnavailable,
    /// Field hash backend failure
    HashError,
    /// Authority level outside the supported tiers
    InvalidAuthorityLevel,
    /// Verifier configuration could not be parsed or is inconsistent
    ConfigurationError,
    /// Filesystem failure while bootstrapping
    IoError,
}

impl ErrorKind {
    /// Stable name of this kind, identical to its serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::KeyNotFound => "KeyNotFound",
            ErrorKind::UnsupportedAlgorithm => "UnsupportedAlgorithm",
            ErrorKind::MissingCertificate => "MissingCertificate",
            ErrorKind::SignatureInvalid => "SignatureInvalid",
            ErrorKind::BadSignatureLength => "BadSignatureLength",
            ErrorKind::UntrustedIssuer => "UntrustedIssuer",
            ErrorKind::MissingFields => "MissingFields",
            ErrorKind::InvalidFormat => "InvalidFormat",
            ErrorKind::UnsupportedProtocol => "UnsupportedProtocol",
            ErrorKind::DistrictLookupFailed => "DistrictLookupFailed",
            ErrorKind::InvalidCredentialType => "InvalidCredentialType",
            ErrorKind::UnverifiedIdentity => "UnverifiedIdentity",
            ErrorKind::DigestMismatch => "DigestMismatch",
            ErrorKind::CredentialExpired => "CredentialExpired",
            ErrorKind::CredentialUnavailable => "CredentialUnavailable",
            ErrorKind::HashError => "HashError",
            ErrorKind::InvalidAuthorityLevel => "InvalidAuthorityLevel",
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::IoError => "IoError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for configuration and bootstrap.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration could not be parsed or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Failure kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Config(_) => ErrorKind::ConfigurationError,
            CoreError::Io(_) => ErrorKind::IoError,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
