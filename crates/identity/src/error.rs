//! Error types for credential verification.
//!
//! Messages are built only from structural facts (lengths, offsets, field
//! names). Address values, document numbers and key material never reach an
//! error-constructing path.

use residency_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur while verifying a credential response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Truncated or malformed CBOR, base64url or JSON
    #[error("Decode error: {0}")]
    Decode(String),

    /// No P-256 public key in the certificate
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Algorithm other than ES256 / SHA-256
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// COSE_Sign1 carried no signer certificate
    #[error("Missing certificate: {0}")]
    MissingCertificate(String),

    /// Signature does not verify under the certificate key
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Signature is not a 64-byte r||s value
    #[error("Bad signature length: expected 64 bytes, got {0}")]
    BadSignatureLength(usize),

    /// Signature verified but the certificate is not a trust anchor
    #[error("Untrusted issuer: certificate does not match any trust anchor")]
    UntrustedIssuer,

    /// Every required field that was absent
    #[error("missing required fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// Structurally wrong input
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Transport protocol not recognised
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// District lookup failed or timed out
    #[error("District lookup failed: {0}")]
    DistrictLookupFailed(String),

    /// Disclosed element does not match the signed digest table
    #[error("Digest mismatch: {0}")]
    DigestMismatch(String),

    /// Current time outside the MSO validity window
    #[error("Credential expired: {0}")]
    CredentialExpired(String),
}

impl VerificationError {
    /// Failure kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerificationError::Decode(_) => ErrorKind::DecodeError,
            VerificationError::KeyNotFound(_) => ErrorKind::KeyNotFound,
            VerificationError::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            VerificationError::MissingCertificate(_) => ErrorKind::MissingCertificate,
            VerificationError::SignatureInvalid => ErrorKind::SignatureInvalid,
            VerificationError::BadSignatureLength(_) => ErrorKind::BadSignatureLength,
            VerificationError::UntrustedIssuer => ErrorKind::UntrustedIssuer,
            VerificationError::MissingFields { .. } => ErrorKind::MissingFields,
            VerificationError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            VerificationError::UnsupportedProtocol(_) => ErrorKind::UnsupportedProtocol,
            VerificationError::DistrictLookupFailed(_) => ErrorKind::DistrictLookupFailed,
            VerificationError::DigestMismatch(_) => ErrorKind::DigestMismatch,
            VerificationError::CredentialExpired(_) => ErrorKind::CredentialExpired,
        }
    }
}

/// Result type for verification operations.
pub type IdentityResult<T> = Result<T, VerificationError>;
