//! Credential verification and district resolution for residency proofs.
//!
//! This crate turns a wallet's presentation of a government-issued mobile
//! driving licence into a district assignment. Issuer signatures are checked
//! against a caller-supplied trust store; the holder's address is used once,
//! for the district lookup, and then discarded.
//!
//! # Core Concepts
//!
//! - **Binary Decoder**: CBOR, compact JWT and SD-JWT decoding (`cbor`, `jwt`)
//! - **Certificate Key Extractor**: P-256 key location in DER and the
//!   trust-anchor store (`pki`)
//! - **COSE_Sign1 Verifier**: ES256 issuer authentication (`cose`)
//! - **MSO Digest Validator**: per-element digest binding (`mso`)
//! - **Credential Response Processor**: the `mdoc` and `openid4vp`
//!   transports end to end (`response`)
//!
//! # Security Model
//!
//! - Every failure is terminal and tagged with an [`ErrorKind`]
//! - Signature verification always precedes the trust-store decision
//! - Address fields never reach a log line, an error or a result

pub mod cbor;
pub mod cose;
pub mod district;
pub mod error;
pub mod jwt;
pub mod mso;
pub mod pki;
pub mod response;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cose::{verify_sign1, verify_sign1_at, CoseSign1};
pub use district::{DistrictAssignment, DistrictLookup, LookupError};
pub use error::{IdentityResult, VerificationError};
pub use jwt::{decode_compact, decode_sd_jwt, CompactJwt, Disclosure, SdJwt};
pub use mso::{Mso, ValidityInfo};
pub use pki::{extract_p256_public_key, TrustAnchor, TrustAnchorSet};
pub use response::{
    credential_hash, AddressFields, CredentialProcessor, CredentialResponse, Protocol,
    VerificationResult, VerifiedDistrict, VpToken,
};

// Re-export core types for convenience
pub use residency_core::ErrorKind;
