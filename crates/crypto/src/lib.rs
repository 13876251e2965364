//! Circuit-facing cryptography for the residency verifier.
//!
//! This crate turns a successful credential verification into something a
//! zero-knowledge circuit can consume.
//!
//! # Core Capabilities
//!
//! - **Identity Commitments**: deterministic Poseidon commitments over the
//!   BN254 scalar field, one per verified document
//! - **Proof Input Mapping**: stored two-tree session credentials plus a
//!   per-request context, laid out exactly as the circuit expects
//!
//! # Security Principles
//!
//! - Commitments never fold in time, randomness or nonces
//! - Only two-tree credentials are mapped; everything else fails closed
//! - Authority levels are never raised client-side
//! - Secrets are redacted from `Debug` output

pub mod zk;

pub use zk::{
    identity_commitment, map_credential, map_stored_credential, AuthorityLevel, CredentialStore,
    CredentialType, ProofContext, SessionCredential, TwoTreeProofInputs, ZkError, ZkResult,
    DEFAULT_AUTHORITY_LEVEL,
};
