//! Zero-knowledge circuit plumbing for district membership proofs.
//!
//! This module derives circuit-field identity commitments and prepares the
//! exact input layout of the two-tree membership circuit. Proving itself
//! happens outside this workspace.

pub mod error;
pub mod inputs;
pub mod mapper;
pub mod poseidon;

pub use error::{ZkError, ZkResult};
pub use inputs::{
    AuthorityLevel, CredentialType, ProofContext, SessionCredential, TwoTreeProofInputs,
    DEFAULT_AUTHORITY_LEVEL,
};
pub use mapper::{map_credential, map_stored_credential, resolve_authority_level, CredentialStore};
pub use poseidon::{identity_commitment, poseidon_hash_2};
