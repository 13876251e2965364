//! Mapping of stored session credentials onto two-tree circuit inputs.
//!
//! A wrong or missing input here does not produce a type error anywhere; it
//! produces a proof that silently fails to verify. Every field the circuit
//! needs is therefore checked before the inputs leave this module.

use tracing::{debug, warn};

use super::error::{ZkError, ZkResult};
use super::inputs::{
    AuthorityLevel, CredentialType, ProofContext, SessionCredential, TwoTreeProofInputs,
    DEFAULT_AUTHORITY_LEVEL,
};

/// Read-only access to credentials produced by the tree service
/// (dependency injection).
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential stored under `credential_id`, if any.
    fn load(&self, credential_id: &str) -> ZkResult<Option<SessionCredential>>;
}

/// Pick the authority level the proof will claim.
///
/// The credential's own level wins because it was computed with the full
/// document in view; the caller's value is used only when the credential has
/// none. Without either, the conservative default applies. A higher level is
/// never inferred here.
pub fn resolve_authority_level(
    credential_level: Option<AuthorityLevel>,
    context_level: Option<AuthorityLevel>,
) -> AuthorityLevel {
    credential_level
        .or(context_level)
        .unwrap_or(DEFAULT_AUTHORITY_LEVEL)
}

/// Map a stored credential and a request context onto circuit inputs.
pub fn map_credential(
    credential: &SessionCredential,
    context: &ProofContext,
) -> ZkResult<TwoTreeProofInputs> {
    match credential.credential_type {
        Some(CredentialType::TwoTree) => {}
        other => {
            let found = other.map(|t| t.as_str()).unwrap_or("undefined");
            return Err(ZkError::InvalidCredentialType(format!(
                "expected two-tree, found {found}"
            )));
        }
    }

    let mut missing = Vec::new();
    if credential.merkle_root.is_empty() {
        missing.push("merkle_root");
    }
    if credential.cell_map_root.is_empty() {
        missing.push("cell_map_root");
    }
    if credential.user_secret.is_empty() {
        missing.push("user_secret");
    }
    if credential.districts.is_empty() {
        missing.push("districts");
    }
    if !missing.is_empty() {
        return Err(ZkError::MissingFields {
            fields: missing.into_iter().map(String::from).collect(),
        });
    }

    if credential.identity_commitment.is_empty() {
        return Err(ZkError::UnverifiedIdentity);
    }

    let authority_level =
        resolve_authority_level(credential.authority_level, context.authority_level);
    debug!(
        authority_level = authority_level.value(),
        districts = credential.districts.len(),
        "mapped two-tree proof inputs"
    );

    Ok(TwoTreeProofInputs {
        user_root: credential.merkle_root.clone(),
        cell_map_root: credential.cell_map_root.clone(),
        districts: credential.districts.clone(),
        nullifier: context.nullifier.clone(),
        action_domain: context.action_domain.clone(),
        authority_level,
        user_secret: credential.user_secret.clone(),
        cell_id: credential.cell_id.clone(),
        registration_salt: credential.registration_salt.clone(),
        identity_commitment: credential.identity_commitment.clone(),
        user_path: credential.merkle_path.clone(),
        user_index: credential.leaf_index,
        cell_map_path: credential.cell_map_path.clone(),
        cell_map_path_bits: credential.cell_map_path_bits.clone(),
    })
}

/// Load a credential from storage and map it.
pub fn map_stored_credential<S: CredentialStore + ?Sized>(
    store: &S,
    credential_id: &str,
    context: &ProofContext,
) -> ZkResult<TwoTreeProofInputs> {
    let credential = match store.load(credential_id) {
        Ok(Some(credential)) => credential,
        Ok(None) => {
            return Err(ZkError::CredentialUnavailable(
                "no credential stored for identifier".to_string(),
            ))
        }
        Err(err) => {
            warn!(kind = %err.kind(), "credential storage failed");
            return Err(ZkError::CredentialUnavailable(
                "credential storage failed".to_string(),
            ));
        }
    };
    map_credential(&credential, context)
}
