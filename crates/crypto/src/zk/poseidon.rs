//! Poseidon hash functions for identity commitments.
//!
//! Commitments are circomlib-compatible Poseidon hashes over BN254 scalars,
//! so the proving circuit can recompute them in-field. Nothing time-dependent
//! is folded into a commitment: one verified document always maps to one
//! commitment, which is what makes registration Sybil-resistant.

use super::error::{ZkError, ZkResult};
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};
use sha2::{Digest, Sha256};

/// Prefix of every hex-formatted field element.
pub const FIELD_HEX_PREFIX: &str = "0x";

fn poseidon_hash(inputs: &[&[u8; 32]]) -> ZkResult<[u8; 32]> {
    let mut hasher = Poseidon::<Fr>::new_circom(inputs.len())
        .map_err(|err| ZkError::HashError(err.to_string()))?;
    let field_inputs: Vec<Fr> = inputs
        .iter()
        .map(|input| Fr::from_be_bytes_mod_order((*input).as_ref()))
        .collect();
    let hash = hasher
        .hash(&field_inputs)
        .map_err(|err| ZkError::HashError(err.to_string()))?;
    field_to_bytes(&hash)
}

fn field_to_bytes(value: &Fr) -> ZkResult<[u8; 32]> {
    let bytes = value.into_bigint().to_bytes_be();
    if bytes.len() > 32 {
        return Err(ZkError::HashError(
            "field element exceeds 32 bytes".to_string(),
        ));
    }
    let mut output = [0u8; 32];
    let offset = 32 - bytes.len();
    output[offset..].copy_from_slice(&bytes);
    Ok(output)
}

/// Hash two field elements together
pub fn poseidon_hash_2(a: &[u8; 32], b: &[u8; 32]) -> ZkResult<[u8; 32]> {
    poseidon_hash(&[a, b])
}

/// Map an arbitrary string onto the scalar field: `SHA-256(utf8) mod r`.
pub fn string_to_field_bytes(input: &str) -> ZkResult<[u8; 32]> {
    let digest: [u8; 32] = Sha256::digest(input.as_bytes()).into();
    field_to_bytes(&Fr::from_be_bytes_mod_order(&digest))
}

/// Format 32 field bytes as `0x` followed by 64 lowercase hex digits.
pub fn field_to_hex(bytes: &[u8; 32]) -> String {
    format!("{}{}", FIELD_HEX_PREFIX, hex::encode(bytes))
}

/// Derive the identity commitment for a verified credential.
///
/// commitment = poseidon_hash_2(field(provider), field(credential_hash))
pub fn identity_commitment(provider: &str, credential_hash: &str) -> ZkResult<String> {
    let mut missing = Vec::new();
    if provider.is_empty() {
        missing.push("provider".to_string());
    }
    if credential_hash.is_empty() {
        missing.push("credential_hash".to_string());
    }
    if !missing.is_empty() {
        return Err(ZkError::MissingFields { fields: missing });
    }

    let provider_field = string_to_field_bytes(provider)?;
    let hash_field = string_to_field_bytes(credential_hash)?;
    let commitment = poseidon_hash_2(&provider_field, &hash_field)?;
    Ok(field_to_hex(&commitment))
}
