//! Verified credential to circuit inputs
//!
//! Chains a verification result into the identity commitment and maps the
//! stored two-tree credential onto the membership circuit's inputs.

use std::collections::HashMap;
use std::sync::RwLock;

use residency_core::ErrorKind;
use residency_crypto::{
    identity_commitment, map_credential, map_stored_credential, AuthorityLevel, CredentialStore,
    CredentialType, ProofContext, SessionCredential, ZkError, ZkResult, DEFAULT_AUTHORITY_LEVEL,
};
use residency_identity::test_support::{certificate_der, issuer_key, MdocFixture};
use serde_json::json;

use crate::test_utils::{sample_processor, trust_store_for};

/// Credentials as the tree service would persist them, keyed by id.
#[derive(Default)]
struct JsonCredentialStore {
    records: RwLock<HashMap<String, String>>,
}

impl JsonCredentialStore {
    fn insert(&self, id: &str, record: serde_json::Value) {
        self.records
            .write()
            .unwrap()
            .insert(id.to_string(), record.to_string());
    }
}

impl CredentialStore for JsonCredentialStore {
    fn load(&self, credential_id: &str) -> ZkResult<Option<SessionCredential>> {
        let records = self
            .records
            .read()
            .map_err(|_| ZkError::CredentialUnavailable("store poisoned".to_string()))?;
        records
            .get(credential_id)
            .map(|record| {
                serde_json::from_str(record)
                    .map_err(|e| ZkError::CredentialUnavailable(e.to_string()))
            })
            .transpose()
    }
}

fn districts() -> Vec<String> {
    (0..24).map(|i| format!("0x{:064x}", 0xd000 + i)).collect()
}

fn two_tree_record(commitment: &str) -> serde_json::Value {
    json!({
        "identity_commitment": commitment,
        "leaf_index": 42,
        "merkle_path": ["0x01", "0x02", "0x03"],
        "merkle_root": format!("0x{}", "a".repeat(64)),
        "credential_type": "two-tree",
        "cell_id": "0x0cell",
        "cell_map_root": format!("0x{}", "b".repeat(64)),
        "cell_map_path": ["0x04", "0x05"],
        "cell_map_path_bits": [0, 1],
        "districts": districts(),
        "user_secret": format!("0x{}", "c".repeat(64)),
        "registration_salt": "0x5a17"
    })
}

fn context() -> ProofContext {
    ProofContext {
        action_domain: "0xdomain".to_string(),
        nullifier: "0xnullifier".to_string(),
        authority_level: None,
    }
}

#[tokio::test]
async fn test_verified_credential_to_proof_inputs() {
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let raw = MdocFixture::address(Some("94110"), Some("CA"), None).signed_response(&key, &cert);
    let verified = sample_processor()
        .process(&raw, "mdoc", None, "unused", &trust_store_for(&cert))
        .await
        .unwrap();

    let commitment = identity_commitment(&verified.verification_method, &verified.credential_hash)
        .unwrap();
    assert!(commitment.starts_with("0x"));
    assert_eq!(commitment.len(), 66);
    // Re-presenting the same document yields the same commitment.
    assert_eq!(
        identity_commitment(&verified.verification_method, &verified.credential_hash).unwrap(),
        commitment
    );

    let store = JsonCredentialStore::default();
    store.insert("session-1", two_tree_record(&commitment));
    let inputs = map_stored_credential(&store, "session-1", &context()).unwrap();

    assert_eq!(inputs.identity_commitment, commitment);
    assert_eq!(inputs.authority_level, DEFAULT_AUTHORITY_LEVEL);
    assert_eq!(inputs.authority_level.value(), 3);
    assert_eq!(inputs.districts.len(), 24);
    assert_eq!(inputs.user_root, format!("0x{}", "a".repeat(64)));
    assert_eq!(inputs.cell_map_root, format!("0x{}", "b".repeat(64)));
    assert_eq!(inputs.user_secret, format!("0x{}", "c".repeat(64)));
    assert_eq!(inputs.user_path, vec!["0x01", "0x02", "0x03"]);
    assert_eq!(inputs.user_index, 42);
    assert_eq!(inputs.nullifier, "0xnullifier");
    assert_eq!(inputs.action_domain, "0xdomain");
}

#[test]
fn test_distinct_documents_distinct_commitments() {
    let first = identity_commitment("mdl", &hex::encode([1u8; 32])).unwrap();
    let second = identity_commitment("mdl", &hex::encode([2u8; 32])).unwrap();
    let other_provider = identity_commitment("passport", &hex::encode([1u8; 32])).unwrap();

    assert_ne!(first, second);
    assert_ne!(first, other_provider);
}

#[test]
fn test_authority_level_precedence() {
    let store = JsonCredentialStore::default();
    let commitment = identity_commitment("mdl", "ab").unwrap();

    let mut with_level = two_tree_record(&commitment);
    with_level["authority_level"] = json!(4);
    store.insert("leveled", with_level);
    store.insert("plain", two_tree_record(&commitment));

    let ctx = ProofContext {
        authority_level: Some(AuthorityLevel::new(2).unwrap()),
        ..context()
    };
    let inputs = map_stored_credential(&store, "leveled", &ctx).unwrap();
    assert_eq!(inputs.authority_level.value(), 4);

    let inputs = map_stored_credential(&store, "plain", &ctx).unwrap();
    assert_eq!(inputs.authority_level.value(), 2);
}

#[test]
fn test_out_of_range_stored_level_rejected() {
    let store = JsonCredentialStore::default();
    let mut record = two_tree_record("0x01");
    record["authority_level"] = json!(9);
    store.insert("bad-level", record);

    let err = map_stored_credential(&store, "bad-level", &context()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialUnavailable);
}

#[test]
fn test_unknown_credential_id() {
    let store = JsonCredentialStore::default();
    let err = map_stored_credential(&store, "missing", &context()).unwrap_err();
    assert_eq!(
        err,
        ZkError::CredentialUnavailable("no credential stored for identifier".to_string())
    );
}

#[test]
fn test_rejections_follow_validation_order() {
    let mut credential: SessionCredential =
        serde_json::from_value(two_tree_record("0x01")).unwrap();

    credential.credential_type = Some(CredentialType::SingleTree);
    assert_eq!(
        map_credential(&credential, &context()).unwrap_err().kind(),
        ErrorKind::InvalidCredentialType
    );

    credential.credential_type = None;
    assert_eq!(
        map_credential(&credential, &context()).unwrap_err().kind(),
        ErrorKind::InvalidCredentialType
    );

    credential.credential_type = Some(CredentialType::TwoTree);
    credential.merkle_root.clear();
    credential.cell_map_root.clear();
    credential.identity_commitment.clear();
    assert_eq!(
        map_credential(&credential, &context()).unwrap_err(),
        ZkError::MissingFields {
            fields: vec!["merkle_root".to_string(), "cell_map_root".to_string()]
        }
    );

    credential.merkle_root = "0xaaa".to_string();
    credential.cell_map_root = "0xbbb".to_string();
    assert_eq!(
        map_credential(&credential, &context()).unwrap_err(),
        ZkError::UnverifiedIdentity
    );
}
