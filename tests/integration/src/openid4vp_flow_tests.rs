//! End-to-end OpenID4VP presentations

use residency_core::ErrorKind;
use residency_identity::test_support::{compact_jwt, disclosure, disclosure_digest};
use residency_identity::{TrustAnchorSet, VerificationError};
use serde_json::json;

use crate::test_utils::{init_tracing, sample_processor};

const NONCE: &str = "c2VydmVyLWlzc3VlZC1ub25jZQ";

fn address_disclosures() -> Vec<String> {
    vec![
        disclosure("2GLC42sKQveCfGfryNRN9w", "resident_postal_code", json!("95814")),
        disclosure("eluV5Og3gSNII8EYnsxA_A", "resident_city", json!("Sacramento")),
        disclosure("6Ij7tM-a5iVPGboS5tmvVA", "resident_state", json!("CA")),
    ]
}

#[tokio::test]
async fn test_sd_jwt_disclosures_supply_address() {
    init_tracing();
    let disclosures = address_disclosures();
    let jwt = compact_jwt(&json!({ "nonce": NONCE }));
    let raw = format!("{jwt}~{}~", disclosures.join("~"));

    let verified = sample_processor()
        .process(raw.as_bytes(), "openid4vp", None, NONCE, &TrustAnchorSet::default())
        .await
        .expect("disclosed address verifies");
    assert_eq!(verified.district, "CA-07");
    assert_eq!(verified.state, "CA");
    assert_eq!(verified.verification_method, "mdl");
}

#[tokio::test]
async fn test_sd_jwt_with_digest_list() {
    let disclosures = address_disclosures();
    let digests: Vec<String> = disclosures.iter().map(|d| disclosure_digest(d)).collect();
    let jwt = compact_jwt(&json!({ "nonce": NONCE, "_sd": digests, "_sd_alg": "sha-256" }));
    let raw = json!({ "vp_token": format!("{jwt}~{}~", disclosures.join("~")) }).to_string();

    let verified = sample_processor()
        .process(raw.as_bytes(), "openid4vp", None, NONCE, &TrustAnchorSet::default())
        .await
        .unwrap();
    assert_eq!(verified.district, "CA-07");
}

#[tokio::test]
async fn test_disclosure_overrides_payload() {
    // The disclosed state wins over a stale value in the JWT body.
    let disclosures = address_disclosures();
    let jwt = compact_jwt(&json!({ "nonce": NONCE, "resident_state": "NV" }));
    let raw = format!("{jwt}~{}~", disclosures.join("~"));

    let verified = sample_processor()
        .process(raw.as_bytes(), "openid4vp", None, NONCE, &TrustAnchorSet::default())
        .await
        .unwrap();
    assert_eq!(verified.state, "CA");
}

#[tokio::test]
async fn test_nonce_mismatch() {
    let disclosures = address_disclosures();
    let jwt = compact_jwt(&json!({ "nonce": "replayed-nonce" }));
    let raw = format!("{jwt}~{}~", disclosures.join("~"));

    let processor = sample_processor();
    let err = processor
        .process(raw.as_bytes(), "openid4vp", None, NONCE, &TrustAnchorSet::default())
        .await
        .unwrap_err();
    assert_eq!(err, VerificationError::InvalidFormat("nonce mismatch".to_string()));
    assert_eq!(processor.lookup().calls(), 0);
}

#[tokio::test]
async fn test_namespaced_claims_in_plain_jwt() {
    let jwt = compact_jwt(&json!({
        "nonce": NONCE,
        "org.iso.18013.5.1": {
            "resident_postal_code": "20001",
            "resident_state": "DC"
        }
    }));

    let verified = sample_processor()
        .process(jwt.as_bytes(), "openid4vp", None, NONCE, &TrustAnchorSet::default())
        .await
        .unwrap();
    assert_eq!(verified.district, "DC-98");
}

#[tokio::test]
async fn test_missing_fields_reported_together() {
    let jwt = compact_jwt(&json!({ "nonce": NONCE, "resident_city": "Sacramento" }));

    let err = sample_processor()
        .process(jwt.as_bytes(), "openid4vp", None, NONCE, &TrustAnchorSet::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFields);
    assert_eq!(
        err.to_string(),
        "missing required fields: resident_postal_code, resident_state"
    );
}

#[tokio::test]
async fn test_malformed_token_is_decode_error() {
    let err = sample_processor()
        .process(b"not-a-jwt", "openid4vp", None, NONCE, &TrustAnchorSet::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
}

#[tokio::test]
async fn test_ephemeral_key_is_ignored() {
    let disclosures = address_disclosures();
    let jwt = compact_jwt(&json!({ "nonce": NONCE }));
    let raw = format!("{jwt}~{}~", disclosures.join("~"));

    let verified = sample_processor()
        .process(
            raw.as_bytes(),
            "openid4vp",
            Some(&[0x04u8; 65][..]),
            NONCE,
            &TrustAnchorSet::default(),
        )
        .await
        .unwrap();
    assert_eq!(verified.district, "CA-07");
}

#[tokio::test]
async fn test_disclosed_nonce_cannot_replace_payload_nonce() {
    // A captured presentation bound to an old nonce, with a fresh nonce
    // appended as a disclosure.
    let jwt = compact_jwt(&json!({
        "nonce": "stale-nonce",
        "resident_postal_code": "95814",
        "resident_state": "CA"
    }));
    let fresh = disclosure("bGF0ZS1zYWx0", "nonce", json!(NONCE));
    let raw = format!("{jwt}~{fresh}~");

    let processor = sample_processor();
    let err = processor
        .process(raw.as_bytes(), "openid4vp", None, NONCE, &TrustAnchorSet::default())
        .await
        .unwrap_err();
    assert_eq!(err, VerificationError::InvalidFormat("nonce mismatch".to_string()));
    assert_eq!(processor.lookup().calls(), 0);
}

#[tokio::test]
async fn test_disclosed_nonce_cannot_supply_missing_nonce() {
    let mut disclosures = address_disclosures();
    disclosures.push(disclosure("bm8tbm9uY2U", "nonce", json!(NONCE)));
    let jwt = compact_jwt(&json!({}));
    let raw = format!("{jwt}~{}~", disclosures.join("~"));

    let err = sample_processor()
        .process(raw.as_bytes(), "openid4vp", None, NONCE, &TrustAnchorSet::default())
        .await
        .unwrap_err();
    assert_eq!(err, VerificationError::InvalidFormat("nonce mismatch".to_string()));
}
