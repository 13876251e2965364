//! End-to-end mdoc presentations
//!
//! Each test builds a genuinely signed DeviceResponse, runs it through the
//! processor and checks the outcome callers see.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use ciborium::value::Value;
use residency_core::{Config, ErrorKind, VerificationConfig};
use residency_identity::test_support::{
    certificate_der, issuer_key, issuer_signed_item, sign1, MdocFixture,
};
use residency_identity::{
    credential_hash, CredentialProcessor, IdentityResult, TrustAnchorSet, VerificationError,
    VerificationResult, VerifiedDistrict,
};
use sha2::{Digest, Sha256};

use crate::test_utils::{
    init_tracing, sample_processor, trust_store_for, SlowLookup, StaticDistrictLookup,
};

const NONCE: &str = "unused-for-mdoc";

#[tokio::test]
async fn test_signed_mdoc_resolves_district() {
    init_tracing();
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let raw = MdocFixture::address(Some("94110"), Some("CA"), Some("San Francisco"))
        .signed_response(&key, &cert);

    let processor = sample_processor();
    let verified = processor
        .process(&raw, "mdoc", None, NONCE, &trust_store_for(&cert))
        .await
        .expect("signed mdoc verifies");

    assert_eq!(verified.district, "CA-11");
    assert_eq!(verified.state, "CA");
    assert_eq!(verified.verification_method, "mdl");
    assert_eq!(verified.credential_hash, hex::encode(Sha256::digest(&raw)));
    assert_eq!(verified.credential_hash, credential_hash(&raw));

    // Nothing from the address survives into the serialised result.
    let result: IdentityResult<VerifiedDistrict> = Ok(verified);
    let json = serde_json::to_string(&VerificationResult::from(result)).unwrap();
    assert!(json.contains("\"status\":\"success\""));
    assert!(!json.contains("94110"));
    assert!(!json.contains("San Francisco"));
}

#[tokio::test]
async fn test_missing_state_is_named() {
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let anchors = trust_store_for(&cert);
    let processor = sample_processor();

    let with_postal = MdocFixture::address(Some("94110"), None, None).signed_response(&key, &cert);
    let err = processor
        .process(&with_postal, "mdoc", None, NONCE, &anchors)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFields);
    assert_eq!(err.to_string(), "missing required fields: resident_state");

    // Both gaps are reported together.
    let neither = MdocFixture::address(None, None, Some("Fresno")).signed_response(&key, &cert);
    let err = processor
        .process(&neither, "mdoc", None, NONCE, &anchors)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        VerificationError::MissingFields {
            fields: vec![
                "resident_postal_code".to_string(),
                "resident_state".to_string()
            ]
        }
    );
    assert!(!err.to_string().contains("Fresno"));
    assert_eq!(processor.lookup().calls(), 0);
}

#[tokio::test]
async fn test_tampered_element_rejected() {
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let fixture = MdocFixture::address(Some("94110"), Some("CA"), None);
    let items = fixture.items();
    let issuer_auth = sign1(&key, &cert, &fixture.mso_payload(&items));

    // Swap in a different postal code under the signed digest ID.
    let mut tampered = items;
    tampered[1] = issuer_signed_item(1, "resident_postal_code", Value::Text("95814".into()));
    let raw = fixture.response_with(tampered, Some(issuer_auth));

    let err = sample_processor()
        .process(&raw, "mdoc", None, NONCE, &trust_store_for(&cert))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DigestMismatch);
}

#[tokio::test]
async fn test_expired_credential_rejected() {
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let mut fixture = MdocFixture::address(Some("94110"), Some("CA"), None);
    fixture.valid_from = Utc::now() - chrono::Duration::days(400);
    fixture.valid_until = Utc::now() - chrono::Duration::days(35);
    let raw = fixture.signed_response(&key, &cert);

    let err = sample_processor()
        .process(&raw, "mdoc", None, NONCE, &trust_store_for(&cert))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialExpired);

    // The window check can be switched off.
    let config = VerificationConfig {
        enforce_validity_window: false,
        ..VerificationConfig::default()
    };
    let processor = CredentialProcessor::new(StaticDistrictLookup::sample(), config);
    assert!(processor
        .process(&raw, "mdoc", None, NONCE, &trust_store_for(&cert))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_untrusted_and_forged_issuers() {
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let processor = sample_processor();

    let raw = MdocFixture::address(Some("94110"), Some("CA"), None).signed_response(&key, &cert);
    let other_anchor = trust_store_for(&certificate_der(&issuer_key(8), "NV DMV IACA"));
    let err = processor
        .process(&raw, "mdoc", None, NONCE, &other_anchor)
        .await
        .unwrap_err();
    assert_eq!(err, VerificationError::UntrustedIssuer);

    // Signed with a key that does not match the embedded certificate.
    let forged = MdocFixture::address(Some("94110"), Some("CA"), None)
        .signed_response(&issuer_key(9), &cert);
    let err = processor
        .process(&forged, "mdoc", None, NONCE, &trust_store_for(&cert))
        .await
        .unwrap_err();
    assert_eq!(err, VerificationError::SignatureInvalid);
}

#[tokio::test]
async fn test_trust_anchors_from_config() {
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let toml = format!(
        r#"
[verification]
lookup_timeout_ms = 2000

[[trust_anchors]]
issuer_label = "CA DMV IACA"
state_or_authority = "CA"
certificate_base64 = "{}"
expires_at = "2099-01-01T00:00:00Z"
"#,
        STANDARD.encode(&cert)
    );
    let config = Config::from_toml_str(&toml).unwrap();
    let anchors = TrustAnchorSet::from_config(&config.trust_anchors).unwrap();
    assert_eq!(anchors.len(), 1);

    let processor = CredentialProcessor::new(
        StaticDistrictLookup::sample(),
        config.verification,
    );
    let raw = MdocFixture::address(Some("82001"), Some("WY"), None).signed_response(&key, &cert);
    let verified = processor
        .process(&raw, "mdoc", None, NONCE, &anchors)
        .await
        .unwrap();
    assert_eq!(verified.district, "WY-AL");
}

#[tokio::test]
async fn test_lookup_timeout_is_lookup_failure() {
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let raw = MdocFixture::address(Some("94110"), Some("CA"), None).signed_response(&key, &cert);

    let config = VerificationConfig {
        lookup_timeout_ms: 50,
        ..VerificationConfig::default()
    };
    let processor = CredentialProcessor::new(
        SlowLookup {
            delay: Duration::from_secs(10),
        },
        config,
    );

    let err = processor
        .process(&raw, "mdoc", None, NONCE, &trust_store_for(&cert))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DistrictLookupFailed);
}

#[tokio::test]
async fn test_unknown_address_is_lookup_failure() {
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let raw = MdocFixture::address(Some("00000"), Some("CA"), None).signed_response(&key, &cert);

    let err = sample_processor()
        .process(&raw, "mdoc", None, NONCE, &trust_store_for(&cert))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        VerificationError::DistrictLookupFailed("district lookup failed".to_string())
    );
}

#[tokio::test]
async fn test_concurrent_requests_share_processor() {
    let key = issuer_key(7);
    let cert = certificate_der(&key, "CA DMV IACA");
    let anchors = trust_store_for(&cert);
    let processor = sample_processor();

    let ca = MdocFixture::address(Some("94110"), Some("CA"), None).signed_response(&key, &cert);
    let dc = MdocFixture::address(Some("20001"), Some("DC"), None).signed_response(&key, &cert);
    let (first, second) = tokio::join!(
        processor.process(&ca, "mdoc", None, NONCE, &anchors),
        processor.process(&dc, "mdoc", None, NONCE, &anchors),
    );

    assert_eq!(first.unwrap().district, "CA-11");
    assert_eq!(second.unwrap().district, "DC-98");
    assert_eq!(processor.lookup().calls(), 2);
}
