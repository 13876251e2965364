//! Fixture builders for issuer-signed credentials.
//!
//! ⚠️ WARNING: DO NOT USE IN PRODUCTION ⚠️
//!
//! Keys here are derived from fixed seeds and are publicly known. The
//! builders produce genuine CBOR, genuine ES256 signatures and minimal but
//! well-formed DER certificates, so the verification paths exercised with
//! them are the production paths.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use ciborium::value::Value;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use sha2::{Digest, Sha256};

use crate::cbor::{encode, TAG_ENCODED_CBOR};
use crate::cose::{COSE_ALG_ES256, HEADER_ALG, HEADER_X5CHAIN};
use residency_core::config::{DEFAULT_MDL_DOC_TYPE, DEFAULT_MDL_NAMESPACE};

const TAG_TDATE: u64 = 0;

/// Deterministic issuer key; `seed` must be non-zero.
pub fn issuer_key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).expect("non-zero seed is a valid P-256 scalar")
}

/// SEC1 uncompressed encoding of the key's public point.
pub fn uncompressed_point(key: &SigningKey) -> Vec<u8> {
    key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
}

fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    match content.len() {
        len @ 0..=0x7f => out.push(len as u8),
        len @ 0x80..=0xff => out.extend_from_slice(&[0x81, len as u8]),
        len => out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]),
    }
    out.extend_from_slice(content);
    out
}

/// Minimal X.509-shaped DER carrying a real P-256 SubjectPublicKeyInfo.
///
/// `subject` makes certificates for the same key distinguishable.
pub fn certificate_der(key: &SigningKey, subject: &str) -> Vec<u8> {
    let algorithm = der_tlv(
        0x30,
        &[
            0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, // id-ecPublicKey
            0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, // prime256v1
        ],
    );
    let mut key_bits = vec![0x00];
    key_bits.extend_from_slice(&uncompressed_point(key));
    let mut spki_content = algorithm;
    spki_content.extend(der_tlv(0x03, &key_bits));
    let spki = der_tlv(0x30, &spki_content);

    let mut tbs_content = der_tlv(0xa0, &der_tlv(0x02, &[0x02]));
    tbs_content.extend(der_tlv(0x02, &[0x01]));
    tbs_content.extend(der_tlv(0x0c, subject.as_bytes()));
    tbs_content.extend(spki);
    let tbs = der_tlv(0x30, &tbs_content);

    // ecdsa-with-SHA256
    let signature_algorithm = der_tlv(
        0x30,
        &[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02],
    );
    let mut cert_content = tbs;
    cert_content.extend(signature_algorithm);
    cert_content.extend(der_tlv(0x03, &[0x00, 0x30, 0x00]));
    der_tlv(0x30, &cert_content)
}

/// Untagged COSE_Sign1 array signed with ES256.
pub fn sign1(key: &SigningKey, certificate: &[u8], payload: &[u8]) -> Value {
    sign1_with_alg(key, certificate, payload, COSE_ALG_ES256)
}

/// COSE_Sign1 array with an arbitrary `alg` header.
pub fn sign1_with_alg(key: &SigningKey, certificate: &[u8], payload: &[u8], alg: i64) -> Value {
    let protected = encode(&Value::Map(vec![(
        Value::Integer(HEADER_ALG.into()),
        Value::Integer(alg.into()),
    )]))
    .expect("protected header encodes");

    let to_be_signed = encode(&Value::Array(vec![
        Value::Text("Signature1".into()),
        Value::Bytes(protected.clone()),
        Value::Bytes(Vec::new()),
        Value::Bytes(payload.to_vec()),
    ]))
    .expect("Sig_structure encodes");
    let signature: Signature = key.sign(&to_be_signed);

    Value::Array(vec![
        Value::Bytes(protected),
        Value::Map(vec![(
            Value::Integer(HEADER_X5CHAIN.into()),
            Value::Bytes(certificate.to_vec()),
        )]),
        Value::Bytes(payload.to_vec()),
        Value::Bytes(signature.to_bytes().to_vec()),
    ])
}

/// RFC 3339 `tdate` (tag 0).
pub fn tdate(time: DateTime<Utc>) -> Value {
    Value::Tag(
        TAG_TDATE,
        Box::new(Value::Text(time.to_rfc3339_opts(SecondsFormat::Secs, true))),
    )
}

/// `#6.24(bstr)` wrapping of an encoded value.
pub fn encoded_cbor(value: &Value) -> Value {
    Value::Tag(
        TAG_ENCODED_CBOR,
        Box::new(Value::Bytes(encode(value).expect("value encodes"))),
    )
}

/// IssuerSignedItemBytes for one data element.
pub fn issuer_signed_item(digest_id: u64, identifier: &str, value: Value) -> Value {
    let item = Value::Map(vec![
        (Value::Text("digestID".into()), Value::Integer(digest_id.into())),
        (
            Value::Text("random".into()),
            Value::Bytes(Sha256::digest(identifier.as_bytes()).to_vec()),
        ),
        (
            Value::Text("elementIdentifier".into()),
            Value::Text(identifier.into()),
        ),
        (Value::Text("elementValue".into()), value),
    ]);
    encoded_cbor(&item)
}

/// Builder for a single-document mDL DeviceResponse.
#[derive(Debug, Clone)]
pub struct MdocFixture {
    pub namespace: String,
    pub doc_type: String,
    pub elements: Vec<(String, Value)>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl MdocFixture {
    /// Address elements; `None` leaves the element out.
    pub fn address(postal_code: Option<&str>, state: Option<&str>, city: Option<&str>) -> Self {
        let mut elements = vec![(
            "family_name".to_string(),
            Value::Text("Doe".into()),
        )];
        for (identifier, value) in [
            ("resident_postal_code", postal_code),
            ("resident_state", state),
            ("resident_city", city),
        ] {
            if let Some(value) = value {
                elements.push((identifier.to_string(), Value::Text(value.into())));
            }
        }

        let now = Utc::now();
        Self {
            namespace: DEFAULT_MDL_NAMESPACE.to_string(),
            doc_type: DEFAULT_MDL_DOC_TYPE.to_string(),
            elements,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(365),
        }
    }

    /// IssuerSignedItemBytes with digest IDs assigned in order.
    pub fn items(&self) -> Vec<Value> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, (identifier, value))| issuer_signed_item(i as u64, identifier, value.clone()))
            .collect()
    }

    /// MobileSecurityObjectBytes digesting `items`.
    pub fn mso_payload(&self, items: &[Value]) -> Vec<u8> {
        let digests = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let digest = Sha256::digest(encode(item).expect("item encodes")).to_vec();
                (Value::Integer((i as u64).into()), Value::Bytes(digest))
            })
            .collect();

        let mso = Value::Map(vec![
            (Value::Text("version".into()), Value::Text("1.0".into())),
            (
                Value::Text("digestAlgorithm".into()),
                Value::Text("SHA-256".into()),
            ),
            (
                Value::Text("valueDigests".into()),
                Value::Map(vec![(
                    Value::Text(self.namespace.clone()),
                    Value::Map(digests),
                )]),
            ),
            (Value::Text("docType".into()), Value::Text(self.doc_type.clone())),
            (
                Value::Text("validityInfo".into()),
                Value::Map(vec![
                    (Value::Text("signed".into()), tdate(self.valid_from)),
                    (Value::Text("validFrom".into()), tdate(self.valid_from)),
                    (Value::Text("validUntil".into()), tdate(self.valid_until)),
                ]),
            ),
        ]);
        encode(&encoded_cbor(&mso)).expect("MSO encodes")
    }

    /// Issuer-signed response over the fixture's own elements.
    pub fn signed_response(&self, key: &SigningKey, certificate: &[u8]) -> Vec<u8> {
        let items = self.items();
        let issuer_auth = sign1(key, certificate, &self.mso_payload(&items));
        self.response_with(items, Some(issuer_auth))
    }

    /// Response without any issuerAuth structure.
    pub fn unsigned_response(&self) -> Vec<u8> {
        self.response_with(self.items(), None)
    }

    /// Response with explicit items and issuerAuth.
    pub fn response_with(&self, items: Vec<Value>, issuer_auth: Option<Value>) -> Vec<u8> {
        let mut issuer_signed = vec![(
            Value::Text("nameSpaces".into()),
            Value::Map(vec![(Value::Text(self.namespace.clone()), Value::Array(items))]),
        )];
        if let Some(issuer_auth) = issuer_auth {
            issuer_signed.push((Value::Text("issuerAuth".into()), issuer_auth));
        }

        let document = Value::Map(vec![
            (Value::Text("docType".into()), Value::Text(self.doc_type.clone())),
            (Value::Text("issuerSigned".into()), Value::Map(issuer_signed)),
        ]);
        let response = Value::Map(vec![
            (Value::Text("version".into()), Value::Text("1.0".into())),
            (Value::Text("documents".into()), Value::Array(vec![document])),
            (Value::Text("status".into()), Value::Integer(0.into())),
        ]);
        encode(&response).expect("response encodes")
    }
}

/// Compact JWT over `payload` with a placeholder signature segment.
pub fn compact_jwt(payload: &serde_json::Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256","typ":"vc+sd-jwt"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        URL_SAFE_NO_PAD.encode([0x5au8; 64])
    )
}

/// Encoded `[salt, name, value]` disclosure.
pub fn disclosure(salt: &str, name: &str, value: serde_json::Value) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::json!([salt, name, value]).to_string())
}

/// `base64url(SHA-256(disclosure))` as listed in `_sd`.
pub fn disclosure_digest(disclosure: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(disclosure.as_bytes()))
}
