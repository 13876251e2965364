//! COSE_Sign1 verification for issuer authentication.
//!
//! # Security Properties
//!
//! - Only ES256 (COSE alg -7) is accepted
//! - Detached payloads are rejected; there is no out-of-band payload channel
//! - The Sig_structure is rebuilt locally; external AAD is always empty
//! - The trust-anchor check runs only after the signature has verified, so a
//!   caller probing certificates learns nothing about the trust store from a
//!   forged signature

use chrono::{DateTime, Utc};
use ciborium::value::Value;
use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use tracing::{debug, warn};

use crate::cbor;
use crate::error::{IdentityResult, VerificationError};
use crate::mso::Mso;
use crate::pki::{extract_p256_public_key, TrustAnchorSet};

/// COSE algorithm identifier for ECDSA w/ SHA-256.
pub const COSE_ALG_ES256: i64 = -7;

/// Protected header label carrying the algorithm.
pub const HEADER_ALG: i64 = 1;

/// Unprotected header label carrying the X.509 chain.
pub const HEADER_X5CHAIN: i64 = 33;

/// CBOR tag of a tagged COSE_Sign1.
pub const TAG_COSE_SIGN1: u64 = 18;

/// ECDSA P-256 signature length (r || s).
pub const ES256_SIGNATURE_LEN: usize = 64;

const SIGNATURE1_CONTEXT: &str = "Signature1";

/// The four parts of a COSE_Sign1 structure.
#[derive(Debug, Clone, PartialEq)]
pub struct CoseSign1 {
    /// Serialized protected header map
    pub protected: Vec<u8>,
    pub unprotected: Vec<(Value, Value)>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CoseSign1 {
    /// Parse from a decoded value, tagged (18) or untagged.
    pub fn from_value(value: &Value) -> IdentityResult<Self> {
        let value = match value {
            Value::Tag(TAG_COSE_SIGN1, inner) => inner.as_ref(),
            other => other,
        };
        let parts = value.as_array().ok_or_else(|| {
            VerificationError::InvalidFormat("COSE_Sign1 is not an array".to_string())
        })?;
        let [protected, unprotected, payload, signature] = parts.as_slice() else {
            return Err(VerificationError::InvalidFormat(format!(
                "COSE_Sign1 must have 4 elements, found {}",
                parts.len()
            )));
        };

        let protected = protected
            .as_bytes()
            .ok_or_else(|| {
                VerificationError::InvalidFormat("protected header is not a byte string".into())
            })?
            .clone();
        let unprotected = unprotected
            .as_map()
            .ok_or_else(|| {
                VerificationError::InvalidFormat("unprotected header is not a map".into())
            })?
            .clone();
        let payload = match payload {
            Value::Bytes(bytes) => bytes.clone(),
            Value::Null => {
                return Err(VerificationError::InvalidFormat(
                    "detached COSE payloads are not supported".into(),
                ))
            }
            _ => {
                return Err(VerificationError::InvalidFormat(
                    "COSE payload is not a byte string".into(),
                ))
            }
        };
        let signature = signature
            .as_bytes()
            .ok_or_else(|| {
                VerificationError::InvalidFormat("COSE signature is not a byte string".into())
            })?
            .clone();

        Ok(Self {
            protected,
            unprotected,
            payload,
            signature,
        })
    }

    /// Decode and parse from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> IdentityResult<Self> {
        Self::from_value(&cbor::decode(bytes)?)
    }

    /// The `alg` value from the protected header.
    pub fn algorithm(&self) -> IdentityResult<i64> {
        if self.protected.is_empty() {
            return Err(VerificationError::UnsupportedAlgorithm(
                "no protected algorithm header".to_string(),
            ));
        }
        let headers = cbor::decode(&self.protected)?;
        if headers.as_map().is_none() {
            return Err(VerificationError::InvalidFormat(
                "protected header is not a map".to_string(),
            ));
        }
        cbor::map_get_int(&headers, HEADER_ALG)
            .and_then(cbor::as_i128)
            .and_then(|alg| i64::try_from(alg).ok())
            .ok_or_else(|| {
                VerificationError::UnsupportedAlgorithm(
                    "no integer algorithm in protected header".to_string(),
                )
            })
    }

    /// Leaf certificate from the x5chain header (label 33).
    pub fn signer_certificate(&self) -> IdentityResult<Vec<u8>> {
        let missing =
            || VerificationError::MissingCertificate("no x5chain in unprotected header".into());
        match cbor::map_get_int_in(&self.unprotected, HEADER_X5CHAIN).ok_or_else(missing)? {
            Value::Bytes(der) if !der.is_empty() => Ok(der.clone()),
            Value::Array(chain) => match chain.first() {
                Some(Value::Bytes(der)) if !der.is_empty() => Ok(der.clone()),
                _ => Err(missing()),
            },
            _ => Err(missing()),
        }
    }

    /// `["Signature1", protected, h'', payload]` encoded as CBOR.
    pub fn sig_structure(&self) -> IdentityResult<Vec<u8>> {
        cbor::encode(&Value::Array(vec![
            Value::Text(SIGNATURE1_CONTEXT.into()),
            Value::Bytes(self.protected.clone()),
            Value::Bytes(Vec::new()),
            Value::Bytes(self.payload.clone()),
        ]))
    }
}

/// Verify an issuer signature and return the signed MSO.
pub fn verify_sign1(sign1: &CoseSign1, trust_anchors: &TrustAnchorSet) -> IdentityResult<Mso> {
    verify_sign1_at(sign1, trust_anchors, Utc::now())
}

/// As [`verify_sign1`], with trust-anchor expiry judged at `now`.
pub fn verify_sign1_at(
    sign1: &CoseSign1,
    trust_anchors: &TrustAnchorSet,
    now: DateTime<Utc>,
) -> IdentityResult<Mso> {
    let alg = sign1.algorithm()?;
    if alg != COSE_ALG_ES256 {
        return Err(VerificationError::UnsupportedAlgorithm(format!(
            "COSE algorithm {alg}"
        )));
    }

    let certificate = sign1.signer_certificate()?;
    let to_be_signed = sign1.sig_structure()?;
    verify_es256(&certificate, &to_be_signed, &sign1.signature)?;

    match trust_anchors.find(&certificate, now) {
        Some(anchor) => debug!(
            issuer = %anchor.issuer_label,
            authority = %anchor.state_or_authority,
            "issuer certificate matched trust anchor"
        ),
        None => {
            warn!(
                certificate_len = certificate.len(),
                anchors = trust_anchors.len(),
                "issuer certificate not in trust store"
            );
            return Err(VerificationError::UntrustedIssuer);
        }
    }

    Mso::from_payload(&sign1.payload, certificate)
}

fn verify_es256(certificate: &[u8], message: &[u8], signature: &[u8]) -> IdentityResult<()> {
    let point = extract_p256_public_key(certificate)?;
    if signature.len() != ES256_SIGNATURE_LEN {
        return Err(VerificationError::BadSignatureLength(signature.len()));
    }

    let verifying_key = VerifyingKey::from_sec1_bytes(&point).map_err(|_| {
        VerificationError::KeyNotFound("certificate key is not a valid P-256 point".to_string())
    })?;
    let signature =
        Signature::from_slice(signature).map_err(|_| VerificationError::SignatureInvalid)?;

    verifying_key
        .verify(message, &signature)
        .map_err(|_| VerificationError::SignatureInvalid)
}
