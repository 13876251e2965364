//! Mobile Security Object (MSO) model and digest validation.
//!
//! The MSO is the issuer-signed payload of `issuerAuth`. It binds every
//! disclosed data element to a digest and bounds the credential's validity.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use ciborium::value::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::cbor;
use crate::error::{IdentityResult, VerificationError};

/// The only digest algorithm accepted in an MSO.
pub const DIGEST_ALGORITHM_SHA256: &str = "SHA-256";

const TAG_TDATE: u64 = 0;
const TAG_EPOCH: u64 = 1;

/// Validity period asserted by the issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityInfo {
    pub signed: Option<DateTime<Utc>>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Parsed Mobile Security Object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mso {
    pub version: String,
    pub digest_algorithm: String,
    pub doc_type: Option<String>,
    /// namespace -> digest ID -> SHA-256 digest
    pub value_digests: BTreeMap<String, BTreeMap<u64, Vec<u8>>>,
    pub validity_info: ValidityInfo,
    /// DER of the certificate whose key verified the signature
    pub issuer_certificate: Vec<u8>,
}

impl Mso {
    /// Parse a COSE payload (MobileSecurityObjectBytes or a bare MSO map).
    pub fn from_payload(payload: &[u8], issuer_certificate: Vec<u8>) -> IdentityResult<Self> {
        let mso = cbor::unwrap_encoded(&cbor::decode(payload)?)?;
        if mso.as_map().is_none() {
            return Err(VerificationError::InvalidFormat(
                "MSO is not a map".to_string(),
            ));
        }

        let version = required_text(&mso, &["version"])?;
        let digest_algorithm = required_text(&mso, &["digestAlgorithm", "digest_algorithm"])?;
        if digest_algorithm != DIGEST_ALGORITHM_SHA256 {
            return Err(VerificationError::UnsupportedAlgorithm(format!(
                "MSO digest algorithm {digest_algorithm}"
            )));
        }

        let doc_type = match cbor::map_get_any(&mso, &["docType", "doc_type"]) {
            Some(Value::Text(doc_type)) => Some(doc_type.clone()),
            Some(_) => {
                return Err(VerificationError::InvalidFormat(
                    "MSO docType is not text".to_string(),
                ))
            }
            None => None,
        };

        let value_digests = parse_value_digests(
            cbor::map_get_any(&mso, &["valueDigests", "value_digests"]).ok_or_else(|| {
                VerificationError::InvalidFormat("MSO has no valueDigests".to_string())
            })?,
        )?;
        let validity_info = parse_validity_info(
            cbor::map_get_any(&mso, &["validityInfo", "validity_info"]).ok_or_else(|| {
                VerificationError::InvalidFormat("MSO has no validityInfo".to_string())
            })?,
        )?;

        Ok(Self {
            version,
            digest_algorithm,
            doc_type,
            value_digests,
            validity_info,
            issuer_certificate,
        })
    }

    /// Fail unless `now` lies within `[valid_from, valid_until]`.
    pub fn check_validity(&self, now: DateTime<Utc>) -> IdentityResult<()> {
        let validity = &self.validity_info;
        if now < validity.valid_from {
            return Err(VerificationError::CredentialExpired(
                "credential is not yet valid".to_string(),
            ));
        }
        if now > validity.valid_until {
            return Err(VerificationError::CredentialExpired(
                "credential validity period has ended".to_string(),
            ));
        }
        Ok(())
    }

    /// Check every disclosed element against the signed digest table.
    ///
    /// `elements` maps a namespace to the encoded IssuerSignedItemBytes
    /// disclosed for it. Returns `true` only if every element's digest ID is
    /// declared for its namespace and SHA-256 of its bytes matches.
    pub fn validate_digests(&self, elements: &HashMap<String, Vec<Vec<u8>>>) -> bool {
        for (namespace, items) in elements {
            let Some(table) = self.value_digests.get(namespace) else {
                debug!(items = items.len(), "namespace absent from MSO digest table");
                return false;
            };
            for (index, item) in items.iter().enumerate() {
                let Some(digest_id) = element_digest_id(item) else {
                    debug!(index, "disclosed element has no digest ID");
                    return false;
                };
                let Some(declared) = table.get(&digest_id) else {
                    debug!(digest_id, "digest ID not declared in MSO");
                    return false;
                };
                if Sha256::digest(item).as_slice() != declared.as_slice() {
                    debug!(digest_id, "element digest does not match MSO");
                    return false;
                }
            }
        }
        true
    }
}

/// `digestID` of an encoded IssuerSignedItem (tagged or bare).
pub fn element_digest_id(item_bytes: &[u8]) -> Option<u64> {
    let item = cbor::unwrap_encoded(&cbor::decode(item_bytes).ok()?).ok()?;
    cbor::map_get_any(&item, &["digestID", "digest_id"])
        .and_then(cbor::as_i128)
        .and_then(|id| u64::try_from(id).ok())
}

fn required_text(map: &Value, keys: &[&str]) -> IdentityResult<String> {
    match cbor::map_get_any(map, keys) {
        Some(Value::Text(text)) => Ok(text.clone()),
        Some(_) => Err(VerificationError::InvalidFormat(format!(
            "MSO {} is not text",
            keys[0]
        ))),
        None => Err(VerificationError::InvalidFormat(format!(
            "MSO has no {}",
            keys[0]
        ))),
    }
}

fn parse_value_digests(value: &Value) -> IdentityResult<BTreeMap<String, BTreeMap<u64, Vec<u8>>>> {
    let invalid = |what: &str| VerificationError::InvalidFormat(format!("valueDigests {what}"));

    let namespaces = value.as_map().ok_or_else(|| invalid("is not a map"))?;
    let mut digests = BTreeMap::new();
    for (namespace, table) in namespaces {
        let namespace = namespace
            .as_text()
            .ok_or_else(|| invalid("namespace is not text"))?;
        let entries = table
            .as_map()
            .ok_or_else(|| invalid("table is not a map"))?;

        let mut by_id = BTreeMap::new();
        for (id, digest) in entries {
            let id = cbor::as_i128(id)
                .and_then(|id| u64::try_from(id).ok())
                .ok_or_else(|| invalid("digest ID is not an unsigned integer"))?;
            let digest = digest
                .as_bytes()
                .ok_or_else(|| invalid("digest is not a byte string"))?;
            by_id.insert(id, digest.clone());
        }
        digests.insert(namespace.to_string(), by_id);
    }
    Ok(digests)
}

fn parse_validity_info(value: &Value) -> IdentityResult<ValidityInfo> {
    if value.as_map().is_none() {
        return Err(VerificationError::InvalidFormat(
            "validityInfo is not a map".to_string(),
        ));
    }
    let field = |keys: &[&str]| -> IdentityResult<Option<DateTime<Utc>>> {
        cbor::map_get_any(value, keys)
            .map(|v| parse_timestamp(v, keys[0]))
            .transpose()
    };
    let missing =
        |name: &str| VerificationError::InvalidFormat(format!("validityInfo has no {name}"));

    let signed = field(&["signed"])?;
    let valid_from = field(&["validFrom", "valid_from"])?.ok_or_else(|| missing("validFrom"))?;
    let valid_until = field(&["validUntil", "valid_until"])?.ok_or_else(|| missing("validUntil"))?;
    if valid_from > valid_until {
        return Err(VerificationError::InvalidFormat(
            "validFrom is after validUntil".to_string(),
        ));
    }

    Ok(ValidityInfo {
        signed,
        valid_from,
        valid_until,
    })
}

fn parse_timestamp(value: &Value, name: &str) -> IdentityResult<DateTime<Utc>> {
    let invalid = || VerificationError::InvalidFormat(format!("{name} is not a valid timestamp"));
    match value {
        Value::Tag(TAG_TDATE, inner) => match inner.as_ref() {
            Value::Text(text) => parse_rfc3339(text).ok_or_else(invalid),
            _ => Err(invalid()),
        },
        Value::Tag(TAG_EPOCH, inner) => cbor::as_i128(inner)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(invalid),
        Value::Text(text) => parse_rfc3339(text).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
