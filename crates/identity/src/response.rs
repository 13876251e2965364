//! Credential response processing.
//!
//! Entry point for a wallet presentation: decode the transport, authenticate
//! what can be authenticated, extract the address, resolve it to a district
//! and return only the district. The address never leaves this module.
//!
//! # Transports
//!
//! - `mdoc`: an ISO 18013-5 DeviceResponse (CBOR), optionally issuer-signed
//! - `openid4vp`: a JWT, SD-JWT or claims object, bound to the request nonce

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ciborium::value::Value as CborValue;
use residency_core::{ErrorKind, VerificationConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cbor;
use crate::cose::{verify_sign1_at, CoseSign1};
use crate::district::DistrictLookup;
use crate::error::{IdentityResult, VerificationError};
use crate::jwt::{decode_sd_jwt, Disclosure, SdJwt};
use crate::pki::TrustAnchorSet;

/// Postal code element identifier (required).
pub const FIELD_POSTAL_CODE: &str = "resident_postal_code";
/// State element identifier (required).
pub const FIELD_STATE: &str = "resident_state";
/// City element identifier (optional).
pub const FIELD_CITY: &str = "resident_city";

/// Verification method reported for every successful result.
pub const VERIFICATION_METHOD: &str = "mdl";

const NONCE_CLAIM: &str = "nonce";
const SD_CLAIM: &str = "_sd";

/// Supported presentation transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "mdoc")]
    Mdoc,
    #[serde(rename = "openid4vp")]
    OpenId4Vp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Mdoc => "mdoc",
            Protocol::OpenId4Vp => "openid4vp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mdoc" => Ok(Protocol::Mdoc),
            "openid4vp" => Ok(Protocol::OpenId4Vp),
            other => Err(VerificationError::UnsupportedProtocol(format!(
                "'{other}' is not a supported protocol"
            ))),
        }
    }
}

/// OpenID4VP `vp_token` after unwrapping.
#[derive(Debug, Clone, PartialEq)]
pub enum VpToken {
    /// JWT or SD-JWT
    Jwt(SdJwt),
    /// Direct claims object
    Claims(Map<String, JsonValue>),
}

/// A decoded presentation, one arm per transport.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialResponse {
    Mdoc(CborValue),
    OpenId4Vp(VpToken),
}

impl CredentialResponse {
    /// Decode raw response bytes for the given transport.
    pub fn decode(raw_response: &[u8], protocol: Protocol) -> IdentityResult<Self> {
        match protocol {
            Protocol::Mdoc => Ok(CredentialResponse::Mdoc(cbor::decode(raw_response)?)),
            Protocol::OpenId4Vp => Ok(CredentialResponse::OpenId4Vp(decode_vp_token(
                raw_response,
            )?)),
        }
    }
}

fn decode_vp_token(raw_response: &[u8]) -> IdentityResult<VpToken> {
    let text = std::str::from_utf8(raw_response)
        .map_err(|_| VerificationError::Decode("response is not UTF-8".to_string()))?
        .trim();
    if text.is_empty() {
        return Err(VerificationError::Decode("empty response".to_string()));
    }

    if !text.starts_with(|c: char| matches!(c, '{' | '[' | '"')) {
        return Ok(VpToken::Jwt(decode_sd_jwt(text)?));
    }

    let json: JsonValue = serde_json::from_str(text)
        .map_err(|_| VerificationError::Decode("response is not valid JSON".to_string()))?;
    let token = match json {
        JsonValue::Object(mut wrapper) if wrapper.contains_key("vp_token") => wrapper
            .remove("vp_token")
            .unwrap_or(JsonValue::Null),
        other => other,
    };
    vp_token_from_json(token)
}

fn vp_token_from_json(token: JsonValue) -> IdentityResult<VpToken> {
    match token {
        JsonValue::String(jwt) => Ok(VpToken::Jwt(decode_sd_jwt(&jwt)?)),
        JsonValue::Object(claims) => Ok(VpToken::Claims(claims)),
        JsonValue::Array(entries) => match entries.into_iter().next() {
            Some(first @ (JsonValue::String(_) | JsonValue::Object(_))) => {
                vp_token_from_json(first)
            }
            _ => Err(VerificationError::InvalidFormat(
                "vp_token array has no usable entry".to_string(),
            )),
        },
        _ => Err(VerificationError::InvalidFormat(
            "vp_token is neither a JWT nor a claims object".to_string(),
        )),
    }
}

/// Address extracted from a credential.
///
/// Zeroized on drop; `Debug` never prints the values.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AddressFields {
    pub postal_code: String,
    pub state: String,
    pub city: Option<String>,
}

impl fmt::Debug for AddressFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressFields")
            .field("postal_code", &"[REDACTED]")
            .field("state", &"[REDACTED]")
            .field("city", &self.city.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AddressFields {
    /// Collect the address through `field`, reporting every missing
    /// required field at once. Empty values count as missing.
    pub fn collect(mut field: impl FnMut(&str) -> Option<String>) -> IdentityResult<Self> {
        let mut present = |name: &str| field(name).filter(|value| !value.trim().is_empty());
        let postal_code = present(FIELD_POSTAL_CODE);
        let state = present(FIELD_STATE);
        let city = present(FIELD_CITY);

        let mut missing = Vec::new();
        if postal_code.is_none() {
            missing.push(FIELD_POSTAL_CODE.to_string());
        }
        if state.is_none() {
            missing.push(FIELD_STATE.to_string());
        }

        match (postal_code, state) {
            (Some(postal_code), Some(state)) => Ok(Self {
                postal_code,
                state,
                city,
            }),
            _ => Err(VerificationError::MissingFields { fields: missing }),
        }
    }
}

/// Successful verification outcome. Carries no address content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedDistrict {
    pub district: String,
    pub state: String,
    pub verification_method: String,
    /// Lowercase hex SHA-256 of the raw response bytes
    pub credential_hash: String,
}

/// Serialisable outcome of a verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationResult {
    Success(VerifiedDistrict),
    Failure { error_kind: ErrorKind, message: String },
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success(_))
    }
}

impl From<IdentityResult<VerifiedDistrict>> for VerificationResult {
    fn from(result: IdentityResult<VerifiedDistrict>) -> Self {
        match result {
            Ok(verified) => VerificationResult::Success(verified),
            Err(err) => VerificationResult::Failure {
                error_kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}

/// Lowercase hex SHA-256 of the raw response.
pub fn credential_hash(raw_response: &[u8]) -> String {
    hex::encode(Sha256::digest(raw_response))
}

/// Verifies credential responses and resolves them to a district.
///
/// Holds no per-request state; one processor may serve concurrent requests.
pub struct CredentialProcessor<L> {
    lookup: L,
    config: VerificationConfig,
}

impl<L: DistrictLookup> CredentialProcessor<L> {
    pub fn new(lookup: L, config: VerificationConfig) -> Self {
        Self { lookup, config }
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Verify `raw_response` and resolve its district.
    ///
    /// `ephemeral_key` is reserved for encrypted-response transports and is
    /// not used by either current transport.
    pub async fn process(
        &self,
        raw_response: &[u8],
        protocol: &str,
        ephemeral_key: Option<&[u8]>,
        expected_nonce: &str,
        trust_anchors: &TrustAnchorSet,
    ) -> IdentityResult<VerifiedDistrict> {
        self.process_at(
            raw_response,
            protocol,
            ephemeral_key,
            expected_nonce,
            trust_anchors,
            Utc::now(),
        )
        .await
    }

    /// As [`process`](Self::process), with validity judged at `now`.
    pub async fn process_at(
        &self,
        raw_response: &[u8],
        protocol: &str,
        ephemeral_key: Option<&[u8]>,
        expected_nonce: &str,
        trust_anchors: &TrustAnchorSet,
        now: DateTime<Utc>,
    ) -> IdentityResult<VerifiedDistrict> {
        info!(
            protocol,
            response_len = raw_response.len(),
            has_ephemeral_key = ephemeral_key.is_some(),
            "processing credential response"
        );

        let result = self
            .verify_and_resolve(raw_response, protocol, expected_nonce, trust_anchors, now)
            .await;
        match &result {
            Ok(verified) => info!(
                protocol,
                district = %verified.district,
                "credential verified"
            ),
            Err(err) => warn!(protocol, error_kind = %err.kind(), "credential rejected"),
        }
        result
    }

    async fn verify_and_resolve(
        &self,
        raw_response: &[u8],
        protocol: &str,
        expected_nonce: &str,
        trust_anchors: &TrustAnchorSet,
        now: DateTime<Utc>,
    ) -> IdentityResult<VerifiedDistrict> {
        let protocol: Protocol = protocol.parse()?;
        let address = match CredentialResponse::decode(raw_response, protocol)? {
            CredentialResponse::Mdoc(response) => {
                self.extract_mdoc(&response, trust_anchors, now)?
            }
            CredentialResponse::OpenId4Vp(token) => self.extract_openid4vp(token, expected_nonce)?,
        };

        let assignment = match timeout(
            self.config.lookup_timeout(),
            self.lookup
                .lookup(&address.postal_code, &address.state, address.city.as_deref()),
        )
        .await
        {
            Ok(Ok(assignment)) => assignment,
            Ok(Err(err)) => {
                warn!(reason = err.reason(), "district lookup failed");
                return Err(VerificationError::DistrictLookupFailed(
                    "district lookup failed".to_string(),
                ));
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.lookup_timeout_ms,
                    "district lookup timed out"
                );
                return Err(VerificationError::DistrictLookupFailed(
                    "district lookup timed out".to_string(),
                ));
            }
        };
        drop(address);

        Ok(VerifiedDistrict {
            district: assignment.district_code,
            state: assignment.state,
            verification_method: VERIFICATION_METHOD.to_string(),
            credential_hash: credential_hash(raw_response),
        })
    }

    fn extract_mdoc(
        &self,
        response: &CborValue,
        trust_anchors: &TrustAnchorSet,
        now: DateTime<Utc>,
    ) -> IdentityResult<AddressFields> {
        if let Some(status) = cbor::map_get(response, "status") {
            if cbor::as_i128(status) != Some(0) {
                return Err(VerificationError::InvalidFormat(
                    "device response status is not OK".to_string(),
                ));
            }
        }

        let document = cbor::map_get(response, "documents")
            .and_then(CborValue::as_array)
            .and_then(|documents| documents.first())
            .ok_or_else(|| {
                VerificationError::InvalidFormat("response contains no documents".to_string())
            })?;

        match cbor::map_get_any(document, &["docType", "doc_type"]) {
            Some(CborValue::Text(doc_type)) if *doc_type == self.config.mdl_doc_type => {}
            None => {}
            Some(_) => {
                return Err(VerificationError::InvalidFormat(
                    "document is not a mobile driving licence".to_string(),
                ))
            }
        }

        let issuer_signed = cbor::map_get_any(document, &["issuerSigned", "issuer_signed"])
            .ok_or_else(|| {
                VerificationError::InvalidFormat("document has no issuerSigned".to_string())
            })?;
        let elements = cbor::map_get_any(issuer_signed, &["nameSpaces", "name_spaces"])
            .and_then(|namespaces| cbor::map_get(namespaces, &self.config.mdl_namespace))
            .and_then(CborValue::as_array)
            .filter(|elements| !elements.is_empty())
            .ok_or_else(|| {
                VerificationError::InvalidFormat("no elements in mDL namespace".to_string())
            })?;

        match cbor::map_get_any(issuer_signed, &["issuerAuth", "issuer_auth"]) {
            Some(issuer_auth) => self.authenticate_elements(issuer_auth, elements, trust_anchors, now)?,
            None if self.config.require_issuer_auth => {
                return Err(VerificationError::MissingCertificate(
                    "document carries no issuerAuth".to_string(),
                ))
            }
            None => warn!("mdoc response has no issuerAuth; elements are unauthenticated"),
        }

        let items = elements
            .iter()
            .map(parse_element)
            .collect::<IdentityResult<Vec<_>>>()?;
        AddressFields::collect(|name| {
            items
                .iter()
                .find(|(identifier, _)| identifier == name)
                .and_then(|(_, value)| cbor::scalar_to_string(value))
        })
    }

    fn authenticate_elements(
        &self,
        issuer_auth: &CborValue,
        elements: &[CborValue],
        trust_anchors: &TrustAnchorSet,
        now: DateTime<Utc>,
    ) -> IdentityResult<()> {
        let sign1 = CoseSign1::from_value(issuer_auth)?;
        let mso = verify_sign1_at(&sign1, trust_anchors, now)?;

        if let Some(doc_type) = &mso.doc_type {
            if *doc_type != self.config.mdl_doc_type {
                return Err(VerificationError::InvalidFormat(
                    "MSO docType does not match document".to_string(),
                ));
            }
        }
        if self.config.enforce_validity_window {
            mso.check_validity(now)?;
        }

        let encoded = elements
            .iter()
            .map(cbor::encode)
            .collect::<IdentityResult<Vec<_>>>()?;
        let disclosed = HashMap::from([(self.config.mdl_namespace.clone(), encoded)]);
        if !mso.validate_digests(&disclosed) {
            return Err(VerificationError::DigestMismatch(
                "disclosed element does not match issuer digest".to_string(),
            ));
        }
        debug!(elements = elements.len(), "mdoc elements authenticated");
        Ok(())
    }

    fn extract_openid4vp(
        &self,
        token: VpToken,
        expected_nonce: &str,
    ) -> IdentityResult<AddressFields> {
        let (payload, disclosures, key_binding) = match token {
            VpToken::Claims(claims) => (claims, Vec::new(), None),
            VpToken::Jwt(sd_jwt) => (
                sd_jwt.jwt.payload_claims()?,
                sd_jwt.disclosures,
                sd_jwt.key_binding,
            ),
        };

        // Only the issuer-level payload binds the nonce; the key-binding JWT
        // is consulted when the payload carries none.
        let nonce = match payload.get(NONCE_CLAIM) {
            Some(nonce) => nonce.as_str().map(str::to_string),
            None => match &key_binding {
                Some(kb) => kb
                    .payload_claims()?
                    .get(NONCE_CLAIM)
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
                None => None,
            },
        };
        if nonce.as_deref() != Some(expected_nonce) {
            return Err(VerificationError::InvalidFormat("nonce mismatch".to_string()));
        }

        let claims = self.merge_claims(payload, &disclosures)?;
        AddressFields::collect(|name| claims.get(name).and_then(json_scalar_to_string))
    }

    /// Payload claims, then the mDL namespace object, then disclosures.
    /// Neither later source may supply or override `nonce`.
    fn merge_claims(
        &self,
        payload: Map<String, JsonValue>,
        disclosures: &[Disclosure],
    ) -> IdentityResult<Map<String, JsonValue>> {
        if !disclosures.is_empty() {
            if let Some(listed) = payload.get(SD_CLAIM).and_then(JsonValue::as_array) {
                for disclosure in disclosures {
                    let digest = disclosure.digest();
                    if !listed.iter().any(|entry| entry.as_str() == Some(digest.as_str())) {
                        return Err(VerificationError::DigestMismatch(
                            "disclosure is not listed in _sd".to_string(),
                        ));
                    }
                }
            }
        }

        let namespaced = match payload.get(&self.config.mdl_namespace) {
            Some(JsonValue::Object(namespaced)) => Some(namespaced.clone()),
            _ => None,
        };
        let mut merged = payload;
        if let Some(namespaced) = namespaced {
            merged.extend(namespaced.into_iter().filter(|(name, _)| name != NONCE_CLAIM));
        }
        for disclosure in disclosures {
            if let Some((name, value)) = disclosure.claim()? {
                if name != NONCE_CLAIM {
                    merged.insert(name, value);
                }
            }
        }
        Ok(merged)
    }
}

fn parse_element(element: &CborValue) -> IdentityResult<(String, CborValue)> {
    let item = cbor::unwrap_encoded(element)?;
    let identifier = cbor::map_get_any(&item, &["elementIdentifier", "element_identifier"])
        .and_then(CborValue::as_text)
        .ok_or_else(|| {
            VerificationError::InvalidFormat("element has no elementIdentifier".to_string())
        })?
        .to_string();
    let value = cbor::map_get_any(&item, &["elementValue", "element_value"])
        .cloned()
        .unwrap_or(CborValue::Null);
    Ok((identifier, value))
}

fn json_scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
