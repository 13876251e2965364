//! Compact JWT and SD-JWT segment decoding.
//!
//! Only the base64url layer and the JSON shape of payloads and disclosures
//! are handled here; there is no signature logic in this module.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{IdentityResult, VerificationError};

/// Separator between an SD-JWT and its disclosures.
pub const DISCLOSURE_SEPARATOR: char = '~';

/// The three decoded segments of a compact JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactJwt {
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CompactJwt {
    /// Payload parsed as a JSON object.
    pub fn payload_claims(&self) -> IdentityResult<Map<String, Value>> {
        json_object(&self.payload, "JWT payload")
    }

    /// Header parsed as a JSON object.
    pub fn header_claims(&self) -> IdentityResult<Map<String, Value>> {
        json_object(&self.header, "JWT header")
    }
}

/// One SD-JWT disclosure, kept in both encoded and decoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disclosure {
    /// The base64url segment exactly as received
    pub encoded: String,
    pub bytes: Vec<u8>,
}

impl Disclosure {
    /// `base64url(SHA-256(encoded))`, the value listed in an `_sd` array.
    pub fn digest(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.encoded.as_bytes()))
    }

    /// Claim name and value of an object-property disclosure
    /// (`[salt, name, value]`). Array-element disclosures (`[salt, value]`)
    /// name no claim and yield `None`.
    pub fn claim(&self) -> IdentityResult<Option<(String, Value)>> {
        let parsed: Value = serde_json::from_slice(&self.bytes)
            .map_err(|_| VerificationError::Decode("disclosure is not JSON".to_string()))?;
        let Value::Array(mut items) = parsed else {
            return Err(VerificationError::InvalidFormat(
                "disclosure is not a JSON array".to_string(),
            ));
        };
        match items.len() {
            2 => Ok(None),
            3 => {
                let value = items.pop().unwrap_or(Value::Null);
                let name = match items.pop() {
                    Some(Value::String(name)) => name,
                    _ => {
                        return Err(VerificationError::InvalidFormat(
                            "disclosure claim name is not a string".to_string(),
                        ))
                    }
                };
                Ok(Some((name, value)))
            }
            n => Err(VerificationError::InvalidFormat(format!(
                "disclosure has {n} elements"
            ))),
        }
    }
}

/// An SD-JWT: issuer JWT, disclosures, optional key-binding JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdJwt {
    pub jwt: CompactJwt,
    pub disclosures: Vec<Disclosure>,
    pub key_binding: Option<CompactJwt>,
}

/// Decode one base64url segment; `=` padding is tolerated.
pub fn decode_base64url(segment: &str) -> IdentityResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| VerificationError::Decode("invalid base64url segment".to_string()))
}

/// Decode `header.payload.signature` into its three byte sequences.
pub fn decode_compact(token: &str) -> IdentityResult<CompactJwt> {
    let mut parts = token.trim().split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(VerificationError::Decode(
            "JWT must have exactly three segments".to_string(),
        ));
    };
    if header.is_empty() || payload.is_empty() {
        return Err(VerificationError::Decode(
            "JWT header and payload must not be empty".to_string(),
        ));
    }

    Ok(CompactJwt {
        header: decode_base64url(header)?,
        payload: decode_base64url(payload)?,
        signature: decode_base64url(signature)?,
    })
}

/// Decode `jwt~disclosure~...~[kb-jwt]`.
///
/// A plain JWT without any `~` decodes to an SD-JWT with no disclosures. The
/// last segment is treated as a key-binding JWT when it contains a `.`.
pub fn decode_sd_jwt(input: &str) -> IdentityResult<SdJwt> {
    let mut segments: Vec<&str> = input.trim().split(DISCLOSURE_SEPARATOR).collect();
    let jwt = decode_compact(segments.remove(0))?;

    let key_binding = match segments.last() {
        Some(last) if last.contains('.') => {
            let kb = decode_compact(last)?;
            segments.pop();
            Some(kb)
        }
        _ => None,
    };

    let disclosures = segments
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            Ok(Disclosure {
                encoded: segment.to_string(),
                bytes: decode_base64url(segment)?,
            })
        })
        .collect::<IdentityResult<Vec<_>>>()?;

    Ok(SdJwt {
        jwt,
        disclosures,
        key_binding,
    })
}

fn json_object(bytes: &[u8], what: &str) -> IdentityResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(VerificationError::InvalidFormat(format!(
            "{what} is not a JSON object"
        ))),
        Err(_) => Err(VerificationError::Decode(format!("{what} is not JSON"))),
    }
}
