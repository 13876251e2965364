//! Issuer certificate key extraction and trust anchors.
//!
//! [`extract_p256_public_key`] is a targeted scan for a P-256
//! SubjectPublicKeyInfo, not an ASN.1 parser. It locates key material and
//! makes no trust decision; trust is decided only by byte-equality against a
//! [`TrustAnchorSet`] supplied with each verification call.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};
use chrono::{DateTime, Utc};
use residency_core::TrustAnchorEntry;

use crate::error::{IdentityResult, VerificationError};

/// DER of OID 1.2.840.10045.2.1 (id-ecPublicKey).
const EC_PUBLIC_KEY_OID: [u8; 9] = [0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];

/// DER of OID 1.2.840.10045.3.1.7 (prime256v1).
const P256_CURVE_OID: [u8; 10] = [
    0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07,
];

const DER_BIT_STRING: u8 = 0x03;
const SEC1_UNCOMPRESSED: u8 = 0x04;

/// Length of an uncompressed P-256 point: `0x04 || X || Y`.
pub const UNCOMPRESSED_POINT_LEN: usize = 65;

/// Accepts standard base64 with or without padding.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Locate the uncompressed P-256 public key in a DER certificate.
pub fn extract_p256_public_key(der: &[u8]) -> IdentityResult<[u8; UNCOMPRESSED_POINT_LEN]> {
    let mut marker = Vec::with_capacity(EC_PUBLIC_KEY_OID.len() + P256_CURVE_OID.len());
    marker.extend_from_slice(&EC_PUBLIC_KEY_OID);
    marker.extend_from_slice(&P256_CURVE_OID);

    let oid_at = find_subslice(der, &marker).ok_or_else(|| {
        VerificationError::KeyNotFound("no EC P-256 key algorithm identifier".to_string())
    })?;
    let after_oids = oid_at + marker.len();

    let bit_string_at = der[after_oids..]
        .iter()
        .position(|&b| b == DER_BIT_STRING)
        .map(|offset| after_oids + offset)
        .ok_or_else(|| VerificationError::KeyNotFound("no BIT STRING after key OIDs".to_string()))?;

    let (length, header_len) = read_der_length(&der[bit_string_at + 1..])?;
    let body_start = bit_string_at + 1 + header_len;
    let body = der
        .get(body_start..body_start + length)
        .ok_or_else(|| VerificationError::KeyNotFound("truncated key BIT STRING".to_string()))?;

    // unused-bits byte, then the SEC1 point
    match body {
        [0x00, point @ ..]
            if point.len() == UNCOMPRESSED_POINT_LEN && point[0] == SEC1_UNCOMPRESSED =>
        {
            let mut key = [0u8; UNCOMPRESSED_POINT_LEN];
            key.copy_from_slice(point);
            Ok(key)
        }
        _ => Err(VerificationError::KeyNotFound(
            "key is not an uncompressed P-256 point".to_string(),
        )),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// DER definite length: returns (length, bytes consumed).
fn read_der_length(bytes: &[u8]) -> IdentityResult<(usize, usize)> {
    let truncated = || VerificationError::KeyNotFound("truncated DER length".to_string());
    let first = *bytes.first().ok_or_else(truncated)?;
    match first {
        0x00..=0x7f => Ok((first as usize, 1)),
        0x81 => Ok((*bytes.get(1).ok_or_else(truncated)? as usize, 2)),
        0x82 => {
            let hi = *bytes.get(1).ok_or_else(truncated)? as usize;
            let lo = *bytes.get(2).ok_or_else(truncated)? as usize;
            Ok(((hi << 8) | lo, 3))
        }
        _ => Err(VerificationError::KeyNotFound(
            "unsupported DER length encoding".to_string(),
        )),
    }
}

/// A certificate accepted as an issuer of credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    /// Human-readable issuer name, e.g. "CA DMV IACA"
    pub issuer_label: String,
    /// Issuing state or authority code
    pub state_or_authority: String,
    pub certificate_der: Vec<u8>,
    pub certificate_base64: String,
    pub expires_at: DateTime<Utc>,
}

impl TrustAnchor {
    /// Build an anchor from raw DER bytes.
    pub fn from_der(
        issuer_label: impl Into<String>,
        state_or_authority: impl Into<String>,
        certificate_der: Vec<u8>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            issuer_label: issuer_label.into(),
            state_or_authority: state_or_authority.into(),
            certificate_base64: STANDARD.encode(&certificate_der),
            certificate_der,
            expires_at,
        }
    }

    /// Build an anchor from a configuration entry.
    pub fn from_entry(entry: &TrustAnchorEntry) -> IdentityResult<Self> {
        let compact: String = entry
            .certificate_base64
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let certificate_der = LENIENT_STANDARD.decode(&compact).map_err(|_| {
            VerificationError::InvalidFormat(format!(
                "trust anchor '{}' certificate is not valid base64",
                entry.issuer_label
            ))
        })?;
        if certificate_der.is_empty() {
            return Err(VerificationError::InvalidFormat(format!(
                "trust anchor '{}' certificate is empty",
                entry.issuer_label
            )));
        }

        Ok(Self {
            issuer_label: entry.issuer_label.clone(),
            state_or_authority: entry.state_or_authority.clone(),
            certificate_der,
            certificate_base64: compact,
            expires_at: entry.expires_at,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Read-only set of trust anchors supplied per verification call.
#[derive(Debug, Clone, Default)]
pub struct TrustAnchorSet {
    anchors: Vec<TrustAnchor>,
}

impl TrustAnchorSet {
    pub fn new(anchors: Vec<TrustAnchor>) -> Self {
        Self { anchors }
    }

    /// Load every configured anchor; one bad entry fails the whole set.
    pub fn from_config(entries: &[TrustAnchorEntry]) -> IdentityResult<Self> {
        let anchors = entries
            .iter()
            .map(TrustAnchor::from_entry)
            .collect::<IdentityResult<Vec<_>>>()?;
        Ok(Self { anchors })
    }

    /// Unexpired anchor whose certificate bytes equal `certificate_der`.
    pub fn find(&self, certificate_der: &[u8], now: DateTime<Utc>) -> Option<&TrustAnchor> {
        self.anchors
            .iter()
            .find(|anchor| anchor.certificate_der == certificate_der && !anchor.is_expired(now))
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrustAnchor> {
        self.anchors.iter()
    }
}
