//! Input and output types for the two-tree district proof.
//!
//! [`SessionCredential`] is what the tree service stores after registration,
//! [`ProofContext`] is supplied per proof request, and
//! [`TwoTreeProofInputs`] matches the circuit's input layout field for field.
//! Renaming or dropping a field of the latter requires a matching circuit
//! change.

use serde::{Deserialize, Serialize};

use super::error::ZkError;

/// Lowest authority tier.
pub const MIN_AUTHORITY_LEVEL: u8 = 1;

/// Highest authority tier.
pub const MAX_AUTHORITY_LEVEL: u8 = 5;

/// Registration layout of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialType {
    /// Identity leaf plus cell-to-district map
    TwoTree,
    /// Legacy single identity tree
    SingleTree,
    /// Any value this build does not recognise
    #[serde(other)]
    Unknown,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::TwoTree => "two-tree",
            CredentialType::SingleTree => "single-tree",
            CredentialType::Unknown => "unknown",
        }
    }
}

/// Policy-assigned trust tier, restricted to `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AuthorityLevel(u8);

impl AuthorityLevel {
    pub fn new(level: u8) -> Result<Self, ZkError> {
        Self::try_from(level)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for AuthorityLevel {
    type Error = ZkError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if (MIN_AUTHORITY_LEVEL..=MAX_AUTHORITY_LEVEL).contains(&level) {
            Ok(Self(level))
        } else {
            Err(ZkError::InvalidAuthorityLevel(level))
        }
    }
}

impl From<AuthorityLevel> for u8 {
    fn from(level: AuthorityLevel) -> Self {
        level.0
    }
}

/// Level assigned to verified credentials that were never classified.
pub const DEFAULT_AUTHORITY_LEVEL: AuthorityLevel = AuthorityLevel(3);

/// Credential produced by the tree service at registration time.
///
/// Absent fields deserialize as empty so the mapper can report every gap at
/// once instead of failing on the first.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionCredential {
    pub identity_commitment: String,
    pub leaf_index: u64,
    pub merkle_path: Vec<String>,
    pub merkle_root: String,
    /// `None` for credentials written before the field existed
    pub credential_type: Option<CredentialType>,
    pub cell_id: String,
    pub cell_map_root: String,
    pub cell_map_path: Vec<String>,
    pub cell_map_path_bits: Vec<u8>,
    pub districts: Vec<String>,
    pub user_secret: String,
    pub registration_salt: String,
    /// Computed server-side with the full document in view
    pub authority_level: Option<AuthorityLevel>,
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("identity_commitment", &self.identity_commitment)
            .field("leaf_index", &self.leaf_index)
            .field("merkle_root", &self.merkle_root)
            .field("credential_type", &self.credential_type)
            .field("cell_map_root", &self.cell_map_root)
            .field("districts", &self.districts.len())
            .field("user_secret", &"<redacted>")
            .field("registration_salt", &"<redacted>")
            .field("authority_level", &self.authority_level)
            .finish_non_exhaustive()
    }
}

/// Per-request values supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProofContext {
    pub action_domain: String,
    /// Opaque; passed through to the circuit untouched
    pub nullifier: String,
    #[serde(default)]
    pub authority_level: Option<AuthorityLevel>,
}

/// Inputs of the two-tree membership circuit.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoTreeProofInputs {
    // Public inputs
    pub user_root: String,
    pub cell_map_root: String,
    pub districts: Vec<String>,
    pub nullifier: String,
    pub action_domain: String,
    pub authority_level: AuthorityLevel,

    // Private inputs
    pub user_secret: String,
    pub cell_id: String,
    pub registration_salt: String,
    pub identity_commitment: String,
    pub user_path: Vec<String>,
    pub user_index: u64,
    pub cell_map_path: Vec<String>,
    pub cell_map_path_bits: Vec<u8>,
}

impl std::fmt::Debug for TwoTreeProofInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoTreeProofInputs")
            .field("user_root", &self.user_root)
            .field("cell_map_root", &self.cell_map_root)
            .field("districts", &self.districts.len())
            .field("action_domain", &self.action_domain)
            .field("authority_level", &self.authority_level)
            .field("user_index", &self.user_index)
            .finish_non_exhaustive()
    }
}
