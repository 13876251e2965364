//! Configuration management for the residency verifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, Result};

/// ISO/IEC 18013-5 mDL namespace.
pub const DEFAULT_MDL_NAMESPACE: &str = "org.iso.18013.5.1";

/// ISO/IEC 18013-5 mDL document type.
pub const DEFAULT_MDL_DOC_TYPE: &str = "org.iso.18013.5.1.mDL";

/// Default bound on a single district lookup.
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub verification: VerificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub trust_anchors: Vec<TrustAnchorEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_namespace")]
    pub mdl_namespace: String,
    #[serde(default = "default_doc_type")]
    pub mdl_doc_type: String,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Reject mdoc responses that carry no issuerAuth structure
    #[serde(default = "default_true")]
    pub require_issuer_auth: bool,
    /// Reject credentials outside their MSO validity window
    #[serde(default = "default_true")]
    pub enforce_validity_window: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

/// A trust anchor as it appears in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustAnchorEntry {
    pub issuer_label: String,
    pub state_or_authority: String,
    /// Standard base64 of the DER certificate
    pub certificate_base64: String,
    pub expires_at: DateTime<Utc>,
}

fn default_namespace() -> String {
    DEFAULT_MDL_NAMESPACE.to_string()
}

fn default_doc_type() -> String {
    DEFAULT_MDL_DOC_TYPE.to_string()
}

fn default_lookup_timeout_ms() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            mdl_namespace: default_namespace(),
            mdl_doc_type: default_doc_type(),
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
            require_issuer_auth: true,
            enforce_validity_window: true,
        }
    }
}

impl VerificationConfig {
    /// Bound applied to the district lookup.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the verifier cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.verification.mdl_namespace.is_empty() {
            return Err(CoreError::Config("mdl_namespace must not be empty".into()));
        }
        if self.verification.lookup_timeout_ms == 0 {
            return Err(CoreError::Config(
                "lookup_timeout_ms must be greater than zero".into(),
            ));
        }
        for anchor in &self.trust_anchors {
            if anchor.certificate_base64.trim().is_empty() {
                return Err(CoreError::Config(format!(
                    "trust anchor '{}' has no certificate",
                    anchor.issuer_label
                )));
            }
        }
        Ok(())
    }

    pub fn default_config() -> Self {
        Self {
            verification: VerificationConfig::default(),
            logging: LoggingConfig::default(),
            trust_anchors: Vec::new(),
        }
    }
}
