//! District lookup collaborator.
//!
//! The resolver maps an address to a legislative district. Codes are passed
//! through untouched: `"CA-12"`, `"WY-AL"` for at-large seats and `"DC-98"`
//! style codes for non-voting delegates are all opaque strings here.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// District resolved for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictAssignment {
    pub district_code: String,
    pub state: String,
}

/// Failure reported by a district resolver.
///
/// The message is logged by kind only and never surfaced to callers, since a
/// resolver may echo the address it was given.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no district found for address")]
    NotFound,

    #[error("district service unavailable: {0}")]
    Unavailable(String),
}

impl LookupError {
    /// Log-safe label for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            LookupError::NotFound => "not_found",
            LookupError::Unavailable(_) => "unavailable",
        }
    }
}

/// Address-to-district resolver.
///
/// Implementations own any retry policy; callers bound each call with a
/// timeout and treat expiry like any other failure.
pub trait DistrictLookup: Send + Sync {
    fn lookup(
        &self,
        postal_code: &str,
        state: &str,
        city: Option<&str>,
    ) -> impl Future<Output = Result<DistrictAssignment, LookupError>> + Send;
}
