//! Test utilities for cross-crate integration tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use residency_core::VerificationConfig;
use residency_identity::{
    CredentialProcessor, DistrictAssignment, DistrictLookup, LookupError, TrustAnchor,
    TrustAnchorSet,
};

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// District resolver backed by a fixed postal-code table.
#[derive(Clone, Default)]
pub struct StaticDistrictLookup {
    districts: Arc<HashMap<String, DistrictAssignment>>,
    calls: Arc<AtomicUsize>,
}

impl StaticDistrictLookup {
    pub fn new(entries: &[(&str, &str, &str)]) -> Self {
        let districts = entries
            .iter()
            .map(|(postal_code, state, district_code)| {
                (
                    postal_code.to_string(),
                    DistrictAssignment {
                        district_code: district_code.to_string(),
                        state: state.to_string(),
                    },
                )
            })
            .collect();
        Self {
            districts: Arc::new(districts),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A handful of real-looking assignments, including an at-large seat and
    /// a delegate district.
    pub fn sample() -> Self {
        Self::new(&[
            ("94110", "CA", "CA-11"),
            ("95814", "CA", "CA-07"),
            ("82001", "WY", "WY-AL"),
            ("20001", "DC", "DC-98"),
        ])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DistrictLookup for StaticDistrictLookup {
    async fn lookup(
        &self,
        postal_code: &str,
        state: &str,
        _city: Option<&str>,
    ) -> Result<DistrictAssignment, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.districts.get(postal_code) {
            Some(assignment) if assignment.state == state => Ok(assignment.clone()),
            _ => Err(LookupError::NotFound),
        }
    }
}

/// Resolver that never answers within any sane timeout.
pub struct SlowLookup {
    pub delay: Duration,
}

impl DistrictLookup for SlowLookup {
    async fn lookup(
        &self,
        _postal_code: &str,
        state: &str,
        _city: Option<&str>,
    ) -> Result<DistrictAssignment, LookupError> {
        tokio::time::sleep(self.delay).await;
        Ok(DistrictAssignment {
            district_code: format!("{state}-01"),
            state: state.to_string(),
        })
    }
}

/// Trust store holding exactly `certificate`, valid for a year.
pub fn trust_store_for(certificate: &[u8]) -> TrustAnchorSet {
    TrustAnchorSet::new(vec![TrustAnchor::from_der(
        "Test State IACA",
        "CA",
        certificate.to_vec(),
        Utc::now() + chrono::Duration::days(365),
    )])
}

/// Processor over the sample district table with default settings.
pub fn sample_processor() -> CredentialProcessor<StaticDistrictLookup> {
    CredentialProcessor::new(StaticDistrictLookup::sample(), VerificationConfig::default())
}
