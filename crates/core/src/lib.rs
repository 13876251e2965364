//! Core functionality for the residency credential verifier.
//!
//! This crate provides the types shared by every other crate in the
//! workspace: the tagged failure taxonomy, configuration loading and
//! logging initialisation.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, LoggingConfig, TrustAnchorEntry, VerificationConfig};
pub use error::{CoreError, ErrorKind, Result};
