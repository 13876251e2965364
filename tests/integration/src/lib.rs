//! Integration tests for the residency verifier
//!
//! This test suite validates:
//! - mdoc presentations from issuer signature through district resolution
//! - OpenID4VP / SD-JWT presentations and nonce binding
//! - Commitment derivation from a verified credential hash
//! - Mapping stored two-tree credentials onto circuit inputs

pub mod test_utils;

#[cfg(test)]
mod mdoc_flow_tests;

#[cfg(test)]
mod openid4vp_flow_tests;

#[cfg(test)]
mod proof_input_tests;
