//! Integration tests for the attestation verifier
//!
//! Run with `cargo test --test integration`.
//!
//! Test organization:
//! - `chain_test.rs` - Chain shape validation and provisioning inference
//! - `verify_test.rs` - End-to-end verification scenarios
//!
//! The fixture chains are assembled by `common::fixtures`, which builds
//! DER certificates around KeyDescriptions encoded with the crate's own
//! canonical encoder. Fixture signatures are placeholders, so scenarios
//! that must get past signature checking inject a stub path validator.

mod common;

mod verify_test;
