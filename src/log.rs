//! Verification logging hook
//!
//! The verifier reports its progress through a caller-supplied [`LogHook`].
//! All methods have empty defaults, so implementations override only what
//! they care about; the verifier behaves identically when no hook is
//! supplied. Callbacks run in-place on the verifying thread and must be
//! non-blocking.

use crate::error::VerificationResult;
use crate::key_description::KeyDescription;
use crate::provisioning::ProvisioningInfoMap;

pub trait LogHook: Send + Sync {
    /// The raw input chain, reported when the chain shape is rejected.
    fn log_input_chain(&self, _chain: &[Vec<u8>]) {}

    /// The final outcome, reported exactly once per verification.
    fn log_result(&self, _result: &VerificationResult) {}

    /// The parsed KeyDescription of the leaf certificate.
    fn log_key_description(&self, _key_description: &KeyDescription) {}

    /// The parsed ProvisioningInfoMap of a remotely provisioned chain.
    fn log_provisioning_info_map(&self, _info: &ProvisioningInfoMap) {}

    /// Serial numbers (lowercase hex) of every certificate except the leaf.
    fn log_cert_serial_numbers(&self, _serials: &[String]) {}

    /// Recoverable oddities: malformed patch levels, unordered tags,
    /// unparseable optional sub-fields.
    fn log_info_message(&self, _message: &str) {}
}

/// Hook used when the caller supplies none.
pub struct NoopLogHook;

impl LogHook for NoopLogHook {}

/// Bridges the hook onto `tracing` events.
pub struct TracingLogHook;

impl LogHook for TracingLogHook {
    fn log_input_chain(&self, chain: &[Vec<u8>]) {
        tracing::info!(cert_count = chain.len(), "Input certificate chain");
    }

    fn log_result(&self, result: &VerificationResult) {
        if result.is_success() {
            tracing::info!(result = ?result, "Attestation verified");
        } else {
            tracing::warn!(result = ?result, "Attestation rejected");
        }
    }

    fn log_key_description(&self, key_description: &KeyDescription) {
        tracing::info!(
            attestation_version = key_description.attestation_version,
            attestation_security_level = %key_description.attestation_security_level,
            key_mint_version = key_description.key_mint_version,
            key_mint_security_level = %key_description.key_mint_security_level,
            challenge_len = key_description.attestation_challenge.len(),
            "Parsed KeyDescription"
        );
    }

    fn log_provisioning_info_map(&self, info: &ProvisioningInfoMap) {
        tracing::info!(
            certificates_issued = info.certificates_issued,
            "Parsed ProvisioningInfoMap"
        );
    }

    fn log_cert_serial_numbers(&self, serials: &[String]) {
        tracing::info!(serials = ?serials, "Certificate serial numbers");
    }

    fn log_info_message(&self, message: &str) {
        tracing::info!("{message}");
    }
}
