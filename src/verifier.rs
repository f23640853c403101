//! Verification pipeline
//!
//! Sequences the verification stages over one chain:
//! 1. chain shape validation
//! 2. serial-number logging for every certificate except the leaf
//! 3. provisioning info parsing for remotely provisioned chains (non-fatal)
//! 4. PKIX path validation with the caller's anchors, clock, and revoked set
//! 5. KeyDescription parsing from the leaf
//! 6. challenge check (the only suspension point)
//! 7. constraint evaluation
//! 8. result construction
//!
//! All outcomes are returned as the [`VerificationResult`] sum; the public
//! entry points never panic and never return `Err`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use der_parser::oid::Oid;
use serde::{Deserialize, Serialize};
use x509_parser::prelude::*;

use crate::anchors::{reject_software_anchors, TrustAnchorsSource};
use crate::chain::{extension_value, serial_hex, AttestationChain, ProvisioningMethod};
use crate::challenge::ChallengeChecker;
use crate::constraints::{check_constraints, ExtensionConstraintConfig};
use crate::error::{BuildError, ChainError, ExtensionParsingError, VerificationResult};
use crate::key_description::{DeviceIdentity, KeyDescription, SecurityLevel, VerifiedBootState};
use crate::log::{LogHook, NoopLogHook};
use crate::path::{PathValidator, PkixPathValidator};
use crate::provisioning::{ProvisioningInfoMap, PROVISIONING_INFO_EXTENSION_OID};
use crate::revocation::RevokedSerialsSource;

/// Supplies the current time for path validation. Must be safe to call
/// concurrently.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A frozen clock, for replaying recorded chains and for tests.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Everything a successful verification attests to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedAttestation {
    /// The attested public key: the uncompressed point for EC keys, the
    /// full SubjectPublicKeyInfo for RSA keys.
    pub public_key: Vec<u8>,
    pub challenge: Vec<u8>,
    pub security_level: SecurityLevel,
    /// Absent only when the root-of-trust constraint is configured away.
    pub verified_boot_state: Option<VerifiedBootState>,
    /// Present on remotely provisioned chains with a parseable
    /// ProvisioningInfo extension.
    pub provisioning_info: Option<ProvisioningInfoMap>,
    pub device_ids: DeviceIdentity,
}

/// Decides whether certificate chains are genuine hardware-backed
/// attestations.
pub struct Verifier {
    trust_anchors: Arc<dyn TrustAnchorsSource>,
    revoked_serials: Arc<dyn RevokedSerialsSource>,
    clock: Arc<dyn Clock>,
    config: ExtensionConstraintConfig,
    path_validator: Box<dyn PathValidator>,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    /// Builds a verifier with the default PKIX path validator. Fails when
    /// any current anchor is the Android software attestation root.
    pub fn new(
        trust_anchors: Arc<dyn TrustAnchorsSource>,
        revoked_serials: Arc<dyn RevokedSerialsSource>,
        clock: Arc<dyn Clock>,
        config: ExtensionConstraintConfig,
    ) -> Result<Self, BuildError> {
        Self::with_path_validator(
            trust_anchors,
            revoked_serials,
            clock,
            config,
            Box::new(PkixPathValidator),
        )
    }

    /// As [`new`](Self::new) with a caller-supplied path validator.
    pub fn with_path_validator(
        trust_anchors: Arc<dyn TrustAnchorsSource>,
        revoked_serials: Arc<dyn RevokedSerialsSource>,
        clock: Arc<dyn Clock>,
        config: ExtensionConstraintConfig,
        path_validator: Box<dyn PathValidator>,
    ) -> Result<Self, BuildError> {
        reject_software_anchors(&trust_anchors.trust_anchors())?;
        Ok(Self {
            trust_anchors,
            revoked_serials,
            clock,
            config,
            path_validator,
        })
    }

    /// Verifies a chain, blocking the calling thread. The challenge future
    /// is driven on a local current-thread runtime, so this must not be
    /// called from within an async context; use
    /// [`verify_async`](Self::verify_async) there.
    pub fn verify(
        &self,
        chain_der: &[Vec<u8>],
        challenge_checker: Option<&dyn ChallengeChecker>,
        log: Option<&dyn LogHook>,
    ) -> VerificationResult {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("current-thread runtime");
        runtime.block_on(self.verify_async(chain_der, challenge_checker, log))
    }

    /// Verifies a chain, suspending only while awaiting the challenge
    /// checker.
    pub async fn verify_async(
        &self,
        chain_der: &[Vec<u8>],
        challenge_checker: Option<&dyn ChallengeChecker>,
        log: Option<&dyn LogHook>,
    ) -> VerificationResult {
        let log = log.unwrap_or(&NoopLogHook);
        let result = self.run(chain_der, challenge_checker, log).await;
        log.log_result(&result);
        result
    }

    async fn run(
        &self,
        chain_der: &[Vec<u8>],
        challenge_checker: Option<&dyn ChallengeChecker>,
        log: &dyn LogHook,
    ) -> VerificationResult {
        let chain = match AttestationChain::parse(chain_der) {
            Ok(chain) => chain,
            Err(e) => {
                log.log_input_chain(chain_der);
                tracing::warn!(error = %e, "Certificate chain rejected");
                return VerificationResult::ChainParsingFailure(e);
            }
        };

        let serials: Vec<String> = chain.certificates()[1..].iter().map(serial_hex).collect();
        log.log_cert_serial_numbers(&serials);

        let provisioning_info = self.parse_provisioning_info(&chain, log);

        let anchors = self.trust_anchors.trust_anchors();
        let revoked = self.revoked_serials.revoked_serials();
        let now = self.clock.now();
        if let Err(e) =
            self.path_validator
                .validate(chain.der_without_anchor(), &anchors, now, &revoked)
        {
            tracing::warn!(reason = ?e.reason, error = %e, "Path validation failed");
            return VerificationResult::PathValidationFailure(e);
        }

        let Some(extension) = chain.attestation_extension_value() else {
            return VerificationResult::ExtensionParsingFailure(ExtensionParsingError::new(
                "Attestation extension not found on the leaf certificate",
            ));
        };
        let key_description = match KeyDescription::parse_with_log(extension, log) {
            Ok(key_description) => key_description,
            Err(e) => return VerificationResult::ExtensionParsingFailure(e),
        };
        log.log_key_description(&key_description);

        if let Some(checker) = challenge_checker {
            if !checker
                .check_challenge(&key_description.attestation_challenge)
                .await
            {
                return VerificationResult::ChallengeMismatch;
            }
        }

        if let Err(violation) = check_constraints(&key_description, &self.config) {
            return VerificationResult::ExtensionConstraintViolation {
                description: violation.description,
                reason: violation.reason,
            };
        }

        let public_key = match extract_public_key(chain.leaf()) {
            Ok(key) => key,
            Err(message) => {
                return VerificationResult::ChainParsingFailure(ChainError::InvalidCertificate {
                    index: 0,
                    message,
                });
            }
        };

        let verified_boot_state = key_description
            .hardware_enforced
            .root_of_trust
            .as_ref()
            .map(|root| root.verified_boot_state);

        VerificationResult::Success(Box::new(VerifiedAttestation {
            public_key,
            challenge: key_description.attestation_challenge.clone(),
            security_level: key_description.attestation_security_level,
            verified_boot_state,
            provisioning_info,
            device_ids: key_description.device_identity(),
        }))
    }

    /// ProvisioningInfo parse errors are non-fatal: recorded as absent and
    /// logged.
    fn parse_provisioning_info(
        &self,
        chain: &AttestationChain<'_>,
        log: &dyn LogHook,
    ) -> Option<ProvisioningInfoMap> {
        if chain.provisioning_method() != ProvisioningMethod::RemotelyProvisioned {
            return None;
        }
        let oid = Oid::from(PROVISIONING_INFO_EXTENSION_OID)
            .expect("Invalid provisioning info OID constant");
        let Some(value) = extension_value(chain.attestation_cert(), &oid) else {
            log.log_info_message(
                "Remotely provisioned chain without a ProvisioningInfo extension",
            );
            return None;
        };
        match ProvisioningInfoMap::parse(value) {
            Ok(info) => {
                log.log_provisioning_info_map(&info);
                Some(info)
            }
            Err(e) => {
                log.log_info_message(&format!("Failed to parse ProvisioningInfoMap: {e}"));
                None
            }
        }
    }
}

fn extract_public_key(cert: &X509Certificate) -> Result<Vec<u8>, String> {
    let spki = cert.public_key();
    match spki.parsed() {
        Ok(x509_parser::public_key::PublicKey::EC(point)) => Ok(point.data().to_vec()),
        Ok(x509_parser::public_key::PublicKey::RSA(_)) => Ok(spki.raw.to_vec()),
        Ok(_) => Err(format!(
            "Unsupported public key algorithm: {}",
            spki.algorithm.algorithm
        )),
        Err(e) => Err(format!("Failed to parse public key: {e:?}")),
    }
}
