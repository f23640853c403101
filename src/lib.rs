//! Android Key Attestation verification
//!
//! Decides whether a certificate chain produced by Android's Keystore is a
//! genuine hardware-backed attestation of a cryptographic key:
//! - chain shape validation defeating chain-extension attacks
//! - KeyDescription extension (OID 1.3.6.1.4.1.11129.2.1.17) parsing with
//!   tag-order observation
//! - ProvisioningInfo extension (OID 1.3.6.1.4.1.11129.2.1.30) parsing for
//!   remotely provisioned chains
//! - PKIX path validation with caller-supplied anchors, clock, and revoked
//!   serial set
//! - configurable constraints over key origin, security level, root of
//!   trust, and tag ordering
//! - pluggable asynchronous challenge checking
//!
//! On success the verifier returns the attested key, challenge, security
//! posture, boot state, device identity, and provisioning information; on
//! failure, one of five precisely-reasoned error variants.
//!
//! Reference: https://developer.android.com/privacy-and-security/security-key-attestation

pub mod anchors;
mod asn1;
pub mod chain;
pub mod challenge;
pub mod constraints;
pub mod der;
pub mod error;
pub mod key_description;
pub mod log;
pub mod path;
pub mod provisioning;
pub mod revocation;
pub mod verifier;

pub use anchors::{StaticTrustAnchors, TrustAnchorsSource, SOFTWARE_ATTESTATION_ROOT_SPKI};
pub use chain::{decode_base64_chain, AttestationChain, ProvisioningMethod};
pub use challenge::{
    ChainedChallengeChecker, ChallengeChecker, ChallengeMatcher, UnusedChallengeCache,
};
pub use constraints::{ExtensionConstraintConfig, SecurityLevelCheck, ValidationLevel};
pub use error::{
    BuildError, ChainError, ChainShapeReason, ConstraintViolationReason, ExtensionParsingError,
    ExtensionParsingReason, PathValidationError, PathValidationReason, VerificationResult,
};
pub use key_description::{
    AttestationApplicationId, AttestationPackageInfo, AuthorizationList, DeviceIdentity,
    KeyDescription, KeyOrigin, PatchLevel, RootOfTrust, SecurityLevel, VerifiedBootState,
    KEY_ATTESTATION_EXTENSION_OID,
};
pub use log::{LogHook, NoopLogHook, TracingLogHook};
pub use path::{PathValidator, PkixPathValidator};
pub use provisioning::{ProvisioningInfoMap, PROVISIONING_INFO_EXTENSION_OID};
pub use revocation::{
    RevocationEntry, RevocationStatus, RevocationStatusList, RevokedSerialsSource,
    StaticRevokedSerials,
};
pub use verifier::{Clock, FixedClock, SystemClock, VerifiedAttestation, Verifier};
