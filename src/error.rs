//! Verification outcome and failure taxonomy
//!
//! Every verification attempt resolves to exactly one [`VerificationResult`]
//! variant; the public entry points never panic and never return `Err`.
//! Failure variants preserve the reason produced by the stage that rejected
//! the chain, so callers can distinguish a mis-shaped chain from a PKIX
//! rejection or a constraint violation without string matching.

use serde::Serialize;
use thiserror::Error;

use crate::verifier::VerifiedAttestation;

/// Outcome of a single verification run.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    /// The chain is a genuine hardware-backed attestation.
    Success(Box<VerifiedAttestation>),
    /// The challenge checker rejected the attestation challenge.
    ChallengeMismatch,
    /// The chain was structurally rejected before any cryptographic check.
    ChainParsingFailure(ChainError),
    /// PKIX path validation rejected the chain.
    PathValidationFailure(PathValidationError),
    /// The KeyDescription extension could not be parsed.
    ExtensionParsingFailure(ExtensionParsingError),
    /// The KeyDescription parsed but failed a configured constraint.
    ExtensionConstraintViolation {
        description: String,
        reason: ConstraintViolationReason,
    },
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success(_))
    }
}

/// Structural rejection of the certificate chain (wrong size, extension
/// mis-placement, missing self-issued root).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("At least 3 certificates are required, got {0}")]
    TooFewCertificates(usize),

    #[error("Certificate {index}: invalid base64 encoding")]
    InvalidBase64 { index: usize },

    #[error("Certificate {index}: {message}")]
    InvalidCertificate { index: usize, message: String },

    #[error("Attestation extension not found")]
    MissingAttestationExtension,

    /// The leaf carries the attestation extension, but a later certificate
    /// carries one too. A chain extended this way smuggles a second
    /// extension past a verifier that only looks at the last occurrence.
    #[error("Multiple certificates carry the attestation extension")]
    ExtendedWithFakeExtension,

    /// Only a non-leaf certificate carries the attestation extension: the
    /// legitimate attestation certificate was used as a CA to issue an
    /// attacker-controlled leaf.
    #[error("Certificate after target certificate")]
    ExtendedForKey,

    #[error("Root certificate not found")]
    RootNotSelfIssued,
}

impl ChainError {
    pub fn reason(&self) -> ChainShapeReason {
        match self {
            ChainError::TooFewCertificates(_) => ChainShapeReason::TooFewCertificates,
            ChainError::InvalidBase64 { .. } | ChainError::InvalidCertificate { .. } => {
                ChainShapeReason::InvalidCertificate
            }
            ChainError::MissingAttestationExtension => {
                ChainShapeReason::TargetMissingAttestationExtension
            }
            ChainError::ExtendedWithFakeExtension => {
                ChainShapeReason::ChainExtendedWithFakeAttestationExtension
            }
            ChainError::ExtendedForKey => ChainShapeReason::ChainExtendedForKey,
            ChainError::RootNotSelfIssued => ChainShapeReason::RootNotSelfIssued,
        }
    }
}

/// Stable reason codes for chain-shape rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainShapeReason {
    TooFewCertificates,
    InvalidCertificate,
    TargetMissingAttestationExtension,
    ChainExtendedWithFakeAttestationExtension,
    ChainExtendedForKey,
    RootNotSelfIssued,
}

/// PKIX rejection, with the underlying reason preserved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PathValidationError {
    pub reason: PathValidationReason,
    pub message: String,
}

impl PathValidationError {
    pub fn new(reason: PathValidationReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Reason codes surfaced by path validation, including `Revoked` from the
/// revocation checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathValidationReason {
    NoTrustAnchor,
    NameChaining,
    InvalidSignature,
    NotYetValid,
    Expired,
    Revoked,
    Unspecified,
}

/// The KeyDescription (or ProvisioningInfo) extension could not be parsed.
///
/// The message carries the observed shape; `reason` is set when the failure
/// maps to one of the stable codes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExtensionParsingError {
    pub message: String,
    pub reason: Option<ExtensionParsingReason>,
}

impl ExtensionParsingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason: None,
        }
    }

    pub fn with_reason(message: impl Into<String>, reason: ExtensionParsingReason) -> Self {
        Self {
            message: message.into(),
            reason: Some(reason),
        }
    }
}

/// Stable reason codes for extension parse failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionParsingReason {
    UnknownTagNumber,
    UnknownEnumValue,
    MalformedDer,
    MalformedUtf8,
    WrongArity,
}

/// Which configured constraint the parsed KeyDescription violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintViolationReason {
    KeyOriginConstraintViolation,
    SecurityLevelConstraintViolation,
    RootOfTrustConstraintViolation,
    AuthorizationListOrderingConstraintViolation,
}

/// Rejected at verifier construction, before any chain is seen.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The supplied anchor set contains the Android software attestation
    /// root. A verifier anchored there would accept emulator attestations.
    #[error("Trust anchor {index} is the Android software attestation root")]
    SoftwareTrustAnchor { index: usize },

    #[error("Trust anchor {index} could not be parsed: {message}")]
    InvalidTrustAnchor { index: usize, message: String },
}
