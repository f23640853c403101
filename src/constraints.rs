//! Extension constraint engine
//!
//! Evaluates configurable per-field validation levels against a parsed
//! KeyDescription. Checks run in a fixed order (key origin, security
//! level, root of trust, tag ordering) and the first violation
//! short-circuits.

use crate::error::ConstraintViolationReason;
use crate::key_description::{KeyDescription, KeyOrigin, RootOfTrust, SecurityLevel};

/// How strictly a single constrained field is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationLevel<T> {
    /// Present and equal to the expected value.
    Strict(T),
    /// Present, any value.
    NotNull,
    /// Not validated.
    Ignore,
}

impl<T: PartialEq + std::fmt::Debug> ValidationLevel<T> {
    fn check(&self, observed: Option<&T>, field: &str) -> Result<(), String> {
        match self {
            ValidationLevel::Ignore => Ok(()),
            ValidationLevel::NotNull => match observed {
                Some(_) => Ok(()),
                None => Err(format!("{field} must be present")),
            },
            ValidationLevel::Strict(expected) => match observed {
                Some(value) if value == expected => Ok(()),
                Some(value) => Err(format!("{field} must be {expected:?}, got {value:?}")),
                None => Err(format!("{field} must be present")),
            },
        }
    }
}

/// Validation levels for the two security-level fields. Beyond the generic
/// levels, the pair can be required to agree without pinning a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevelCheck {
    /// Both fields agree and equal the expected level.
    Strict(SecurityLevel),
    /// Both fields agree and are not Software.
    NotSoftware,
    /// Both fields agree.
    Consistent,
    /// Both fields present (always true after a successful parse).
    NotNull,
    /// Not validated.
    Ignore,
}

impl SecurityLevelCheck {
    fn check(&self, key_description: &KeyDescription) -> Result<(), String> {
        let attestation = key_description.attestation_security_level;
        let key_mint = key_description.key_mint_security_level;
        let consistent = || {
            if attestation == key_mint {
                Ok(())
            } else {
                Err(format!(
                    "attestationSecurityLevel {attestation} does not match keyMintSecurityLevel {key_mint}"
                ))
            }
        };
        match self {
            SecurityLevelCheck::Ignore | SecurityLevelCheck::NotNull => Ok(()),
            SecurityLevelCheck::Consistent => consistent(),
            SecurityLevelCheck::NotSoftware => {
                consistent()?;
                if attestation == SecurityLevel::Software {
                    Err("security level must not be Software".to_string())
                } else {
                    Ok(())
                }
            }
            SecurityLevelCheck::Strict(expected) => {
                consistent()?;
                if attestation == *expected {
                    Ok(())
                } else {
                    Err(format!("security level must be {expected}, got {attestation}"))
                }
            }
        }
    }
}

/// Per-field validation levels applied after a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConstraintConfig {
    /// `hardwareEnforced.origin`; keys attested after import are rejected
    /// by default.
    pub key_origin: ValidationLevel<KeyOrigin>,
    pub security_level: SecurityLevelCheck,
    /// `hardwareEnforced.rootOfTrust`.
    pub root_of_trust: ValidationLevel<RootOfTrust>,
    /// Observed tag ordering of both authorization lists.
    pub authorization_list_tag_order: ValidationLevel<bool>,
}

impl Default for ExtensionConstraintConfig {
    fn default() -> Self {
        Self {
            key_origin: ValidationLevel::Strict(KeyOrigin::Generated),
            security_level: SecurityLevelCheck::Strict(SecurityLevel::TrustedEnvironment),
            root_of_trust: ValidationLevel::NotNull,
            authorization_list_tag_order: ValidationLevel::Ignore,
        }
    }
}

/// A failed constraint, with the human-readable description and the stable
/// reason code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub description: String,
    pub reason: ConstraintViolationReason,
}

pub(crate) fn check_constraints(
    key_description: &KeyDescription,
    config: &ExtensionConstraintConfig,
) -> Result<(), ConstraintViolation> {
    config
        .key_origin
        .check(
            key_description.hardware_enforced.origin.as_ref(),
            "hardwareEnforced.origin",
        )
        .map_err(|description| ConstraintViolation {
            description,
            reason: ConstraintViolationReason::KeyOriginConstraintViolation,
        })?;

    config
        .security_level
        .check(key_description)
        .map_err(|description| ConstraintViolation {
            description,
            reason: ConstraintViolationReason::SecurityLevelConstraintViolation,
        })?;

    config
        .root_of_trust
        .check(
            key_description.hardware_enforced.root_of_trust.as_ref(),
            "hardwareEnforced.rootOfTrust",
        )
        .map_err(|description| ConstraintViolation {
            description,
            reason: ConstraintViolationReason::RootOfTrustConstraintViolation,
        })?;

    let tags_ordered = key_description.software_enforced.are_tags_ordered
        && key_description.hardware_enforced.are_tags_ordered;
    config
        .authorization_list_tag_order
        .check(Some(&tags_ordered), "authorizationList tag order")
        .map_err(|description| ConstraintViolation {
            description,
            reason: ConstraintViolationReason::AuthorizationListOrderingConstraintViolation,
        })?;

    Ok(())
}
