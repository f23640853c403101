//! PKIX path validation adapter
//!
//! Composes a path validation run from caller-supplied pieces: trust
//! anchors, a clock, and the revoked serial set. The validator is
//! dependency-injected into the verifier rather than registered in any
//! process-global provider registry.
//!
//! The revocation check visits every certificate in the chain and fails
//! hard on membership in the revoked set; there is no soft-fail and no
//! forward checking. Check order per certificate path: anchor lookup,
//! revocation, name chaining, validity window, signatures.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

use crate::chain::serial_hex;
use crate::error::{PathValidationError, PathValidationReason};

/// Validates a certificate path. `chain_der` is leaf first and excludes the
/// trust anchor; `anchors_der` is the anchor bundle for this run.
pub trait PathValidator: Send + Sync {
    fn validate(
        &self,
        chain_der: &[Vec<u8>],
        anchors_der: &[Vec<u8>],
        now: DateTime<Utc>,
        revoked_serials: &HashSet<String>,
    ) -> Result<(), PathValidationError>;
}

/// The default validator: name chaining, validity window, signature
/// chaining to a supplied anchor, plus the revocation check.
pub struct PkixPathValidator;

impl PathValidator for PkixPathValidator {
    fn validate(
        &self,
        chain_der: &[Vec<u8>],
        anchors_der: &[Vec<u8>],
        now: DateTime<Utc>,
        revoked_serials: &HashSet<String>,
    ) -> Result<(), PathValidationError> {
        let certs = parse_all(chain_der, "chain certificate")?;
        let anchors = parse_all(anchors_der, "trust anchor")?;

        let last = certs.last().ok_or_else(|| {
            PathValidationError::new(PathValidationReason::Unspecified, "Empty certificate path")
        })?;

        let anchor = anchors
            .iter()
            .find(|anchor| anchor.subject() == last.issuer())
            .ok_or_else(|| {
                PathValidationError::new(
                    PathValidationReason::NoTrustAnchor,
                    "No trust anchor matches the certificate path",
                )
            })?;

        for cert in &certs {
            let serial = serial_hex(cert);
            if revoked_serials.contains(&serial) {
                tracing::warn!(serial = %serial, "Certificate is revoked");
                return Err(PathValidationError::new(
                    PathValidationReason::Revoked,
                    format!("Certificate with serial {serial} is revoked"),
                ));
            }
        }

        for (index, pair) in certs.windows(2).enumerate() {
            if pair[0].issuer() != pair[1].subject() {
                return Err(PathValidationError::new(
                    PathValidationReason::NameChaining,
                    format!("Certificate {index} not issued by certificate {}", index + 1),
                ));
            }
        }

        let now_ts = now.timestamp();
        for (index, cert) in certs.iter().enumerate() {
            let validity = cert.validity();
            if now_ts < validity.not_before.timestamp() {
                return Err(PathValidationError::new(
                    PathValidationReason::NotYetValid,
                    format!("Certificate {index} is not yet valid"),
                ));
            }
            if now_ts > validity.not_after.timestamp() {
                return Err(PathValidationError::new(
                    PathValidationReason::Expired,
                    format!("Certificate {index} has expired"),
                ));
            }
        }

        for (index, pair) in certs.windows(2).enumerate() {
            verify_signature(&pair[0], &pair[1], index)?;
        }
        verify_signature(last, anchor, certs.len() - 1)?;

        Ok(())
    }
}

fn parse_all<'a>(
    ders: &'a [Vec<u8>],
    what: &str,
) -> Result<Vec<X509Certificate<'a>>, PathValidationError> {
    let mut certs = Vec::with_capacity(ders.len());
    for (index, der) in ders.iter().enumerate() {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
            PathValidationError::new(
                PathValidationReason::Unspecified,
                format!("Unparseable {what} {index}: {e:?}"),
            )
        })?;
        certs.push(cert);
    }
    Ok(certs)
}

fn verify_signature(
    cert: &X509Certificate,
    issuer: &X509Certificate,
    index: usize,
) -> Result<(), PathValidationError> {
    cert.verify_signature(Some(issuer.public_key())).map_err(|e| {
        tracing::warn!(cert_index = index, error = ?e, "Signature verification failed");
        PathValidationError::new(
            PathValidationReason::InvalidSignature,
            format!("Certificate {index} signature invalid: {e:?}"),
        )
    })
}
