//! Attestation chain shape validation
//!
//! Orders, counts, and locates the attestation extension within the chain
//! before any cryptographic work:
//! - at least 3 certificates, leaf first, self-issued root last
//! - exactly the leaf carries the attestation extension; a chain that was
//!   extended after the legitimate attestation certificate is rejected
//!   with a reason naming the attack shape
//!
//! Also infers how the attestation key was provisioned from the
//! intermediate's subject, matching RDN attributes structurally by OID
//! rather than splitting a DN display string.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use der_parser::oid::Oid;
use serde::Serialize;
use x509_parser::prelude::*;

use crate::error::ChainError;
use crate::key_description::KEY_ATTESTATION_EXTENSION_OID;

// DN attribute types used by provisioning-method inference.
const OID_DN_COMMON_NAME: &[u64] = &[2, 5, 4, 3];
const OID_DN_SERIAL_NUMBER: &[u64] = &[2, 5, 4, 5];
const OID_DN_ORGANIZATION: &[u64] = &[2, 5, 4, 10];
const OID_DN_TITLE: &[u64] = &[2, 5, 4, 12];

/// How the attestation key was provisioned, inferred from the intermediate
/// subject. Advisory: inference never fails a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningMethod {
    /// Attestation key injected at the factory (TEE or StrongBox CA).
    FactoryProvisioned,
    /// Short-lived attestation key issued by the remote provisioning
    /// service.
    RemotelyProvisioned,
    Unknown,
}

/// A structurally validated attestation chain.
///
/// Borrows the caller's DER bytes for the duration of one verification.
#[derive(Debug)]
pub struct AttestationChain<'a> {
    der: &'a [Vec<u8>],
    certs: Vec<X509Certificate<'a>>,
    provisioning_method: ProvisioningMethod,
}

impl<'a> AttestationChain<'a> {
    /// Validates the chain shape. The input is ordered leaf first; the last
    /// entry is the trust anchor candidate.
    pub fn parse(der: &'a [Vec<u8>]) -> Result<Self, ChainError> {
        if der.len() < 3 {
            return Err(ChainError::TooFewCertificates(der.len()));
        }

        let mut certs = Vec::with_capacity(der.len());
        for (index, bytes) in der.iter().enumerate() {
            let (_, cert) = X509Certificate::from_der(bytes).map_err(|e| {
                ChainError::InvalidCertificate {
                    index,
                    message: format!("{e:?}"),
                }
            })?;
            certs.push(cert);
        }

        let oid = attestation_extension_oid();
        match certs.iter().rposition(|cert| has_extension(cert, &oid)) {
            None => return Err(ChainError::MissingAttestationExtension),
            Some(0) => {}
            Some(_) if has_extension(&certs[0], &oid) => {
                return Err(ChainError::ExtendedWithFakeExtension);
            }
            Some(_) => return Err(ChainError::ExtendedForKey),
        }

        let root = &certs[certs.len() - 1];
        if root.subject() != root.issuer() {
            return Err(ChainError::RootNotSelfIssued);
        }

        let provisioning_method = infer_provisioning_method(&certs[certs.len() - 2]);
        Ok(Self {
            der,
            certs,
            provisioning_method,
        })
    }

    /// The attested-key certificate carrying the attestation extension.
    pub fn leaf(&self) -> &X509Certificate<'a> {
        &self.certs[0]
    }

    /// The certificate that signed the leaf.
    pub fn attestation_cert(&self) -> &X509Certificate<'a> {
        &self.certs[1]
    }

    /// The certificate directly under the root.
    pub fn intermediate(&self) -> &X509Certificate<'a> {
        &self.certs[self.certs.len() - 2]
    }

    /// The self-issued trust anchor candidate.
    pub fn root(&self) -> &X509Certificate<'a> {
        &self.certs[self.certs.len() - 1]
    }

    /// Every certificate except the trust anchor, leaf first.
    pub fn certificates_without_anchor(&self) -> &[X509Certificate<'a>] {
        &self.certs[..self.certs.len() - 1]
    }

    /// DER of every certificate except the trust anchor, leaf first.
    pub fn der_without_anchor(&self) -> &'a [Vec<u8>] {
        &self.der[..self.der.len() - 1]
    }

    pub fn certificates(&self) -> &[X509Certificate<'a>] {
        &self.certs
    }

    pub fn provisioning_method(&self) -> ProvisioningMethod {
        self.provisioning_method
    }

    /// The leaf's attestation extension value. Present by construction.
    pub fn attestation_extension_value(&self) -> Option<&'a [u8]> {
        extension_value(self.leaf(), &attestation_extension_oid())
    }
}

pub(crate) fn attestation_extension_oid() -> Oid<'static> {
    Oid::from(KEY_ATTESTATION_EXTENSION_OID).expect("Invalid key attestation OID constant")
}

fn has_extension(cert: &X509Certificate, oid: &Oid) -> bool {
    cert.extensions().iter().any(|ext| ext.oid == *oid)
}

pub(crate) fn extension_value<'a>(cert: &X509Certificate<'a>, oid: &Oid) -> Option<&'a [u8]> {
    cert.extensions()
        .iter()
        .find(|ext| ext.oid == *oid)
        .map(|ext| ext.value)
}

/// Serial number as lowercase hex without leading zeros, the form used by
/// the revocation status list.
pub(crate) fn serial_hex(cert: &X509Certificate) -> String {
    let full = hex::encode(cert.raw_serial());
    let trimmed = full.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn dn_attribute<'x>(name: &'x X509Name, arcs: &[u64]) -> Option<&'x str> {
    let oid = Oid::from(arcs).expect("Invalid DN attribute OID constant");
    name.iter_attributes()
        .find(|attr| *attr.attr_type() == oid)
        .and_then(|attr| attr.as_str().ok())
}

fn infer_provisioning_method(intermediate: &X509Certificate) -> ProvisioningMethod {
    let subject = intermediate.subject();
    if dn_attribute(subject, OID_DN_SERIAL_NUMBER).is_some()
        && matches!(dn_attribute(subject, OID_DN_TITLE), Some("TEE" | "StrongBox"))
    {
        return ProvisioningMethod::FactoryProvisioned;
    }
    if dn_attribute(subject, OID_DN_COMMON_NAME) == Some("Droid CA2")
        && dn_attribute(subject, OID_DN_ORGANIZATION) == Some("Google LLC")
    {
        return ProvisioningMethod::RemotelyProvisioned;
    }
    ProvisioningMethod::Unknown
}

/// Decodes a chain supplied as base64 DER certificates (the transport shape
/// Android clients produce).
pub fn decode_base64_chain(certs_base64: &[String]) -> Result<Vec<Vec<u8>>, ChainError> {
    let mut out = Vec::with_capacity(certs_base64.len());
    for (index, encoded) in certs_base64.iter().enumerate() {
        let der = STANDARD
            .decode(encoded)
            .map_err(|_| ChainError::InvalidBase64 { index })?;
        out.push(der);
    }
    Ok(out)
}
