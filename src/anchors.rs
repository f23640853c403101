//! Trust anchor sources
//!
//! Anchors are late-bound: the verifier asks its [`TrustAnchorsSource`]
//! once per verification, so an implementation may refresh its bundle at
//! whatever cadence it chooses. Loading anchors from a JSON bundle or a
//! remote endpoint is the caller's concern; [`StaticTrustAnchors`] covers
//! the in-memory case.
//!
//! Anchoring a verifier at the Android software attestation root would
//! accept emulator-grade attestations, so construction rejects it.

use x509_parser::prelude::*;

use crate::error::BuildError;

/// Supplies the DER trust anchors for one verification. Called once per
/// `verify`; must be safe to call concurrently.
pub trait TrustAnchorsSource: Send + Sync {
    fn trust_anchors(&self) -> Vec<Vec<u8>>;
}

/// A fixed in-memory anchor set.
pub struct StaticTrustAnchors {
    anchors: Vec<Vec<u8>>,
}

impl StaticTrustAnchors {
    pub fn new(anchors: Vec<Vec<u8>>) -> Self {
        Self { anchors }
    }
}

impl TrustAnchorsSource for StaticTrustAnchors {
    fn trust_anchors(&self) -> Vec<Vec<u8>> {
        self.anchors.clone()
    }
}

/// SubjectPublicKeyInfo of the AOSP software attestation root, the
/// well-known RSA key that signs software-only (emulator) attestation
/// chains.
pub const SOFTWARE_ATTESTATION_ROOT_SPKI: &[u8] = &[
    0x30, 0x82, 0x01, 0x22, 0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86,
    0xf7, 0x0d, 0x01, 0x01, 0x01, 0x05, 0x00, 0x03, 0x82, 0x01, 0x0f, 0x00,
    0x30, 0x82, 0x01, 0x0a, 0x02, 0x82, 0x01, 0x01, 0x00, 0xfc, 0x79, 0x3b,
    0x62, 0xcd, 0x33, 0xac, 0x0e, 0xc0, 0xcc, 0xc5, 0xa1, 0x72, 0x0d, 0xdf,
    0x2d, 0x7f, 0x6e, 0x93, 0xc0, 0x35, 0x03, 0xb5, 0xbc, 0x62, 0x54, 0x47,
    0x97, 0x62, 0x39, 0xeb, 0x86, 0x7e, 0x85, 0x3d, 0x2a, 0xda, 0x18, 0xe0,
    0x2c, 0x20, 0x55, 0x40, 0xee, 0x66, 0x1c, 0x16, 0xff, 0xd7, 0xc2, 0xaa,
    0x8e, 0x18, 0x40, 0x97, 0x18, 0x73, 0x31, 0x0f, 0x69, 0xda, 0x5c, 0x40,
    0xde, 0x78, 0x16, 0x86, 0x95, 0xc2, 0x69, 0x15, 0x58, 0xc0, 0x6b, 0xc6,
    0xbc, 0xd1, 0xe1, 0x1f, 0x73, 0xcb, 0xfb, 0x49, 0x12, 0xac, 0x84, 0x1e,
    0x3b, 0xbb, 0x11, 0x68, 0xe5, 0x06, 0x58, 0x7f, 0xa7, 0xbb, 0xd3, 0x10,
    0x23, 0xba, 0x1c, 0xa7, 0xa3, 0x15, 0x14, 0xcb, 0x40, 0x5e, 0xb4, 0x42,
    0xae, 0x4c, 0xbd, 0x70, 0x14, 0x3b, 0x9b, 0x86, 0x77, 0x2a, 0xb9, 0xf0,
    0xda, 0x0b, 0x98, 0x34, 0x53, 0xc1, 0x98, 0x33, 0x27, 0x20, 0x67, 0x27,
    0x89, 0xf1, 0xdf, 0x88, 0x08, 0xa6, 0x5f, 0x15, 0x49, 0x6e, 0x9b, 0x37,
    0x7c, 0x4f, 0xca, 0xe2, 0x95, 0xc6, 0x5c, 0x32, 0xb0, 0xee, 0x3a, 0xc2,
    0xac, 0x4e, 0x50, 0x2e, 0x57, 0xe8, 0xe5, 0xc8, 0x2e, 0x69, 0x16, 0x17,
    0xd5, 0xf5, 0x50, 0xbd, 0xd8, 0x16, 0xe7, 0x33, 0xf6, 0x44, 0x79, 0x91,
    0x1e, 0xdb, 0x60, 0xb8, 0xb5, 0xee, 0xdc, 0x99, 0x27, 0x29, 0x18, 0x85,
    0xfa, 0x21, 0x78, 0x5b, 0x6f, 0x3e, 0x3d, 0x39, 0x92, 0x57, 0xb3, 0x62,
    0xf7, 0xcc, 0xd1, 0x94, 0xa0, 0x88, 0x69, 0x8c, 0xd4, 0x9f, 0x8b, 0x2f,
    0x1e, 0x8a, 0x16, 0xea, 0x01, 0x49, 0xea, 0x18, 0x9c, 0x8b, 0xab, 0x06,
    0x4f, 0xe0, 0x6d, 0x1a, 0xa9, 0x28, 0xd8, 0xc8, 0x15, 0x46, 0x5e, 0x83,
    0x0b, 0x82, 0x2b, 0x5e, 0x63, 0xc3, 0x5d, 0x7b, 0xb0, 0x1d, 0x60, 0x76,
    0xca, 0x02, 0x03, 0x01, 0x00, 0x01,
];

/// Whether a certificate's subject public key is the software attestation
/// root key.
pub fn is_software_root_key(spki_der: &[u8]) -> bool {
    spki_der == SOFTWARE_ATTESTATION_ROOT_SPKI
}

/// Fails fast when the anchor set contains the software root (or an anchor
/// that is not a certificate at all).
pub(crate) fn reject_software_anchors(anchors_der: &[Vec<u8>]) -> Result<(), BuildError> {
    for (index, der) in anchors_der.iter().enumerate() {
        let (_, cert) =
            X509Certificate::from_der(der).map_err(|e| BuildError::InvalidTrustAnchor {
                index,
                message: format!("{e:?}"),
            })?;
        if is_software_root_key(cert.public_key().raw) {
            return Err(BuildError::SoftwareTrustAnchor { index });
        }
    }
    Ok(())
}
