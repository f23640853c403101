//! DER certificate and chain fixtures
//!
//! Builds syntactically valid X.509 certificates around KeyDescriptions
//! encoded with the crate's canonical encoder. Signature fields carry
//! placeholder bytes: chains built here parse and name-chain correctly but
//! cannot pass cryptographic signature verification, so success scenarios
//! run with [`AlwaysValidPath`] injected.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use keyattest::der;
use keyattest::{
    AuthorizationList, Clock, ExtensionConstraintConfig, FixedClock, KeyDescription, KeyOrigin,
    PathValidationError, PathValidator, RootOfTrust, SecurityLevel, StaticRevokedSerials,
    StaticTrustAnchors, VerifiedBootState, Verifier, KEY_ATTESTATION_EXTENSION_OID,
    PROVISIONING_INFO_EXTENSION_OID,
};

pub const ECDSA_SHA256_OID: &[u64] = &[1, 2, 840, 10045, 4, 3, 2];
pub const EC_PUBLIC_KEY_OID: &[u64] = &[1, 2, 840, 10045, 2, 1];
pub const P256_OID: &[u64] = &[1, 2, 840, 10045, 3, 1, 7];

pub const DN_COMMON_NAME: &[u64] = &[2, 5, 4, 3];
pub const DN_SERIAL_NUMBER: &[u64] = &[2, 5, 4, 5];
pub const DN_ORGANIZATION: &[u64] = &[2, 5, 4, 10];
pub const DN_TITLE: &[u64] = &[2, 5, 4, 12];

/// Validity window shared by the fixtures; [`fixed_clock`] sits inside it.
pub const NOT_BEFORE: &str = "220101000000Z";
pub const NOT_AFTER: &str = "320101000000Z";

pub fn fixed_clock() -> FixedClock {
    FixedClock(fixed_now())
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// A P-256 SubjectPublicKeyInfo around a synthetic uncompressed point.
pub fn ec_spki(seed: u8) -> Vec<u8> {
    let mut point = vec![0x04u8];
    point.extend(std::iter::repeat(seed).take(64));
    der::sequence(&[
        der::sequence(&[der::oid(EC_PUBLIC_KEY_OID), der::oid(P256_OID)]),
        der::bit_string(&point),
    ])
}

/// The uncompressed point [`ec_spki`] wraps, as the verifier extracts it.
pub fn ec_point(seed: u8) -> Vec<u8> {
    let mut point = vec![0x04u8];
    point.extend(std::iter::repeat(seed).take(64));
    point
}

/// X.501 Name: one single-attribute RDN per (type, value) pair.
pub fn name(rdns: &[(&[u64], &str)]) -> Vec<u8> {
    let parts: Vec<Vec<u8>> = rdns
        .iter()
        .map(|(oid, value)| {
            der::set(&[der::sequence(&[der::oid(oid), der::utf8_string(value)])])
        })
        .collect();
    der::sequence(&parts)
}

/// A v3 certificate with a placeholder signature. Extension values are the
/// inner DER; the builder wraps them in the extnValue OCTET STRING.
pub fn build_cert_with_validity(
    subject: &[(&[u64], &str)],
    issuer: &[(&[u64], &str)],
    serial: &[u8],
    spki: &[u8],
    extensions: &[(&[u64], Vec<u8>)],
    not_before: &str,
    not_after: &str,
) -> Vec<u8> {
    let algorithm = der::sequence(&[der::oid(ECDSA_SHA256_OID)]);
    let validity = der::sequence(&[der::utc_time(not_before), der::utc_time(not_after)]);
    let mut tbs_parts = vec![
        der::context(0, &der::integer(2)),
        der::integer_bytes(serial),
        algorithm.clone(),
        name(issuer),
        validity,
        name(subject),
        spki.to_vec(),
    ];
    if !extensions.is_empty() {
        let encoded: Vec<Vec<u8>> = extensions
            .iter()
            .map(|(oid, inner)| der::sequence(&[der::oid(oid), der::octet_string(inner)]))
            .collect();
        tbs_parts.push(der::context(3, &der::sequence(&encoded)));
    }
    let tbs = der::sequence(&tbs_parts);
    der::sequence(&[tbs, algorithm, der::bit_string(&[0x5a; 70])])
}

pub fn build_cert(
    subject: &[(&[u64], &str)],
    issuer: &[(&[u64], &str)],
    serial: &[u8],
    spki: &[u8],
    extensions: &[(&[u64], Vec<u8>)],
) -> Vec<u8> {
    build_cert_with_validity(subject, issuer, serial, spki, extensions, NOT_BEFORE, NOT_AFTER)
}

pub const ROOT_NAME: &[(&[u64], &str)] = &[(DN_COMMON_NAME, "Fixture Attestation Root")];
pub const UNTRUSTED_ROOT_NAME: &[(&[u64], &str)] = &[(DN_COMMON_NAME, "Untrusted Root")];
pub const CA_NAME: &[(&[u64], &str)] = &[(DN_COMMON_NAME, "Fixture Attestation CA")];
pub const LEAF_NAME: &[(&[u64], &str)] = &[(DN_COMMON_NAME, "Android Keystore Key")];

pub const FACTORY_INTERMEDIATE_NAME: &[(&[u64], &str)] = &[
    (DN_SERIAL_NUMBER, "8a2b7f3d9c41e605"),
    (DN_TITLE, "TEE"),
];
pub const RKP_INTERMEDIATE_NAME: &[(&[u64], &str)] = &[
    (DN_COMMON_NAME, "Droid CA2"),
    (DN_ORGANIZATION, "Google LLC"),
];

/// Seed used for the leaf key in every fixture chain.
pub const LEAF_KEY_SEED: u8 = 0x42;

/// A KeyDescription that satisfies the default constraint config: both
/// levels TEE, key generated in hardware, root of trust present.
pub fn tee_key_description(challenge: &[u8]) -> KeyDescription {
    KeyDescription {
        attestation_version: 300,
        attestation_security_level: SecurityLevel::TrustedEnvironment,
        key_mint_version: 300,
        key_mint_security_level: SecurityLevel::TrustedEnvironment,
        attestation_challenge: challenge.to_vec(),
        unique_id: Vec::new(),
        software_enforced: AuthorizationList {
            creation_date_time: Some(1_719_792_000_000),
            ..Default::default()
        },
        hardware_enforced: AuthorizationList {
            purpose: [2, 3].into_iter().collect(),
            algorithm: Some(3),
            key_size: Some(256),
            digest: [4].into_iter().collect(),
            ec_curve: Some(1),
            no_auth_required: true,
            origin: Some(KeyOrigin::Generated),
            root_of_trust: Some(RootOfTrust {
                verified_boot_key: vec![0xab; 32],
                device_locked: false,
                verified_boot_state: VerifiedBootState::Unverified,
                verified_boot_hash: Some(vec![0xcd; 32]),
            }),
            os_version: Some(140_000),
            attestation_id_brand: Some("google".to_string()),
            attestation_id_device: Some("blueline".to_string()),
            attestation_id_product: Some("blueline".to_string()),
            attestation_id_manufacturer: Some("Google".to_string()),
            attestation_id_model: Some("Pixel 3".to_string()),
            ..Default::default()
        },
    }
}

/// 4-certificate factory-provisioned chain:
/// leaf, attestation CA (serial 0x2a), TEE intermediate, root.
pub fn factory_chain(key_description: &KeyDescription) -> Vec<Vec<u8>> {
    let root = build_cert(ROOT_NAME, ROOT_NAME, &[0x10], &ec_spki(1), &[]);
    let intermediate =
        build_cert(FACTORY_INTERMEDIATE_NAME, ROOT_NAME, &[0x11], &ec_spki(2), &[]);
    let ca = build_cert(CA_NAME, FACTORY_INTERMEDIATE_NAME, &[0x2a], &ec_spki(3), &[]);
    let leaf = build_cert(
        LEAF_NAME,
        CA_NAME,
        &[0x13],
        &ec_spki(LEAF_KEY_SEED),
        &[(KEY_ATTESTATION_EXTENSION_OID, key_description.to_der())],
    );
    vec![leaf, ca, intermediate, root]
}

/// 5-certificate remotely provisioned chain: the attestation certificate
/// carries ProvisioningInfo CBOR `{1: certificates_issued}` and the
/// intermediate is the RKP CA.
pub fn rkp_chain(key_description: &KeyDescription, certificates_issued: u8) -> Vec<Vec<u8>> {
    let provisioning_cbor = vec![0xa1, 0x01, certificates_issued];
    let root = build_cert(ROOT_NAME, ROOT_NAME, &[0x20], &ec_spki(1), &[]);
    let intermediate = build_cert(RKP_INTERMEDIATE_NAME, ROOT_NAME, &[0x21], &ec_spki(2), &[]);
    let ca = build_cert(CA_NAME, RKP_INTERMEDIATE_NAME, &[0x22], &ec_spki(3), &[]);
    let attestation_cert = build_cert(
        &[(DN_COMMON_NAME, "RKP Attestation Cert")],
        CA_NAME,
        &[0x23],
        &ec_spki(4),
        &[(
            PROVISIONING_INFO_EXTENSION_OID,
            der::octet_string(&provisioning_cbor),
        )],
    );
    let leaf = build_cert(
        LEAF_NAME,
        &[(DN_COMMON_NAME, "RKP Attestation Cert")],
        &[0x24],
        &ec_spki(LEAF_KEY_SEED),
        &[(KEY_ATTESTATION_EXTENSION_OID, key_description.to_der())],
    );
    vec![leaf, attestation_cert, ca, intermediate, root]
}

/// The fixture root re-keyed with the software attestation root SPKI.
pub fn software_root_cert() -> Vec<u8> {
    build_cert(
        ROOT_NAME,
        ROOT_NAME,
        &[0x10],
        keyattest::SOFTWARE_ATTESTATION_ROOT_SPKI,
        &[],
    )
}

/// Path validation stub for scenarios exercising the stages after PKIX.
pub struct AlwaysValidPath;

impl PathValidator for AlwaysValidPath {
    fn validate(
        &self,
        _chain_der: &[Vec<u8>],
        _anchors_der: &[Vec<u8>],
        _now: DateTime<Utc>,
        _revoked_serials: &HashSet<String>,
    ) -> Result<(), PathValidationError> {
        Ok(())
    }
}

/// Verifier anchored at the fixture root with real PKIX validation.
pub fn pkix_verifier(anchor: Vec<u8>, revoked: &[&str]) -> Verifier {
    Verifier::new(
        Arc::new(StaticTrustAnchors::new(vec![anchor])),
        Arc::new(StaticRevokedSerials::new(
            revoked.iter().map(|s| (*s).to_string()),
        )),
        Arc::new(fixed_clock()),
        ExtensionConstraintConfig::default(),
    )
    .unwrap()
}

/// Verifier with path validation stubbed out.
pub fn stub_path_verifier(config: ExtensionConstraintConfig) -> Verifier {
    Verifier::with_path_validator(
        Arc::new(StaticTrustAnchors::new(Vec::new())),
        Arc::new(StaticRevokedSerials::empty()),
        Arc::new(fixed_clock()),
        config,
        Box::new(AlwaysValidPath),
    )
    .unwrap()
}

/// `Clock` impl check helper so the fixtures stay honest about the window.
pub fn assert_clock_inside_validity(clock: &dyn Clock) {
    let now = clock.now();
    assert!(now > Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap());
    assert!(now < Utc.with_ymd_and_hms(2032, 1, 1, 0, 0, 0).unwrap());
}
