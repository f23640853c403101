//! End-to-end verification scenarios

use std::num::NonZeroUsize;
use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use keyattest::{
    BuildError, ChainError, ChallengeMatcher, ConstraintViolationReason,
    ExtensionConstraintConfig, PathValidationReason, SecurityLevel, SecurityLevelCheck,
    StaticRevokedSerials, StaticTrustAnchors, UnusedChallengeCache, VerificationResult,
    VerifiedBootState, Verifier,
};

use super::common::*;

#[test]
fn test_valid_factory_chain_verifies_with_default_config() {
    assert_clock_inside_validity(&fixed_clock());

    let key_description = tee_key_description(b"challenge");
    let chain = factory_chain(&key_description);
    let verifier = stub_path_verifier(ExtensionConstraintConfig::default());

    let result = verifier.verify(&chain, None, None);
    let attestation = match result {
        VerificationResult::Success(attestation) => attestation,
        other => panic!("expected success, got {other:?}"),
    };

    assert_eq!(attestation.security_level, SecurityLevel::TrustedEnvironment);
    assert_eq!(attestation.challenge, b"challenge".to_vec());
    assert_eq!(
        attestation.verified_boot_state,
        Some(VerifiedBootState::Unverified)
    );
    assert_eq!(attestation.public_key, ec_point(LEAF_KEY_SEED));
    assert_eq!(attestation.provisioning_info, None);

    let ids = &attestation.device_ids;
    assert_eq!(ids.brand.as_deref(), Some("google"));
    assert_eq!(ids.device.as_deref(), Some("blueline"));
    assert_eq!(ids.product.as_deref(), Some("blueline"));
    assert_eq!(ids.manufacturer.as_deref(), Some("Google"));
    assert_eq!(ids.model.as_deref(), Some("Pixel 3"));
    assert_eq!(ids.serial, None);
    assert!(ids.imeis.is_empty());
}

#[tokio::test]
async fn test_matching_challenge_checker_accepts() {
    let key_description = tee_key_description(b"challenge");
    let chain = factory_chain(&key_description);
    let verifier = stub_path_verifier(ExtensionConstraintConfig::default());
    let checker = ChallengeMatcher::new(b"challenge".to_vec());

    let result = verifier.verify_async(&chain, Some(&checker), None).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn test_remotely_provisioned_chain_carries_provisioning_info() {
    let key_description = tee_key_description(b"challenge");
    let chain = rkp_chain(&key_description, 1);
    let verifier = stub_path_verifier(ExtensionConstraintConfig::default());

    let result = verifier.verify_async(&chain, None, None).await;
    let attestation = match result {
        VerificationResult::Success(attestation) => attestation,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(
        attestation.provisioning_info.map(|info| info.certificates_issued),
        Some(1)
    );
}

#[tokio::test]
async fn test_malformed_provisioning_info_is_non_fatal() {
    let key_description = tee_key_description(b"challenge");
    let mut chain = rkp_chain(&key_description, 1);
    // Re-issue the attestation certificate with garbage in the extension.
    chain[1] = build_cert(
        &[(DN_COMMON_NAME, "RKP Attestation Cert")],
        CA_NAME,
        &[0x23],
        &ec_spki(4),
        &[(
            keyattest::PROVISIONING_INFO_EXTENSION_OID,
            vec![0xff, 0xff],
        )],
    );
    let verifier = stub_path_verifier(ExtensionConstraintConfig::default());

    let result = verifier.verify_async(&chain, None, None).await;
    let attestation = match result {
        VerificationResult::Success(attestation) => attestation,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(attestation.provisioning_info, None);
}

#[test]
fn test_chain_extension_attack_fails_before_everything_else() {
    let key_description = tee_key_description(b"challenge");
    let extension = (
        keyattest::KEY_ATTESTATION_EXTENSION_OID,
        key_description.to_der(),
    );
    let root = build_cert(ROOT_NAME, ROOT_NAME, &[0x10], &ec_spki(1), &[]);
    let intermediate = build_cert(CA_NAME, ROOT_NAME, &[0x11], &ec_spki(2), &[]);
    let target = build_cert(
        &[(DN_COMMON_NAME, "Attested Key")],
        CA_NAME,
        &[0x12],
        &ec_spki(3),
        &[extension.clone()],
    );
    let smuggled = build_cert(
        LEAF_NAME,
        &[(DN_COMMON_NAME, "Attested Key")],
        &[0x13],
        &ec_spki(4),
        &[extension],
    );
    let chain = vec![smuggled, target, intermediate, root];
    let verifier = stub_path_verifier(ExtensionConstraintConfig::default());

    assert_matches!(
        verifier.verify(&chain, None, None),
        VerificationResult::ChainParsingFailure(ChainError::ExtendedWithFakeExtension)
    );
}

#[test]
fn test_untrusted_root_fails_with_no_trust_anchor() {
    let key_description = tee_key_description(b"challenge");
    let chain = factory_chain(&key_description);
    let untrusted_anchor =
        build_cert(UNTRUSTED_ROOT_NAME, UNTRUSTED_ROOT_NAME, &[0x77], &ec_spki(9), &[]);
    let verifier = pkix_verifier(untrusted_anchor, &[]);

    match verifier.verify(&chain, None, None) {
        VerificationResult::PathValidationFailure(e) => {
            assert_eq!(e.reason, PathValidationReason::NoTrustAnchor);
        }
        other => panic!("expected path validation failure, got {other:?}"),
    }
}

#[test]
fn test_revoked_attestation_certificate_fails_with_revoked() {
    let key_description = tee_key_description(b"challenge");
    let chain = factory_chain(&key_description);
    // The attestation certificate in the fixture chain has serial 0x2a.
    let verifier = pkix_verifier(chain[3].clone(), &["2a"]);

    match verifier.verify(&chain, None, None) {
        VerificationResult::PathValidationFailure(e) => {
            assert_eq!(e.reason, PathValidationReason::Revoked);
            assert!(e.message.contains("2a"));
        }
        other => panic!("expected path validation failure, got {other:?}"),
    }
}

#[test]
fn test_placeholder_signatures_fail_signature_verification() {
    let key_description = tee_key_description(b"challenge");
    let chain = factory_chain(&key_description);
    let verifier = pkix_verifier(chain[3].clone(), &[]);

    match verifier.verify(&chain, None, None) {
        VerificationResult::PathValidationFailure(e) => {
            assert_eq!(e.reason, PathValidationReason::InvalidSignature);
        }
        other => panic!("expected path validation failure, got {other:?}"),
    }
}

#[test]
fn test_expired_certificate_fails_with_expired() {
    let key_description = tee_key_description(b"challenge");
    let mut chain = factory_chain(&key_description);
    chain[0] = build_cert_with_validity(
        LEAF_NAME,
        CA_NAME,
        &[0x13],
        &ec_spki(LEAF_KEY_SEED),
        &[(
            keyattest::KEY_ATTESTATION_EXTENSION_OID,
            key_description.to_der(),
        )],
        "220101000000Z",
        "230101000000Z",
    );
    let verifier = pkix_verifier(chain[3].clone(), &[]);

    match verifier.verify(&chain, None, None) {
        VerificationResult::PathValidationFailure(e) => {
            assert_eq!(e.reason, PathValidationReason::Expired);
        }
        other => panic!("expected path validation failure, got {other:?}"),
    }
}

#[test]
fn test_not_yet_valid_certificate_fails_with_not_yet_valid() {
    let key_description = tee_key_description(b"challenge");
    let mut chain = factory_chain(&key_description);
    chain[0] = build_cert_with_validity(
        LEAF_NAME,
        CA_NAME,
        &[0x13],
        &ec_spki(LEAF_KEY_SEED),
        &[(
            keyattest::KEY_ATTESTATION_EXTENSION_OID,
            key_description.to_der(),
        )],
        "300101000000Z",
        "320101000000Z",
    );
    let verifier = pkix_verifier(chain[3].clone(), &[]);

    match verifier.verify(&chain, None, None) {
        VerificationResult::PathValidationFailure(e) => {
            assert_eq!(e.reason, PathValidationReason::NotYetValid);
        }
        other => panic!("expected path validation failure, got {other:?}"),
    }
}

#[test]
fn test_broken_issuer_chain_fails_with_name_chaining() {
    let key_description = tee_key_description(b"challenge");
    let mut chain = factory_chain(&key_description);
    // Re-issue the attestation certificate under an unrelated CA name.
    chain[1] = build_cert(
        CA_NAME,
        &[(DN_COMMON_NAME, "Unrelated CA")],
        &[0x2a],
        &ec_spki(3),
        &[],
    );
    let verifier = pkix_verifier(chain[3].clone(), &[]);

    match verifier.verify(&chain, None, None) {
        VerificationResult::PathValidationFailure(e) => {
            assert_eq!(e.reason, PathValidationReason::NameChaining);
        }
        other => panic!("expected path validation failure, got {other:?}"),
    }
}

#[test]
fn test_wrong_challenge_fails_with_challenge_mismatch() {
    let key_description = tee_key_description(b"challenge");
    let chain = factory_chain(&key_description);
    let verifier = stub_path_verifier(ExtensionConstraintConfig::default());
    let checker = ChallengeMatcher::new(b"foo".to_vec());

    assert_matches!(
        verifier.verify(&chain, Some(&checker), None),
        VerificationResult::ChallengeMismatch
    );
}

#[test]
fn test_mismatched_security_levels_violate_the_default_constraint() {
    let mut key_description = tee_key_description(b"challenge");
    key_description.attestation_security_level = SecurityLevel::StrongBox;
    let chain = factory_chain(&key_description);
    let verifier = stub_path_verifier(ExtensionConstraintConfig::default());

    match verifier.verify(&chain, None, None) {
        VerificationResult::ExtensionConstraintViolation { reason, .. } => {
            assert_eq!(
                reason,
                ConstraintViolationReason::SecurityLevelConstraintViolation
            );
        }
        other => panic!("expected constraint violation, got {other:?}"),
    }
}

#[test]
fn test_mismatched_security_levels_pass_under_not_null() {
    let mut key_description = tee_key_description(b"challenge");
    key_description.attestation_security_level = SecurityLevel::StrongBox;
    let chain = factory_chain(&key_description);
    let verifier = stub_path_verifier(ExtensionConstraintConfig {
        security_level: SecurityLevelCheck::NotNull,
        ..Default::default()
    });

    let result = verifier.verify(&chain, None, None);
    let attestation = match result {
        VerificationResult::Success(attestation) => attestation,
        other => panic!("expected success, got {other:?}"),
    };
    // The reported level is the attestation one.
    assert_eq!(attestation.security_level, SecurityLevel::StrongBox);
}

#[test]
fn test_unused_challenge_cache_accepts_a_chain_only_once() {
    let challenge: [u8; 16] = rand::random();
    let key_description = tee_key_description(&challenge);
    let chain = factory_chain(&key_description);
    let verifier = stub_path_verifier(ExtensionConstraintConfig::default());
    let cache = UnusedChallengeCache::new(NonZeroUsize::new(8).unwrap());

    tokio_test::block_on(async {
        let first = verifier.verify_async(&chain, Some(&cache), None).await;
        assert!(first.is_success());

        let second = verifier.verify_async(&chain, Some(&cache), None).await;
        assert_matches!(second, VerificationResult::ChallengeMismatch);
    });
}

#[test]
fn test_software_root_anchor_is_rejected_at_construction() {
    let err = Verifier::new(
        Arc::new(StaticTrustAnchors::new(vec![software_root_cert()])),
        Arc::new(StaticRevokedSerials::empty()),
        Arc::new(fixed_clock()),
        ExtensionConstraintConfig::default(),
    )
    .unwrap_err();

    assert_eq!(err, BuildError::SoftwareTrustAnchor { index: 0 });
}
