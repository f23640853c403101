//! KeyDescription extension parsing
//!
//! Parses the Android key attestation extension (OID
//! `1.3.6.1.4.1.11129.2.1.17`) into a strongly typed [`KeyDescription`]:
//! - positional SEQUENCE of 8 (versions, security levels, challenge,
//!   unique id, two authorization lists)
//! - AuthorizationList as a walk over context-tagged optional fields keyed
//!   by their stable KeyMint tag numbers
//! - nested RootOfTrust, AttestationApplicationId and patch level shapes
//!
//! Unknown tag numbers are fatal. Per-field coercion failures on optional
//! fields are logged and surface as absence; the structural fields
//! (RootOfTrust, AttestationApplicationId) stay fatal. Tag ordering is
//! observed and recorded, never enforced here.
//!
//! Reference: https://source.android.com/docs/security/features/keystore/attestation

use std::collections::BTreeSet;

use ::asn1::{Enumerated, Null, SetOfWriter};
use der_parser::ber::{BerObject, BerObjectContent};
use serde::{Deserialize, Serialize};

use crate::asn1::{self, ParseResult};
use crate::error::{ExtensionParsingError, ExtensionParsingReason};
use crate::log::{LogHook, NoopLogHook};

/// Android key attestation extension OID: 1.3.6.1.4.1.11129.2.1.17
pub const KEY_ATTESTATION_EXTENSION_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 11129, 2, 1, 17];

// KeyMint tag numbers. The numbers are stable identifiers; the set below is
// the authoritative list this parser understands.
const TAG_PURPOSE: u32 = 1;
const TAG_ALGORITHM: u32 = 2;
const TAG_KEY_SIZE: u32 = 3;
const TAG_DIGEST: u32 = 5;
const TAG_PADDING: u32 = 6;
const TAG_EC_CURVE: u32 = 10;
const TAG_RSA_PUBLIC_EXPONENT: u32 = 200;
const TAG_MGF_DIGEST: u32 = 203;
const TAG_ROLLBACK_RESISTANCE: u32 = 303;
const TAG_EARLY_BOOT_ONLY: u32 = 305;
const TAG_ACTIVE_DATE_TIME: u32 = 400;
const TAG_ORIGINATION_EXPIRE_DATE_TIME: u32 = 401;
const TAG_USAGE_EXPIRE_DATE_TIME: u32 = 402;
const TAG_USAGE_COUNT_LIMIT: u32 = 405;
const TAG_NO_AUTH_REQUIRED: u32 = 503;
const TAG_USER_AUTH_TYPE: u32 = 504;
const TAG_AUTH_TIMEOUT: u32 = 505;
const TAG_ALLOW_WHILE_ON_BODY: u32 = 506;
const TAG_TRUSTED_USER_PRESENCE_REQUIRED: u32 = 507;
const TAG_TRUSTED_CONFIRMATION_REQUIRED: u32 = 508;
const TAG_UNLOCKED_DEVICE_REQUIRED: u32 = 509;
const TAG_CREATION_DATE_TIME: u32 = 701;
const TAG_ORIGIN: u32 = 702;
const TAG_ROOT_OF_TRUST: u32 = 704;
const TAG_OS_VERSION: u32 = 705;
const TAG_OS_PATCH_LEVEL: u32 = 706;
const TAG_ATTESTATION_APPLICATION_ID: u32 = 709;
const TAG_ATTESTATION_ID_BRAND: u32 = 710;
const TAG_ATTESTATION_ID_DEVICE: u32 = 711;
const TAG_ATTESTATION_ID_PRODUCT: u32 = 712;
const TAG_ATTESTATION_ID_SERIAL: u32 = 713;
const TAG_ATTESTATION_ID_IMEI: u32 = 714;
const TAG_ATTESTATION_ID_MEID: u32 = 715;
const TAG_ATTESTATION_ID_MANUFACTURER: u32 = 716;
const TAG_ATTESTATION_ID_MODEL: u32 = 717;
const TAG_VENDOR_PATCH_LEVEL: u32 = 718;
const TAG_BOOT_PATCH_LEVEL: u32 = 719;
const TAG_DEVICE_UNIQUE_ATTESTATION: u32 = 720;
const TAG_IDENTITY_CREDENTIAL_KEY: u32 = 721;
const TAG_ATTESTATION_ID_SECOND_IMEI: u32 = 723;
const TAG_MODULE_HASH: u32 = 724;

/// Where the key material lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SecurityLevel {
    /// Key material in non-secure memory.
    Software = 0,
    /// Key material in the TEE.
    TrustedEnvironment = 1,
    /// Key material in a dedicated hardware security module.
    StrongBox = 2,
}

impl TryFrom<i64> for SecurityLevel {
    type Error = ExtensionParsingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SecurityLevel::Software),
            1 => Ok(SecurityLevel::TrustedEnvironment),
            2 => Ok(SecurityLevel::StrongBox),
            _ => Err(ExtensionParsingError::with_reason(
                format!("Unknown security level: {value}"),
                ExtensionParsingReason::UnknownEnumValue,
            )),
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityLevel::Software => write!(f, "Software"),
            SecurityLevel::TrustedEnvironment => write!(f, "TrustedEnvironment"),
            SecurityLevel::StrongBox => write!(f, "StrongBox"),
        }
    }
}

/// Verified boot state from RootOfTrust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum VerifiedBootState {
    /// Boot chain verified against the device manufacturer key.
    Verified = 0,
    /// Boot chain verified against a user-installed key.
    SelfSigned = 1,
    /// Boot chain not verified (unlocked bootloader).
    Unverified = 2,
    /// Boot verification failed.
    Failed = 3,
}

impl TryFrom<i64> for VerifiedBootState {
    type Error = ExtensionParsingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VerifiedBootState::Verified),
            1 => Ok(VerifiedBootState::SelfSigned),
            2 => Ok(VerifiedBootState::Unverified),
            3 => Ok(VerifiedBootState::Failed),
            _ => Err(ExtensionParsingError::with_reason(
                format!("Unknown verified boot state: {value}"),
                ExtensionParsingReason::UnknownEnumValue,
            )),
        }
    }
}

/// How the key material came to exist (tag 702).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum KeyOrigin {
    /// Generated inside the secure hardware.
    Generated = 0,
    /// Derived inside the secure hardware.
    Derived = 1,
    /// Imported in the clear.
    Imported = 2,
    /// Origin not recorded (pre-KeyMint key).
    Unknown = 3,
    /// Imported through a secure import operation.
    SecurelyImported = 4,
}

impl TryFrom<i64> for KeyOrigin {
    type Error = ExtensionParsingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyOrigin::Generated),
            1 => Ok(KeyOrigin::Derived),
            2 => Ok(KeyOrigin::Imported),
            3 => Ok(KeyOrigin::Unknown),
            4 => Ok(KeyOrigin::SecurelyImported),
            _ => Err(ExtensionParsingError::with_reason(
                format!("Unknown key origin: {value}"),
                ExtensionParsingReason::UnknownEnumValue,
            )),
        }
    }
}

/// Boot-verified identity of the device's boot code and state (tag 704).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootOfTrust {
    pub verified_boot_key: Vec<u8>,
    pub device_locked: bool,
    pub verified_boot_state: VerifiedBootState,
    pub verified_boot_hash: Option<Vec<u8>>,
}

impl RootOfTrust {
    fn from_ber(obj: &BerObject) -> ParseResult<Self> {
        let items = asn1::as_sequence(obj)?;
        if items.len() != 3 && items.len() != 4 {
            return Err(ExtensionParsingError::with_reason(
                format!("RootOfTrust requires 3 or 4 elements, got {}", items.len()),
                ExtensionParsingReason::WrongArity,
            ));
        }
        Ok(Self {
            verified_boot_key: asn1::as_octet_string(&items[0])?.to_vec(),
            device_locked: asn1::as_boolean(&items[1])?,
            verified_boot_state: VerifiedBootState::try_from(asn1::as_integer(&items[2])?)?,
            verified_boot_hash: match items.get(3) {
                Some(item) => Some(asn1::as_octet_string(item)?.to_vec()),
                None => None,
            },
        })
    }

    pub fn to_der(&self) -> Vec<u8> {
        ::asn1::write_single(&self.writer()).expect("RootOfTrust encoding cannot fail")
    }

    fn writer(&self) -> write::RootOfTrust<'_> {
        write::RootOfTrust {
            verified_boot_key: &self.verified_boot_key,
            device_locked: self.device_locked,
            verified_boot_state: Enumerated::new(self.verified_boot_state as u32),
            verified_boot_hash: self.verified_boot_hash.as_deref(),
        }
    }
}

/// One attested package of the requesting app.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttestationPackageInfo {
    pub package_name: String,
    pub version: i64,
}

/// Identity of the app that requested the attestation (tag 709).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationApplicationId {
    pub packages: BTreeSet<AttestationPackageInfo>,
    pub signature_digests: BTreeSet<Vec<u8>>,
}

impl AttestationApplicationId {
    /// Parses the DER value carried inside the tag-709 OCTET STRING.
    pub fn parse(bytes: &[u8]) -> ParseResult<Self> {
        let obj = asn1::parse_der(bytes)?;
        let items = asn1::as_sequence(&obj)?;
        if items.len() != 2 {
            return Err(ExtensionParsingError::with_reason(
                format!(
                    "AttestationApplicationId requires 2 elements, got {}",
                    items.len()
                ),
                ExtensionParsingReason::WrongArity,
            ));
        }
        let mut packages = BTreeSet::new();
        for entry in asn1::as_set(&items[0])? {
            let fields = asn1::as_sequence(entry)?;
            if fields.len() != 2 {
                return Err(ExtensionParsingError::with_reason(
                    format!(
                        "AttestationPackageInfo requires 2 elements, got {}",
                        fields.len()
                    ),
                    ExtensionParsingReason::WrongArity,
                ));
            }
            packages.insert(AttestationPackageInfo {
                package_name: asn1::as_utf8(&fields[0])?,
                version: asn1::as_integer(&fields[1])?,
            });
        }
        let mut signature_digests = BTreeSet::new();
        for entry in asn1::as_set(&items[1])? {
            signature_digests.insert(asn1::as_octet_string(entry)?.to_vec());
        }
        Ok(Self {
            packages,
            signature_digests,
        })
    }

    pub fn to_der(&self) -> Vec<u8> {
        let package_infos: Vec<write::AttestationPackageInfo<'_>> = self
            .packages
            .iter()
            .map(|package| write::AttestationPackageInfo {
                package_name: package.package_name.as_bytes(),
                version: package.version,
            })
            .collect();
        let signature_digests: Vec<&[u8]> =
            self.signature_digests.iter().map(Vec::as_slice).collect();
        let writer = write::AttestationApplicationId {
            package_infos: SetOfWriter::new(package_infos),
            signature_digests: SetOfWriter::new(signature_digests),
        };
        ::asn1::write_single(&writer).expect("AttestationApplicationId encoding cannot fail")
    }
}

/// A year-month patch level with an optional two-digit day.
///
/// Source integers are 6 digits (yyyyMM) or 8 digits (yyyyMMdd); any other
/// width is reported as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchLevel {
    pub year: u16,
    pub month: u8,
    pub day: Option<u8>,
}

impl PatchLevel {
    pub fn from_integer(value: i64) -> Option<Self> {
        match value {
            100_000..=999_999 => Some(Self {
                year: (value / 100) as u16,
                month: (value % 100) as u8,
                day: None,
            }),
            10_000_000..=99_999_999 => Some(Self {
                year: (value / 10_000) as u16,
                month: ((value / 100) % 100) as u8,
                day: Some((value % 100) as u8),
            }),
            _ => None,
        }
    }

    pub fn to_integer(self) -> i64 {
        match self.day {
            Some(day) => {
                i64::from(self.year) * 10_000 + i64::from(self.month) * 100 + i64::from(day)
            }
            None => i64::from(self.year) * 100 + i64::from(self.month),
        }
    }
}

/// The open record of optional KeyMint authorizations.
///
/// Boolean fields carry truth by presence: absent means false, and an
/// explicit BOOLEAN FALSE on the wire is a protocol violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationList {
    pub purpose: BTreeSet<i64>,
    pub algorithm: Option<i64>,
    pub key_size: Option<i64>,
    pub digest: BTreeSet<i64>,
    pub padding: BTreeSet<i64>,
    pub ec_curve: Option<i64>,
    pub rsa_public_exponent: Option<i64>,
    pub mgf_digest: BTreeSet<i64>,
    pub rollback_resistance: bool,
    pub early_boot_only: bool,
    pub active_date_time: Option<i64>,
    pub origination_expire_date_time: Option<i64>,
    pub usage_expire_date_time: Option<i64>,
    pub usage_count_limit: Option<i64>,
    pub no_auth_required: bool,
    pub user_auth_type: Option<i64>,
    pub auth_timeout: Option<i64>,
    pub allow_while_on_body: bool,
    pub trusted_user_presence_required: bool,
    pub trusted_confirmation_required: bool,
    pub unlocked_device_required: bool,
    pub creation_date_time: Option<i64>,
    pub origin: Option<KeyOrigin>,
    pub root_of_trust: Option<RootOfTrust>,
    pub os_version: Option<i64>,
    pub os_patch_level: Option<PatchLevel>,
    pub attestation_application_id: Option<AttestationApplicationId>,
    pub attestation_id_brand: Option<String>,
    pub attestation_id_device: Option<String>,
    pub attestation_id_product: Option<String>,
    pub attestation_id_serial: Option<String>,
    pub attestation_id_imei: Option<String>,
    pub attestation_id_meid: Option<String>,
    pub attestation_id_manufacturer: Option<String>,
    pub attestation_id_model: Option<String>,
    pub vendor_patch_level: Option<PatchLevel>,
    pub boot_patch_level: Option<PatchLevel>,
    pub device_unique_attestation: bool,
    pub identity_credential_key: bool,
    pub attestation_id_second_imei: Option<String>,
    pub module_hash: Option<Vec<u8>>,
    /// Whether the tags appeared in strictly ascending order on the wire.
    /// True for an empty list.
    pub are_tags_ordered: bool,
}

impl Default for AuthorizationList {
    fn default() -> Self {
        Self {
            purpose: BTreeSet::new(),
            algorithm: None,
            key_size: None,
            digest: BTreeSet::new(),
            padding: BTreeSet::new(),
            ec_curve: None,
            rsa_public_exponent: None,
            mgf_digest: BTreeSet::new(),
            rollback_resistance: false,
            early_boot_only: false,
            active_date_time: None,
            origination_expire_date_time: None,
            usage_expire_date_time: None,
            usage_count_limit: None,
            no_auth_required: false,
            user_auth_type: None,
            auth_timeout: None,
            allow_while_on_body: false,
            trusted_user_presence_required: false,
            trusted_confirmation_required: false,
            unlocked_device_required: false,
            creation_date_time: None,
            origin: None,
            root_of_trust: None,
            os_version: None,
            os_patch_level: None,
            attestation_application_id: None,
            attestation_id_brand: None,
            attestation_id_device: None,
            attestation_id_product: None,
            attestation_id_serial: None,
            attestation_id_imei: None,
            attestation_id_meid: None,
            attestation_id_manufacturer: None,
            attestation_id_model: None,
            vendor_patch_level: None,
            boot_patch_level: None,
            device_unique_attestation: false,
            identity_credential_key: false,
            attestation_id_second_imei: None,
            module_hash: None,
            are_tags_ordered: true,
        }
    }
}

impl AuthorizationList {
    fn from_ber(obj: &BerObject, which: &str, log: &dyn LogHook) -> ParseResult<Self> {
        let items = asn1::as_sequence(obj)?;
        let mut list = AuthorizationList::default();
        let mut tags = Vec::with_capacity(items.len());
        for item in items {
            let tag = asn1::tag_number(item);
            tags.push(tag);
            let value = asn1::unwrap_tagged(item)?;
            list.apply(tag, &value, which, log)?;
        }
        list.are_tags_ordered = tags.windows(2).all(|pair| pair[0] < pair[1]);
        if !list.are_tags_ordered {
            log.log_info_message(&format!(
                "{which} authorization list tags are not in ascending order: {tags:?}"
            ));
        }
        Ok(list)
    }

    fn apply(
        &mut self,
        tag: u32,
        value: &BerObject,
        which: &str,
        log: &dyn LogHook,
    ) -> ParseResult<()> {
        match tag {
            TAG_PURPOSE => {
                self.purpose = recovered(int_set(value), "purpose", which, log).unwrap_or_default();
            }
            TAG_ALGORITHM => {
                self.algorithm = recovered(asn1::as_integer(value), "algorithm", which, log);
            }
            TAG_KEY_SIZE => {
                self.key_size = recovered(asn1::as_integer(value), "keySize", which, log);
            }
            TAG_DIGEST => {
                self.digest = recovered(int_set(value), "digest", which, log).unwrap_or_default();
            }
            TAG_PADDING => {
                self.padding = recovered(int_set(value), "padding", which, log).unwrap_or_default();
            }
            TAG_EC_CURVE => {
                self.ec_curve = recovered(asn1::as_integer(value), "ecCurve", which, log);
            }
            TAG_RSA_PUBLIC_EXPONENT => {
                self.rsa_public_exponent =
                    recovered(asn1::as_integer(value), "rsaPublicExponent", which, log);
            }
            TAG_MGF_DIGEST => {
                self.mgf_digest =
                    recovered(int_set(value), "mgfDigest", which, log).unwrap_or_default();
            }
            TAG_ROLLBACK_RESISTANCE => {
                self.rollback_resistance = presence_flag(value, "rollbackResistance", which, log)?;
            }
            TAG_EARLY_BOOT_ONLY => {
                self.early_boot_only = presence_flag(value, "earlyBootOnly", which, log)?;
            }
            TAG_ACTIVE_DATE_TIME => {
                self.active_date_time =
                    recovered(asn1::as_integer(value), "activeDateTime", which, log);
            }
            TAG_ORIGINATION_EXPIRE_DATE_TIME => {
                self.origination_expire_date_time = recovered(
                    asn1::as_integer(value),
                    "originationExpireDateTime",
                    which,
                    log,
                );
            }
            TAG_USAGE_EXPIRE_DATE_TIME => {
                self.usage_expire_date_time =
                    recovered(asn1::as_integer(value), "usageExpireDateTime", which, log);
            }
            TAG_USAGE_COUNT_LIMIT => {
                self.usage_count_limit =
                    recovered(asn1::as_integer(value), "usageCountLimit", which, log);
            }
            TAG_NO_AUTH_REQUIRED => {
                self.no_auth_required = presence_flag(value, "noAuthRequired", which, log)?;
            }
            TAG_USER_AUTH_TYPE => {
                self.user_auth_type = recovered(asn1::as_integer(value), "userAuthType", which, log);
            }
            TAG_AUTH_TIMEOUT => {
                self.auth_timeout = recovered(asn1::as_integer(value), "authTimeout", which, log);
            }
            TAG_ALLOW_WHILE_ON_BODY => {
                self.allow_while_on_body = presence_flag(value, "allowWhileOnBody", which, log)?;
            }
            TAG_TRUSTED_USER_PRESENCE_REQUIRED => {
                self.trusted_user_presence_required =
                    presence_flag(value, "trustedUserPresenceRequired", which, log)?;
            }
            TAG_TRUSTED_CONFIRMATION_REQUIRED => {
                self.trusted_confirmation_required =
                    presence_flag(value, "trustedConfirmationRequired", which, log)?;
            }
            TAG_UNLOCKED_DEVICE_REQUIRED => {
                self.unlocked_device_required =
                    presence_flag(value, "unlockedDeviceRequired", which, log)?;
            }
            TAG_CREATION_DATE_TIME => {
                self.creation_date_time =
                    recovered(asn1::as_integer(value), "creationDateTime", which, log);
            }
            TAG_ORIGIN => {
                self.origin = recovered(
                    asn1::as_integer(value).and_then(KeyOrigin::try_from),
                    "origin",
                    which,
                    log,
                );
            }
            TAG_ROOT_OF_TRUST => {
                self.root_of_trust = Some(RootOfTrust::from_ber(value)?);
            }
            TAG_OS_VERSION => {
                self.os_version = recovered(asn1::as_integer(value), "osVersion", which, log);
            }
            TAG_OS_PATCH_LEVEL => {
                self.os_patch_level = patch_level(value, "osPatchLevel", which, log);
            }
            TAG_ATTESTATION_APPLICATION_ID => {
                let bytes = asn1::as_octet_string(value)?;
                self.attestation_application_id = Some(AttestationApplicationId::parse(bytes)?);
            }
            TAG_ATTESTATION_ID_BRAND => {
                self.attestation_id_brand =
                    recovered(asn1::as_utf8(value), "attestationIdBrand", which, log);
            }
            TAG_ATTESTATION_ID_DEVICE => {
                self.attestation_id_device =
                    recovered(asn1::as_utf8(value), "attestationIdDevice", which, log);
            }
            TAG_ATTESTATION_ID_PRODUCT => {
                self.attestation_id_product =
                    recovered(asn1::as_utf8(value), "attestationIdProduct", which, log);
            }
            TAG_ATTESTATION_ID_SERIAL => {
                self.attestation_id_serial =
                    recovered(asn1::as_utf8(value), "attestationIdSerial", which, log);
            }
            TAG_ATTESTATION_ID_IMEI => {
                self.attestation_id_imei =
                    recovered(asn1::as_utf8(value), "attestationIdImei", which, log);
            }
            TAG_ATTESTATION_ID_MEID => {
                self.attestation_id_meid =
                    recovered(asn1::as_utf8(value), "attestationIdMeid", which, log);
            }
            TAG_ATTESTATION_ID_MANUFACTURER => {
                self.attestation_id_manufacturer =
                    recovered(asn1::as_utf8(value), "attestationIdManufacturer", which, log);
            }
            TAG_ATTESTATION_ID_MODEL => {
                self.attestation_id_model =
                    recovered(asn1::as_utf8(value), "attestationIdModel", which, log);
            }
            TAG_VENDOR_PATCH_LEVEL => {
                self.vendor_patch_level = patch_level(value, "vendorPatchLevel", which, log);
            }
            TAG_BOOT_PATCH_LEVEL => {
                self.boot_patch_level = patch_level(value, "bootPatchLevel", which, log);
            }
            TAG_DEVICE_UNIQUE_ATTESTATION => {
                self.device_unique_attestation =
                    presence_flag(value, "deviceUniqueAttestation", which, log)?;
            }
            TAG_IDENTITY_CREDENTIAL_KEY => {
                self.identity_credential_key =
                    presence_flag(value, "identityCredentialKey", which, log)?;
            }
            TAG_ATTESTATION_ID_SECOND_IMEI => {
                self.attestation_id_second_imei =
                    recovered(asn1::as_utf8(value), "attestationIdSecondImei", which, log);
            }
            TAG_MODULE_HASH => {
                self.module_hash = recovered(
                    asn1::as_octet_string(value).map(<[u8]>::to_vec),
                    "moduleHash",
                    which,
                    log,
                );
            }
            unknown => {
                return Err(ExtensionParsingError::with_reason(
                    format!("Unknown tag number: {unknown}"),
                    ExtensionParsingReason::UnknownTagNumber,
                ));
            }
        }
        Ok(())
    }

    /// Canonical encoding: present tags in ascending tag-number order.
    pub fn to_der(&self) -> Vec<u8> {
        let application_id_der = self
            .attestation_application_id
            .as_ref()
            .map(AttestationApplicationId::to_der);
        ::asn1::write_single(&self.writer(&application_id_der))
            .expect("AuthorizationList encoding cannot fail")
    }

    fn writer<'a>(
        &'a self,
        application_id_der: &'a Option<Vec<u8>>,
    ) -> write::AuthorizationList<'a> {
        write::AuthorizationList {
            purpose: int_set_writer(&self.purpose),
            algorithm: self.algorithm,
            key_size: self.key_size,
            digest: int_set_writer(&self.digest),
            padding: int_set_writer(&self.padding),
            ec_curve: self.ec_curve,
            rsa_public_exponent: self.rsa_public_exponent,
            mgf_digest: int_set_writer(&self.mgf_digest),
            rollback_resistance: flag(self.rollback_resistance),
            early_boot_only: flag(self.early_boot_only),
            active_date_time: self.active_date_time,
            origination_expire_date_time: self.origination_expire_date_time,
            usage_expire_date_time: self.usage_expire_date_time,
            usage_count_limit: self.usage_count_limit,
            no_auth_required: flag(self.no_auth_required),
            user_auth_type: self.user_auth_type,
            auth_timeout: self.auth_timeout,
            allow_while_on_body: flag(self.allow_while_on_body),
            trusted_user_presence_required: flag(self.trusted_user_presence_required),
            trusted_confirmation_required: flag(self.trusted_confirmation_required),
            unlocked_device_required: flag(self.unlocked_device_required),
            creation_date_time: self.creation_date_time,
            origin: self.origin.map(|origin| origin as i64),
            root_of_trust: self.root_of_trust.as_ref().map(RootOfTrust::writer),
            os_version: self.os_version,
            os_patch_level: self.os_patch_level.map(PatchLevel::to_integer),
            attestation_application_id: application_id_der.as_deref(),
            attestation_id_brand: utf8_bytes(&self.attestation_id_brand),
            attestation_id_device: utf8_bytes(&self.attestation_id_device),
            attestation_id_product: utf8_bytes(&self.attestation_id_product),
            attestation_id_serial: utf8_bytes(&self.attestation_id_serial),
            attestation_id_imei: utf8_bytes(&self.attestation_id_imei),
            attestation_id_meid: utf8_bytes(&self.attestation_id_meid),
            attestation_id_manufacturer: utf8_bytes(&self.attestation_id_manufacturer),
            attestation_id_model: utf8_bytes(&self.attestation_id_model),
            vendor_patch_level: self.vendor_patch_level.map(PatchLevel::to_integer),
            boot_patch_level: self.boot_patch_level.map(PatchLevel::to_integer),
            device_unique_attestation: flag(self.device_unique_attestation),
            identity_credential_key: flag(self.identity_credential_key),
            attestation_id_second_imei: utf8_bytes(&self.attestation_id_second_imei),
            module_hash: self.module_hash.as_deref(),
        }
    }
}

fn int_set_writer(values: &BTreeSet<i64>) -> Option<SetOfWriter<'_, i64, Vec<i64>>> {
    if values.is_empty() {
        None
    } else {
        Some(SetOfWriter::new(values.iter().copied().collect()))
    }
}

fn flag(present: bool) -> Option<Null> {
    present.then_some(())
}

fn utf8_bytes(value: &Option<String>) -> Option<&[u8]> {
    value.as_deref().map(str::as_bytes)
}

fn recovered<T>(
    result: ParseResult<T>,
    field: &str,
    which: &str,
    log: &dyn LogHook,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log.log_info_message(&format!("Skipping unparseable {which} {field}: {e}"));
            tracing::debug!(field, list = which, error = %e, "Skipping unparseable optional field");
            None
        }
    }
}

fn int_set(obj: &BerObject) -> ParseResult<BTreeSet<i64>> {
    let items = asn1::as_set(obj)?;
    let mut out = BTreeSet::new();
    for item in items {
        out.insert(asn1::as_integer(item)?);
    }
    Ok(out)
}

fn patch_level(obj: &BerObject, field: &str, which: &str, log: &dyn LogHook) -> Option<PatchLevel> {
    let value = recovered(asn1::as_integer(obj), field, which, log)?;
    match PatchLevel::from_integer(value) {
        Some(level) => Some(level),
        None => {
            log.log_info_message(&format!(
                "{which} {field} has unexpected width, treating as absent: {value}"
            ));
            None
        }
    }
}

/// Presence-carried booleans: NULL or TRUE mean present, an explicit FALSE
/// violates the schema.
fn presence_flag(
    obj: &BerObject,
    field: &str,
    which: &str,
    log: &dyn LogHook,
) -> ParseResult<bool> {
    match &obj.content {
        BerObjectContent::Null => Ok(true),
        BerObjectContent::Boolean(true) => Ok(true),
        BerObjectContent::Boolean(false) => Err(ExtensionParsingError::new(format!(
            "Boolean tag {field} explicitly encoded as FALSE"
        ))),
        other => {
            log.log_info_message(&format!(
                "Skipping {which} {field} with unexpected shape: {other:?}"
            ));
            Ok(false)
        }
    }
}

/// Identity of the attested device, projected from the hardware-enforced
/// authorization list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub brand: Option<String>,
    pub device: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
    pub imeis: BTreeSet<String>,
    pub meid: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
}

/// The parsed attestation extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDescription {
    pub attestation_version: i64,
    pub attestation_security_level: SecurityLevel,
    pub key_mint_version: i64,
    pub key_mint_security_level: SecurityLevel,
    pub attestation_challenge: Vec<u8>,
    pub unique_id: Vec<u8>,
    pub software_enforced: AuthorizationList,
    pub hardware_enforced: AuthorizationList,
}

impl KeyDescription {
    /// Parses the extension value. Total: every byte sequence yields either
    /// a value or an [`ExtensionParsingError`] with a specific reason.
    pub fn parse(bytes: &[u8]) -> ParseResult<Self> {
        Self::parse_with_log(bytes, &NoopLogHook)
    }

    /// As [`parse`](Self::parse), reporting recoverable oddities through the
    /// hook. Accepts the value either as the bare KeyDescription SEQUENCE or
    /// still wrapped in the extension OCTET STRING.
    pub fn parse_with_log(bytes: &[u8], log: &dyn LogHook) -> ParseResult<Self> {
        let outer = asn1::parse_der(bytes)?;
        let wrapped: Option<&[u8]> = match &outer.content {
            BerObjectContent::OctetString(inner) => Some(inner),
            _ => None,
        };
        let unwrapped;
        let obj = if let Some(inner) = wrapped {
            unwrapped = asn1::parse_der(inner)?;
            &unwrapped
        } else {
            &outer
        };

        let items = asn1::as_sequence(obj)?;
        if items.len() != 8 {
            return Err(ExtensionParsingError::with_reason(
                format!("KeyDescription requires exactly 8 elements, got {}", items.len()),
                ExtensionParsingReason::WrongArity,
            ));
        }

        Ok(Self {
            attestation_version: asn1::as_integer(&items[0])?,
            attestation_security_level: SecurityLevel::try_from(asn1::as_integer(&items[1])?)?,
            key_mint_version: asn1::as_integer(&items[2])?,
            key_mint_security_level: SecurityLevel::try_from(asn1::as_integer(&items[3])?)?,
            attestation_challenge: asn1::as_octet_string(&items[4])?.to_vec(),
            unique_id: asn1::as_octet_string(&items[5])?.to_vec(),
            software_enforced: AuthorizationList::from_ber(&items[6], "softwareEnforced", log)?,
            hardware_enforced: AuthorizationList::from_ber(&items[7], "hardwareEnforced", log)?,
        })
    }

    /// Canonical DER encoding of the KeyDescription SEQUENCE.
    pub fn to_der(&self) -> Vec<u8> {
        let software_app_id = self
            .software_enforced
            .attestation_application_id
            .as_ref()
            .map(AttestationApplicationId::to_der);
        let hardware_app_id = self
            .hardware_enforced
            .attestation_application_id
            .as_ref()
            .map(AttestationApplicationId::to_der);
        let writer = write::KeyDescription {
            attestation_version: self.attestation_version,
            attestation_security_level: Enumerated::new(self.attestation_security_level as u32),
            key_mint_version: self.key_mint_version,
            key_mint_security_level: Enumerated::new(self.key_mint_security_level as u32),
            attestation_challenge: &self.attestation_challenge,
            unique_id: &self.unique_id,
            software_enforced: self.software_enforced.writer(&software_app_id),
            hardware_enforced: self.hardware_enforced.writer(&hardware_app_id),
        };
        ::asn1::write_single(&writer).expect("KeyDescription encoding cannot fail")
    }

    /// The encoding as it appears in the certificate: the SEQUENCE wrapped
    /// in the extension OCTET STRING.
    pub fn to_extension_value(&self) -> Vec<u8> {
        ::asn1::write_single(&self.to_der().as_slice())
            .expect("Extension value encoding cannot fail")
    }

    /// Projects the hardware-enforced attestation ids into a
    /// [`DeviceIdentity`].
    pub fn device_identity(&self) -> DeviceIdentity {
        let hw = &self.hardware_enforced;
        let mut imeis = BTreeSet::new();
        if let Some(imei) = &hw.attestation_id_imei {
            imeis.insert(imei.clone());
        }
        if let Some(imei) = &hw.attestation_id_second_imei {
            imeis.insert(imei.clone());
        }
        DeviceIdentity {
            brand: hw.attestation_id_brand.clone(),
            device: hw.attestation_id_device.clone(),
            product: hw.attestation_id_product.clone(),
            serial: hw.attestation_id_serial.clone(),
            imeis,
            meid: hw.attestation_id_meid.clone(),
            manufacturer: hw.attestation_id_manufacturer.clone(),
            model: hw.attestation_id_model.clone(),
        }
    }
}

/// Write-side mirror of the KeyMint schema, for the canonical encoder.
/// Struct field order is the ascending tag order; absent options emit
/// nothing.
mod write {
    use ::asn1::{Asn1Write, Enumerated, Null, SetOfWriter};

    #[derive(Asn1Write)]
    pub(super) struct KeyDescription<'a> {
        pub(super) attestation_version: i64,
        pub(super) attestation_security_level: Enumerated,
        pub(super) key_mint_version: i64,
        pub(super) key_mint_security_level: Enumerated,
        pub(super) attestation_challenge: &'a [u8],
        pub(super) unique_id: &'a [u8],
        pub(super) software_enforced: AuthorizationList<'a>,
        pub(super) hardware_enforced: AuthorizationList<'a>,
    }

    #[derive(Asn1Write)]
    pub(super) struct AuthorizationList<'a> {
        #[explicit(1)]
        pub(super) purpose: Option<SetOfWriter<'a, i64, Vec<i64>>>,
        #[explicit(2)]
        pub(super) algorithm: Option<i64>,
        #[explicit(3)]
        pub(super) key_size: Option<i64>,
        #[explicit(5)]
        pub(super) digest: Option<SetOfWriter<'a, i64, Vec<i64>>>,
        #[explicit(6)]
        pub(super) padding: Option<SetOfWriter<'a, i64, Vec<i64>>>,
        #[explicit(10)]
        pub(super) ec_curve: Option<i64>,
        #[explicit(200)]
        pub(super) rsa_public_exponent: Option<i64>,
        #[explicit(203)]
        pub(super) mgf_digest: Option<SetOfWriter<'a, i64, Vec<i64>>>,
        #[explicit(303)]
        pub(super) rollback_resistance: Option<Null>,
        #[explicit(305)]
        pub(super) early_boot_only: Option<Null>,
        #[explicit(400)]
        pub(super) active_date_time: Option<i64>,
        #[explicit(401)]
        pub(super) origination_expire_date_time: Option<i64>,
        #[explicit(402)]
        pub(super) usage_expire_date_time: Option<i64>,
        #[explicit(405)]
        pub(super) usage_count_limit: Option<i64>,
        #[explicit(503)]
        pub(super) no_auth_required: Option<Null>,
        #[explicit(504)]
        pub(super) user_auth_type: Option<i64>,
        #[explicit(505)]
        pub(super) auth_timeout: Option<i64>,
        #[explicit(506)]
        pub(super) allow_while_on_body: Option<Null>,
        #[explicit(507)]
        pub(super) trusted_user_presence_required: Option<Null>,
        #[explicit(508)]
        pub(super) trusted_confirmation_required: Option<Null>,
        #[explicit(509)]
        pub(super) unlocked_device_required: Option<Null>,
        #[explicit(701)]
        pub(super) creation_date_time: Option<i64>,
        #[explicit(702)]
        pub(super) origin: Option<i64>,
        #[explicit(704)]
        pub(super) root_of_trust: Option<RootOfTrust<'a>>,
        #[explicit(705)]
        pub(super) os_version: Option<i64>,
        #[explicit(706)]
        pub(super) os_patch_level: Option<i64>,
        #[explicit(709)]
        pub(super) attestation_application_id: Option<&'a [u8]>,
        #[explicit(710)]
        pub(super) attestation_id_brand: Option<&'a [u8]>,
        #[explicit(711)]
        pub(super) attestation_id_device: Option<&'a [u8]>,
        #[explicit(712)]
        pub(super) attestation_id_product: Option<&'a [u8]>,
        #[explicit(713)]
        pub(super) attestation_id_serial: Option<&'a [u8]>,
        #[explicit(714)]
        pub(super) attestation_id_imei: Option<&'a [u8]>,
        #[explicit(715)]
        pub(super) attestation_id_meid: Option<&'a [u8]>,
        #[explicit(716)]
        pub(super) attestation_id_manufacturer: Option<&'a [u8]>,
        #[explicit(717)]
        pub(super) attestation_id_model: Option<&'a [u8]>,
        #[explicit(718)]
        pub(super) vendor_patch_level: Option<i64>,
        #[explicit(719)]
        pub(super) boot_patch_level: Option<i64>,
        #[explicit(720)]
        pub(super) device_unique_attestation: Option<Null>,
        #[explicit(721)]
        pub(super) identity_credential_key: Option<Null>,
        #[explicit(723)]
        pub(super) attestation_id_second_imei: Option<&'a [u8]>,
        #[explicit(724)]
        pub(super) module_hash: Option<&'a [u8]>,
    }

    #[derive(Asn1Write)]
    pub(super) struct RootOfTrust<'a> {
        pub(super) verified_boot_key: &'a [u8],
        pub(super) device_locked: bool,
        pub(super) verified_boot_state: Enumerated,
        pub(super) verified_boot_hash: Option<&'a [u8]>,
    }

    #[derive(Asn1Write)]
    pub(super) struct AttestationPackageInfo<'a> {
        pub(super) package_name: &'a [u8],
        pub(super) version: i64,
    }

    #[derive(Asn1Write)]
    pub(super) struct AttestationApplicationId<'a> {
        pub(super) package_infos:
            SetOfWriter<'a, AttestationPackageInfo<'a>, Vec<AttestationPackageInfo<'a>>>,
        pub(super) signature_digests: SetOfWriter<'a, &'a [u8], Vec<&'a [u8]>>,
    }
}
