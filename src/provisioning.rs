//! ProvisioningInfo extension parsing
//!
//! Remotely provisioned chains carry the extension
//! `1.3.6.1.4.1.11129.2.1.30` on the attestation certificate: a CBOR map
//! inside a DER OCTET STRING. Only key `1` (certificates issued by the
//! remote provisioner for this device) is read; additional keys are
//! ignored.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::asn1::{self, ParseResult};
use crate::error::ExtensionParsingError;

/// ProvisioningInfo extension OID: 1.3.6.1.4.1.11129.2.1.30
pub const PROVISIONING_INFO_EXTENSION_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 11129, 2, 1, 30];

const CERTIFICATES_ISSUED_KEY: i128 = 1;

/// Provisioning statistics for a remotely provisioned device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningInfoMap {
    pub certificates_issued: u64,
}

impl ProvisioningInfoMap {
    /// Parses the extension value (DER OCTET STRING wrapping a CBOR map).
    pub fn parse(extension_value: &[u8]) -> ParseResult<Self> {
        let obj = asn1::parse_der(extension_value)?;
        let cbor_bytes = asn1::as_octet_string(&obj)?;
        let value: Value = ciborium::de::from_reader(cbor_bytes)
            .map_err(|e| ExtensionParsingError::new(format!("Invalid CBOR: {e}")))?;
        let entries = value
            .as_map()
            .ok_or_else(|| ExtensionParsingError::new("Expected CBOR map"))?;

        for (key, entry) in entries {
            let Some(key) = key.as_integer() else {
                continue;
            };
            if i128::from(key) != CERTIFICATES_ISSUED_KEY {
                continue;
            }
            let issued = entry
                .as_integer()
                .and_then(|v| u64::try_from(i128::from(v)).ok())
                .ok_or_else(|| {
                    ExtensionParsingError::new("certificatesIssued must be an unsigned integer")
                })?;
            return Ok(Self {
                certificates_issued: issued,
            });
        }

        Err(ExtensionParsingError::new(
            "certificatesIssued (key 1) not present in provisioning info map",
        ))
    }
}
