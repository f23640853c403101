//! Revocation status list
//!
//! The verifier consumes a set of revoked serial numbers (lowercase hex, no
//! leading zeros) through a [`RevokedSerialsSource`]. Fetching the status
//! list from the remote endpoint is the caller's concern; this module
//! carries the wire format of the published list and in-memory sources.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Supplies the revoked serial set for one verification. Called once per
/// `verify`; must be safe to call concurrently.
pub trait RevokedSerialsSource: Send + Sync {
    fn revoked_serials(&self) -> HashSet<String>;
}

/// The published status list: `{"entries": {"<serial-hex>": {...}}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationStatusList {
    pub entries: HashMap<String, RevocationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub status: RevocationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationStatus {
    Ok,
    Revoked,
}

impl RevocationStatusList {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serials whose status is REVOKED, normalized to lowercase.
    pub fn revoked_serials(&self) -> HashSet<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.status == RevocationStatus::Revoked)
            .map(|(serial, _)| serial.to_lowercase())
            .collect()
    }
}

impl RevokedSerialsSource for RevocationStatusList {
    fn revoked_serials(&self) -> HashSet<String> {
        RevocationStatusList::revoked_serials(self)
    }
}

/// A fixed in-memory revoked set.
pub struct StaticRevokedSerials {
    serials: HashSet<String>,
}

impl StaticRevokedSerials {
    pub fn new(serials: impl IntoIterator<Item = String>) -> Self {
        Self {
            serials: serials.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            serials: HashSet::new(),
        }
    }
}

impl RevokedSerialsSource for StaticRevokedSerials {
    fn revoked_serials(&self) -> HashSet<String> {
        self.serials.clone()
    }
}
