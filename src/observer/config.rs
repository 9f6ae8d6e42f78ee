//! Observer configuration

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::observer::errors::Result;

/// Privacy level applied to newly observed queries
///
/// Levels are ordered; each level includes the redactions of the ones below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    ShowAll = 0,
    HideDomains = 1,
    HideDomainsClients = 2,
    Maximum = 3,
}

impl Default for PrivacyLevel {
    fn default() -> Self {
        PrivacyLevel::ShowAll
    }
}

impl FromStr for PrivacyLevel {
    type Err = String;

    /// Accepts the numeric level or its snake_case name
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "0" | "show_all" => Ok(PrivacyLevel::ShowAll),
            "1" | "hide_domains" => Ok(PrivacyLevel::HideDomains),
            "2" | "hide_domains_clients" => Ok(PrivacyLevel::HideDomainsClients),
            "3" | "maximum" => Ok(PrivacyLevel::Maximum),
            other => Err(format!("unknown privacy level: {}", other)),
        }
    }
}

/// Placeholder stored instead of a redacted domain
pub const HIDDEN_DOMAIN: &str = "hidden";

/// Placeholder stored instead of a redacted client
pub const HIDDEN_CLIENT: &str = "0.0.0.0";

/// Observer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Track AAAA queries
    pub analyze_aaaa: bool,
    /// Self-referential hostname excluded from all tracking
    pub sentinel_hostname: String,
    /// Width of a time bucket (seconds)
    pub bucket_width_secs: u64,
    /// Source path fragment of the gravity blocklist
    pub gravity_marker: String,
    /// Source path fragment of the user blacklist
    pub blacklist_marker: String,
    /// Slots added per memory-growth request
    pub alloc_step: usize,
    /// Hard cap on query records
    pub max_queries: Option<usize>,
    /// Hard cap on distinct domains
    pub max_domains: Option<usize>,
    /// Hard cap on distinct clients
    pub max_clients: Option<usize>,
    /// Privacy level used when no policy collaborator is installed
    pub privacy_level: PrivacyLevel,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            analyze_aaaa: true,
            sentinel_hostname: "pi.hole".to_string(),
            bucket_width_secs: 600, // 10 minute buckets
            gravity_marker: "/gravity.list".to_string(),
            blacklist_marker: "/black.list".to_string(),
            alloc_step: 10000,
            max_queries: None,
            max_domains: None,
            max_clients: None,
            privacy_level: PrivacyLevel::ShowAll,
        }
    }
}

impl ObserverConfig {
    pub fn from_toml_str(raw: &str) -> Result<ObserverConfig> {
        let config: ObserverConfig = toml::from_str(raw)?;
        Ok(config.normalized())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<ObserverConfig> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// True if `source` names one of the two blocklist files
    pub fn is_blocklist_source(&self, source: &str) -> bool {
        source.contains(&self.gravity_marker) || source.contains(&self.blacklist_marker)
    }

    // A zero width or step would stall bucketing and table growth
    pub(crate) fn normalized(mut self) -> ObserverConfig {
        if self.bucket_width_secs == 0 {
            log::warn!("bucket_width_secs must be positive, using 600");
            self.bucket_width_secs = 600;
        }
        if self.alloc_step == 0 {
            self.alloc_step = 1;
        }
        self.sentinel_hostname = self.sentinel_hostname.to_lowercase();
        self
    }
}
