//! External collaborators of the observer
//!
//! The observer never reaches out to the resolver. Everything it needs from
//! the rest of the system goes through the traits in this module, each of
//! which ships with a default implementation.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;
use regex::Regex;

use crate::observer::config::PrivacyLevel;
use crate::observer::query::QueryStatus;

/// Source of the current privacy level, consulted once per new query
pub trait PrivacyPolicy: Send + Sync {
    fn privacy_level(&self) -> PrivacyLevel;
}

impl PrivacyPolicy for PrivacyLevel {
    fn privacy_level(&self) -> PrivacyLevel {
        *self
    }
}

/// Privacy level that can be changed while the observer runs
impl PrivacyPolicy for RwLock<PrivacyLevel> {
    fn privacy_level(&self) -> PrivacyLevel {
        *self.read()
    }
}

/// Derives the status of a query answered from local configuration
pub trait StatusDetector: Send + Sync {
    fn detect(&self, domain: &str) -> QueryStatus;
}

/// Re-reads blocklists after the resolver reloaded its zone data
pub trait BlocklistReloader: Send + Sync {
    fn reload(&self);
}

/// Wall clock in unix seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> ManualClock {
        ManualClock {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::Release);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}

/// dnsmasq wildcard rule: `address=/domain/target`
const WILDCARD_LINE: &str = r"^\s*address=/([^/\s]+)/";

/// Wildcard blocking rules read from a dnsmasq configuration file
///
/// A domain is wildcard blocked if it equals a rule or is a subdomain of one.
/// Every other domain answered from local configuration counts as cached.
#[derive(Debug, Default)]
pub struct WildcardList {
    path: Option<PathBuf>,
    domains: RwLock<HashSet<String>>,
}

impl WildcardList {
    /// An empty list with no backing file
    pub fn empty() -> WildcardList {
        WildcardList::default()
    }

    /// A list backed by `path`, loaded immediately
    pub fn from_file<P: AsRef<Path>>(path: P) -> WildcardList {
        let list = WildcardList {
            path: Some(path.as_ref().to_path_buf()),
            domains: RwLock::new(HashSet::new()),
        };
        list.reload();
        list
    }

    pub fn from_domains<I, S>(domains: I) -> WildcardList
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        WildcardList {
            path: None,
            domains: RwLock::new(
                domains
                    .into_iter()
                    .map(|d| d.as_ref().to_lowercase())
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.domains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.read().is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        let domains = self.domains.read();

        let mut candidate = domain.as_str();
        loop {
            if domains.contains(candidate) {
                return true;
            }
            match candidate.find('.') {
                Some(pos) => candidate = &candidate[pos + 1..],
                None => return false,
            }
        }
    }
}

/// Extracts wildcard domains from dnsmasq configuration text
pub fn parse_wildcards(content: &str) -> HashSet<String> {
    let re = match Regex::new(WILDCARD_LINE) {
        Ok(re) => re,
        Err(e) => {
            log::error!("Invalid wildcard pattern: {}", e);
            return HashSet::new();
        }
    };

    content
        .lines()
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

impl StatusDetector for WildcardList {
    fn detect(&self, domain: &str) -> QueryStatus {
        if self.contains(domain) {
            QueryStatus::WildcardBlocked
        } else {
            QueryStatus::Cache
        }
    }
}

impl BlocklistReloader for WildcardList {
    fn reload(&self) {
        let path = match self.path {
            Some(ref path) => path,
            None => return,
        };

        match fs::read_to_string(path) {
            Ok(content) => {
                let domains = parse_wildcards(&content);
                log::info!(
                    "Loaded {} wildcard domains from {}",
                    domains.len(),
                    path.display()
                );
                *self.domains.write() = domains;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No wildcard list at {}", path.display());
                self.domains.write().clear();
            }
            Err(e) => {
                log::warn!(
                    "Failed to read wildcard list {}: {}, keeping {} entries",
                    path.display(),
                    e,
                    self.len()
                );
            }
        }
    }
}
