//! Error types for the observer
//!
//! Unrecognized input and unmatched transient ids are not errors: handlers log
//! them and return normally. The only failure a handler reports is running out
//! of room in a backing table, which the caller must treat as fatal.

use std::error::Error;
use std::fmt;

use derive_more::{Display, Error, From};

/// Backing table that failed to grow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Queries,
    Domains,
    Clients,
    Forwards,
}

#[derive(Debug)]
pub struct ResourceError {
    pub table: TableKind,
    /// Slots in use when growth was requested
    pub current: usize,
    /// Configured cap, if the cap was the reason
    pub limit: Option<usize>,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit {
            Some(limit) => write!(
                f,
                "Resource exhausted: {:?} table full ({}/{})",
                self.table, self.current, limit
            ),
            None => write!(
                f,
                "Resource exhausted: cannot grow {:?} table beyond {} slots",
                self.table, self.current
            ),
        }
    }
}

impl Error for ResourceError {}

#[derive(Debug, Display, From, Error)]
pub enum ObserverError {
    Resource(ResourceError),
    Io(std::io::Error),
    Config(toml::de::Error),
    Json(serde_json::Error),
    Metrics(prometheus::Error),
}

pub type Result<T> = std::result::Result<T, ObserverError>;
