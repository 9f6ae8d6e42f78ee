//! Resolver Event Observation
//!
//! This module turns the resolver's callback stream into consistent aggregate
//! state. Every event handler runs under a single lock, resolves names to dense
//! ids, correlates the event to an in-flight query record by the resolver's
//! transient id and applies exactly one status transition per record.
//!
//! # Module Structure
//!
//! * `flags` - typed resolver flag bitset
//! * `query_type` - query type labels reported by the resolver
//! * `table` - growable slot storage with the memory-growth request
//! * `intern` - domain, client and upstream interning tables
//! * `buckets` - fixed-width time buckets
//! * `query` - query records and transient id correlation
//! * `domain` - per-domain aggregates and reply classification
//! * `counters` - process-wide running totals
//! * `collaborators` - privacy policy, status detector, reload trigger, clock
//! * `state` - the owned aggregate state
//! * `handlers` - the per-event state machine
//! * `engine` - the locked public handle
//! * `events` - serializable resolver events for replay
//! * `metrics` - Prometheus exposition of the counters

/// Resolver flag bitset
pub mod flags;

/// Query type labels
pub mod query_type;

/// Configuration
pub mod config;

/// Error types
pub mod errors;

/// Growable slot tables
pub mod table;

/// Identifier interning
pub mod intern;

/// Time buckets
pub mod buckets;

/// Query records
pub mod query;

/// Domain aggregates and reply classification
pub mod domain;

/// Global counters
pub mod counters;

/// External collaborators
pub mod collaborators;

/// Aggregate state
pub mod state;

/// Event handlers
mod handlers;

/// Public observer handle
pub mod engine;

/// Serializable resolver events
pub mod events;

/// Prometheus metrics export
pub mod metrics;

pub use collaborators::{
    BlocklistReloader, Clock, ManualClock, PrivacyPolicy, StatusDetector, SystemClock,
    WildcardList,
};
pub use config::{ObserverConfig, PrivacyLevel};
pub use counters::GlobalCounters;
pub use domain::{DnssecStatus, DomainAggregate, ReplyKind};
pub use engine::{DnsObserver, Summary};
pub use errors::{ObserverError, ResourceError, Result, TableKind};
pub use events::{ReplayLine, ResolverEvent};
pub use flags::ReplyFlags;
pub use intern::{ClientId, DomainId, ForwardId};
pub use query::{QueryRecord, QueryStatus};
pub use query_type::QueryType;
pub use state::ObserverState;
