//! DNS Observer
//!
//! A real-time DNS traffic observation engine. A recursive resolver reports the
//! lifecycle of every query (received, forwarded, answered from cache, replied,
//! DNSSEC validated) and the observer folds those events into per-query records,
//! per-domain reply history, per-client statistics and time-bucketed histograms.
//!
//! # Architecture
//!
//! * `observer` - event ingestion, state machine and aggregate tables
//!
//! ```rust,no_run
//! # use dns_observer::observer::{DnsObserver, ObserverConfig, ReplyFlags};
//! let observer = DnsObserver::new(ObserverConfig::default());
//! observer.on_query_observed(ReplyFlags::IPV4, "example.com", &[192, 168, 1, 10], "query[A]", 7)?;
//! observer.on_forwarded(ReplyFlags::IPV4, "example.com", &[9, 9, 9, 9], 7)?;
//! assert_eq!(observer.counters().forwarded, 1);
//! # Ok::<(), dns_observer::observer::ObserverError>(())
//! ```

/// Resolver event ingestion and aggregate state
pub mod observer;
