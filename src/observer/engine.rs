//! The public observer handle
//!
//! `DnsObserver` owns the whole aggregate state behind one mutex. Every event
//! method takes the lock on entry and holds it until it returns, so each event
//! is applied atomically with respect to every other event and to readers.
//! The guard is scope-bound and released on every early return.
//!
//! The handle is `Send + Sync`; share it across resolver threads with `Arc`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_derive::Serialize;

use crate::observer::buckets::TimeBucket;
use crate::observer::collaborators::{
    BlocklistReloader, Clock, PrivacyPolicy, StatusDetector, SystemClock, WildcardList,
};
use crate::observer::config::ObserverConfig;
use crate::observer::counters::GlobalCounters;
use crate::observer::domain::DomainAggregate;
use crate::observer::errors::Result;
use crate::observer::flags::ReplyFlags;
use crate::observer::handlers::render_address;
use crate::observer::metrics;
use crate::observer::query::QueryRecord;
use crate::observer::state::ObserverState;

/// Main observer handle
pub struct DnsObserver {
    state: Mutex<ObserverState>,
    privacy: Arc<dyn PrivacyPolicy>,
    detector: Arc<dyn StatusDetector>,
    reloader: Arc<dyn BlocklistReloader>,
    clock: Arc<dyn Clock>,
}

impl DnsObserver {
    /// Observer with an empty wildcard list, the configured privacy level and
    /// the system clock
    pub fn new(config: ObserverConfig) -> DnsObserver {
        let wildcards = Arc::new(WildcardList::empty());
        DnsObserver {
            privacy: Arc::new(config.privacy_level),
            detector: wildcards.clone(),
            reloader: wildcards,
            clock: Arc::new(SystemClock),
            state: Mutex::new(ObserverState::new(config)),
        }
    }

    pub fn with_privacy_policy(mut self, privacy: Arc<dyn PrivacyPolicy>) -> Self {
        self.privacy = privacy;
        self
    }

    pub fn with_status_detector(mut self, detector: Arc<dyn StatusDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_blocklist_reloader(mut self, reloader: Arc<dyn BlocklistReloader>) -> Self {
        self.reloader = reloader;
        self
    }

    /// Installs one wildcard list as both status detector and reload target
    pub fn with_wildcards(self, wildcards: Arc<WildcardList>) -> Self {
        self.with_status_detector(wildcards.clone())
            .with_blocklist_reloader(wildcards)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// A new query arrived from a client
    pub fn on_query_observed(
        &self,
        flags: ReplyFlags,
        name: &str,
        addr: &[u8],
        type_label: &str,
        transient_id: i32,
    ) -> Result<()> {
        let now = self.clock.now();
        let privacy = self.privacy.privacy_level();

        let mut state = self.state.lock();
        state.query_observed(flags, name, addr, type_label, transient_id, now, privacy)
    }

    /// A query was sent to an upstream server
    pub fn on_forwarded(
        &self,
        flags: ReplyFlags,
        name: &str,
        addr: &[u8],
        transient_id: i32,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.forwarded(flags, name, addr, transient_id)
    }

    /// A reply arrived, either from local configuration or from upstream
    pub fn on_reply(
        &self,
        flags: ReplyFlags,
        name: &str,
        addr: Option<&[u8]>,
        ttl: u64,
        transient_id: i32,
    ) {
        let answer = addr.and_then(|bytes| render_address(flags, bytes));

        let mut state = self.state.lock();
        state.reply(
            flags,
            name,
            answer.as_deref(),
            ttl,
            transient_id,
            self.detector.as_ref(),
        );
    }

    /// A query was answered from the resolver's cache or a hosts file
    pub fn on_cache_answer(
        &self,
        flags: ReplyFlags,
        name: &str,
        addr: Option<&[u8]>,
        source: Option<&str>,
        ttl: u64,
        transient_id: i32,
    ) {
        let answer = addr.and_then(|bytes| render_address(flags, bytes));

        let mut state = self.state.lock();
        state.cache_answer(flags, name, answer.as_deref(), source, ttl, transient_id);
    }

    /// DNSSEC validation finished for a query
    pub fn on_dnssec_result(&self, status_code: i32, transient_id: i32) {
        let mut state = self.state.lock();
        state.dnssec_result(status_code, transient_id);
    }

    /// The resolver re-read its configuration and hosts files
    pub fn on_zone_reload(&self) {
        self.state.lock().counters.blocklist_entries = 0;

        // The reload reads files, so it runs after the guard is gone
        self.reloader.reload();
    }

    /// The resolver finished loading a hosts-format file
    pub fn on_hosts_file_loaded(&self, path: Option<&str>, count: u64) {
        let mut state = self.state.lock();
        state.hosts_file_loaded(path, count);
    }

    /// Runs `f` with shared access to the state, under the observer lock
    pub fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&ObserverState) -> R,
    {
        let state = self.state.lock();
        f(&state)
    }

    pub fn counters(&self) -> GlobalCounters {
        self.state.lock().counters.clone()
    }

    pub fn query(&self, slot: usize) -> Option<QueryRecord> {
        self.state.lock().queries.get(slot).cloned()
    }

    pub fn domain(&self, name: &str) -> Option<DomainAggregate> {
        self.state.lock().domain_by_name(name).cloned()
    }

    /// Counters in Prometheus text exposition format
    pub fn prometheus_text(&self) -> Result<String> {
        let counters = self.counters();
        metrics::render(&counters)
    }

    /// Snapshot for dashboards; lists are ordered by descending count
    pub fn summary(&self, top: usize) -> Summary {
        let state = self.state.lock();

        let mut top_domains: Vec<DomainSummary> = state
            .domains()
            .filter_map(|(id, d)| {
                state.index.domain_name(id).map(|name| DomainSummary {
                    domain: name.to_string(),
                    queries: d.query_count,
                    blocked: d.blocked_count,
                })
            })
            .collect();
        top_domains.sort_by(|a, b| b.queries.cmp(&a.queries).then_with(|| a.domain.cmp(&b.domain)));
        top_domains.truncate(top);

        let mut top_clients: Vec<ClientSummary> = state
            .clients()
            .filter_map(|(id, c)| {
                state.index.client_name(id).map(|name| ClientSummary {
                    client: name.to_string(),
                    queries: c.query_count,
                })
            })
            .collect();
        top_clients.sort_by(|a, b| b.queries.cmp(&a.queries).then_with(|| a.client.cmp(&b.client)));
        top_clients.truncate(top);

        let mut forward_destinations: Vec<ForwardSummary> = state
            .forwards()
            .filter_map(|(id, f)| {
                state.index.forward_name(id).map(|name| ForwardSummary {
                    server: name.to_string(),
                    forwarded: f.forwarded_count,
                })
            })
            .collect();
        forward_destinations.sort_by(|a, b| b.forwarded.cmp(&a.forwarded));

        Summary {
            counters: state.counters.clone(),
            domains_tracked: state.index.domain_count(),
            clients_tracked: state.index.client_count(),
            over_time: state.buckets.iter().map(BucketSummary::from).collect(),
            top_domains,
            top_clients,
            forward_destinations,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub counters: GlobalCounters,
    pub domains_tracked: usize,
    pub clients_tracked: usize,
    pub over_time: Vec<BucketSummary>,
    pub top_domains: Vec<DomainSummary>,
    pub top_clients: Vec<ClientSummary>,
    pub forward_destinations: Vec<ForwardSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    pub start: i64,
    pub total: u64,
    pub blocked: u64,
    pub cached: u64,
    pub unique_clients: usize,
}

impl From<&TimeBucket> for BucketSummary {
    fn from(bucket: &TimeBucket) -> Self {
        BucketSummary {
            start: bucket.start,
            total: bucket.total,
            blocked: bucket.blocked,
            cached: bucket.cached,
            unique_clients: bucket.clients.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainSummary {
    pub domain: String,
    pub queries: u64,
    pub blocked: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    pub client: String,
    pub queries: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForwardSummary {
    pub server: String,
    pub forwarded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::collaborators::ManualClock;
    use crate::observer::config::PrivacyLevel;
    use parking_lot::RwLock;
    use std::thread;

    fn observer() -> DnsObserver {
        DnsObserver::new(ObserverConfig::default()).with_clock(Arc::new(ManualClock::new(6000)))
    }

    #[test]
    fn test_observer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DnsObserver>();
    }

    #[test]
    fn test_concurrent_events_stay_consistent() {
        let observer = Arc::new(observer());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let observer = observer.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        let id = t * 1000 + i;
                        let name = format!("host{}.example", i % 17);
                        observer
                            .on_query_observed(ReplyFlags::IPV4, &name, &[10, 0, 0, t as u8], "query[A]", id)
                            .unwrap();
                        if i % 2 == 0 {
                            observer
                                .on_forwarded(ReplyFlags::IPV4, &name, &[1, 1, 1, 1], id)
                                .unwrap();
                        } else {
                            observer.on_cache_answer(
                                ReplyFlags::FORWARD | ReplyFlags::IPV4,
                                &name,
                                Some(&[93, 184, 216, 34]),
                                None,
                                60,
                                id,
                            );
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let counters = observer.counters();
        assert_eq!(counters.queries, 1000);
        assert_eq!(counters.forwarded, 500);
        assert_eq!(counters.cached, 500);
        assert_eq!(counters.unknown, 0);
        assert!(observer.read(|state| state.is_consistent()));
    }

    #[test]
    fn test_runtime_privacy_change_applies_to_new_queries() {
        let policy = Arc::new(RwLock::new(PrivacyLevel::ShowAll));
        let observer = observer().with_privacy_policy(policy.clone());

        observer
            .on_query_observed(ReplyFlags::IPV4, "visible.example", &[10, 0, 0, 1], "query[A]", 1)
            .unwrap();
        *policy.write() = PrivacyLevel::HideDomains;
        observer
            .on_query_observed(ReplyFlags::IPV4, "secret.example", &[10, 0, 0, 1], "query[A]", 2)
            .unwrap();

        assert!(observer.domain("visible.example").is_some());
        assert!(observer.domain("secret.example").is_none());
        assert!(observer.domain("hidden").is_some());
    }

    #[test]
    fn test_summary_orders_by_count() {
        let observer = observer();
        for (id, name) in ["b.example", "a.example", "b.example"].iter().enumerate() {
            observer
                .on_query_observed(ReplyFlags::IPV4, name, &[10, 0, 0, 1], "query[A]", id as i32)
                .unwrap();
        }
        observer
            .on_forwarded(ReplyFlags::IPV4, "a.example", &[9, 9, 9, 9], 1)
            .unwrap();

        let summary = observer.summary(10);
        assert_eq!(summary.top_domains[0].domain, "b.example");
        assert_eq!(summary.top_domains[0].queries, 2);
        assert_eq!(summary.top_clients[0].queries, 3);
        assert_eq!(summary.forward_destinations[0].server, "9.9.9.9");
        assert_eq!(summary.forward_destinations[0].forwarded, 1);
        assert_eq!(summary.over_time.len(), 1);
        assert_eq!(summary.over_time[0].total, 3);
        assert_eq!(summary.over_time[0].unique_clients, 1);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"top_domains\""));
    }

    #[test]
    fn test_zone_reload_resets_blocklist_count() {
        let observer = observer();
        observer.on_hosts_file_loaded(Some("/etc/pihole/gravity.list"), 100);
        assert_eq!(observer.counters().blocklist_entries, 100);

        observer.on_zone_reload();
        assert_eq!(observer.counters().blocklist_entries, 0);
    }
}
