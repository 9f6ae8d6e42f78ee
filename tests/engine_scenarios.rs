//! End-to-end scenarios driving the observer through its public handle

use std::sync::Arc;

use dns_observer::observer::{
    DnsObserver, DnssecStatus, ManualClock, ObserverConfig, ObserverError, PrivacyLevel,
    QueryStatus, ReplayLine, ReplyFlags, ReplyKind, TableKind, WildcardList,
};

const CLIENT: [u8; 4] = [192, 168, 1, 10];
const UPSTREAM: [u8; 4] = [9, 9, 9, 9];

fn observer_with(config: ObserverConfig) -> (DnsObserver, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_600_000_000));
    let observer = DnsObserver::new(config).with_clock(clock.clone());
    (observer, clock)
}

fn observer() -> DnsObserver {
    observer_with(ObserverConfig::default()).0
}

fn query(observer: &DnsObserver, name: &str, label: &str, id: i32) {
    observer
        .on_query_observed(ReplyFlags::IPV4, name, &CLIENT, label, id)
        .unwrap();
}

#[test]
fn test_forwarded_query_with_upstream_reply() {
    let observer = observer();

    query(&observer, "example.com", "query[A]", 1);
    observer
        .on_forwarded(ReplyFlags::IPV4, "example.com", &UPSTREAM, 1)
        .unwrap();
    observer.on_reply(
        ReplyFlags::FORWARD | ReplyFlags::IPV4,
        "example.com",
        Some(&[93, 184, 216, 34]),
        300,
        1,
    );

    let counters = observer.counters();
    assert_eq!(counters.queries, 1);
    assert_eq!(counters.forwarded, 1);
    assert_eq!(counters.unknown, 0);
    assert_eq!(counters.reply_ip, 1);

    let record = observer.query(0).unwrap();
    assert_eq!(record.status, QueryStatus::Forwarded);
    assert!(record.complete);
    assert_eq!(record.ttl, 300);

    let domain = observer.domain("example.com").unwrap();
    assert_eq!(domain.last_ipv4.as_deref(), Some("93.184.216.34"));
    assert_eq!(domain.reply[0], ReplyKind::Ip);

    let summary = observer.summary(5);
    assert_eq!(summary.forward_destinations[0].server, "9.9.9.9");
    assert_eq!(summary.forward_destinations[0].forwarded, 1);
}

#[test]
fn test_cache_answer_then_forward_is_reclassified() {
    let observer = observer();

    query(&observer, "www.example.org", "query[A]", 4);
    observer.on_cache_answer(
        ReplyFlags::FORWARD | ReplyFlags::CNAME,
        "www.example.org",
        None,
        None,
        60,
        4,
    );
    assert_eq!(observer.counters().cached, 1);

    observer
        .on_forwarded(ReplyFlags::IPV4, "cdn.example.net", &UPSTREAM, 4)
        .unwrap();

    let counters = observer.counters();
    assert_eq!(counters.cached, 0);
    assert_eq!(counters.forwarded, 1);
    assert_eq!(counters.unknown, 0);
    assert_eq!(observer.query(0).unwrap().status, QueryStatus::Forwarded);
    assert_eq!(observer.summary(1).over_time[0].cached, 0);
    assert!(observer.read(|state| state.is_consistent()));
}

#[test]
fn test_sentinel_hostname_is_never_tracked() {
    let observer = observer();

    query(&observer, "Pi.Hole", "query[A]", 1);
    observer.on_cache_answer(
        ReplyFlags::HOSTS | ReplyFlags::IMMORTAL | ReplyFlags::IPV4,
        "pi.hole",
        Some(&[192, 168, 1, 2]),
        Some("/etc/hosts"),
        0,
        1,
    );

    let counters = observer.counters();
    assert_eq!(counters.queries, 0);
    assert_eq!(counters.query_types, [0; 7]);
    assert!(observer.domain("pi.hole").is_none());
}

#[test]
fn test_mixed_case_sentinel_from_code_config() {
    let config = ObserverConfig {
        sentinel_hostname: "Pi.Hole".to_string(),
        ..ObserverConfig::default()
    };
    let (observer, _) = observer_with(config);

    query(&observer, "pi.hole", "query[A]", 1);
    query(&observer, "PI.HOLE", "query[AAAA]", 2);

    assert_eq!(observer.counters().queries, 0);
    assert!(observer.domain("pi.hole").is_none());
}

#[test]
fn test_aaaa_analysis_disabled() {
    let config = ObserverConfig {
        analyze_aaaa: false,
        ..ObserverConfig::default()
    };
    let (observer, _) = observer_with(config);

    query(&observer, "v6.example", "query[AAAA]", 1);
    query(&observer, "v4.example", "query[A]", 2);

    let counters = observer.counters();
    assert_eq!(counters.queries, 1);
    assert_eq!(counters.query_types[1], 0);
    assert!(observer.domain("v6.example").is_none());
}

#[test]
fn test_repeated_events_are_idempotent() {
    let observer = observer();

    query(&observer, "example.com", "query[A]", 1);
    for _ in 0..3 {
        observer
            .on_forwarded(ReplyFlags::IPV4, "example.com", &UPSTREAM, 1)
            .unwrap();
        observer.on_reply(
            ReplyFlags::FORWARD | ReplyFlags::NEG | ReplyFlags::NXDOMAIN,
            "example.com",
            None,
            30,
            1,
        );
    }

    let counters = observer.counters();
    assert_eq!(counters.forwarded, 1);
    assert_eq!(counters.reply_nxdomain, 1);
    assert_eq!(counters.unknown, 0);
    assert_eq!(observer.summary(1).forward_destinations[0].forwarded, 1);
}

#[test]
fn test_cache_answers_on_complete_records_change_nothing() {
    let observer = observer();

    query(&observer, "tracker.example", "query[A]", 1);
    query(&observer, "www.example.org", "query[A]", 2);
    query(&observer, "example.com", "query[A]", 3);

    let gravity = |observer: &DnsObserver| {
        observer.on_cache_answer(
            ReplyFlags::HOSTS | ReplyFlags::IMMORTAL | ReplyFlags::IPV4,
            "tracker.example",
            Some(&[0, 0, 0, 0]),
            Some("/etc/pihole/gravity.list"),
            2,
            1,
        )
    };
    let cached = |observer: &DnsObserver, id: i32| {
        observer.on_cache_answer(
            ReplyFlags::FORWARD | ReplyFlags::IPV4,
            "www.example.org",
            Some(&[192, 0, 2, 1]),
            None,
            60,
            id,
        )
    };

    gravity(&observer);
    cached(&observer, 2);
    observer
        .on_forwarded(ReplyFlags::IPV4, "example.com", &UPSTREAM, 3)
        .unwrap();

    let counters = observer.counters();
    let over_time = observer.summary(0).over_time;
    assert_eq!(counters.blocked, 1);
    assert_eq!(counters.cached, 1);
    assert_eq!(counters.forwarded, 1);

    gravity(&observer);
    assert_eq!(observer.counters(), counters);
    assert_eq!(observer.summary(0).over_time, over_time);

    cached(&observer, 2);
    assert_eq!(observer.counters(), counters);
    assert_eq!(observer.summary(0).over_time, over_time);

    cached(&observer, 3);
    assert_eq!(observer.counters(), counters);
    assert_eq!(observer.summary(0).over_time, over_time);
    assert_eq!(observer.query(2).unwrap().status, QueryStatus::Forwarded);

    // a forward after the replays must not find a cache charge to reverse on id 1
    observer
        .on_forwarded(ReplyFlags::IPV4, "tracker.example", &UPSTREAM, 1)
        .unwrap();
    assert_eq!(observer.counters(), counters);
    assert!(observer.read(|state| state.is_consistent()));
}

#[test]
fn test_gravity_and_wildcard_blocking() {
    let wildcards = Arc::new(WildcardList::from_domains(vec!["ads.example"]));
    let observer = observer().with_wildcards(wildcards);

    query(&observer, "tracker.example", "query[A]", 1);
    observer.on_cache_answer(
        ReplyFlags::HOSTS | ReplyFlags::IMMORTAL | ReplyFlags::IPV4,
        "tracker.example",
        Some(&[0, 0, 0, 0]),
        Some("/etc/pihole/gravity.list"),
        2,
        1,
    );

    query(&observer, "x.ads.example", "query[A]", 2);
    observer.on_reply(
        ReplyFlags::CONFIG | ReplyFlags::IPV4,
        "x.ads.example",
        Some(&[0, 0, 0, 0]),
        2,
        2,
    );

    let counters = observer.counters();
    assert_eq!(counters.blocked, 2);
    assert_eq!(counters.wildcard_blocked, 1);
    assert_eq!(observer.query(0).unwrap().status, QueryStatus::GravityBlocked);
    assert_eq!(observer.query(1).unwrap().status, QueryStatus::WildcardBlocked);
    assert!(observer.domain("x.ads.example").unwrap().is_wildcard);
    assert_eq!(observer.domain("tracker.example").unwrap().blocked_count, 1);
}

#[test]
fn test_maximum_privacy_redacts_everything() {
    let config = ObserverConfig {
        privacy_level: PrivacyLevel::Maximum,
        ..ObserverConfig::default()
    };
    let (observer, _) = observer_with(config);

    query(&observer, "secret.example", "query[A]", 1);
    query(&observer, "other.example", "query[A]", 2);

    let summary = observer.summary(10);
    assert_eq!(summary.domains_tracked, 1);
    assert_eq!(summary.top_domains[0].domain, "hidden");
    assert_eq!(summary.top_clients[0].client, "0.0.0.0");
    assert!(observer.query(0).unwrap().privacy_redacted);
}

#[test]
fn test_transient_id_reuse_targets_newest_record() {
    let observer = observer();

    query(&observer, "first.example", "query[A]", 42);
    observer
        .on_forwarded(ReplyFlags::IPV4, "first.example", &UPSTREAM, 42)
        .unwrap();
    query(&observer, "second.example", "query[A]", 42);
    observer.on_dnssec_result(DnssecStatus::CODE_SECURE, 42);

    assert_eq!(observer.query(1).unwrap().status, QueryStatus::Unknown);
    assert_eq!(
        observer.domain("second.example").unwrap().dnssec,
        DnssecStatus::Secure
    );
    assert_eq!(
        observer.domain("first.example").unwrap().dnssec,
        DnssecStatus::Unknown
    );
}

#[test]
fn test_queries_fall_into_time_buckets() {
    let (observer, clock) = observer_with(ObserverConfig::default());

    query(&observer, "a.example", "query[A]", 1);
    clock.advance(600);
    query(&observer, "b.example", "query[A]", 2);
    query(&observer, "c.example", "query[PTR]", 3);

    let summary = observer.summary(10);
    assert_eq!(summary.over_time.len(), 2);
    assert_eq!(summary.over_time[0].total, 1);
    assert_eq!(summary.over_time[1].total, 1);
    assert_eq!(summary.over_time[1].start - summary.over_time[0].start, 600);
    assert_eq!(summary.counters.query_types[5], 1);
}

#[test]
fn test_query_table_cap_is_resource_error() {
    let config = ObserverConfig {
        max_queries: Some(2),
        alloc_step: 1,
        ..ObserverConfig::default()
    };
    let (observer, _) = observer_with(config);

    query(&observer, "a.example", "query[A]", 1);
    query(&observer, "b.example", "query[A]", 2);
    let err = observer
        .on_query_observed(ReplyFlags::IPV4, "c.example", &CLIENT, "query[A]", 3)
        .unwrap_err();

    match err {
        ObserverError::Resource(e) => assert_eq!(e.table, TableKind::Queries),
        other => panic!("unexpected error {}", other),
    }
    assert_eq!(observer.counters().queries, 2);
    assert!(observer.read(|state| state.is_consistent()));
}

#[test]
fn test_replay_lines_drive_the_observer() {
    let (observer, clock) = observer_with(ObserverConfig::default());
    let capture = r#"
{"at":1600000000,"event":"query","name":"example.com","client":"10.0.0.5","query_type":"query[A]","id":1}
{"event":"forwarded","name":"example.com","server":"1.1.1.1","id":1}
{"event":"reply","name":"example.com","flags":["F_FORWARD"],"answer":"93.184.216.34","ttl":300,"id":1}
{"event":"hosts_loaded","path":"/etc/pihole/gravity.list","count":120000}
"#;

    for line in capture.lines().filter(|l| !l.trim().is_empty()) {
        let replay: ReplayLine = serde_json::from_str(line).unwrap();
        if let Some(at) = replay.at {
            clock.set(at);
        }
        observer.dispatch(&replay.event).unwrap();
    }

    let counters = observer.counters();
    assert_eq!(counters.forwarded, 1);
    assert_eq!(counters.reply_ip, 1);
    assert_eq!(counters.blocklist_entries, 120000);
    assert_eq!(
        observer.domain("example.com").unwrap().last_ipv4.as_deref(),
        Some("93.184.216.34")
    );
}
