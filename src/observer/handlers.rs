//! Per-event state machine
//!
//! A query record starts `Unknown` and incomplete. The first event that
//! settles its disposition (forward, cache answer, local configuration reply)
//! completes it and moves it out of the `unknown` counter exactly once.
//! Late events on a completed record may still rewrite its status, but never
//! its counters. The exception is a record answered from cache that is then
//! forwarded: its cache accounting is reversed and it is re-finalized as
//! forwarded in the same call.
//!
//! Handlers assume the caller holds the observer lock.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::observer::collaborators::StatusDetector;
use crate::observer::config::{PrivacyLevel, HIDDEN_CLIENT, HIDDEN_DOMAIN};
use crate::observer::domain::{DnssecStatus, ReplyKind};
use crate::observer::errors::Result;
use crate::observer::flags::ReplyFlags;
use crate::observer::query::{QueryRecord, QueryStatus};
use crate::observer::query_type::QueryType;
use crate::observer::state::ObserverState;

/// Renders raw address bytes; `IPV4` selects the 4-byte form
pub(crate) fn render_address(flags: ReplyFlags, bytes: &[u8]) -> Option<String> {
    let addr = if flags.contains(ReplyFlags::IPV4) || bytes.len() == 4 {
        if bytes.len() < 4 {
            return None;
        }
        IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
    } else {
        if bytes.len() < 16 {
            return None;
        }
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&bytes[..16]);
        IpAddr::V6(Ipv6Addr::from(octets))
    };

    Some(addr.to_string())
}

impl ObserverState {
    pub(crate) fn query_observed(
        &mut self,
        flags: ReplyFlags,
        name: &str,
        addr: &[u8],
        type_label: &str,
        transient_id: i32,
        now: i64,
        privacy: PrivacyLevel,
    ) -> Result<()> {
        let qtype = QueryType::from_label(type_label);

        if qtype == Some(QueryType::Aaaa) && !self.config.analyze_aaaa {
            log::debug!("Not analyzing AAAA query for {} (ID {})", name, transient_id);
            return Ok(());
        }

        let mut domain = name.to_lowercase();
        if domain == self.config.sentinel_hostname {
            return Ok(());
        }

        let qtype = match qtype {
            Some(qtype) => qtype,
            None => {
                log::debug!(
                    "Skipping unknown query type: {} (ID {})",
                    type_label,
                    transient_id
                );
                return Ok(());
            }
        };

        if qtype.is_tracked() {
            self.queries.reserve_slot()?;
        }

        let bucket = self.buckets.bucket_for(now);
        if let Some(b) = self.buckets.get_mut(bucket) {
            b.query_types[qtype.index()] += 1;
        }
        self.counters.query_types[qtype.index()] += 1;

        if !qtype.is_tracked() {
            log::debug!("Counted {} query for {} (ID {})", qtype.name(), domain, transient_id);
            return Ok(());
        }

        // Redact before anything is interned so raw names never reach the tables
        if privacy >= PrivacyLevel::HideDomains {
            domain = HIDDEN_DOMAIN.to_string();
        }
        let client = if privacy >= PrivacyLevel::HideDomainsClients {
            HIDDEN_CLIENT.to_string()
        } else {
            render_address(flags, addr).unwrap_or_default()
        };

        log::debug!(
            "**** new query {} {} {} (ID {})",
            qtype.name(),
            domain,
            client,
            transient_id
        );

        let domain_id = self.intern_domain(&domain)?;
        let client_id = self.intern_client(&client)?;

        let slot = self.queries.next_slot();
        self.queries.insert(QueryRecord {
            slot_id: slot,
            transient_id,
            query_type: qtype,
            status: QueryStatus::Unknown,
            domain: domain_id,
            client: client_id,
            bucket,
            timestamp: now,
            complete: false,
            counted_as: QueryStatus::Unknown,
            forward: None,
            ttl: 0,
            reply: ReplyKind::Unknown,
            privacy_redacted: privacy == PrivacyLevel::Maximum,
        })?;

        self.counters.queries += 1;
        self.counters.unknown += 1;

        if let Some(b) = self.buckets.get_mut(bucket) {
            b.total += 1;
            *b.clients.entry(client_id).or_insert(0) += 1;
        }
        self.domains[domain_id.0].query_count += 1;
        self.clients[client_id.0].query_count += 1;

        Ok(())
    }

    pub(crate) fn forwarded(
        &mut self,
        flags: ReplyFlags,
        name: &str,
        addr: &[u8],
        transient_id: i32,
    ) -> Result<()> {
        let upstream = render_address(flags, addr).map(|a| a.to_lowercase());
        log::debug!(
            "**** forwarded {} to {} (ID {})",
            name,
            upstream.as_deref().unwrap_or("?"),
            transient_id
        );

        // Unmatched ids belong to queries we never track (PTR, sentinel, ...)
        let slot = match self.queries.find_latest(transient_id) {
            Some(slot) => slot,
            None => return Ok(()),
        };

        let forward = match upstream {
            Some(ref upstream) => self.intern_forward(upstream)?,
            None => None,
        };

        let record = &mut self.queries[slot];

        // Answered from cache first (e.g. a CNAME), now the target has to be
        // asked upstream: undo the cache accounting and count it again below.
        // A status rewritten to `Cache` by a late local reply was never
        // charged to `cached`, so only the counted disposition is reversed.
        if record.complete && record.counted_as == QueryStatus::Cache {
            record.complete = false;
            record.counted_as = QueryStatus::Unknown;
            let bucket = record.bucket;
            self.counters.cached = self.counters.cached.saturating_sub(1);
            self.counters.unknown += 1;
            if let Some(b) = self.buckets.get_mut(bucket) {
                b.cached = b.cached.saturating_sub(1);
            }
        }

        let record = &mut self.queries[slot];
        record.status = QueryStatus::Forwarded;
        if forward.is_some() {
            record.forward = forward;
        }

        if !record.complete {
            record.complete = true;
            record.counted_as = QueryStatus::Forwarded;
            self.counters.unknown = self.counters.unknown.saturating_sub(1);
            self.counters.forwarded += 1;
            if let Some(id) = forward {
                self.forwards[id.0].forwarded_count += 1;
            }
        }

        Ok(())
    }

    pub(crate) fn cache_answer(
        &mut self,
        flags: ReplyFlags,
        name: &str,
        answer: Option<&str>,
        source: Option<&str>,
        ttl: u64,
        transient_id: i32,
    ) {
        if name.to_lowercase() == self.config.sentinel_hostname {
            return;
        }

        log::debug!(
            "**** got cache answer for {} / {} / {} (TTL {}, ID {}) {:?}",
            name,
            answer.unwrap_or(""),
            source.unwrap_or(""),
            ttl,
            transient_id,
            flags
        );

        let status = match self.classify_cache_answer(flags, source) {
            Some(status) => status,
            None => {
                log::warn!("Unknown cache reply for {} (ID {}): {:?}", name, transient_id, flags);
                return;
            }
        };

        let slot = match self.queries.find_latest(transient_id) {
            Some(slot) => slot,
            None => return,
        };

        let record = &mut self.queries[slot];
        if record.complete {
            log::debug!("Query {} already complete, ignoring cache answer", slot);
            return;
        }

        record.status = status;
        record.ttl = ttl;
        record.complete = true;
        record.counted_as = status;
        let (bucket, domain_id) = (record.bucket, record.domain);

        self.counters.unknown = self.counters.unknown.saturating_sub(1);
        if status.is_blocked() {
            self.counters.blocked += 1;
            self.domains[domain_id.0].blocked_count += 1;
            if let Some(b) = self.buckets.get_mut(bucket) {
                b.blocked += 1;
            }
        } else {
            self.counters.cached += 1;
            if let Some(b) = self.buckets.get_mut(bucket) {
                b.cached += 1;
            }
        }

        self.save_reply(slot, flags, name, answer, true);
    }

    /// Status of a cache answer, `None` for flag combinations we don't know
    fn classify_cache_answer(&self, flags: ReplyFlags, source: Option<&str>) -> Option<QueryStatus> {
        let hosts = flags.contains(ReplyFlags::HOSTS | ReplyFlags::IMMORTAL);
        let dhcp = flags.contains(ReplyFlags::NAMEP | ReplyFlags::DHCP);
        let forward = flags.contains(ReplyFlags::FORWARD);

        if !(hosts || dhcp || forward) {
            return None;
        }

        if flags.contains(ReplyFlags::HOSTS) {
            // gravity.list, black.list, local.list, /etc/hosts and friends
            let source = source.unwrap_or("");
            if source.contains(&self.config.gravity_marker) {
                Some(QueryStatus::GravityBlocked)
            } else if source.contains(&self.config.blacklist_marker) {
                Some(QueryStatus::BlacklistBlocked)
            } else {
                Some(QueryStatus::Cache)
            }
        } else {
            // DHCP lease name or cached answer to an earlier forward
            Some(QueryStatus::Cache)
        }
    }

    pub(crate) fn reply(
        &mut self,
        flags: ReplyFlags,
        name: &str,
        answer: Option<&str>,
        ttl: u64,
        transient_id: i32,
        detector: &dyn StatusDetector,
    ) {
        log::debug!(
            "**** got reply {} is {} (TTL {}, ID {}) {:?}",
            name,
            describe_answer(flags, answer),
            ttl,
            transient_id,
            flags
        );

        if flags.contains(ReplyFlags::CONFIG) {
            self.config_reply(flags, name, answer, ttl, transient_id, detector);
        } else if flags.contains(ReplyFlags::FORWARD) {
            self.upstream_reply(flags, name, answer, ttl, transient_id);
        } else {
            log::warn!("Unknown reply for {} (ID {}): {:?}", name, transient_id, flags);
        }
    }

    /// Answered from local configuration: wildcard rule or user-provided entry
    fn config_reply(
        &mut self,
        flags: ReplyFlags,
        name: &str,
        answer: Option<&str>,
        ttl: u64,
        transient_id: i32,
        detector: &dyn StatusDetector,
    ) {
        let slot = match self.queries.find_latest(transient_id) {
            Some(slot) => slot,
            None => return,
        };

        let domain_id = self.queries[slot].domain;
        let status = match self.index.domain_name(domain_id) {
            Some(domain) => detector.detect(domain),
            None => return,
        };

        let record = &mut self.queries[slot];
        record.status = status;
        if record.complete {
            return;
        }

        record.ttl = ttl;
        record.complete = true;
        record.counted_as = status;
        let bucket = record.bucket;

        self.counters.unknown = self.counters.unknown.saturating_sub(1);
        if status.is_blocked() {
            self.counters.blocked += 1;
            let domain = &mut self.domains[domain_id.0];
            domain.blocked_count += 1;
            if status == QueryStatus::WildcardBlocked {
                self.counters.wildcard_blocked += 1;
                domain.is_wildcard = true;
            }
            if let Some(b) = self.buckets.get_mut(bucket) {
                b.blocked += 1;
            }
        } else if status == QueryStatus::Cache {
            self.counters.cached += 1;
            if let Some(b) = self.buckets.get_mut(bucket) {
                b.cached += 1;
            }
        }

        self.save_reply(slot, flags, name, answer, true);
    }

    /// Reply from upstream; the query was already counted when it was forwarded
    fn upstream_reply(
        &mut self,
        flags: ReplyFlags,
        name: &str,
        answer: Option<&str>,
        ttl: u64,
        transient_id: i32,
    ) {
        let slot = match self.queries.find_latest(transient_id) {
            Some(slot) => slot,
            None => return,
        };

        let domain_id = self.queries[slot].domain;
        let matches = self
            .index
            .domain_name(domain_id)
            .map_or(false, |domain| domain.eq_ignore_ascii_case(name));
        if !matches {
            return;
        }

        self.save_reply(slot, flags, name, answer, false);
        self.queries[slot].ttl = ttl;
    }

    pub(crate) fn dnssec_result(&mut self, status_code: i32, transient_id: i32) {
        let slot = match self.queries.find_latest(transient_id) {
            Some(slot) => slot,
            None => return,
        };

        let domain_id = self.queries[slot].domain;
        let status = DnssecStatus::from_code(status_code);
        log::debug!(
            "**** got DNSSEC details for {}: {:?} (ID {})",
            self.index.domain_name(domain_id).unwrap_or("?"),
            status,
            transient_id
        );

        if let Some(domain) = self.domains.get_mut(domain_id.0) {
            domain.dnssec = status;
        }
    }

    pub(crate) fn hosts_file_loaded(&mut self, path: Option<&str>, count: u64) {
        match path {
            Some(path) if self.config.is_blocklist_source(path) => {
                self.counters.blocklist_entries += count;
                log::debug!("Counted {} blocklist entries from {}", count, path);
            }
            _ => {}
        }
    }
}

fn describe_answer<'a>(flags: ReplyFlags, answer: Option<&'a str>) -> &'a str {
    if flags.contains(ReplyFlags::CNAME) {
        "(CNAME)"
    } else if flags.contains(ReplyFlags::NEG | ReplyFlags::NXDOMAIN) {
        "(NXDOMAIN)"
    } else if flags.contains(ReplyFlags::NEG) {
        "(NODATA)"
    } else {
        answer.unwrap_or("")
    }
}
