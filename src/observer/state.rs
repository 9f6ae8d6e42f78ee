//! The owned aggregate state of the observer
//!
//! `ObserverState` holds every table the event handlers touch. It is never
//! shared directly; `DnsObserver` keeps it behind a single lock and lends it
//! out to readers through `DnsObserver::read`.

use serde_derive::Serialize;

use crate::observer::buckets::TimeBuckets;
use crate::observer::config::ObserverConfig;
use crate::observer::counters::GlobalCounters;
use crate::observer::domain::{classify_reply, is_literal_answer, DomainAggregate, ReplyKind};
use crate::observer::errors::Result;
use crate::observer::flags::ReplyFlags;
use crate::observer::intern::{ClientId, DomainId, ForwardId, IdentifierIndex};
use crate::observer::query::QueryTable;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientStats {
    pub query_count: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ForwardStats {
    /// Queries finalized as forwarded to this server
    pub forwarded_count: u64,
}

#[derive(Debug)]
pub struct ObserverState {
    pub(crate) config: ObserverConfig,
    pub(crate) index: IdentifierIndex,
    pub(crate) queries: QueryTable,
    pub(crate) domains: Vec<DomainAggregate>,
    pub(crate) clients: Vec<ClientStats>,
    pub(crate) forwards: Vec<ForwardStats>,
    pub(crate) buckets: TimeBuckets,
    pub(crate) counters: GlobalCounters,
}

impl ObserverState {
    pub fn new(config: ObserverConfig) -> ObserverState {
        let config = config.normalized();
        ObserverState {
            index: IdentifierIndex::new(&config),
            queries: QueryTable::new(config.alloc_step, config.max_queries),
            domains: Vec::new(),
            clients: Vec::new(),
            forwards: Vec::new(),
            buckets: TimeBuckets::new(config.bucket_width_secs),
            counters: GlobalCounters::default(),
            config,
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn counters(&self) -> &GlobalCounters {
        &self.counters
    }

    pub fn index(&self) -> &IdentifierIndex {
        &self.index
    }

    pub fn queries(&self) -> &QueryTable {
        &self.queries
    }

    pub fn buckets(&self) -> &TimeBuckets {
        &self.buckets
    }

    pub fn domain(&self, id: DomainId) -> Option<&DomainAggregate> {
        self.domains.get(id.0)
    }

    pub fn domain_by_name(&self, name: &str) -> Option<&DomainAggregate> {
        self.index.find_domain(name).and_then(|id| self.domain(id))
    }

    pub fn client(&self, id: ClientId) -> Option<&ClientStats> {
        self.clients.get(id.0)
    }

    pub fn forward(&self, id: ForwardId) -> Option<&ForwardStats> {
        self.forwards.get(id.0)
    }

    pub fn domains(&self) -> impl Iterator<Item = (DomainId, &DomainAggregate)> {
        self.domains.iter().enumerate().map(|(i, d)| (DomainId(i), d))
    }

    pub fn clients(&self) -> impl Iterator<Item = (ClientId, &ClientStats)> {
        self.clients.iter().enumerate().map(|(i, c)| (ClientId(i), c))
    }

    pub fn forwards(&self) -> impl Iterator<Item = (ForwardId, &ForwardStats)> {
        self.forwards.iter().enumerate().map(|(i, f)| (ForwardId(i), f))
    }

    /// `unknown + completed == queries` must hold between events
    pub fn is_consistent(&self) -> bool {
        let completed = self.queries.completed_count() as u64;
        self.counters.unknown + completed == self.counters.queries
            && self.queries.len() as u64 == self.counters.queries
    }

    pub(crate) fn intern_domain(&mut self, name: &str) -> Result<DomainId> {
        let (id, created) = self.index.intern_domain(name)?;
        if created {
            self.domains.push(DomainAggregate::new());
        }
        Ok(id)
    }

    pub(crate) fn intern_client(&mut self, addr: &str) -> Result<ClientId> {
        let (id, created) = self.index.intern_client(addr)?;
        if created {
            self.clients.push(ClientStats::default());
        }
        Ok(id)
    }

    pub(crate) fn intern_forward(&mut self, addr: &str) -> Result<Option<ForwardId>> {
        let interned = self.index.intern_forward(addr, true)?;
        if let Some((_, true)) = interned {
            self.forwards.push(ForwardStats::default());
        }
        Ok(interned.map(|(id, _)| id))
    }

    /// Records the reply classification and literal answer of a query
    ///
    /// The domain always remembers the latest classification; the global reply
    /// counters count each record once. The answer is stored only for positive,
    /// non-alias replies and, when `require_name_match` is set, only if the
    /// reply is for the record's own domain.
    pub(crate) fn save_reply(
        &mut self,
        slot: usize,
        flags: ReplyFlags,
        name: &str,
        answer: Option<&str>,
        require_name_match: bool,
    ) {
        let kind = classify_reply(flags);
        let (domain_id, reply_slot, first_reply) = match self.queries.get_mut(slot) {
            Some(record) => {
                let first = record.reply == ReplyKind::Unknown;
                if first {
                    record.reply = kind;
                }
                (record.domain, record.query_type.reply_slot(), first)
            }
            None => return,
        };

        if first_reply {
            self.counters.count_reply(kind);
        }

        let name_matches = !require_name_match
            || self
                .index
                .domain_name(domain_id)
                .map_or(false, |domain| domain.eq_ignore_ascii_case(name));

        if let Some(domain) = self.domains.get_mut(domain_id.0) {
            domain.reply[reply_slot] = kind;

            if let Some(answer) = answer {
                if is_literal_answer(flags) && name_matches {
                    domain.store_answer(reply_slot, answer);
                }
            }
        }
    }
}
