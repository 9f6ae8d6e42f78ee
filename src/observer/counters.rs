//! Process-wide running totals

use serde_derive::Serialize;

use crate::observer::domain::ReplyKind;
use crate::observer::query_type::QueryType;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalCounters {
    /// Query records created
    pub queries: u64,
    /// Records finalized as blocked (all blocklist categories)
    pub blocked: u64,
    /// Subset of `blocked` caused by wildcard rules
    pub wildcard_blocked: u64,
    pub cached: u64,
    pub forwarded: u64,
    /// Records without a final disposition yet
    pub unknown: u64,
    pub reply_nxdomain: u64,
    pub reply_nodata: u64,
    pub reply_cname: u64,
    pub reply_ip: u64,
    /// Observed queries per type, including untracked types
    pub query_types: [u64; QueryType::COUNT],
    /// Entries loaded from the blocklist files since the last reload
    pub blocklist_entries: u64,
}

impl GlobalCounters {
    pub fn count_reply(&mut self, kind: ReplyKind) {
        match kind {
            ReplyKind::NxDomain => self.reply_nxdomain += 1,
            ReplyKind::NoData => self.reply_nodata += 1,
            ReplyKind::Cname => self.reply_cname += 1,
            ReplyKind::Ip => self.reply_ip += 1,
            ReplyKind::Unknown => {}
        }
    }

    pub fn query_type(&self, qtype: QueryType) -> u64 {
        self.query_types[qtype.index()]
    }

    /// Records with a final disposition
    pub fn completed(&self) -> u64 {
        self.queries.saturating_sub(self.unknown)
    }

    pub fn blocked_percentage(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            (self.blocked as f64 / self.queries as f64) * 100.0
        }
    }
}
