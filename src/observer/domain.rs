//! Per-domain aggregates and reply classification

use serde_derive::Serialize;

use crate::observer::flags::ReplyFlags;

/// DNSSEC validation outcome, last write wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DnssecStatus {
    Unknown,
    Secure,
    Insecure,
    Bogus,
}

impl DnssecStatus {
    /// Resolver code for a validated answer
    pub const CODE_SECURE: i32 = 0x10000;
    /// Resolver code for an answer from an unsigned zone
    pub const CODE_INSECURE: i32 = 0x20000;
    /// Resolver code for a failed validation
    pub const CODE_BOGUS: i32 = 0x30000;

    /// Maps a resolver status code; anything not secure or insecure is bogus
    pub fn from_code(code: i32) -> DnssecStatus {
        match code {
            Self::CODE_SECURE => DnssecStatus::Secure,
            Self::CODE_INSECURE => DnssecStatus::Insecure,
            _ => DnssecStatus::Bogus,
        }
    }
}

impl Default for DnssecStatus {
    fn default() -> Self {
        DnssecStatus::Unknown
    }
}

/// Classification of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReplyKind {
    Unknown,
    NxDomain,
    NoData,
    Cname,
    Ip,
}

impl Default for ReplyKind {
    fn default() -> Self {
        ReplyKind::Unknown
    }
}

/// Classifies a reply from its flags
pub fn classify_reply(flags: ReplyFlags) -> ReplyKind {
    if flags.contains(ReplyFlags::NEG) {
        if flags.contains(ReplyFlags::NXDOMAIN) {
            ReplyKind::NxDomain
        } else {
            ReplyKind::NoData
        }
    } else if flags.contains(ReplyFlags::CNAME) {
        ReplyKind::Cname
    } else {
        ReplyKind::Ip
    }
}

/// True if the reply carries a literal address worth remembering
pub fn is_literal_answer(flags: ReplyFlags) -> bool {
    !flags.intersects(ReplyFlags::NEG | ReplyFlags::CNAME)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DomainAggregate {
    /// Records created for this domain
    pub query_count: u64,
    pub blocked_count: u64,
    /// Set once a wildcard block is observed, never cleared
    pub is_wildcard: bool,
    pub last_ipv4: Option<String>,
    pub last_ipv6: Option<String>,
    pub dnssec: DnssecStatus,
    /// Last reply classification for A (0) and AAAA (1)
    pub reply: [ReplyKind; 2],
}

impl DomainAggregate {
    pub fn new() -> DomainAggregate {
        DomainAggregate::default()
    }

    /// Replaces the stored answer for the given reply slot
    pub fn store_answer(&mut self, slot: usize, answer: &str) {
        let target = if slot == 0 {
            &mut self.last_ipv4
        } else {
            &mut self.last_ipv6
        };

        if target.as_deref() != Some(answer) {
            *target = Some(answer.to_string());
        }
    }
}
