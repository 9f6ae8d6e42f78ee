//! Query type labels reported by the resolver

use serde_derive::{Deserialize, Serialize};

/// `QueryType` is the record type of an observed query
///
/// The resolver reports types as log labels such as `query[AAAA]`. Only the
/// types listed here are counted; A and AAAA additionally get a full query
/// record. Use `from_label` to parse a label and `index` for the dense
/// position in per-type counter arrays.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy, Serialize, Deserialize)]
pub enum QueryType {
    A,
    Aaaa,
    Any,
    Srv,
    Soa,
    Ptr,
    Txt,
}

impl QueryType {
    /// Number of counted query types
    pub const COUNT: usize = 7;

    pub const ALL: [QueryType; QueryType::COUNT] = [
        QueryType::A,
        QueryType::Aaaa,
        QueryType::Any,
        QueryType::Srv,
        QueryType::Soa,
        QueryType::Ptr,
        QueryType::Txt,
    ];

    /// Parses `query[A]`-style labels; the bare type name is accepted as well
    pub fn from_label(label: &str) -> Option<QueryType> {
        let label = label.trim();
        let name = label
            .strip_prefix("query[")
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(label);

        match name {
            "A" => Some(QueryType::A),
            "AAAA" => Some(QueryType::Aaaa),
            "ANY" => Some(QueryType::Any),
            "SRV" => Some(QueryType::Srv),
            "SOA" => Some(QueryType::Soa),
            "PTR" => Some(QueryType::Ptr),
            "TXT" => Some(QueryType::Txt),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            QueryType::A => 0,
            QueryType::Aaaa => 1,
            QueryType::Any => 2,
            QueryType::Srv => 3,
            QueryType::Soa => 4,
            QueryType::Ptr => 5,
            QueryType::Txt => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QueryType::A => "A",
            QueryType::Aaaa => "AAAA",
            QueryType::Any => "ANY",
            QueryType::Srv => "SRV",
            QueryType::Soa => "SOA",
            QueryType::Ptr => "PTR",
            QueryType::Txt => "TXT",
        }
    }

    /// Only address queries become query records
    pub fn is_tracked(self) -> bool {
        matches!(self, QueryType::A | QueryType::Aaaa)
    }

    /// Per-domain reply slot: 0 for A, 1 for AAAA
    pub fn reply_slot(self) -> usize {
        match self {
            QueryType::A => 0,
            _ => 1,
        }
    }
}
