//! Query records
//!
//! Records are appended in arrival order and never removed. The resolver's
//! transient id is only unique among in-flight queries, so the table keeps an
//! index from transient id to the most recently created record carrying it;
//! older records with a recycled id are never matched again.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use serde_derive::Serialize;

use crate::observer::domain::ReplyKind;
use crate::observer::errors::{Result, TableKind};
use crate::observer::intern::{ClientId, DomainId, ForwardId};
use crate::observer::query_type::QueryType;
use crate::observer::table::SlotTable;

/// Disposition of a query record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueryStatus {
    Unknown,
    Forwarded,
    Cache,
    GravityBlocked,
    BlacklistBlocked,
    WildcardBlocked,
}

impl QueryStatus {
    pub fn is_blocked(self) -> bool {
        matches!(
            self,
            QueryStatus::GravityBlocked | QueryStatus::BlacklistBlocked | QueryStatus::WildcardBlocked
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    pub slot_id: usize,
    pub transient_id: i32,
    pub query_type: QueryType,
    pub status: QueryStatus,
    pub domain: DomainId,
    pub client: ClientId,
    /// Time bucket at creation
    pub bucket: usize,
    /// Creation time (unix seconds)
    pub timestamp: i64,
    pub complete: bool,
    /// Status the disposition counters were charged under; `Unknown` until complete
    pub counted_as: QueryStatus,
    pub forward: Option<ForwardId>,
    pub ttl: u64,
    /// First reply classification seen for this record
    pub reply: ReplyKind,
    pub privacy_redacted: bool,
}

#[derive(Debug)]
pub struct QueryTable {
    records: SlotTable<QueryRecord>,
    latest: HashMap<i32, usize>,
}

impl QueryTable {
    pub fn new(step: usize, limit: Option<usize>) -> QueryTable {
        QueryTable {
            records: SlotTable::new(TableKind::Queries, step, limit),
            latest: HashMap::new(),
        }
    }

    /// Makes sure the next `insert` cannot fail
    pub fn reserve_slot(&mut self) -> Result<()> {
        self.records.ensure_room()
    }

    /// Next slot id to be handed out
    pub fn next_slot(&self) -> usize {
        self.records.len()
    }

    pub fn insert(&mut self, record: QueryRecord) -> Result<usize> {
        let transient_id = record.transient_id;
        let slot = self.records.push(record)?;
        self.latest.insert(transient_id, slot);
        Ok(slot)
    }

    /// Most recent record created with `transient_id`
    pub fn find_latest(&self, transient_id: i32) -> Option<usize> {
        self.latest.get(&transient_id).copied()
    }

    pub fn get(&self, slot: usize) -> Option<&QueryRecord> {
        self.records.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut QueryRecord> {
        self.records.get_mut(slot)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryRecord> {
        self.records.iter()
    }

    pub fn completed_count(&self) -> usize {
        self.records.iter().filter(|r| r.complete).count()
    }
}

impl Index<usize> for QueryTable {
    type Output = QueryRecord;

    fn index(&self, slot: usize) -> &QueryRecord {
        &self.records[slot]
    }
}

impl IndexMut<usize> for QueryTable {
    fn index_mut(&mut self, slot: usize) -> &mut QueryRecord {
        &mut self.records[slot]
    }
}
