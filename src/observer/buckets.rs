//! Fixed-width time buckets
//!
//! Buckets are aligned to multiples of the configured width since the unix
//! epoch and are contiguous from the first bucket ever observed. A timestamp
//! past the newest bucket appends every bucket up to and including it; a
//! timestamp before the oldest bucket is clamped to the oldest one.

use std::collections::HashMap;

use serde_derive::Serialize;

use crate::observer::intern::ClientId;
use crate::observer::query_type::QueryType;

/// Counters for one time window; additive only
#[derive(Debug, Clone, Serialize)]
pub struct TimeBucket {
    /// Window start (unix seconds)
    pub start: i64,
    pub total: u64,
    pub blocked: u64,
    pub cached: u64,
    pub clients: HashMap<ClientId, u64>,
    pub query_types: [u64; QueryType::COUNT],
}

impl TimeBucket {
    fn new(start: i64) -> TimeBucket {
        TimeBucket {
            start,
            total: 0,
            blocked: 0,
            cached: 0,
            clients: HashMap::new(),
            query_types: [0; QueryType::COUNT],
        }
    }
}

/// Largest forward jump, in windows, accepted from one timestamp to the next
pub const MAX_BUCKET_GAP: i64 = 1 << 16;

#[derive(Debug)]
pub struct TimeBuckets {
    width: i64,
    buckets: Vec<TimeBucket>,
}

impl TimeBuckets {
    pub fn new(width_secs: u64) -> TimeBuckets {
        TimeBuckets {
            width: width_secs.max(1) as i64,
            buckets: Vec::new(),
        }
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    /// Index of the bucket covering `timestamp`, extending the sequence forward
    ///
    /// A jump more than `MAX_BUCKET_GAP` windows past the newest bucket is
    /// treated as a bad clock and lands in the newest bucket.
    pub fn bucket_for(&mut self, timestamp: i64) -> usize {
        let start = timestamp.checked_sub(timestamp.rem_euclid(self.width));

        let first = match (self.buckets.first(), start) {
            (Some(bucket), _) => bucket.start,
            (None, Some(start)) => {
                self.buckets.push(TimeBucket::new(start));
                return 0;
            }
            (None, None) => {
                log::warn!("Timestamp {} cannot be aligned to a bucket", timestamp);
                return 0;
            }
        };

        let start = match start {
            Some(start) if start >= first => start,
            _ => return 0,
        };

        let newest = self.buckets.len() - 1;
        let offset = start
            .checked_sub(first)
            .and_then(|delta| delta.checked_div(self.width))
            .unwrap_or(i64::MAX);
        if offset - newest as i64 > MAX_BUCKET_GAP {
            log::warn!(
                "Timestamp {} is {} buckets past the newest bucket, counting it in the newest",
                timestamp,
                offset - newest as i64
            );
            return newest;
        }

        let idx = offset as usize;
        while self.buckets.len() <= idx {
            let next = first + self.buckets.len() as i64 * self.width;
            self.buckets.push(TimeBucket::new(next));
        }
        idx
    }

    pub fn get(&self, idx: usize) -> Option<&TimeBucket> {
        self.buckets.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut TimeBucket> {
        self.buckets.get_mut(idx)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeBucket> {
        self.buckets.iter()
    }
}
