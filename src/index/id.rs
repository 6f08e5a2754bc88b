//! Creation-ordered record identifiers
//!
//! A `RecordId` is a 12-byte identifier with an embedded creation
//! timestamp: 4 bytes of big-endian unix seconds, 5 bytes of per-process
//! random, 3 bytes of big-endian counter. Byte order equals creation
//! order, which is what makes "everything since time T" a simple range
//! scan: the threshold is the smallest id whose embedded timestamp is >= T.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 12-byte identifier, creation-ordered, rendered as 24 hex chars
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId([u8; 12]);

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn process_random() -> &'static [u8; 5] {
    static RANDOM: OnceLock<[u8; 5]> = OnceLock::new();
    RANDOM.get_or_init(|| {
        // Mixed from the clock and pid; uniqueness only has to hold per
        // process, ordering comes from the timestamp prefix.
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64)
            .unwrap_or(0);
        let seed = nanos
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(u64::from(std::process::id()));
        let bytes = seed.to_be_bytes();
        [bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
    })
}

impl RecordId {
    /// The all-zero sentinel, smaller than every generated id
    pub const ZERO: RecordId = RecordId([0; 12]);

    /// Generate a fresh id stamped with the current time
    #[must_use]
    pub fn generate() -> Self {
        let secs = Utc::now().timestamp().max(0) as u32;
        Self::build(secs, COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Generate a fresh id stamped with an explicit time
    ///
    /// Used by rebuild tasks so an article's id carries its content item's
    /// creation time, not the rebuild time.
    #[must_use]
    pub fn generate_at(ts: DateTime<Utc>) -> Self {
        let secs = ts.timestamp().max(0) as u32;
        Self::build(secs, COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Threshold id for "since time T" scans: timestamp prefix, zero tail
    #[must_use]
    pub fn from_timestamp(ts: DateTime<Utc>) -> Self {
        let secs = ts.timestamp().max(0) as u32;
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        Self(bytes)
    }

    fn build(secs: u32, counter: u32) -> Self {
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(process_random());
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// The embedded creation time, truncated to whole seconds
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        let secs = u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        DateTime::from_timestamp(i64::from(secs), 0).unwrap_or_default()
    }

    /// Parse 24 lowercase/uppercase hex chars
    #[must_use]
    pub fn parse(hex_str: &str) -> Option<Self> {
        if hex_str.len() != 24 {
            return None;
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(hex_str, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// Render as 24 lowercase hex chars
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.to_hex())
    }
}
