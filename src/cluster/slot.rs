//! Hash-slot computation for Redis Cluster (Module H).

use crate::utils::{crc16, extract_hash_tag};

pub const SLOT_COUNT: u16 = 16384;

/// `crc16(key-tag) mod 16384`, matching Redis Cluster's key-to-slot rule.
pub fn key_slot(key: &str) -> u16 {
    let tag = extract_hash_tag(key);
    crc16(tag.as_bytes()) % SLOT_COUNT
}
