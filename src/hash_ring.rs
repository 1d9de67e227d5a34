//! Consistent-hash pool (Module F): deterministic key → client-list-index
//! routing over a fixed host array.

use crate::utils::crc16;

/// A virtual-node hash ring over `0..host_count` indices. Deterministic
/// and independent of host liveness — callers fall back to
/// [`crate::client_list::ClientList::get_available`] when the routed
/// index turns out to be down.
pub struct HashRing {
    host_count: usize,
    virtual_nodes_per_host: u32,
    ring: Vec<(u32, usize)>, // (hash, host index), sorted by hash
}

const DEFAULT_VIRTUAL_NODES: u32 = 160;

impl HashRing {
    pub fn new(host_count: usize) -> Self {
        Self::with_virtual_nodes(host_count, DEFAULT_VIRTUAL_NODES)
    }

    pub fn with_virtual_nodes(host_count: usize, virtual_nodes_per_host: u32) -> Self {
        let mut ring = Vec::with_capacity(host_count * virtual_nodes_per_host as usize);
        for host_index in 0..host_count {
            for v in 0..virtual_nodes_per_host {
                let label = format!("host-{host_index}#{v}");
                let hash = ring_hash(label.as_bytes());
                ring.push((hash, host_index));
            }
        }
        ring.sort_unstable_by_key(|(h, _)| *h);
        Self { host_count, virtual_nodes_per_host, ring }
    }

    pub fn host_count(&self) -> usize {
        self.host_count
    }

    /// Route `key` to a client-list index. Deterministic for a fixed ring.
    pub fn index_for(&self, key: &str) -> Option<usize> {
        if self.ring.is_empty() {
            return None;
        }
        let hash = ring_hash(key.as_bytes());
        let pos = self.ring.partition_point(|(h, _)| *h < hash);
        let (_, index) = self.ring[pos % self.ring.len()];
        Some(index)
    }
}

/// CRC-16 gives a cheap, already-imported 16-bit hash; fold two
/// differently-salted passes together for a wider, better-distributed
/// ring coordinate than 16 bits alone would give.
fn ring_hash(data: &[u8]) -> u32 {
    let lo = crc16(data) as u32;
    let mut salted = Vec::with_capacity(data.len() + 1);
    salted.push(0xA5u8);
    salted.extend_from_slice(data);
    let hi = crc16(&salted) as u32;
    (hi << 16) | lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn routing_is_deterministic() {
        let ring = HashRing::new(4);
        let a = ring.index_for("some-key");
        let b = ring.index_for("some-key");
        assert_eq!(a, b);
    }

    #[test]
    fn all_hosts_reachable_with_enough_keys() {
        let ring = HashRing::new(4);
        let mut seen = HashMap::new();
        for i in 0..2000 {
            let key = format!("key-{i}");
            if let Some(idx) = ring.index_for(&key) {
                *seen.entry(idx).or_insert(0) += 1;
            }
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn empty_ring_routes_nowhere() {
        let ring = HashRing::new(0);
        assert_eq!(ring.index_for("x"), None);
    }

    #[test]
    fn single_host_always_wins() {
        let ring = HashRing::new(1);
        for i in 0..100 {
            assert_eq!(ring.index_for(&format!("k{i}")), Some(0));
        }
    }
}
