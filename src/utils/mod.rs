//! Small stateless helpers shared across the client layers.
use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a unique id for log/trace correlation (not used for lock
/// tokens — see [`generate_lock_token`] for those).
pub fn generate_id(prefix: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();
    let random: u32 = rand::random();
    format!("{prefix}-{timestamp}-{random:x}")
}

/// Fresh lock-authority token. A UUIDv4 per the distributed-lock data
/// model, rather than the timestamp+rand scheme [`generate_id`] uses.
pub fn generate_lock_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0), the variant Redis Cluster uses
/// for hash-slot assignment.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Extract the `{tag}` substring of a key for hash-slot co-location.
/// Falls back to the whole key when there's no `{`/`}` pair, or the pair
/// is empty (`{}`).
pub fn extract_hash_tag(key: &str) -> &str {
    if let Some(start) = key.find('{') {
        if let Some(end_rel) = key[start + 1..].find('}') {
            let end = start + 1 + end_rel;
            if end > start + 1 {
                return &key[start + 1..end];
            }
        }
    }
    key
}

pub fn parse_socket_addr(addr: &str) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
    addr.parse()
}

pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }
    if unit_index == 0 {
        format!("{bytes} {}", UNITS[unit_index])
    } else {
        format!("{size:.2} {}", UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_matches_redis_test_vectors() {
        assert_eq!(crc16(b"123456789"), 12739);
        assert_eq!(crc16(b"foo"), 44950);
    }

    #[test]
    fn hash_tag_extraction() {
        assert_eq!(extract_hash_tag("foo{bar}baz"), "bar");
        assert_eq!(extract_hash_tag("no_tag"), "no_tag");
        assert_eq!(extract_hash_tag("empty{}tag"), "empty{}tag");
        assert_eq!(extract_hash_tag("{user1000}.following"), "user1000");
    }

    #[test]
    fn format_duration_buckets() {
        use std::time::Duration;
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h1m1s");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generate_id("t"), generate_id("t"));
    }

    #[test]
    fn lock_tokens_are_unique_uuids() {
        let a = generate_lock_token();
        let b = generate_lock_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
