//! Parsing of `MOVED`/`ASK` redirection errors (part of Module I/J).

use crate::resp::RespValue;
use aho_corasick::AhoCorasick;
use lazy_static::lazy_static;

const BYTE_SPACE: u8 = b' ';
const PATTERNS: &[&str] = &["ASK", "MOVED"];

lazy_static! {
    static ref FINDER: AhoCorasick =
        AhoCorasick::new(PATTERNS).expect("static redirect patterns are valid");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Moved { slot: u16, address: String },
    Ask { slot: u16, address: String },
}

impl Redirect {
    pub fn slot(&self) -> u16 {
        match self {
            Redirect::Moved { slot, .. } | Redirect::Ask { slot, .. } => *slot,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Redirect::Moved { address, .. } | Redirect::Ask { address, .. } => address,
        }
    }

    pub fn requires_asking(&self) -> bool {
        matches!(self, Redirect::Ask { .. })
    }
}

/// Fast byte-level scan for a leading `ASK `/`MOVED ` token, used on raw
/// error text before it's even wrapped in a [`RespValue`].
pub fn parse_redirect_bytes(data: &[u8]) -> Option<Redirect> {
    let mat = FINDER.find(data)?;
    let end = mat.end();
    if end >= data.len() || data[end] != BYTE_SPACE {
        return None;
    }
    let rest = &data[end + 1..];
    let sep = rest.iter().position(|&b| b == BYTE_SPACE)?;
    let slot = btoi::btoi::<u16>(&rest[..sep]).ok()?;
    let address = String::from_utf8_lossy(&rest[sep + 1..])
        .trim_end_matches(['\r', '\n'])
        .to_string();

    Some(if mat.pattern().as_u32() == 0 {
        Redirect::Ask { slot, address }
    } else {
        Redirect::Moved { slot, address }
    })
}

/// Parse a decoded RESP error value. Returns `None` for any error text that
/// isn't a redirection.
pub fn parse_redirect(value: &RespValue) -> Option<Redirect> {
    match value {
        RespValue::Error(text) => parse_redirect_bytes(text.as_bytes()),
        _ => None,
    }
}

pub fn is_redirect(value: &RespValue) -> bool {
    matches!(value, RespValue::Error(text) if text.starts_with("MOVED ") || text.starts_with("ASK "))
}

pub fn asking_command() -> RespValue {
    crate::resp::RespEncoder::command("ASKING", &[] as &[&[u8]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_moved() {
        let v = RespValue::Error("MOVED 3999 127.0.0.1:6381".into());
        let r = parse_redirect(&v).unwrap();
        assert_eq!(r, Redirect::Moved { slot: 3999, address: "127.0.0.1:6381".into() });
        assert!(!r.requires_asking());
    }

    #[test]
    fn parses_ask() {
        let v = RespValue::Error("ASK 3999 127.0.0.1:6381".into());
        let r = parse_redirect(&v).unwrap();
        assert_eq!(r, Redirect::Ask { slot: 3999, address: "127.0.0.1:6381".into() });
        assert!(r.requires_asking());
    }

    #[test]
    fn non_redirect_errors_are_none() {
        let v = RespValue::Error("WRONGTYPE bad op".into());
        assert!(parse_redirect(&v).is_none());
        assert!(!is_redirect(&v));
    }

    #[test]
    fn boundary_slots() {
        assert_eq!(
            parse_redirect_bytes(b"MOVED 16383 127.0.0.1:6381").unwrap().slot(),
            16383
        );
        assert_eq!(parse_redirect_bytes(b"ASK 0 127.0.0.1:6381").unwrap().slot(), 0);
    }

    #[test]
    fn malformed_is_none() {
        assert!(parse_redirect_bytes(b"MOVED3999 127.0.0.1:6381").is_none());
        assert!(parse_redirect_bytes(b"MOVED 3999").is_none());
        assert!(parse_redirect_bytes(b"").is_none());
    }

    #[test]
    fn asking_command_shape() {
        let cmd = asking_command();
        let elements = cmd.as_array().unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].as_bulk(), Some(b"ASKING".as_ref()));
    }
}
