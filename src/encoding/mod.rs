//! Encoding helpers. A single resource is a standard JSON object; list
//! responses are framed as JSON Lines — one JSON document per line, with no
//! enclosing array — so the server never has to buffer an entire listing in
//! memory. See spec.md §4.6.

use std::io::Write;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::RcpResult;

/// Encodes `value` as indented JSON with a trailing newline — the canonical
/// on-disk shape for the template controller (spec.md §9).
pub fn encode_indented<T: Serialize>(value: &T) -> RcpResult<Vec<u8>> {
    let mut buf = serde_json::to_vec_pretty(value)?;
    buf.push(b'\n');
    Ok(buf)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> RcpResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Writes `items` to `w` as JSON Lines: each item serialized on its own
/// line, no surrounding `[...]`.
pub fn write_json_lines<W: Write, T: Serialize>(mut w: W, items: &[T]) -> RcpResult<()> {
    for item in items {
        serde_json::to_writer(&mut w, item)?;
        w.write_all(b"\n")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Item {
        name: String,
    }

    #[test]
    fn json_lines_round_trip() {
        let items = vec![
            Item {
                name: "a".into(),
            },
            Item {
                name: "b".into(),
            },
        ];

        let mut buf = Vec::new();
        write_json_lines(&mut buf, &items).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let decoded: Vec<Item> = lines
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(decoded, items);
    }

    #[test]
    fn encode_indented_has_trailing_newline() {
        let buf = encode_indented(&Item { name: "a".into() }).unwrap();
        assert!(buf.ends_with(b"\n"));
    }
}
