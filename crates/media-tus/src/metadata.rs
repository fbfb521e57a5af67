//! Upload-Metadata header codec
//!
//! The header carries comma-separated elements, each a key optionally
//! followed by a space and a base64 value. Parsing is lenient: malformed
//! elements are skipped rather than failing the request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::BTreeMap;

/// Parse an `Upload-Metadata` header value into a metadata map.
pub fn parse(header: &str) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    for element in header.split(',') {
        let parts: Vec<&str> = element.trim().split(' ').collect();
        if parts.len() > 2 {
            continue;
        }
        let key = parts[0];
        if key.is_empty() {
            continue;
        }
        let value = match parts.get(1) {
            Some(encoded) => match STANDARD.decode(encoded) {
                Ok(decoded) => String::from_utf8_lossy(&decoded).into_owned(),
                Err(_) => continue,
            },
            None => String::new(),
        };
        meta.insert(key.to_string(), value);
    }
    meta
}

/// Serialize a metadata map back into `Upload-Metadata` form.
pub fn serialize(meta: &BTreeMap<String, String>) -> String {
    meta.iter()
        .map(|(key, value)| format!("{key} {}", STANDARD.encode(value)))
        .collect::<Vec<_>>()
        .join(",")
}
