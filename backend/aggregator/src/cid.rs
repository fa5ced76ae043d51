//! Content-identifier codec.
//!
//! The contract stores CIDs as `vector<u8>`.  Depending on the endpoint, the
//! node's JSON layer serves such a field either as a `0x`-prefixed hex string
//! or as a plain array of byte values; event payloads occasionally carry the
//! already-decoded string.  `decode` accepts all three shapes.
//!
//! Malformed input (odd-length hex, non-hex digits, bytes that are not valid
//! UTF-8) decodes to the empty string — callers treat `""` as "no CID".

use serde_json::Value;

/// Encode a CID string into the byte sequence a `vector<u8>` entry-function
/// argument expects.
pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Hex form (`0x…`) of an encoded CID, as the JSON transaction payload wants it.
pub fn encode_hex(text: &str) -> String {
    format!("0x{}", hex::encode(encode(text)))
}

/// Decode an on-chain CID value back into its UTF-8 string form.
pub fn decode(value: &Value) -> String {
    match value {
        Value::String(s) => decode_str(s),
        Value::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                match item.as_u64() {
                    Some(b) if b <= u8::MAX as u64 => bytes.push(b as u8),
                    _ => return String::new(),
                }
            }
            String::from_utf8(bytes).unwrap_or_default()
        }
        _ => String::new(),
    }
}

/// Decode a string-shaped CID field: `0x`-prefixed hex is unpacked to UTF-8,
/// anything else passes through unchanged.
pub fn decode_str(s: &str) -> String {
    match s.strip_prefix("0x") {
        Some(stripped) => match hex::decode(stripped) {
            Ok(bytes) => String::from_utf8(bytes).unwrap_or_default(),
            Err(_) => String::new(),
        },
        None => s.to_string(),
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
