//! Store key codec.
//!
//! A key concatenates an aggregate's namespace and its JSON-serialized match
//! signature, then base64-encodes the whole string so the store sees one
//! opaque identifier. The same codec serves the write and read paths.

use crate::signature::MetaIdentifier;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Separates the namespace from the signature inside a decoded key.
/// Kubernetes namespace names are DNS labels and can never contain it.
pub const SEPARATOR: char = '$';

/// Encodes a namespace and signature into an opaque store key.
pub fn encode(namespace: &str, id: &MetaIdentifier) -> String {
    let json = serde_json::to_string(id).expect("signature serializes to JSON");
    BASE64.encode(format!("{namespace}{SEPARATOR}{json}"))
}

/// Decodes a store key into its namespace and signature halves.
///
/// Fails soft: malformed base64, a non-UTF-8 payload, or unparseable
/// signature JSON yield the zero-value signature rather than an error, so one
/// corrupt key cannot block processing of the others. A key with no separator
/// decodes to its full text as the namespace segment.
pub fn decode(key: &str) -> (String, MetaIdentifier) {
    let raw = match decode_raw(key) {
        Some(raw) => raw,
        None => return (String::new(), MetaIdentifier::default()),
    };
    match raw.split_once(SEPARATOR) {
        Some((namespace, json)) => {
            let id = serde_json::from_str(json).unwrap_or_default();
            (namespace.to_string(), id)
        }
        None => (raw, MetaIdentifier::default()),
    }
}

/// The decoded text of a key, used to order candidates deterministically.
pub(crate) fn decode_raw(key: &str) -> Option<String> {
    let bytes = BASE64.decode(key).ok()?;
    String::from_utf8(bytes).ok()
}
