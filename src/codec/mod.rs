//! Compact string encoding of an include map, used for persistence.
//!
//! Grammar: entries separated by `,`; an entry is either `key` (empty include
//! list) or `key=>{v1,v2,...}`. Keys are written in ascending order so the
//! output is stable across runs; values keep their list order.
//!
//! There is no escaping. Document ids must not contain any of
//! [`RESERVED_CHARS`]; layout resource names never do.
use crate::graph::{DocumentId, IncludeMap};

/// Characters with structural meaning in the encoding.
pub const RESERVED_CHARS: [char; 4] = [',', '=', '{', '}'];

/// True if `id` can be encoded without ambiguity.
#[must_use]
pub fn is_encodable(id: &str) -> bool {
    !id.contains(RESERVED_CHARS)
}

/// Encode `map` into its canonical string form.
#[must_use]
pub fn encode_map(map: &IncludeMap) -> String {
    let mut keys: Vec<&DocumentId> = map.keys().collect();
    keys.sort();

    let mut out = String::new();
    for key in keys {
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(key.as_str());
        let values = &map[key];
        if !values.is_empty() {
            out.push_str("=>{");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(value.as_str());
            }
            out.push('}');
        }
    }
    out
}

/// Decode a string produced by [`encode_map`].
///
/// Decoding is lenient: malformed input yields a best-effort map rather than
/// an error, and never panics.
#[must_use]
pub fn decode_map(encoded: &str) -> IncludeMap {
    let bytes = encoded.as_bytes();
    let end = bytes.len();
    let mut map = IncludeMap::new();
    let mut i = 0;

    while i < end {
        let key_begin = i;
        let mut key_end = i;
        while i < end {
            match bytes[i] {
                b',' => break,
                b'=' => {
                    // Skip "=>"
                    i += 2;
                    break;
                }
                _ => {
                    i += 1;
                    key_end = i;
                }
            }
        }

        let mut values = Vec::new();
        if i < end && bytes[i] == b'{' {
            i += 1;
            while i < end {
                let value_begin = i;
                while i < end && bytes[i] != b',' && bytes[i] != b'}' {
                    i += 1;
                }
                if i > value_begin {
                    values.push(DocumentId(slice(encoded, value_begin, i)));
                }
                if i >= end || bytes[i] == b'}' {
                    break;
                }
                i += 1;
            }
        }

        map.insert(DocumentId(slice(encoded, key_begin, key_end)), values);
        // Skip the closing '}' or the entry separator
        i += 1;
    }
    map
}

// Delimiters are ASCII so boundaries normally fall on char boundaries; a lone
// '=' followed by a multi-byte char can break that, hence the lossy conversion.
fn slice(s: &str, begin: usize, end: usize) -> String {
    let end = end.min(s.len());
    let begin = begin.min(end);
    String::from_utf8_lossy(&s.as_bytes()[begin..end]).into_owned()
}
