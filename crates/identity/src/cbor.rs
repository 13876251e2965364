//! CBOR decoding into a generic value tree.
//!
//! Decoding is all-or-nothing: truncated input, malformed items and trailing
//! bytes after the top-level item all fail with [`VerificationError::Decode`].
//! Error messages carry offsets only, never decoded content.

use ciborium::value::{Integer, Value};

use crate::error::{IdentityResult, VerificationError};

/// CBOR tag for embedded encoded CBOR (`#6.24(bstr)`).
pub const TAG_ENCODED_CBOR: u64 = 24;

/// Decode exactly one CBOR item from `bytes`.
pub fn decode(bytes: &[u8]) -> IdentityResult<Value> {
    if bytes.is_empty() {
        return Err(VerificationError::Decode("empty CBOR input".to_string()));
    }

    let mut reader = bytes;
    let value: Value = ciborium::de::from_reader(&mut reader).map_err(describe_error)?;
    if !reader.is_empty() {
        return Err(VerificationError::Decode(format!(
            "{} trailing bytes after CBOR item",
            reader.len()
        )));
    }
    Ok(value)
}

/// Encode a value as definite-length CBOR.
pub fn encode(value: &Value) -> IdentityResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|_| VerificationError::Decode("value could not be encoded as CBOR".to_string()))?;
    Ok(buf)
}

fn describe_error(err: ciborium::de::Error<std::io::Error>) -> VerificationError {
    use ciborium::de::Error;

    #[allow(unreachable_patterns)]
    let message = match err {
        Error::Io(_) => "truncated CBOR input".to_string(),
        Error::Syntax(offset) => format!("invalid CBOR syntax at offset {offset}"),
        Error::Semantic(Some(offset), _) => format!("invalid CBOR item at offset {offset}"),
        Error::Semantic(None, _) => "invalid CBOR item".to_string(),
        Error::RecursionLimitExceeded => "CBOR nesting too deep".to_string(),
        _ => "malformed CBOR".to_string(),
    };
    VerificationError::Decode(message)
}

/// Look up a text key in a CBOR map.
pub fn map_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .as_map()?
        .iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

/// Look up the first of several spellings of a text key.
pub fn map_get_any<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map_get(value, key))
}

/// Look up an integer key in a CBOR map (COSE header labels).
pub fn map_get_int(value: &Value, key: i64) -> Option<&Value> {
    map_get_int_in(value.as_map()?, key)
}

/// Same as [`map_get_int`] over a borrowed entry list.
pub fn map_get_int_in(entries: &[(Value, Value)], key: i64) -> Option<&Value> {
    let wanted = Integer::from(key);
    entries
        .iter()
        .find(|(k, _)| k.as_integer() == Some(wanted))
        .map(|(_, v)| v)
}

/// Integer value as `i128`, the widest CBOR integer range.
pub fn as_i128(value: &Value) -> Option<i128> {
    value.as_integer().map(i128::from)
}

/// Unwrap `#6.24(bstr)` by decoding the embedded item; other values are
/// returned as they are.
pub fn unwrap_encoded(value: &Value) -> IdentityResult<Value> {
    match value {
        Value::Tag(TAG_ENCODED_CBOR, inner) => match inner.as_ref() {
            Value::Bytes(bytes) => decode(bytes),
            _ => Err(VerificationError::Decode(
                "tag 24 does not wrap a byte string".to_string(),
            )),
        },
        other => Ok(other.clone()),
    }
}

/// Text and integer scalars rendered as strings.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Text(text) => Some(text.clone()),
        Value::Integer(int) => Some(i128::from(*int).to_string()),
        _ => None,
    }
}
