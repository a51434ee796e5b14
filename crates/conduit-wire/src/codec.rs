//! Lossless conversion between [`Value`] and JSON text.
//!
//! The binary variant has no native JSON representation, so it is encoded as
//! a `data:` URL string (`data:<mime>;base64,<payload>` or, with no mime
//! type, `data:;base64,<payload>`); decoding recognizes that exact shape and
//! restores the binary variant. Every other string is passed through
//! unchanged, so `decode(encode(v)) == v` holds for all `v`.

use crate::{error::WireError, value::Value};
use base64::Engine as _;
use std::collections::BTreeMap;

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Serialize a [`Value`] to JSON text.
pub fn encode(value: &Value) -> String {
    serde_json::to_string(&to_json(value)).expect("wire Value always serializes to valid JSON")
}

/// Deserialize JSON text into a [`Value`].
pub fn decode(text: &str) -> Result<Value, WireError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    from_json(json)
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Binary { mime_type, bytes } => {
            serde_json::Value::String(encode_data_url(mime_type.as_deref(), bytes))
        }
        Value::Sequence(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Mapping(map) => {
            serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect())
        }
    }
}

fn from_json(json: serde_json::Value) -> Result<Value, WireError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Double(f)
            } else {
                return Err(WireError::UnrepresentableNumber(n.to_string()));
            }
        }
        serde_json::Value::String(s) => match decode_data_url(&s)? {
            Some((mime_type, bytes)) => Value::Binary { mime_type, bytes },
            None => Value::String(s),
        },
        serde_json::Value::Array(items) => {
            Value::Sequence(items.into_iter().map(from_json).collect::<Result<_, _>>()?)
        }
        serde_json::Value::Object(obj) => {
            let mut map = BTreeMap::new();
            for (k, v) in obj {
                map.insert(k, from_json(v)?);
            }
            Value::Mapping(map)
        }
    })
}

fn encode_data_url(mime_type: Option<&str>, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!(
        "{DATA_URL_PREFIX}{}{BASE64_MARKER}{payload}",
        mime_type.unwrap_or("")
    )
}

/// Returns `Ok(Some((mime_type, bytes)))` if `s` is a data URL of the exact
/// shape this codec emits, `Ok(None)` if `s` is an ordinary string, and
/// `Err` if `s` looks like a data URL but its payload is malformed.
fn decode_data_url(s: &str) -> Result<Option<(Option<String>, Vec<u8>)>, WireError> {
    let Some(rest) = s.strip_prefix(DATA_URL_PREFIX) else {
        return Ok(None);
    };
    let Some(marker_at) = rest.find(BASE64_MARKER) else {
        return Ok(None);
    };
    let mime_type = &rest[..marker_at];
    let payload = &rest[marker_at + BASE64_MARKER.len()..];
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(WireError::InvalidBase64)?;
    let mime_type = if mime_type.is_empty() {
        None
    } else {
        Some(mime_type.to_string())
    };
    Ok(Some((mime_type, bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_strings_are_not_mistaken_for_data_urls() {
        let v = Value::String("data:oops".into());
        let encoded = encode(&v);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(v, decoded);
    }

    #[test]
    fn binary_round_trips_through_data_url() {
        let v = Value::Binary {
            mime_type: Some("image/png".into()),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        };
        let encoded = encode(&v);
        assert!(encoded.contains("data:image/png;base64,"));
        assert_eq!(decode(&encoded).unwrap(), v);
    }

    #[test]
    fn binary_without_mime_type_round_trips() {
        let v = Value::Binary {
            mime_type: None,
            bytes: vec![1, 2, 3],
        };
        let encoded = encode(&v);
        assert_eq!(decode(&encoded).unwrap(), v);
    }

    #[test]
    fn nested_mapping_round_trips() {
        let v = Value::mapping(vec![
            ("a".into(), Value::Sequence(vec![Value::Integer(1), Value::Bool(true)])),
            ("b".into(), Value::Null),
        ]);
        let encoded = encode(&v);
        assert_eq!(decode(&encoded).unwrap(), v);
    }

    proptest::proptest! {
        #[test]
        fn round_trip_holds_for_arbitrary_strings_and_integers(
            s in ".*",
            i in proptest::num::i64::ANY,
        ) {
            let strv = Value::String(s);
            proptest::prop_assert_eq!(decode(&encode(&strv)).unwrap(), strv);
            let intv = Value::Integer(i);
            proptest::prop_assert_eq!(decode(&encode(&intv)).unwrap(), intv);
        }
    }
}
