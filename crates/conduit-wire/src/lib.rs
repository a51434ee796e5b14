//! Self-describing wire-value model with a lossless JSON codec.
//!
//! [`Value`] is the recursive sum type every MCP envelope field is built from:
//! null, bool, integer, double, string, inline binary, sequence, and mapping.
//! The tree is always uniquely owned (no shared references), so structural
//! equality and hashing fall out of `#[derive]` directly.

mod codec;
mod error;
mod value;

pub use codec::{decode, encode};
pub use error::WireError;
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_every_variant() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Integer(-7),
            Value::Double(3.25),
            Value::String("hello".into()),
            Value::Binary {
                mime_type: Some("application/octet-stream".into()),
                bytes: vec![1, 2, 3, 255],
            },
            Value::Sequence(vec![Value::Integer(1), Value::Bool(false)]),
            Value::mapping(vec![("a".into(), Value::Integer(1))]),
        ];
        for v in values {
            let encoded = encode(&v);
            let decoded = decode(&encoded).expect("decode");
            assert_eq!(v, decoded);
        }
    }
}
