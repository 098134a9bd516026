//! JSON 라인 코덱
//!
//! 레코드당 JSON 객체 하나 (JSONL). 숫자는 `arbitrary_precision` 원문으로
//! 디코딩되므로 큰 정수가 잘리지 않습니다.

use super::LineCodec;
use crate::error::CodecError;
use crate::value::{Fields, fields_from_json, fields_to_json};

const CODEC: &str = "json";

/// JSON 라인 코덱
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLineCodec;

impl LineCodec for JsonLineCodec {
    fn name(&self) -> &'static str {
        CODEC
    }

    fn decode(&self, data: &[u8]) -> Result<Fields, CodecError> {
        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(|e| CodecError::Decode {
                codec: CODEC,
                reason: e.to_string(),
            })?;

        match value {
            serde_json::Value::Object(map) => Ok(fields_from_json(map)),
            other => Err(CodecError::Decode {
                codec: CODEC,
                reason: format!("expected JSON object at top level, found {}", json_kind(&other)),
            }),
        }
    }

    /// 인코딩 결과는 항상 `\n`으로 끝납니다.
    fn encode(&self, fields: &Fields) -> Result<Vec<u8>, CodecError> {
        let mut out = serde_json::to_vec(&serde_json::Value::Object(fields_to_json(fields)))
            .map_err(|e| CodecError::Encode {
                codec: CODEC,
                reason: e.to_string(),
            })?;
        out.push(b'\n');
        Ok(out)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use proptest::prelude::*;

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (prop::num::f64::NORMAL | prop::num::f64::ZERO).prop_map(Value::Float),
            ".{0,12}".prop_map(Value::Text),
        ]
    }

    fn field_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            3 => leaf(),
            1 => prop::collection::vec(leaf(), 0..4).prop_map(Value::List),
            1 => prop::collection::btree_map("[a-z]{1,6}", leaf(), 0..4).prop_map(Value::Map),
        ]
    }

    #[test]
    fn encode_appends_newline() {
        let mut fields = Fields::new();
        fields.insert("a".to_owned(), Value::Int(1));
        let out = JsonLineCodec.encode(&fields).unwrap();
        assert_eq!(out, b"{\"a\":1}\n");
    }

    #[test]
    fn decode_accepts_trailing_newline() {
        let fields = JsonLineCodec.decode(b"{\"src\":\"10.1.2.3\"}\n").unwrap();
        assert_eq!(fields["src"], Value::from("10.1.2.3"));
    }

    #[test]
    fn decode_preserves_large_integers() {
        let fields = JsonLineCodec
            .decode(br#"{"id": 9223372036854775808, "n": -7}"#)
            .unwrap();
        assert_eq!(fields["id"], Value::Decimal("9223372036854775808".to_owned()));
        assert_eq!(fields["n"], Value::Int(-7));

        let out = JsonLineCodec.encode(&fields).unwrap();
        assert_eq!(out, b"{\"id\":9223372036854775808,\"n\":-7}\n");
    }

    #[test]
    fn decode_rejects_non_object() {
        let err = JsonLineCodec.decode(b"[1,2,3]").unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(JsonLineCodec.decode(b"{not json").is_err());
    }

    #[test]
    fn integral_float_stays_float() {
        let mut fields = Fields::new();
        fields.insert("f".to_owned(), Value::Float(2.0));
        let out = JsonLineCodec.encode(&fields).unwrap();
        assert_eq!(out, b"{\"f\":2.0}\n");
        assert_eq!(JsonLineCodec.decode(&out).unwrap(), fields);
    }

    proptest! {
        #[test]
        fn mixed_values_survive_encode_decode(
            fields in prop::collection::btree_map("[a-z_]{1,8}", field_value(), 0..8),
        ) {
            let line = JsonLineCodec.encode(&fields).unwrap();
            prop_assert_eq!(JsonLineCodec.decode(&line).unwrap(), fields);
        }
    }
}
