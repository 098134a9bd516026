//! 원시 바이트 / 텍스트 코덱
//!
//! 두 코덱 모두 입력 전체를 단일 필드에 담습니다. 인코딩 시 해당 필드가
//! 기대 타입이 아니면 설정 오류로 보고 [`CodecError::TypeMismatch`]를 반환합니다.

use bytes::Bytes;

use super::LineCodec;
use crate::error::CodecError;
use crate::value::{Fields, Value};

/// [`RawLineCodec`]이 사용하는 필드명
pub const RAW_FIELD: &str = "bytes";

/// [`StringLineCodec`]이 사용하는 필드명
pub const STRING_FIELD: &str = "message";

/// 원시 바이트 코덱
#[derive(Debug, Clone, Copy, Default)]
pub struct RawLineCodec;

impl LineCodec for RawLineCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn decode(&self, data: &[u8]) -> Result<Fields, CodecError> {
        let mut fields = Fields::new();
        fields.insert(RAW_FIELD.to_owned(), Value::Bytes(Bytes::copy_from_slice(data)));
        Ok(fields)
    }

    fn encode(&self, fields: &Fields) -> Result<Vec<u8>, CodecError> {
        match fields.get(RAW_FIELD) {
            Some(Value::Bytes(b)) => Ok(b.to_vec()),
            other => Err(CodecError::TypeMismatch {
                codec: "raw",
                field: RAW_FIELD.to_owned(),
                expected: "bytes",
                found: other.map_or("missing", Value::type_name),
            }),
        }
    }
}

/// 텍스트 코덱
///
/// 디코딩 시 유효하지 않은 UTF-8 시퀀스는 대체 문자로 바뀝니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLineCodec;

impl LineCodec for StringLineCodec {
    fn name(&self) -> &'static str {
        "string"
    }

    fn decode(&self, data: &[u8]) -> Result<Fields, CodecError> {
        let mut fields = Fields::new();
        fields.insert(
            STRING_FIELD.to_owned(),
            Value::Text(String::from_utf8_lossy(data).into_owned()),
        );
        Ok(fields)
    }

    fn encode(&self, fields: &Fields) -> Result<Vec<u8>, CodecError> {
        match fields.get(STRING_FIELD) {
            Some(Value::Text(s)) => Ok(s.as_bytes().to_vec()),
            other => Err(CodecError::TypeMismatch {
                codec: "string",
                field: STRING_FIELD.to_owned(),
                expected: "text",
                found: other.map_or("missing", Value::type_name),
            }),
        }
    }
}
