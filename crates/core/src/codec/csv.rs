//! CSV 라인 코덱
//!
//! 고정된 헤더 목록을 기준으로 한 줄의 구분자 레코드를 필드 매핑으로 변환합니다.
//!
//! 따옴표 처리와 이스케이프는 `csv` 크레이트의 리더/라이터에 맡깁니다.
//!
//! # 디코딩
//! - 입력의 첫 레코드 하나만 읽습니다. 필드 수가 헤더 수와 다르면 에러입니다.
//! - `convert`가 켜져 있으면 정수 → 실수 순으로 변환을 시도하고, 실패하면 문자열로 둡니다.
//!
//! # 인코딩
//! - 헤더 순서대로 값을 쓰며, 없거나 `Null`인 필드는 빈 칸입니다.
//! - 빈 필드 하나뿐인 레코드는 `""`로 써서 빈 줄과 구별합니다.
//! - 헤더 목록이 비어 있으면 에러입니다.

use serde::Deserialize;

use super::LineCodec;
use crate::error::{CodecError, ConfigError};
use crate::value::{Fields, Value};

const CODEC: &str = "csv";

/// CSV 코덱 설정 (스테이지 옵션에서 읽음)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// 컬럼 이름 목록
    pub headers: Vec<String>,
    /// 구분자 (ASCII 한 글자)
    pub separator: String,
    /// 디코딩 시 숫자 변환 여부
    pub convert: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            separator: ",".to_owned(),
            convert: true,
        }
    }
}

/// CSV 라인 코덱
#[derive(Debug, Clone)]
pub struct CsvLineCodec {
    headers: Vec<String>,
    separator: u8,
    convert: bool,
}

impl CsvLineCodec {
    /// 새 코덱을 생성합니다.
    pub fn new(headers: Vec<String>, separator: u8, convert: bool) -> Self {
        Self {
            headers,
            separator,
            convert,
        }
    }

    /// 옵션에서 코덱을 생성합니다. 구분자는 따옴표/개행이 아닌 ASCII 한 글자여야 합니다.
    pub fn from_options(stage: &str, options: CsvOptions) -> Result<Self, ConfigError> {
        let separator = match options.separator.as_bytes() {
            [b] if b.is_ascii() && !matches!(b, b'"' | b'\r' | b'\n') => *b,
            _ => {
                return Err(ConfigError::invalid(
                    format!("{stage}.separator"),
                    format!(
                        "separator must be a single ASCII character, got {:?}",
                        options.separator
                    ),
                ));
            }
        };
        Ok(Self::new(options.headers, separator, options.convert))
    }

    /// 헤더 목록
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn convert_value(&self, raw: &str) -> Value {
        if !self.convert {
            return Value::Text(raw.to_owned());
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        match raw.parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => Value::Text(raw.to_owned()),
        }
    }
}

fn decode_error(reason: impl Into<String>) -> CodecError {
    CodecError::Decode {
        codec: CODEC,
        reason: reason.into(),
    }
}

fn encode_error(reason: impl Into<String>) -> CodecError {
    CodecError::Encode {
        codec: CODEC,
        reason: reason.into(),
    }
}

impl LineCodec for CsvLineCodec {
    fn name(&self) -> &'static str {
        CODEC
    }

    fn decode(&self, data: &[u8]) -> Result<Fields, CodecError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.separator)
            .from_reader(data);

        let mut record = csv::StringRecord::new();
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => return Err(decode_error("empty record")),
            Err(e) => return Err(decode_error(e.to_string())),
        }
        if record.len() != self.headers.len() {
            return Err(decode_error(format!(
                "expected {} fields, found {}",
                self.headers.len(),
                record.len()
            )));
        }

        Ok(self
            .headers
            .iter()
            .cloned()
            .zip(record.iter().map(|raw| self.convert_value(raw)))
            .collect())
    }

    /// 인코딩 결과는 항상 `\n`으로 끝납니다.
    fn encode(&self, fields: &Fields) -> Result<Vec<u8>, CodecError> {
        if self.headers.is_empty() {
            return Err(encode_error("no headers configured"));
        }

        let row: Vec<String> = self
            .headers
            .iter()
            .map(|header| fields.get(header).map(Value::to_string).unwrap_or_default())
            .collect();
        if matches!(row.as_slice(), [only] if only.is_empty()) {
            return Ok(b"\"\"\n".to_vec());
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.separator)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::with_capacity(self.headers.len() * 8));
        writer
            .write_record(&row)
            .map_err(|e| encode_error(e.to_string()))?;
        writer.into_inner().map_err(|e| encode_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec(headers: &[&str], convert: bool) -> CsvLineCodec {
        CsvLineCodec::new(headers.iter().map(|h| (*h).to_owned()).collect(), b',', convert)
    }

    #[test]
    fn decode_with_conversion() {
        let fields = codec(&["src", "port", "ratio"], true)
            .decode(b"10.0.0.1,443,0.5\n")
            .unwrap();
        assert_eq!(fields["src"], Value::from("10.0.0.1"));
        assert_eq!(fields["port"], Value::Int(443));
        assert_eq!(fields["ratio"], Value::Float(0.5));
    }

    #[test]
    fn decode_without_conversion_keeps_text() {
        let fields = codec(&["port"], false).decode(b"443").unwrap();
        assert_eq!(fields["port"], Value::from("443"));
    }

    #[test]
    fn decode_quoted_fields() {
        let fields = codec(&["a", "b"], false)
            .decode(b"\"x,y\",\"say \"\"hi\"\"\"\r\n")
            .unwrap();
        assert_eq!(fields["a"], Value::from("x,y"));
        assert_eq!(fields["b"], Value::from("say \"hi\""));
    }

    #[test]
    fn decode_field_count_mismatch() {
        let err = codec(&["a", "b"], true).decode(b"1,2,3").unwrap_err();
        assert!(err.to_string().contains("expected 2 fields, found 3"));
    }

    #[test]
    fn decode_keeps_bare_quote_in_unquoted_field() {
        let fields = codec(&["a"], false).decode(b"ab\"c\n").unwrap();
        assert_eq!(fields["a"], Value::from("ab\"c"));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let err = codec(&["a"], false).decode(b"\xff\xfe\n").unwrap_err();
        assert!(matches!(err, CodecError::Decode { codec: "csv", .. }));
    }

    #[test]
    fn decode_rejects_empty_line() {
        let err = codec(&["a"], false).decode(b"\n").unwrap_err();
        assert!(err.to_string().contains("empty record"));
    }

    #[test]
    fn single_empty_field_survives_encode_decode() {
        let c = codec(&["a"], false);
        let mut fields = Fields::new();
        fields.insert("a".to_owned(), Value::from(""));

        let line = c.encode(&fields).unwrap();
        assert_eq!(line, b"\"\"\n");
        assert_eq!(c.decode(&line).unwrap()["a"], Value::from(""));
    }

    #[test]
    fn converted_numbers_survive_encode_decode() {
        let c = codec(&["port", "delta", "ratio", "whole"], true);
        let mut fields = Fields::new();
        fields.insert("port".to_owned(), Value::Int(443));
        fields.insert("delta".to_owned(), Value::Int(-7));
        fields.insert("ratio".to_owned(), Value::Float(0.5));
        fields.insert("whole".to_owned(), Value::Float(2.0));

        let line = c.encode(&fields).unwrap();
        assert_eq!(line, b"443,-7,0.5,2.0\n");
        assert_eq!(c.decode(&line).unwrap(), fields);
    }

    #[test]
    fn decode_custom_separator() {
        let c = CsvLineCodec::new(vec!["a".to_owned(), "b".to_owned()], b';', true);
        let fields = c.decode(b"1;two").unwrap();
        assert_eq!(fields["a"], Value::Int(1));
        assert_eq!(fields["b"], Value::from("two"));
    }

    #[test]
    fn encode_missing_and_null_are_empty() {
        let mut fields = Fields::new();
        fields.insert("a".to_owned(), Value::Int(1));
        fields.insert("c".to_owned(), Value::Null);
        let out = codec(&["a", "b", "c"], true).encode(&fields).unwrap();
        assert_eq!(out, b"1,,\n");
    }

    #[test]
    fn encode_quotes_when_needed() {
        let mut fields = Fields::new();
        fields.insert("a".to_owned(), Value::from("x,y"));
        fields.insert("b".to_owned(), Value::from("q\"q"));
        let out = codec(&["a", "b"], true).encode(&fields).unwrap();
        assert_eq!(out, b"\"x,y\",\"q\"\"q\"\n");
    }

    #[test]
    fn encode_without_headers_fails() {
        assert!(codec(&[], true).encode(&Fields::new()).is_err());
    }

    #[test]
    fn separator_validation() {
        let options = CsvOptions {
            separator: "\"".to_owned(),
            ..CsvOptions::default()
        };
        assert!(CsvLineCodec::from_options("T", options).is_err());

        let options = CsvOptions {
            separator: "\t".to_owned(),
            ..CsvOptions::default()
        };
        assert_eq!(CsvLineCodec::from_options("T", options).unwrap().separator, b'\t');
    }

    proptest! {
        #[test]
        fn text_fields_survive_encode_decode(
            a in "[ -~]{0,20}",
            b in "[a-z,\" ]{0,20}",
        ) {
            let c = codec(&["a", "b"], false);
            let mut fields = Fields::new();
            fields.insert("a".to_owned(), Value::Text(a.clone()));
            fields.insert("b".to_owned(), Value::Text(b.clone()));

            let line = c.encode(&fields).unwrap();
            // 두 필드가 모두 비면 빈 레코드가 아닌 "," 한 줄이 됩니다.
            let decoded = c.decode(&line).unwrap();
            prop_assert_eq!(&decoded["a"], &Value::Text(a));
            prop_assert_eq!(&decoded["b"], &Value::Text(b));
        }
    }
}
