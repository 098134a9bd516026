//! 이벤트 필드 값 — 동적 타입을 닫힌 합 타입으로 표현합니다.
//!
//! 이벤트 페이로드는 필드 이름 → [`Value`] 매핑([`Fields`])입니다.
//! `serde_json::Value`와의 변환은 JSON 코덱과 LPM 메타데이터 로딩에서 사용됩니다.
//!
//! # 숫자 표현
//! JSON 숫자는 `arbitrary_precision` 원문을 기준으로 변환합니다.
//! - `i64`로 정확히 표현 가능한 정수 → [`Value::Int`]
//! - 소수/지수 표기 → [`Value::Float`]
//! - 그 외(범위를 넘는 정수 등) → [`Value::Decimal`] (원문 보존)

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

/// 이벤트 필드 매핑 (키 순서가 결정적이어야 인코딩 결과가 안정적입니다)
pub type Fields = BTreeMap<String, Value>;

/// 이벤트 필드 값
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 값 없음
    Null,
    /// 불리언
    Bool(bool),
    /// 64비트 정수
    Int(i64),
    /// 부동소수점
    Float(f64),
    /// `i64`/`f64`로 정확히 표현할 수 없는 숫자 리터럴 (원문 그대로)
    Decimal(String),
    /// 텍스트
    Text(String),
    /// 원시 바이트
    Bytes(Bytes),
    /// 값 목록
    List(Vec<Value>),
    /// 중첩 매핑
    Map(Fields),
}

impl Value {
    /// 로그 및 에러 메시지에 사용하는 타입 이름
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// 텍스트 값이면 참조를 반환합니다.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 바이트 값이면 참조를 반환합니다.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// `Null` 여부
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// JSON 값으로 변환합니다.
    ///
    /// 바이트는 소문자 hex 문자열, 유한하지 않은 float는 `null`로 표현됩니다.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::Number((*i).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Decimal(s) => s
                .parse::<serde_json::Number>()
                .map(serde_json::Value::Number)
                .unwrap_or_else(|_| serde_json::Value::String(s.clone())),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => serde_json::Value::String(hex::encode(b)),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Map(fields) => serde_json::Value::Object(fields_to_json(fields)),
        }
    }
}

fn number_to_value(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        return Value::Int(i);
    }
    let literal = n.to_string();
    let integral = !literal.contains(['.', 'e', 'E']);
    match n.as_f64() {
        Some(f) if !integral && f.is_finite() => Value::Float(f),
        _ => Value::Decimal(literal),
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => number_to_value(&n),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(fields_from_json(map)),
        }
    }
}

/// JSON 객체를 [`Fields`]로 변환합니다.
pub fn fields_from_json(map: serde_json::Map<String, serde_json::Value>) -> Fields {
    map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

/// [`Fields`]를 JSON 객체로 변환합니다.
pub fn fields_to_json(fields: &Fields) -> serde_json::Map<String, serde_json::Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}

/// 범용 문자열 표현 (CSV 인코딩 등에 사용)
///
/// float는 정수와 구별되도록 항상 소수점 또는 지수를 포함합니다.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Decimal(s) | Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&hex::encode(b)),
            Self::List(_) | Self::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}
