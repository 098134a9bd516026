//! 라인 코덱 — 원시 바이트 레코드와 이벤트 필드 매핑 간 변환
//!
//! 코덱은 경계 어댑터(소스/싱크)가 사용하는 전략 객체이며, 핵심 파이프라인은
//! 코덱을 직접 사용하지 않습니다. 모든 코덱은 생성 시점의 설정 외에는 상태가 없습니다.
//!
//! # 지원 형식
//! - [`JsonLineCodec`]: 레코드당 JSON 객체 하나 (인코딩 시 개행 추가)
//! - [`CsvLineCodec`]: 고정 헤더 기반 구분자 라인, 선택적 숫자 변환
//! - [`RawLineCodec`]: 입력 바이트를 `bytes` 필드에 그대로 담음
//! - [`StringLineCodec`]: 입력을 텍스트로 `message` 필드에 담음

pub mod csv;
pub mod json;
pub mod text;

pub use csv::{CsvLineCodec, CsvOptions};
pub use json::JsonLineCodec;
pub use text::{RAW_FIELD, RawLineCodec, STRING_FIELD, StringLineCodec};

use crate::config::{Options, parse_options};
use crate::error::{CodecError, ConfigError};
use crate::value::Fields;

/// 바이트 ⇄ 필드 매핑 변환 trait
///
/// 새로운 레코드 형식을 지원하려면 이 trait을 구현합니다.
pub trait LineCodec: Send + Sync {
    /// 코덱 이름 (로깅용)
    fn name(&self) -> &'static str;

    /// 원시 바이트 레코드를 필드 매핑으로 변환합니다.
    fn decode(&self, data: &[u8]) -> Result<Fields, CodecError>;

    /// 필드 매핑을 원시 바이트 레코드로 변환합니다.
    fn encode(&self, fields: &Fields) -> Result<Vec<u8>, CodecError>;
}

/// 어댑터 모듈 이름에 대응하는 코덱 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// JSON 라인
    Json,
    /// CSV 라인
    Csv,
    /// 원시 바이트
    Raw,
    /// 텍스트
    Str,
}

impl CodecKind {
    /// 코덱을 생성합니다. CSV는 옵션에서 `headers`/`separator`/`convert`를 읽습니다.
    pub fn build(self, stage: &str, options: &Options) -> Result<Box<dyn LineCodec>, ConfigError> {
        Ok(match self {
            Self::Json => Box::new(JsonLineCodec),
            Self::Csv => {
                let csv_options: CsvOptions = parse_options(stage, options)?;
                Box::new(CsvLineCodec::from_options(stage, csv_options)?)
            }
            Self::Raw => Box::new(RawLineCodec),
            Self::Str => Box::new(StringLineCodec),
        })
    }
}
