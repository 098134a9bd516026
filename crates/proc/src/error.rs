//! 변환 스테이지 에러 타입
//!
//! [`ProcError`]는 LPM/다이제스트 스테이지에서 발생하는 에러를 표현합니다.
//! `From<ProcError> for EvpipeError` 변환이 구현되어 있어
//! 생성자에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use evpipe_core::error::{ConfigError, EvpipeError};

/// 변환 스테이지 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ProcError {
    /// 프리픽스 파일을 열거나 읽을 수 없음
    #[error("prefix load error: {path}: {reason}")]
    PrefixLoad {
        /// 프리픽스 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 잘못된 프리픽스 문자열
    #[error("invalid prefix '{input}': {reason}")]
    InvalidPrefix {
        /// 입력 문자열
        input: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<ProcError> for EvpipeError {
    fn from(err: ProcError) -> Self {
        match err {
            ProcError::Config { field, reason } => {
                EvpipeError::Config(ConfigError::InvalidValue { field, reason })
            }
            ProcError::PrefixLoad { path, reason } => EvpipeError::Config(ConfigError::InvalidValue {
                field: "filepath".to_owned(),
                reason: format!("{path}: {reason}"),
            }),
            other => EvpipeError::Config(ConfigError::InvalidValue {
                field: "prefix".to_owned(),
                reason: other.to_string(),
            }),
        }
    }
}
