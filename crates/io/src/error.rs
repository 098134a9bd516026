//! 경계 어댑터 에러 타입
//!
//! [`IoAdapterError`]는 파일/UDP 어댑터에서 발생하는 에러를 표현합니다.
//! 생성 시점 에러(설정, 바인드 실패)는 설정 에러로, 실행 중 에러는 파이프라인 에러로
//! [`EvpipeError`]에 변환됩니다.

use evpipe_core::error::{ConfigError, EvpipeError, PipelineError};

/// 경계 어댑터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IoAdapterError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 소켓 바인드 실패
    #[error("bind failed: {addr}: {reason}")]
    Bind {
        /// 바인드 주소
        addr: String,
        /// 실패 사유
        reason: String,
    },

    /// 원격 주소 연결 실패
    #[error("connect failed: {addr}: {reason}")]
    Connect {
        /// 대상 주소
        addr: String,
        /// 실패 사유
        reason: String,
    },

    /// 출력 파일 생성 실패
    #[error("cannot create output file {path}: {reason}")]
    FileCreate {
        /// 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IoAdapterError> for EvpipeError {
    fn from(err: IoAdapterError) -> Self {
        match err {
            IoAdapterError::Config { field, reason } => {
                EvpipeError::Config(ConfigError::InvalidValue { field, reason })
            }
            IoAdapterError::Bind { addr, reason } => EvpipeError::Config(ConfigError::InvalidValue {
                field: "bind".to_owned(),
                reason: format!("{addr}: {reason}"),
            }),
            IoAdapterError::Io(e) => EvpipeError::Io(e),
            other => EvpipeError::Pipeline(PipelineError::TaskFailed(other.to_string())),
        }
    }
}
