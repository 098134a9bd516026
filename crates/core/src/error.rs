//! 에러 타입 — 도메인별 에러 정의
//!
//! [`EvpipeError`]는 최상위 에러이며, 각 하위 에러는 `#[from]` 변환으로
//! `?` 연산자를 통해 자연스럽게 전파됩니다.

/// evpipe 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum EvpipeError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 실행 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 코덱 변환 에러
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// 레지스트리 에러
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// `InvalidValue` 에러를 간편하게 생성합니다.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 파이프라인 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패 (하류 스테이지 종료)
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 스테이지 구성 실패
    #[error("stage '{stage}' build failed: {reason}")]
    BuildFailed { stage: String, reason: String },

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 스테이지 태스크 비정상 종료
    #[error("stage task failed: {0}")]
    TaskFailed(String),
}

/// 라인 코덱 에러
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// 입력 바이트를 레코드로 변환하지 못함
    #[error("{codec}: decode failed: {reason}")]
    Decode { codec: &'static str, reason: String },

    /// 레코드를 바이트로 변환하지 못함
    #[error("{codec}: encode failed: {reason}")]
    Encode { codec: &'static str, reason: String },

    /// 필드 타입 불일치 (설정 또는 프로그래밍 오류)
    #[error("{codec}: field '{field}' must be {expected}, found {found}")]
    TypeMismatch {
        codec: &'static str,
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// 컴포넌트 레지스트리 에러
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 등록되지 않은 컴포넌트 타입
    #[error("component type not found: {name}")]
    NotFound { name: String },

    /// 전역 레지스트리가 이미 고정됨
    #[error("global registry already installed")]
    AlreadyInstalled,
}
