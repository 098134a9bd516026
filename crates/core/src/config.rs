//! 설정 관리 — evpipe.toml 파싱 및 컴포넌트 옵션 변환
//!
//! [`EvpipeConfig`]는 데몬 설정의 최상위 구조체입니다.
//! 각 스테이지는 `[[stages]]` 항목 하나에 대응하며, `module` 이름과
//! 모듈별 옵션([`Options`])을 담습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`EVPIPE_GENERAL_LOG_LEVEL=debug` 형식)
//! 3. 설정 파일 (`evpipe.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 예시
//! ```toml
//! [general]
//! log_level = "info"
//!
//! [[stages]]
//! module = "UDPJSONInput"
//! port = 9999
//!
//! [[stages]]
//! module = "LPMProc"
//! filepath = "/etc/evpipe/prefix-asn.txt"
//! reload_minutes = 1440
//! in_fields = ["src", "dst"]
//! out_fields = [{ newkey = "_{{in_field}}_asn", metakey = "asn" }]
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::component::DEFAULT_STATS_EVERY;
use crate::error::{ConfigError, EvpipeError};

/// 컴포넌트 생성자에 전달되는 동적 옵션 매핑
pub type Options = serde_json::Map<String, serde_json::Value>;

/// 모든 스테이지에 공통으로 적용되는 옵션 키: 처리량 로그 주기
pub const OPTION_STATS_EVERY: &str = "stats_every";

/// 동적 옵션을 타입 있는 설정 구조체로 한 번에 변환합니다.
///
/// 누락되었거나 타입이 맞지 않는 키는 스테이지 이름과 함께 보고됩니다.
pub fn parse_options<T: DeserializeOwned>(stage: &str, options: &Options) -> Result<T, ConfigError> {
    serde_json::from_value(serde_json::Value::Object(options.clone()))
        .map_err(|e| ConfigError::invalid(stage, e.to_string()))
}

/// 옵션에서 처리량 로그 주기를 읽습니다 (없으면 기본값).
pub fn stats_every(options: &Options) -> u64 {
    options
        .get(OPTION_STATS_EVERY)
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(DEFAULT_STATS_EVERY)
}

/// evpipe 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvpipeConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 스테이지 목록 (소스 → 프로세서 → 싱크 순서)
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl EvpipeConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, EvpipeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, EvpipeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EvpipeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                EvpipeError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, EvpipeError> {
        toml::from_str(toml_str).map_err(|e| {
            EvpipeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `EVPIPE_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "EVPIPE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "EVPIPE_GENERAL_LOG_FORMAT");
        override_parse(
            &mut self.general.channel_capacity,
            "EVPIPE_GENERAL_CHANNEL_CAPACITY",
        );
        override_parse(&mut self.metrics.enabled, "EVPIPE_METRICS_ENABLED");
        override_parse(&mut self.metrics.port, "EVPIPE_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EvpipeError> {
        const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            )
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            )
            .into());
        }

        if self.general.channel_capacity == 0
            || self.general.channel_capacity > MAX_CHANNEL_CAPACITY
        {
            return Err(ConfigError::invalid(
                "general.channel_capacity",
                format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            )
            .into());
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::invalid("metrics.port", "must be greater than 0").into());
        }

        for (i, stage) in self.stages.iter().enumerate() {
            if stage.module.trim().is_empty() {
                return Err(
                    ConfigError::invalid(format!("stages[{i}].module"), "must not be empty").into(),
                );
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 스테이지 간 채널 용량
    pub channel_capacity: usize,
    /// 처리량 로그 주기 (스테이지 옵션에 없을 때 적용)
    pub stats_every: u64,
    /// 종료 시 스테이지 루프가 끝나기를 기다리는 시간 (초)
    pub shutdown_grace_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            channel_capacity: 1024,
            stats_every: DEFAULT_STATS_EVERY,
            shutdown_grace_secs: 5,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

/// 스테이지 하나의 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// 레지스트리에 등록된 컴포넌트 타입 이름
    pub module: String,
    /// 모듈별 옵션
    #[serde(flatten)]
    pub options: Options,
}

impl StageConfig {
    /// 모듈 이름과 옵션으로 스테이지 설정을 생성합니다.
    pub fn new(module: impl Into<String>, options: Options) -> Self {
        Self {
            module: module.into(),
            options,
        }
    }
}

fn override_string(target: &mut String, key: &str) {
    if let Ok(val) = std::env::var(key) {
        *target = val;
    }
}

fn override_parse<T: std::str::FromStr>(target: &mut T, key: &str) {
    if let Ok(val) = std::env::var(key) {
        match val.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key = key, value = %val, "ignoring unparsable env override"),
        }
    }
}
