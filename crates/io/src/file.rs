//! 파일 싱크 — 인코딩한 레코드를 파일에 쓰고 일정 주기로 새 파일로 회전합니다.
//!
//! 파일 이름은 `folder` 아래에 `file_name_format`(chrono strftime 패턴)을 현재 시각으로
//! 렌더링해 정합니다. 매 수신 전에 `rotate_seconds`가 지났는지 확인하고, 지났으면
//! 기존 파일을 flush/닫고 새 파일을 엽니다. 같은 이름의 파일이 있으면 이어 씁니다.
//!
//! ```toml
//! [[stages]]
//! module = "FileCSVOutput"
//! folder = "/var/log/evpipe"
//! file_name_format = "flows-%Y%m%d-%H%M.csv"
//! rotate_seconds = 300
//! headers = ["src", "dst", "_src_asn"]
//! ```
//!
//! 인코딩/쓰기 실패는 로그를 남기고 해당 레코드를 버립니다.
//! 파일을 만들 수 없으면 스테이지가 에러로 종료됩니다.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use evpipe_core::codec::{CodecKind, LineCodec};
use evpipe_core::component::{BoxFuture, Component, ComponentBase, EventReceiver, EventSender};
use evpipe_core::config::{Options, parse_options, stats_every};
use evpipe_core::error::EvpipeError;
use evpipe_core::metrics as m;

use crate::error::IoAdapterError;

/// JSON 파일 싱크 등록 이름
pub const FILE_JSON_OUTPUT: &str = "FileJSONOutput";

/// CSV 파일 싱크 등록 이름
pub const FILE_CSV_OUTPUT: &str = "FileCSVOutput";

/// 파일 싱크 옵션
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileSinkOptions {
    /// 출력 디렉토리
    pub folder: String,
    /// 파일 이름 패턴 (chrono strftime)
    pub file_name_format: String,
    /// 회전 주기 (초)
    pub rotate_seconds: u64,
}

impl Default for FileSinkOptions {
    fn default() -> Self {
        Self {
            folder: "/tmp".to_owned(),
            file_name_format: "evpipe-%Y%m%d-%H%M%S.log".to_owned(),
            rotate_seconds: 60,
        }
    }
}

impl FileSinkOptions {
    /// 옵션 값을 검증합니다.
    pub fn validate(&self, stage: &str) -> Result<(), IoAdapterError> {
        if self.folder.trim().is_empty() {
            return Err(IoAdapterError::Config {
                field: format!("{stage}.folder"),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.rotate_seconds == 0 {
            return Err(IoAdapterError::Config {
                field: format!("{stage}.rotate_seconds"),
                reason: "must be at least 1".to_owned(),
            });
        }
        render_file_name(&self.file_name_format, chrono::Local::now()).map_err(|_| {
            IoAdapterError::Config {
                field: format!("{stage}.file_name_format"),
                reason: format!("invalid time pattern '{}'", self.file_name_format),
            }
        })?;
        Ok(())
    }
}

/// 시각을 파일 이름 패턴으로 렌더링합니다.
pub fn render_file_name<Tz>(pattern: &str, now: chrono::DateTime<Tz>) -> Result<String, std::fmt::Error>
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut name = String::new();
    write!(name, "{}", now.format(pattern))?;
    if name.is_empty() || name.contains('/') {
        return Err(std::fmt::Error);
    }
    Ok(name)
}

/// 시간 기반으로 회전하는 출력 파일
struct RotatingFile {
    folder: PathBuf,
    pattern: String,
    period: Duration,
    current: Option<(PathBuf, tokio::fs::File)>,
    opened_at: Instant,
}

impl RotatingFile {
    fn new(options: &FileSinkOptions) -> Self {
        Self {
            folder: PathBuf::from(&options.folder),
            pattern: options.file_name_format.clone(),
            period: Duration::from_secs(options.rotate_seconds),
            current: None,
            opened_at: Instant::now(),
        }
    }

    fn due(&self) -> bool {
        self.current.is_none() || self.opened_at.elapsed() >= self.period
    }

    async fn rotate(&mut self, tag: &str) -> Result<(), IoAdapterError> {
        self.close(tag).await;

        let name = render_file_name(&self.pattern, chrono::Local::now()).map_err(|_| {
            IoAdapterError::FileCreate {
                path: self.folder.display().to_string(),
                reason: format!("cannot render pattern '{}'", self.pattern),
            }
        })?;
        let path = self.folder.join(name);
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| IoAdapterError::FileCreate {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(stage = tag, path = %path.display(), "opened output file");
        self.current = Some((path, file));
        self.opened_at = Instant::now();
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self.current.as_mut() {
            Some((_, file)) => file.write_all(data).await,
            None => Err(std::io::Error::other("no output file open")),
        }
    }

    async fn close(&mut self, tag: &str) {
        let Some((path, mut file)) = self.current.take() else {
            return;
        };
        if let Err(e) = file.flush().await {
            tracing::warn!(stage = tag, path = %path.display(), error = %e, "flush failed");
        }
        if let Err(e) = file.sync_all().await {
            tracing::warn!(stage = tag, path = %path.display(), error = %e, "sync failed");
        }
        tracing::debug!(stage = tag, path = %path.display(), "closed output file");
    }

    fn path(&self) -> Option<&Path> {
        self.current.as_ref().map(|(p, _)| p.as_path())
    }
}

/// 회전 파일 싱크 (코덱은 생성 시 주입)
pub struct FileOutput {
    base: ComponentBase,
    codec: Box<dyn LineCodec>,
    options: FileSinkOptions,
}

impl FileOutput {
    /// 옵션을 검증하고 지정한 코덱으로 싱크를 생성합니다.
    pub fn new(
        module: &str,
        tag: &str,
        kind: CodecKind,
        input: Option<EventReceiver>,
        output: Option<EventSender>,
        options: &Options,
    ) -> Result<Self, EvpipeError> {
        let sink_options: FileSinkOptions = parse_options(module, options)?;
        sink_options.validate(module)?;
        let codec = kind.build(module, options)?;

        if input.is_none() {
            return Err(IoAdapterError::Config {
                field: module.to_owned(),
                reason: "requires an input channel (cannot be the first stage)".to_owned(),
            }
            .into());
        }

        tracing::info!(
            stage = tag,
            folder = %sink_options.folder,
            pattern = %sink_options.file_name_format,
            rotate_seconds = sink_options.rotate_seconds,
            codec = codec.name(),
            "creating file sink"
        );
        Ok(Self {
            base: ComponentBase::new(tag, input, output).with_stats_every(stats_every(options)),
            codec,
            options: sink_options,
        })
    }

    /// `FileJSONOutput` 생성자
    pub fn build_json(
        input: Option<EventReceiver>,
        output: Option<EventSender>,
        options: &Options,
    ) -> Result<Arc<dyn Component>, EvpipeError> {
        Ok(Arc::new(Self::new(
            FILE_JSON_OUTPUT,
            "OUT-FILE-JSON",
            CodecKind::Json,
            input,
            output,
            options,
        )?))
    }

    /// `FileCSVOutput` 생성자
    pub fn build_csv(
        input: Option<EventReceiver>,
        output: Option<EventSender>,
        options: &Options,
    ) -> Result<Arc<dyn Component>, EvpipeError> {
        Ok(Arc::new(Self::new(
            FILE_CSV_OUTPUT,
            "OUT-FILE-CSV",
            CodecKind::Csv,
            input,
            output,
            options,
        )?))
    }

    async fn process(&self, file: &mut RotatingFile) -> Result<(), EvpipeError> {
        let tag = self.base.tag();
        while !self.base.should_stop() {
            if file.due() {
                file.rotate(tag).await?;
            }

            let Some(event) = self.base.next_event().await else {
                break;
            };

            match self.codec.encode(&event.data) {
                Ok(bytes) => match file.write(&bytes).await {
                    Ok(()) => {
                        metrics::counter!(m::SINK_RECORDS_TOTAL, m::LABEL_STAGE => tag.to_owned())
                            .increment(1);
                    }
                    Err(e) => {
                        tracing::error!(stage = tag, path = ?file.path(), error = %e, "failed to write record");
                    }
                },
                Err(e) => {
                    metrics::counter!(m::CODEC_ERRORS_TOTAL, m::LABEL_STAGE => tag.to_owned(), m::LABEL_CODEC => self.codec.name())
                        .increment(1);
                    tracing::error!(stage = tag, error = %e, "failed to encode record");
                }
            }

            self.base.forward(event).await?;
            self.base.stats_add_message();
            self.base.print_stats();
        }
        Ok(())
    }
}

impl Component for FileOutput {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>> {
        Box::pin(async move {
            tracing::debug!(stage = %self.tag(), "file sink starting");
            let mut file = RotatingFile::new(&self.options);
            let result = self.process(&mut file).await;
            file.close(self.tag()).await;
            tracing::info!(stage = %self.tag(), written = self.base.messages(), "file sink stopping");
            result
        })
    }
}

impl std::fmt::Debug for FileOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileOutput")
            .field("base", &self.base)
            .field("codec", &self.codec.name())
            .field("options", &self.options)
            .finish()
    }
}
