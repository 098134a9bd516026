//! LPM 스테이지 — 최장 프리픽스 매칭으로 이벤트 필드를 보강합니다.
//!
//! 프리픽스 파일(`filepath`)을 읽어 트리를 만들고, 각 이벤트의 `in_fields` 값(주소 또는
//! CIDR 문자열)을 트리에서 찾아 매칭된 프리픽스의 메타데이터를 `out_fields` 규칙에 따라
//! 이벤트에 복사합니다.
//!
//! ```toml
//! [[stages]]
//! module = "LPMProc"
//! filepath = "/etc/evpipe/prefix-asn.txt"
//! reload_minutes = 1440
//! in_fields = ["src", "dst"]
//! out_fields = [
//!     { newkey = "_{{in_field}}_prefix", metakey = "prefix" },
//!     { newkey = "_{{in_field}}_asn", metakey = "asn" },
//! ]
//! ```
//!
//! # 재적재
//! ```text
//! loading → ready → (loading → ready)*
//! ```
//! 새 트리는 잠금 밖에서 완성한 뒤 쓰기 잠금 아래에서 참조만 교체합니다.
//! 조회는 이벤트 하나를 보강하는 동안 읽기 잠금을 잡으므로, 한 이벤트의 모든 필드는
//! 같은 트리 스냅샷을 기준으로 채워집니다. 잠금은 채널 송신 전에 해제됩니다.
//!
//! 재적재 시점:
//! - 생성 시 한 번 (실패하면 생성 에러)
//! - `reload_minutes > 0`이면 주기적으로 (실패하면 이전 트리 유지)
//! - `reload` 시그널을 받을 때

pub mod loader;
pub mod tree;

pub use loader::{PREFIX_KEY, PrefixTable, load_prefix_file, load_prefix_file_async, parse_prefix_file};
pub use tree::{Prefix, PrefixTree};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use evpipe_core::component::{BoxFuture, Component, ComponentBase, EventReceiver, EventSender};
use evpipe_core::config::{Options, parse_options, stats_every};
use evpipe_core::error::EvpipeError;
use evpipe_core::event::Event;
use evpipe_core::metrics as m;
use evpipe_core::value::{Fields, Value};

use crate::error::ProcError;

/// 레지스트리 등록 이름
pub const MODULE_NAME: &str = "LPMProc";

/// 출력 필드 이름 템플릿의 입력 필드 자리표시자
pub const IN_FIELD_PLACEHOLDER: &str = "{{in_field}}";

/// 출력 필드 규칙
#[derive(Debug, Clone, Deserialize)]
pub struct OutField {
    /// 출력 필드 이름 템플릿 (`{{in_field}}` 포함 가능)
    pub newkey: String,
    /// 복사할 메타데이터 키
    pub metakey: String,
}

/// LPM 스테이지 옵션
#[derive(Debug, Clone, Deserialize)]
pub struct LpmOptions {
    /// 프리픽스 파일 경로 (필수)
    pub filepath: Option<String>,
    /// 주기적 재적재 간격 (분, 0이면 비활성)
    #[serde(default)]
    pub reload_minutes: f64,
    /// 매칭할 입력 필드 목록
    #[serde(default)]
    pub in_fields: Vec<String>,
    /// 출력 필드 규칙 목록
    #[serde(default)]
    pub out_fields: Vec<OutField>,
}

impl LpmOptions {
    /// 옵션 값을 검증하고 프리픽스 파일 경로를 돌려줍니다.
    pub fn validate(&self) -> Result<PathBuf, ProcError> {
        let path = match self.filepath.as_deref() {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => {
                return Err(ProcError::Config {
                    field: format!("{MODULE_NAME}.filepath"),
                    reason: "a prefix file path is required".to_owned(),
                });
            }
        };

        if !self.reload_minutes.is_finite() || self.reload_minutes < 0.0 {
            return Err(ProcError::Config {
                field: format!("{MODULE_NAME}.reload_minutes"),
                reason: format!("must be a non-negative number, got {}", self.reload_minutes),
            });
        }

        if let Some(bad) = self.out_fields.iter().find(|f| f.newkey.is_empty()) {
            return Err(ProcError::Config {
                field: format!("{MODULE_NAME}.out_fields"),
                reason: format!("empty newkey for metakey '{}'", bad.metakey),
            });
        }

        Ok(path)
    }

    /// 재적재 주기
    pub fn reload_every(&self) -> Option<Duration> {
        (self.reload_minutes > 0.0).then(|| Duration::from_secs_f64(self.reload_minutes * 60.0))
    }
}

/// 입력 필드 하나에 대한 보강 규칙 (출력 필드 이름은 미리 계산)
#[derive(Debug, Clone)]
struct FieldRule {
    in_field: String,
    /// (출력 필드 이름, 메타데이터 키)
    outputs: Vec<(String, String)>,
}

impl FieldRule {
    fn new(in_field: &str, out_fields: &[OutField]) -> Self {
        let outputs = out_fields
            .iter()
            .map(|o| {
                (
                    o.newkey.replacen(IN_FIELD_PLACEHOLDER, in_field, 1),
                    o.metakey.clone(),
                )
            })
            .collect();
        Self {
            in_field: in_field.to_owned(),
            outputs,
        }
    }
}

/// 스테이지 태스크와 재적재 태스크가 공유하는 트리 저장소
#[derive(Debug)]
struct PrefixStore {
    tag: String,
    path: PathBuf,
    current: RwLock<Arc<PrefixTree<Fields>>>,
}

impl PrefixStore {
    /// 새 트리를 만들고 참조를 교체합니다. 실패하면 이전 트리를 그대로 둡니다.
    async fn reload(&self) -> Result<usize, ProcError> {
        let started = Instant::now();
        let table = match load_prefix_file_async(&self.path).await {
            Ok(table) => table,
            Err(e) => {
                metrics::counter!(m::LPM_RELOADS_TOTAL, m::LABEL_STAGE => self.tag.clone(), m::LABEL_RESULT => "failure")
                    .increment(1);
                return Err(e);
            }
        };

        let loaded = table.loaded;
        let fresh = Arc::new(table.tree);
        let previous = {
            let mut current = self.current.write().await;
            std::mem::replace(&mut *current, fresh)
        };
        // 이전 트리 해제는 잠금 밖에서
        drop(previous);

        let elapsed = started.elapsed();
        metrics::counter!(m::LPM_RELOADS_TOTAL, m::LABEL_STAGE => self.tag.clone(), m::LABEL_RESULT => "success")
            .increment(1);
        metrics::gauge!(m::LPM_PREFIXES_LOADED, m::LABEL_STAGE => self.tag.clone()).set(loaded as f64);
        metrics::histogram!(m::LPM_RELOAD_DURATION_SECONDS).record(elapsed.as_secs_f64());

        tracing::info!(
            stage = %self.tag,
            path = %self.path.display(),
            loaded,
            skipped = table.skipped,
            elapsed_ms = elapsed.as_millis() as u64,
            "prefix table reloaded"
        );
        Ok(loaded)
    }

    /// 재적재를 시도하고 실패는 로그만 남깁니다.
    async fn reload_or_keep(&self) {
        if let Err(e) = self.reload().await {
            tracing::error!(stage = %self.tag, error = %e, "prefix reload failed, keeping previous table");
        }
    }
}

/// LPM 보강 스테이지
pub struct LpmProc {
    base: ComponentBase,
    store: Arc<PrefixStore>,
    rules: Vec<FieldRule>,
    reload_every: Option<Duration>,
    /// 이미 경고한 입력 필드 (필드당 한 번만 경고)
    warned: Mutex<HashSet<String>>,
}

impl LpmProc {
    /// 옵션을 검증하고 프리픽스 파일을 처음 적재합니다.
    ///
    /// # Errors
    /// - 필수 옵션 누락, 타입 불일치
    /// - 입력 채널 없음
    /// - 프리픽스 파일을 읽을 수 없음
    pub fn new(
        input: Option<EventReceiver>,
        output: Option<EventSender>,
        options: &Options,
    ) -> Result<Self, EvpipeError> {
        let opts: LpmOptions = parse_options(MODULE_NAME, options)?;
        let path = opts.validate()?;

        if input.is_none() {
            return Err(ProcError::Config {
                field: MODULE_NAME.to_owned(),
                reason: "requires an input channel (cannot be the first stage)".to_owned(),
            }
            .into());
        }

        let tag = "PROC-LPM".to_owned();
        let table = load_prefix_file(&path)?;
        tracing::info!(
            stage = %tag,
            path = %path.display(),
            loaded = table.loaded,
            skipped = table.skipped,
            "prefix table loaded"
        );
        metrics::gauge!(m::LPM_PREFIXES_LOADED, m::LABEL_STAGE => tag.clone()).set(table.loaded as f64);

        let rules = opts
            .in_fields
            .iter()
            .map(|f| FieldRule::new(f, &opts.out_fields))
            .collect();

        Ok(Self {
            base: ComponentBase::new(tag.clone(), input, output).with_stats_every(stats_every(options)),
            store: Arc::new(PrefixStore {
                tag,
                path,
                current: RwLock::new(Arc::new(table.tree)),
            }),
            rules,
            reload_every: opts.reload_every(),
            warned: Mutex::new(HashSet::new()),
        })
    }

    /// 레지스트리 생성자
    pub fn build(
        input: Option<EventReceiver>,
        output: Option<EventSender>,
        options: &Options,
    ) -> Result<Arc<dyn Component>, EvpipeError> {
        Ok(Arc::new(Self::new(input, output, options)?))
    }

    /// 프리픽스 파일을 다시 읽습니다.
    pub async fn reload(&self) -> Result<usize, ProcError> {
        self.store.reload().await
    }

    /// 현재 트리의 프리픽스 수
    pub async fn prefix_count(&self) -> usize {
        self.store.current.read().await.len()
    }

    /// 이벤트 하나를 현재 트리 스냅샷으로 보강합니다.
    pub async fn enrich(&self, event: &mut Event) {
        let tree = self.store.current.read().await;
        for rule in &self.rules {
            let Some(query) = event.get(&rule.in_field).and_then(Value::as_str) else {
                self.warn_once(&rule.in_field, event.get(&rule.in_field));
                continue;
            };

            let matched = match tree.find(query) {
                Ok(matched) => matched,
                Err(e) => {
                    tracing::debug!(stage = %self.tag(), field = %rule.in_field, error = %e, "lookup failed");
                    continue;
                }
            };

            match matched {
                Some(meta) => {
                    for (dst, metakey) in &rule.outputs {
                        let value = meta.get(metakey).cloned().unwrap_or(Value::Null);
                        event.set(dst.as_str(), value);
                    }
                }
                None => {
                    for (dst, _) in &rule.outputs {
                        event.set(dst.as_str(), "");
                    }
                }
            }
        }
    }

    fn warn_once(&self, field: &str, found: Option<&Value>) {
        let Ok(mut warned) = self.warned.lock() else {
            return;
        };
        if warned.insert(field.to_owned()) {
            tracing::warn!(
                stage = %self.tag(),
                field,
                found = found.map_or("missing", evpipe_core::value::Value::type_name),
                "input field is not text, skipping (further occurrences suppressed)"
            );
        }
    }

    async fn process(&self) -> Result<(), EvpipeError> {
        while !self.base.should_stop() {
            let Some(mut event) = self.base.next_event().await else {
                break;
            };
            if event.should_run() {
                self.enrich(&mut event).await;
            }
            self.base.forward(event).await?;
            self.base.stats_add_message();
            self.base.print_stats();
        }
        Ok(())
    }
}

fn spawn_reloader(store: Arc<PrefixStore>, period: Duration, stop: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => store.reload_or_keep().await,
            }
        }
        tracing::debug!(stage = %store.tag, "periodic reload stopped");
    })
}

impl Component for LpmProc {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>> {
        Box::pin(async move {
            tracing::debug!(stage = %self.tag(), "LPM stage starting");
            let reloader = self.reload_every.map(|period| {
                tracing::info!(stage = %self.tag(), period_secs = period.as_secs_f64(), "periodic reload enabled");
                spawn_reloader(Arc::clone(&self.store), period, self.base.stop_token())
            });

            let result = self.process().await;

            if let Some(handle) = reloader {
                handle.abort();
            }
            tracing::info!(stage = %self.tag(), "LPM stage stopping");
            result
        })
    }

    fn signal<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tracing::info!(stage = %self.tag(), signal = name, "signal received");
            match name {
                "reload" => self.store.reload_or_keep().await,
                other => tracing::info!(stage = %self.tag(), signal = other, "unknown signal ignored"),
            }
        })
    }
}

impl std::fmt::Debug for LpmProc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LpmProc")
            .field("base", &self.base)
            .field("path", &self.store.path)
            .field("rules", &self.rules)
            .field("reload_every", &self.reload_every)
            .finish()
    }
}
