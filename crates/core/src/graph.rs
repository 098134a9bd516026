//! 파이프라인 그래프 — 설정된 스테이지 목록을 채널로 연결하고 생명주기를 관리합니다.
//!
//! 스테이지는 설정 순서대로 선형 연결됩니다. 스테이지 *i*의 출력 채널이
//! 스테이지 *i+1*의 입력 채널이며, 첫 스테이지는 입력이 없고 마지막 스테이지는
//! 출력이 없습니다.
//!
//! # 생명주기
//! ```text
//! build() → start() → signal("reload")* → shutdown(grace) | join()
//! ```
//!
//! `build()`는 태스크를 하나도 띄우기 전에 모든 스테이지를 생성하므로, 생성 에러는
//! 처리 시작 전에 드러납니다.
//!
//! 실행 중에는 그래프가 스테이지를 약한 참조로만 들고 있습니다. 스테이지 태스크가
//! 끝나면 그 출력 송신자가 해제되어 하류 스테이지가 입력 종료를 관측합니다.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::component::{Component, DEFAULT_STATS_EVERY};
use crate::config::{OPTION_STATS_EVERY, StageConfig};
use crate::error::{EvpipeError, PipelineError};
use crate::registry::Registry;

/// 기본 채널 용량
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// 그래프 생성 옵션
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// 스테이지 간 채널 용량 (1 이상)
    pub channel_capacity: usize,
    /// 스테이지 옵션에 `stats_every`가 없을 때 주입할 값
    pub stats_every: u64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            stats_every: DEFAULT_STATS_EVERY,
        }
    }
}

/// 실행 중인 스테이지 태스크
struct StageTask {
    tag: String,
    stage: Weak<dyn Component>,
    handle: JoinHandle<Result<(), EvpipeError>>,
}

/// 선형 스테이지 그래프
pub struct PipelineGraph {
    /// 생성됐지만 아직 시작하지 않은 스테이지
    pending: Vec<Arc<dyn Component>>,
    /// 실행 중인 스테이지
    running: Vec<StageTask>,
    /// 끝난 스테이지 태스크 수
    finished: Arc<watch::Sender<usize>>,
}

impl PipelineGraph {
    /// 레지스트리에서 생성자를 찾아 모든 스테이지를 생성하고 채널로 연결합니다.
    ///
    /// # Errors
    ///
    /// - 스테이지 목록이 비었거나 채널 용량이 0이면 [`PipelineError::BuildFailed`]
    /// - 등록되지 않은 모듈 이름이면 [`crate::error::RegistryError::NotFound`]
    /// - 스테이지 생성자가 반환한 에러 (설정 오류, 필수 파일 없음 등)
    pub fn build(
        registry: &Registry,
        stages: &[StageConfig],
        options: GraphOptions,
    ) -> Result<Self, EvpipeError> {
        if stages.is_empty() {
            return Err(PipelineError::BuildFailed {
                stage: "graph".to_owned(),
                reason: "no stages configured".to_owned(),
            }
            .into());
        }
        if options.channel_capacity == 0 {
            return Err(PipelineError::BuildFailed {
                stage: "graph".to_owned(),
                reason: "channel capacity must be greater than 0".to_owned(),
            }
            .into());
        }

        let last = stages.len() - 1;
        let mut pending: Vec<Arc<dyn Component>> = Vec::with_capacity(stages.len());
        let mut upstream = None;

        for (index, stage) in stages.iter().enumerate() {
            let constructor = registry.lookup(&stage.module)?;

            let output = if index < last {
                let (tx, rx) = mpsc::channel(options.channel_capacity);
                Some((tx, rx))
            } else {
                None
            };
            let (output_tx, next_rx) = match output {
                Some((tx, rx)) => (Some(tx), Some(rx)),
                None => (None, None),
            };

            let mut stage_options = stage.options.clone();
            stage_options
                .entry(OPTION_STATS_EVERY)
                .or_insert_with(|| options.stats_every.into());

            let component = constructor(upstream.take(), output_tx, &stage_options).map_err(|e| {
                tracing::error!(index, module = %stage.module, error = %e, "failed to construct stage");
                e
            })?;
            tracing::debug!(index, module = %stage.module, tag = %component.tag(), "stage constructed");

            pending.push(component);
            upstream = next_rx;
        }

        tracing::info!(stages = pending.len(), capacity = options.channel_capacity, "pipeline graph built");
        Ok(Self {
            pending,
            running: Vec::new(),
            finished: Arc::new(watch::Sender::new(0)),
        })
    }

    /// 스테이지 수
    pub fn len(&self) -> usize {
        self.pending.len() + self.running.len()
    }

    /// 스테이지가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 시작 여부
    pub fn is_running(&self) -> bool {
        !self.running.is_empty()
    }

    /// 스테이지 태그 목록 (설정 순서)
    pub fn tags(&self) -> Vec<String> {
        if self.running.is_empty() {
            self.pending.iter().map(|s| s.tag().to_owned()).collect()
        } else {
            self.running.iter().map(|t| t.tag.clone()).collect()
        }
    }

    /// 스테이지마다 tokio 태스크를 하나씩 띄웁니다.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.pending.is_empty() {
            return Err(PipelineError::AlreadyRunning);
        }

        for stage in self.pending.drain(..) {
            let tag = stage.tag().to_owned();
            let weak = Arc::downgrade(&stage);
            let task_tag = tag.clone();
            let finished = Arc::clone(&self.finished);
            let handle = tokio::spawn(async move {
                let result = stage.run().await;
                match &result {
                    Ok(()) => tracing::info!(stage = %task_tag, "stage finished"),
                    Err(e) => tracing::error!(stage = %task_tag, error = %e, "stage failed"),
                }
                finished.send_modify(|n| *n += 1);
                result
            });
            self.running.push(StageTask {
                tag,
                stage: weak,
                handle,
            });
        }

        tracing::info!(stages = self.running.len(), "pipeline started");
        Ok(())
    }

    /// 모든 스테이지 태스크가 스스로 끝날 때까지 기다립니다.
    ///
    /// 태스크 결과는 회수하지 않으므로, 이후 [`join`](Self::join)으로 에러를 확인합니다.
    /// 시작하지 않은 그래프에서는 바로 반환합니다.
    pub async fn finished(&self) {
        let total = self.running.len();
        let mut rx = self.finished.subscribe();
        let _ = rx.wait_for(|n| *n >= total).await;
    }

    /// 모든 살아있는 스테이지에 제어 메시지를 전달합니다.
    pub async fn signal(&self, name: &str) {
        for task in &self.running {
            if let Some(stage) = task.stage.upgrade() {
                stage.signal(name).await;
            }
        }
    }

    /// 모든 살아있는 스테이지에 정지를 요청합니다.
    pub fn request_stop(&self) {
        for task in &self.running {
            if let Some(stage) = task.stage.upgrade() {
                stage.request_stop();
            }
        }
    }

    /// 정지를 요청하고 최대 `grace`만큼 기다린 뒤, 남은 태스크를 중단합니다.
    ///
    /// 스테이지가 반환한 첫 번째 에러를 돌려줍니다.
    pub async fn shutdown(&mut self, grace: Duration) -> Result<(), PipelineError> {
        if self.running.is_empty() {
            return Err(PipelineError::NotRunning);
        }

        tracing::info!(grace_secs = grace.as_secs_f64(), "pipeline shutting down");
        self.request_stop();

        let deadline = tokio::time::Instant::now() + grace;
        let mut first_error = None;

        for mut task in self.running.drain(..) {
            let outcome = match tokio::time::timeout_at(deadline, &mut task.handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!(stage = %task.tag, "stage did not stop within grace period, aborting");
                    task.handle.abort();
                    continue;
                }
            };
            if let Err(e) = flatten(&task.tag, outcome) {
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("pipeline stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// 모든 스테이지 태스크가 끝날 때까지 기다립니다.
    ///
    /// 소스 입력이 끝나면 종료가 하류로 전파되어 반환됩니다.
    pub async fn join(&mut self) -> Result<(), PipelineError> {
        if self.running.is_empty() {
            return Err(PipelineError::NotRunning);
        }

        let mut first_error = None;
        for task in self.running.drain(..) {
            if let Err(e) = flatten(&task.tag, task.handle.await) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn flatten(
    tag: &str,
    joined: Result<Result<(), EvpipeError>, tokio::task::JoinError>,
) -> Result<(), PipelineError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PipelineError::TaskFailed(format!("{tag}: {e}"))),
        Err(e) => Err(PipelineError::TaskFailed(format!("{tag}: {e}"))),
    }
}

impl std::fmt::Debug for PipelineGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineGraph")
            .field("stages", &self.tags())
            .field("running", &self.is_running())
            .finish()
    }
}
