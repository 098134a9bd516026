//! 컴포넌트 계약 — 모든 파이프라인 스테이지가 구현하는 생명주기 trait
//!
//! [`Component`]는 두 가지 동작을 제공합니다.
//! - `run()`: 스테이지의 처리 루프. 정지 요청 또는 입력 채널 종료 시에만 반환합니다.
//! - `signal(name)`: 데이터 채널과 별개로 전달되는 제어 메시지 (예: `"reload"`).
//!
//! [`ComponentBase`]는 모든 스테이지가 값으로 포함하는 공통 런타임입니다.
//! (입출력 채널, 정지 토큰, 태그, 처리량 카운터)
//!
//! # 처리 루프 규약
//! ```text
//! loop {
//!     (a) 정지 플래그 확인
//!     (b) 입력 채널에서 이벤트 대기
//!     (c) 변환 적용
//!     (d) 출력 채널이 있으면 전달 (하류가 느리면 여기서 대기 = 역압)
//!     (e) 카운터 증가, 주기적으로 처리량 로그
//! }
//! ```
//!
//! 정지는 요청일 뿐 보장이 아닙니다. 수신 대기 중인 스테이지는 다음 반복에서
//! 플래그를 확인하므로, 정지 요청 이후 최대 한 개의 이벤트가 더 처리될 수 있습니다.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{EvpipeError, PipelineError};
use crate::event::Event;

/// `Send` 가능한 박싱된 Future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 스테이지 입력 채널
pub type EventReceiver = mpsc::Receiver<Event>;

/// 스테이지 출력 채널
pub type EventSender = mpsc::Sender<Event>;

/// 처리량 로그 기본 주기 (메시지 수)
pub const DEFAULT_STATS_EVERY: u64 = 10_000;

/// 모든 파이프라인 스테이지가 구현하는 trait
///
/// 레지스트리의 생성자는 `Arc<dyn Component>`를 반환하므로, 실행 중에도
/// 다른 태스크에서 `signal()`과 `request_stop()`을 호출할 수 있습니다.
pub trait Component: Send + Sync {
    /// 공통 런타임 상태
    fn base(&self) -> &ComponentBase;

    /// 처리 루프를 실행합니다. 정지 요청 또는 입력 종료 시 반환합니다.
    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>>;

    /// 제어 메시지를 전달합니다.
    ///
    /// 이해하지 못하는 이름은 로그만 남기고 무시합니다.
    fn signal<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tracing::info!(stage = %self.tag(), signal = name, "unknown signal ignored");
        })
    }

    /// 스테이지 태그
    fn tag(&self) -> &str {
        self.base().tag()
    }

    /// 정지를 요청합니다.
    fn request_stop(&self) {
        self.base().request_stop();
    }
}

/// 처리량 로그 윈도우
#[derive(Debug)]
struct StatsWindow {
    last_at: Instant,
    last_count: u64,
}

/// 모든 스테이지가 포함하는 공통 상태와 헬퍼
///
/// 입력 수신자는 비동기 뮤텍스 뒤에 있어 `run()`이 `&self`만으로 루프를 돌 수 있습니다.
/// 스테이지당 처리 루프는 하나이므로 이 뮤텍스에서 경합은 발생하지 않습니다.
pub struct ComponentBase {
    /// 로깅/메트릭용 태그
    tag: String,
    /// 입력 채널 (소스는 없음)
    input: Option<tokio::sync::Mutex<EventReceiver>>,
    /// 출력 채널 (싱크는 없음)
    output: Option<EventSender>,
    /// 정지 요청 토큰
    stop: CancellationToken,
    /// 처리한 메시지 수
    messages: AtomicU64,
    /// 처리량 로그 주기 (0이면 비활성)
    stats_every: u64,
    /// 마지막 처리량 로그 시점
    window: Mutex<StatsWindow>,
}

impl ComponentBase {
    /// 새 공통 런타임을 생성합니다.
    pub fn new(
        tag: impl Into<String>,
        input: Option<EventReceiver>,
        output: Option<EventSender>,
    ) -> Self {
        Self {
            tag: tag.into(),
            input: input.map(tokio::sync::Mutex::new),
            output,
            stop: CancellationToken::new(),
            messages: AtomicU64::new(0),
            stats_every: DEFAULT_STATS_EVERY,
            window: Mutex::new(StatsWindow {
                last_at: Instant::now(),
                last_count: 0,
            }),
        }
    }

    /// 처리량 로그 주기를 설정합니다.
    pub fn with_stats_every(mut self, every: u64) -> Self {
        self.stats_every = every;
        self
    }

    /// 스테이지 태그
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// 입력 채널 보유 여부
    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// 출력 채널 보유 여부
    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// 정지를 요청합니다.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// 정지 요청 여부
    pub fn should_stop(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// 정지 토큰의 자식 토큰. 스테이지가 띄운 보조 태스크 종료에 사용합니다.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.child_token()
    }

    /// 다음 이벤트를 기다립니다.
    ///
    /// 입력 채널이 없거나 모든 송신자가 닫혔으면 `None`을 반환합니다.
    pub async fn next_event(&self) -> Option<Event> {
        let input = self.input.as_ref()?;
        input.lock().await.recv().await
    }

    /// 출력 채널이 있으면 이벤트를 전달합니다.
    ///
    /// 하류 채널이 가득 차 있으면 여기서 대기합니다 (유일한 역압 메커니즘).
    pub async fn forward(&self, event: Event) -> Result<(), PipelineError> {
        match &self.output {
            Some(tx) => tx
                .send(event)
                .await
                .map_err(|_| PipelineError::ChannelSend(format!("{}: downstream closed", self.tag))),
            None => Ok(()),
        }
    }

    /// 처리 메시지 카운터를 증가시킵니다.
    pub fn stats_add_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(crate::metrics::STAGE_EVENTS_TOTAL, crate::metrics::LABEL_STAGE => self.tag.clone())
            .increment(1);
    }

    /// 처리한 메시지 수
    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// 설정된 주기마다 처리량 로그를 남깁니다.
    pub fn print_stats(&self) {
        let count = self.messages();
        if self.stats_every == 0 || count == 0 || count % self.stats_every != 0 {
            return;
        }

        let Ok(mut window) = self.window.lock() else {
            return;
        };
        let elapsed = window.last_at.elapsed().as_secs_f64();
        let delta = count - window.last_count;
        let rate = if elapsed > 0.0 {
            delta as f64 / elapsed
        } else {
            0.0
        };
        window.last_at = Instant::now();
        window.last_count = count;

        tracing::info!(
            stage = %self.tag,
            total = count,
            rate = format!("{rate:.1}/s"),
            "stage throughput"
        );
    }
}

impl std::fmt::Debug for ComponentBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentBase")
            .field("tag", &self.tag)
            .field("has_input", &self.has_input())
            .field("has_output", &self.has_output())
            .field("stopped", &self.should_stop())
            .field("messages", &self.messages())
            .finish()
    }
}
