//! 스테이지 생명주기 통합 테스트
//!
//! - 정지 요청 이후 처리되는 이벤트 수
//! - 그래프 연결과 종료 전파
//! - 제어 메시지 전달
//! - 유예 시간 이후 강제 중단

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use evpipe_core::component::{BoxFuture, Component, ComponentBase, EventReceiver, EventSender};
use evpipe_core::config::{Options, StageConfig, parse_options};
use evpipe_core::error::EvpipeError;
use evpipe_core::event::Event;
use evpipe_core::graph::{GraphOptions, PipelineGraph};
use evpipe_core::registry::Registry;
use evpipe_core::value::Value;
use serde::Deserialize;
use tokio::sync::mpsc;

// =============================================================================
// 테스트 스테이지
// =============================================================================

/// `count`개의 이벤트를 만들고 끝나는 소스
struct CountingSource {
    base: ComponentBase,
    count: i64,
}

#[derive(Deserialize)]
struct CountingOptions {
    count: i64,
}

impl Component for CountingSource {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>> {
        Box::pin(async move {
            for n in 0..self.count {
                if self.base.should_stop() {
                    break;
                }
                let mut event = Event::default();
                event.set("n", n);
                self.base.forward(event).await?;
                self.base.stats_add_message();
            }
            Ok(())
        })
    }
}

fn counting_source(
    input: Option<EventReceiver>,
    output: Option<EventSender>,
    options: &Options,
) -> Result<Arc<dyn Component>, EvpipeError> {
    let opts: CountingOptions = parse_options("CountingSource", options)?;
    Ok(Arc::new(CountingSource {
        base: ComponentBase::new("COUNTING_SOURCE", input, output),
        count: opts.count,
    }))
}

/// 정지 요청이 올 때까지 대기하는 소스
struct IdleSource {
    base: ComponentBase,
}

impl Component for IdleSource {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>> {
        Box::pin(async move {
            self.base.stop_token().cancelled().await;
            Ok(())
        })
    }
}

fn idle_source(
    input: Option<EventReceiver>,
    output: Option<EventSender>,
    _options: &Options,
) -> Result<Arc<dyn Component>, EvpipeError> {
    Ok(Arc::new(IdleSource {
        base: ComponentBase::new("IDLE_SOURCE", input, output),
    }))
}

/// 정지 요청을 무시하는 스테이지
struct Stubborn {
    base: ComponentBase,
}

impl Component for Stubborn {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>> {
        Box::pin(async move {
            std::future::pending::<()>().await;
            Ok(())
        })
    }
}

fn stubborn(
    input: Option<EventReceiver>,
    output: Option<EventSender>,
    _options: &Options,
) -> Result<Arc<dyn Component>, EvpipeError> {
    Ok(Arc::new(Stubborn {
        base: ComponentBase::new("STUBBORN", input, output),
    }))
}

static TAGGED_SUM: AtomicU64 = AtomicU64::new(0);
static RELOADS: AtomicU64 = AtomicU64::new(0);

/// 이벤트에 `tagged` 필드를 붙이고, 출력이 없으면 `n` 값을 누적하는 스테이지
struct Tagger {
    base: ComponentBase,
}

impl Component for Tagger {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>> {
        Box::pin(async move {
            while !self.base.should_stop() {
                let Some(mut event) = self.base.next_event().await else {
                    break;
                };
                if event.should_run() {
                    event.set("tagged", true);
                }
                if !self.base.has_output()
                    && let (Some(Value::Int(n)), Some(Value::Bool(true))) =
                        (event.get("n"), event.get("tagged"))
                {
                    TAGGED_SUM.fetch_add(*n as u64, Ordering::SeqCst);
                }
                self.base.forward(event).await?;
                self.base.stats_add_message();
                self.base.print_stats();
            }
            Ok(())
        })
    }

    fn signal<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if name == "reload" {
                RELOADS.fetch_add(1, Ordering::SeqCst);
            }
        })
    }
}

fn tagger(
    input: Option<EventReceiver>,
    output: Option<EventSender>,
    options: &Options,
) -> Result<Arc<dyn Component>, EvpipeError> {
    let base = ComponentBase::new("TAGGER", input, output)
        .with_stats_every(evpipe_core::config::stats_every(options));
    Ok(Arc::new(Tagger { base }))
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register("CountingSource", counting_source);
    registry.register("IdleSource", idle_source);
    registry.register("Stubborn", stubborn);
    registry.register("Tagger", tagger);
    registry
}

fn stage(module: &str, options: serde_json::Value) -> StageConfig {
    let serde_json::Value::Object(options) = options else {
        panic!("options must be an object");
    };
    StageConfig::new(module, options)
}

// =============================================================================
// 정지 의미론
// =============================================================================

#[tokio::test]
async fn stop_allows_at_most_one_in_flight_event() {
    let (in_tx, in_rx) = mpsc::channel(16);
    let (out_tx, mut out_rx) = mpsc::channel(16);
    let comp = Arc::new(Tagger {
        base: ComponentBase::new("TAGGER", Some(in_rx), Some(out_tx)),
    });
    let handle = tokio::spawn(Arc::clone(&comp).run());

    in_tx.send(Event::default()).await.unwrap();
    out_rx.recv().await.unwrap();
    assert_eq!(comp.base().messages(), 1);

    comp.request_stop();
    for _ in 0..5 {
        in_tx.send(Event::default()).await.unwrap();
    }

    handle.await.unwrap().unwrap();
    assert!(
        comp.base().messages() <= 2,
        "processed {} events, expected at most one after stop",
        comp.base().messages()
    );
}

#[tokio::test]
async fn stop_before_start_processes_nothing() {
    let (in_tx, in_rx) = mpsc::channel(4);
    let comp = Arc::new(Tagger {
        base: ComponentBase::new("TAGGER", Some(in_rx), None),
    });
    in_tx.send(Event::default()).await.unwrap();
    comp.request_stop();

    Arc::clone(&comp).run().await.unwrap();
    assert_eq!(comp.base().messages(), 0);
}

// =============================================================================
// 그래프
// =============================================================================

#[tokio::test]
async fn graph_runs_to_completion_when_source_ends() {
    let stages = [
        stage("CountingSource", serde_json::json!({ "count": 100 })),
        stage("Tagger", serde_json::json!({})),
        stage("Tagger", serde_json::json!({ "stats_every": 10 })),
    ];
    let mut graph = PipelineGraph::build(
        &registry(),
        &stages,
        GraphOptions {
            channel_capacity: 2,
            ..GraphOptions::default()
        },
    )
    .unwrap();
    assert_eq!(graph.len(), 3);

    graph.start().unwrap();
    assert!(graph.is_running());
    tokio::time::timeout(Duration::from_secs(5), graph.join())
        .await
        .expect("pipeline should drain")
        .unwrap();

    assert_eq!(TAGGED_SUM.load(Ordering::SeqCst), (0..100).sum::<u64>());
}

#[tokio::test]
async fn graph_construction_error_aborts_build() {
    let stages = [
        stage("CountingSource", serde_json::json!({ "count": "many" })),
        stage("Tagger", serde_json::json!({})),
    ];
    let err = PipelineGraph::build(&registry(), &stages, GraphOptions::default()).unwrap_err();
    assert!(matches!(err, EvpipeError::Config(_)));
}

#[tokio::test]
async fn graph_delivers_signals() {
    let stages = [
        stage("IdleSource", serde_json::json!({})),
        stage("Tagger", serde_json::json!({})),
    ];
    let mut graph = PipelineGraph::build(&registry(), &stages, GraphOptions::default()).unwrap();
    graph.start().unwrap();

    let before = RELOADS.load(Ordering::SeqCst);
    graph.signal("reload").await;
    graph.signal("unknown").await;
    assert_eq!(RELOADS.load(Ordering::SeqCst), before + 1);

    graph.shutdown(Duration::from_secs(5)).await.unwrap();
    assert!(!graph.is_running());
}

#[tokio::test]
async fn shutdown_propagates_through_idle_chain() {
    let stages = [
        stage("IdleSource", serde_json::json!({})),
        stage("Tagger", serde_json::json!({})),
        stage("Tagger", serde_json::json!({})),
    ];
    let mut graph = PipelineGraph::build(&registry(), &stages, GraphOptions::default()).unwrap();
    graph.start().unwrap();

    tokio::time::timeout(Duration::from_secs(5), graph.shutdown(Duration::from_secs(2)))
        .await
        .expect("shutdown should finish")
        .unwrap();
}

#[tokio::test]
async fn shutdown_aborts_stages_that_ignore_stop() {
    let stages = [
        stage("Stubborn", serde_json::json!({})),
        stage("Tagger", serde_json::json!({})),
    ];
    let mut graph = PipelineGraph::build(&registry(), &stages, GraphOptions::default()).unwrap();
    graph.start().unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        graph.shutdown(Duration::from_millis(100)),
    )
    .await
    .expect("shutdown should finish after grace")
    .unwrap();
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let stages = [stage("IdleSource", serde_json::json!({}))];
    let mut graph = PipelineGraph::build(&registry(), &stages, GraphOptions::default()).unwrap();
    graph.start().unwrap();
    assert!(graph.start().is_err());
    graph.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn finished_resolves_once_every_stage_returns() {
    let stages = [stage("CountingSource", serde_json::json!({ "count": 3 }))];
    let mut graph = PipelineGraph::build(&registry(), &stages, GraphOptions::default()).unwrap();
    graph.start().unwrap();

    tokio::time::timeout(Duration::from_secs(5), graph.finished())
        .await
        .expect("single stage should finish");
    graph.join().await.unwrap();
}

#[tokio::test]
async fn finished_stays_pending_while_a_stage_runs() {
    let stages = [stage("IdleSource", serde_json::json!({}))];
    let mut graph = PipelineGraph::build(&registry(), &stages, GraphOptions::default()).unwrap();
    graph.start().unwrap();

    let waited = tokio::time::timeout(Duration::from_millis(100), graph.finished()).await;
    assert!(waited.is_err());
    graph.shutdown(Duration::from_secs(1)).await.unwrap();
}
