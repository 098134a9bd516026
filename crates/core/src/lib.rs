//! evpipe 공통 크레이트
//!
//! 파이프라인의 모든 스테이지 크레이트가 공유하는 타입과 계약을 정의합니다.
//!
//! - [`event`] / [`value`]: 스테이지 간 전달되는 이벤트와 필드 값
//! - [`component`]: 스테이지 생명주기 trait과 공통 런타임
//! - [`registry`]: 모듈 이름 → 생성자 매핑
//! - [`codec`]: 경계 어댑터용 라인 코덱
//! - [`graph`]: 스테이지 연결과 시작/정지
//! - [`config`]: 데몬 설정과 스테이지 옵션 변환
//! - [`error`]: 에러 계층
//! - [`metrics`]: 메트릭 이름

pub mod codec;
pub mod component;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod metrics;
pub mod registry;
pub mod value;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{CodecError, ConfigError, EvpipeError, PipelineError, RegistryError};

// 설정
pub use config::{EvpipeConfig, Options, StageConfig, parse_options};

// 이벤트
pub use event::Event;
pub use value::{Fields, Value};

// 컴포넌트 계약
pub use component::{BoxFuture, Component, ComponentBase, EventReceiver, EventSender};

// 레지스트리
pub use registry::{Constructor, Registry};

// 코덱
pub use codec::{CodecKind, LineCodec};

// 그래프
pub use graph::{GraphOptions, PipelineGraph};
