//! evpipe 변환 스테이지
//!
//! - [`lpm`]: 최장 프리픽스 매칭으로 주소 필드에 네트워크 메타데이터를 붙이는 스테이지
//! - [`digest`]: 필드 값의 솔트 다이제스트를 계산하는 스테이지
//!
//! [`register_components`]로 레지스트리에 모든 스테이지를 등록합니다.

pub mod digest;
pub mod error;
pub mod lpm;

// --- 주요 타입 re-export ---

pub use digest::{DigestOptions, DigestProc};
pub use error::ProcError;
pub use lpm::{LpmOptions, LpmProc, OutField, Prefix, PrefixTree};

use evpipe_core::registry::Registry;

/// 이 크레이트의 모든 스테이지를 등록합니다.
pub fn register_components(registry: &mut Registry) {
    registry.register(lpm::MODULE_NAME, LpmProc::build);
    registry.register(digest::MODULE_NAME, DigestProc::build);
    registry.register(digest::LEGACY_MODULE_NAME, DigestProc::build);
}
