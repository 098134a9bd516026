//! 컴포넌트 레지스트리 — 타입 이름 → 생성자 매핑
//!
//! 각 컴포넌트 크레이트는 `register_components(&mut Registry)`로 자기 타입을 등록합니다.
//! 그래프 빌더는 설정의 `module` 이름으로 생성자를 조회합니다.
//!
//! # 생명주기
//! ```text
//! Registry::new() → register()* (순차 초기화) → install() → global() 읽기 전용
//! ```
//!
//! 같은 이름을 다시 등록하면 마지막 등록이 이깁니다.
//! [`install`] 이후에는 전역 레지스트리가 고정되며, 두 번째 설치는 에러입니다.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::component::{Component, EventReceiver, EventSender};
use crate::config::Options;
use crate::error::{EvpipeError, RegistryError};

/// 컴포넌트 생성자: `(입력 채널, 출력 채널, 옵션) → Component`
pub type Constructor =
    fn(Option<EventReceiver>, Option<EventSender>, &Options) -> Result<Arc<dyn Component>, EvpipeError>;

/// 컴포넌트 레지스트리
#[derive(Default, Clone)]
pub struct Registry {
    constructors: HashMap<String, Constructor>,
}

impl Registry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 생성자를 등록합니다. 같은 이름이 있으면 덮어씁니다.
    pub fn register(&mut self, name: impl Into<String>, constructor: Constructor) {
        let name = name.into();
        tracing::debug!(component = %name, "registering component");
        if self.constructors.insert(name.clone(), constructor).is_some() {
            tracing::debug!(component = %name, "component re-registered, previous constructor replaced");
        }
    }

    /// 이름으로 생성자를 조회합니다.
    pub fn lookup(&self, name: &str) -> Result<Constructor, RegistryError> {
        self.constructors
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_owned(),
            })
    }

    /// 등록 여부
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// 등록된 이름 목록 (정렬됨)
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 등록된 생성자 수
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// 레지스트리를 프로세스 전역으로 고정합니다.
///
/// 파이프라인 태스크를 띄우기 전, 순차 초기화 단계에서 한 번만 호출해야 합니다.
pub fn install(registry: Registry) -> Result<&'static Registry, RegistryError> {
    let count = registry.len();
    GLOBAL
        .set(registry)
        .map_err(|_| RegistryError::AlreadyInstalled)?;
    tracing::info!(components = count, "component registry installed");
    GLOBAL.get().ok_or(RegistryError::AlreadyInstalled)
}

/// 전역 레지스트리. [`install`] 전에는 `None`입니다.
pub fn global() -> Option<&'static Registry> {
    GLOBAL.get()
}
