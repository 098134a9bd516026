//! 다이제스트 스테이지 — 입력 필드 값에 솔트를 붙여 SHA-256 다이제스트를 계산합니다.
//!
//! `in_fields[i]`의 텍스트 값에 `salt`를 이어 붙인 바이트열의 다이제스트를
//! 소문자 hex 문자열로 `out_fields[i]`에 저장합니다.
//!
//! ```toml
//! [[stages]]
//! module = "DigestProc"
//! in_fields = ["user", "email"]
//! out_fields = ["user_digest", "email_digest"]
//! salt = "change-me"
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use sha2::{Digest, Sha256};

use evpipe_core::component::{BoxFuture, Component, ComponentBase, EventReceiver, EventSender};
use evpipe_core::config::{Options, parse_options, stats_every};
use evpipe_core::error::EvpipeError;
use evpipe_core::event::Event;
use evpipe_core::value::Value;

use crate::error::ProcError;

/// 레지스트리 등록 이름
pub const MODULE_NAME: &str = "DigestProc";

/// 이전 설정 파일과의 호환을 위한 별칭 (알고리즘은 동일하게 SHA-256)
pub const LEGACY_MODULE_NAME: &str = "Md5Proc";

/// 다이제스트 스테이지 옵션
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DigestOptions {
    /// 입력 필드 목록
    pub in_fields: Vec<String>,
    /// 출력 필드 목록 (`in_fields`와 같은 길이)
    pub out_fields: Vec<String>,
    /// 값 뒤에 붙이는 솔트
    pub salt: String,
}

impl DigestOptions {
    /// 옵션 값을 검증합니다.
    pub fn validate(&self) -> Result<(), ProcError> {
        if self.in_fields.len() != self.out_fields.len() {
            return Err(ProcError::Config {
                field: format!("{MODULE_NAME}.out_fields"),
                reason: format!(
                    "expected {} output fields to match in_fields, got {}",
                    self.in_fields.len(),
                    self.out_fields.len()
                ),
            });
        }
        Ok(())
    }
}

/// `value || salt`의 SHA-256 다이제스트 (소문자 hex)
pub fn salted_digest(value: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// 다이제스트 스테이지
#[derive(Debug)]
pub struct DigestProc {
    base: ComponentBase,
    pairs: Vec<(String, String)>,
    salt: String,
    warned: Mutex<HashSet<String>>,
}

impl DigestProc {
    /// 옵션을 검증하고 스테이지를 생성합니다.
    pub fn new(
        input: Option<EventReceiver>,
        output: Option<EventSender>,
        options: &Options,
    ) -> Result<Self, EvpipeError> {
        let opts: DigestOptions = parse_options(MODULE_NAME, options)?;
        opts.validate()?;

        if input.is_none() {
            return Err(ProcError::Config {
                field: MODULE_NAME.to_owned(),
                reason: "requires an input channel (cannot be the first stage)".to_owned(),
            }
            .into());
        }

        tracing::info!(fields = opts.in_fields.len(), "creating digest stage");
        Ok(Self {
            base: ComponentBase::new("PROC-DIGEST", input, output)
                .with_stats_every(stats_every(options)),
            pairs: opts.in_fields.into_iter().zip(opts.out_fields).collect(),
            salt: opts.salt,
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

    /// 이벤트의 설정된 필드마다 다이제스트를 계산해 저장합니다.
    pub fn apply(&self, event: &mut Event) {
        for (in_field, out_field) in &self.pairs {
            let digest = match event.get(in_field) {
                Some(Value::Text(s)) => salted_digest(s, &self.salt),
                other => {
                    self.warn_once(in_field, other);
                    continue;
                }
            };
            event.set(out_field.as_str(), digest);
        }
    }

    fn warn_once(&self, field: &str, found: Option<&Value>) {
        let Ok(mut warned) = self.warned.lock() else {
            return;
        };
        if warned.insert(field.to_owned()) {
            tracing::warn!(
                stage = %self.base.tag(),
                field,
                found = found.map_or("missing", evpipe_core::value::Value::type_name),
                "input field is not text, skipping (further occurrences suppressed)"
            );
        }
    }
}

impl Component for DigestProc {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn run(self: Arc<Self>) -> BoxFuture<'static, Result<(), EvpipeError>> {
        Box::pin(async move {
            tracing::debug!(stage = %self.tag(), "digest stage starting");
            while !self.base.should_stop() {
                let Some(mut event) = self.base.next_event().await else {
                    break;
                };
                if event.should_run() {
                    self.apply(&mut event);
                }
                self.base.forward(event).await?;
                self.base.stats_add_message();
                self.base.print_stats();
            }
            tracing::info!(stage = %self.tag(), "digest stage stopping");
            Ok(())
        })
    }
}
