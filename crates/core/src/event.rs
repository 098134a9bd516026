//! 이벤트 — 스테이지 간 전달되는 데이터의 기본 단위
//!
//! 이벤트는 소스가 생성하고, 각 프로세서 스테이지가 제자리에서 필드를 추가/덮어쓰며,
//! 싱크가 직렬화 후 폐기합니다. 채널 송수신이 소유권 이전이므로 두 스테이지가
//! 같은 이벤트를 동시에 변경하는 일은 없습니다.

use std::fmt;

use crate::value::{Fields, Value};

/// 파이프라인을 흐르는 하나의 레코드
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// 필드 이름 → 값
    pub data: Fields,
    /// 선택적 처리 플래그. `Some(false)`이면 스테이지는 변환 없이 전달만 합니다.
    pub should_run: Option<bool>,
}

impl Event {
    /// 필드 매핑으로 이벤트를 생성합니다.
    pub fn new(data: Fields) -> Self {
        Self {
            data,
            should_run: None,
        }
    }

    /// 처리 플래그를 지정합니다.
    pub fn with_should_run(mut self, should_run: bool) -> Self {
        self.should_run = Some(should_run);
        self
    }

    /// 이 이벤트에 변환을 적용해야 하는지 여부 (플래그가 없으면 `true`)
    pub fn should_run(&self) -> bool {
        self.should_run.unwrap_or(true)
    }

    /// 필드 값을 조회합니다.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// 필드 값을 설정합니다 (기존 값은 덮어씁니다).
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(field.into(), value.into());
    }

    /// JSON 객체 문자열로 이벤트를 생성합니다. 주로 테스트와 도구에서 사용합니다.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(s)?;
        Ok(Self::new(crate::value::fields_from_json(map)))
    }
}

impl From<Fields> for Event {
    fn from(data: Fields) -> Self {
        Self::new(data)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event[{} fields] {}",
            self.data.len(),
            serde_json::Value::Object(crate::value::fields_to_json(&self.data))
        )
    }
}
