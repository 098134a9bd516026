//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 스테이지는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! 레코더가 설치되지 않았으면 매크로 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `evpipe_`
//! - 영역: `stage_`, `lpm_`, `codec_`, `sink_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스테이지 태그 레이블 키
pub const LABEL_STAGE: &str = "stage";

/// 코덱 이름 레이블 키 (json, csv, raw, string)
pub const LABEL_CODEC: &str = "codec";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 스테이지 공통 ─────────────────────────────────────────────────

/// 스테이지가 처리한 이벤트 수 (counter, label: stage)
pub const STAGE_EVENTS_TOTAL: &str = "evpipe_stage_events_total";

// ─── LPM ─────────────────────────────────────────────────────────

/// LPM: 재적재 시도 수 (counter, labels: stage, result)
pub const LPM_RELOADS_TOTAL: &str = "evpipe_lpm_reloads_total";

/// LPM: 현재 트리에 적재된 프리픽스 수 (gauge, label: stage)
pub const LPM_PREFIXES_LOADED: &str = "evpipe_lpm_prefixes_loaded";

/// LPM: 재적재 소요 시간 (histogram, 초)
pub const LPM_RELOAD_DURATION_SECONDS: &str = "evpipe_lpm_reload_duration_seconds";

// ─── 코덱 / 경계 어댑터 ──────────────────────────────────────────────

/// 디코딩/인코딩 실패 수 (counter, labels: stage, codec)
pub const CODEC_ERRORS_TOTAL: &str = "evpipe_codec_errors_total";

/// 싱크가 기록/전송한 레코드 수 (counter, label: stage)
pub const SINK_RECORDS_TOTAL: &str = "evpipe_sink_records_total";

/// 재적재 소요 시간 히스토그램 버킷 (초)
pub const RELOAD_DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(STAGE_EVENTS_TOTAL, "Events processed per pipeline stage");

    describe_counter!(
        LPM_RELOADS_TOTAL,
        "Prefix table reload attempts by result (success, failure)"
    );
    describe_gauge!(
        LPM_PREFIXES_LOADED,
        "Prefixes in the currently published lookup tree"
    );
    describe_histogram!(
        LPM_RELOAD_DURATION_SECONDS,
        "Time spent reading and building a prefix table in seconds"
    );

    describe_counter!(
        CODEC_ERRORS_TOTAL,
        "Records dropped because they failed to decode or encode"
    );
    describe_counter!(SINK_RECORDS_TOTAL, "Records written or sent by sinks");
}
