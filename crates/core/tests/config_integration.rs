//! evpipe.toml 통합 설정 테스트
//!
//! - evpipe.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use evpipe_core::config::{EvpipeConfig, GeneralConfig};
use evpipe_core::error::{ConfigError, EvpipeError};

// =============================================================================
// evpipe.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../evpipe.toml.example");
    let config = EvpipeConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.general.channel_capacity, 1024);
    assert!(!config.metrics.enabled);
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../evpipe.toml.example");
    let config = EvpipeConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_stage_order_is_preserved() {
    let content = include_str!("../../../evpipe.toml.example");
    let config = EvpipeConfig::parse(content).expect("should parse");

    let modules: Vec<&str> = config.stages.iter().map(|s| s.module.as_str()).collect();
    assert_eq!(
        modules,
        vec!["UDPJSONInput", "LPMProc", "DigestProc", "FileJSONOutput"]
    );
}

#[test]
fn example_config_lpm_options_are_flattened() {
    let content = include_str!("../../../evpipe.toml.example");
    let config = EvpipeConfig::parse(content).expect("should parse");

    let lpm = &config.stages[1];
    assert_eq!(lpm.options["filepath"], "/etc/evpipe/prefix-asn.txt");
    assert_eq!(lpm.options["reload_minutes"], 1440);
    assert_eq!(lpm.options["in_fields"], serde_json::json!(["src", "dst"]));
    assert_eq!(
        lpm.options["out_fields"][0]["newkey"],
        "_{{in_field}}_asn"
    );
    assert!(!lpm.options.contains_key("module"));
}

#[test]
fn example_config_general_matches_code_defaults() {
    let content = include_str!("../../../evpipe.toml.example");
    let from_file = EvpipeConfig::parse(content).expect("should parse");
    let from_code = GeneralConfig::default();

    assert_eq!(from_file.general.log_level, from_code.log_level);
    assert_eq!(from_file.general.log_format, from_code.log_format);
    assert_eq!(from_file.general.channel_capacity, from_code.channel_capacity);
    assert_eq!(from_file.general.stats_every, from_code.stats_every);
    assert_eq!(
        from_file.general.shutdown_grace_secs,
        from_code.shutdown_grace_secs
    );
}

// =============================================================================
// 부분 설정 / 에러
// =============================================================================

#[test]
fn partial_config_uses_defaults() {
    let config = EvpipeConfig::parse(
        r#"
[[stages]]
module = "UDPStrInput"
port = 5514
"#,
    )
    .expect("should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.stages.len(), 1);
    config.validate().expect("defaults should validate");
}

#[test]
fn empty_file_parses_but_has_no_stages() {
    let config = EvpipeConfig::parse("").expect("empty TOML is valid");
    assert!(config.stages.is_empty());
}

#[test]
fn malformed_toml_is_parse_error() {
    let err = EvpipeConfig::parse("[general\nlog_level = ").unwrap_err();
    assert!(matches!(
        err,
        EvpipeError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn stage_without_module_is_parse_error() {
    let err = EvpipeConfig::parse(
        r#"
[[stages]]
port = 1
"#,
    )
    .unwrap_err();
    assert!(matches!(err, EvpipeError::Config(ConfigError::ParseFailed { .. })));
}

#[tokio::test]
async fn missing_file_is_file_not_found() {
    let err = EvpipeConfig::from_file("/nonexistent/evpipe.toml")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EvpipeError::Config(ConfigError::FileNotFound { .. })
    ));
}
