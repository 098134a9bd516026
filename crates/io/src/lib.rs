//! evpipe 경계 어댑터
//!
//! 파이프라인 바깥과 바이트를 주고받는 소스/싱크 스테이지입니다.
//! 모든 어댑터는 [`evpipe_core::codec::LineCodec`]을 주입받아 레코드를 변환합니다.
//!
//! - [`file`]: 시간 기반으로 회전하는 파일 싱크 (`FileJSONOutput`, `FileCSVOutput`)
//! - [`udp`]: UDP 싱크 (`UDP{JSON,CSV,Raw,Str}Output`)와 소스 (`UDP{JSON,CSV,Raw,Str}Input`)
//!
//! [`register_components`]로 레지스트리에 모든 어댑터를 등록합니다.

pub mod error;
pub mod file;
pub mod udp;

// --- 주요 타입 re-export ---

pub use error::IoAdapterError;
pub use file::{FileOutput, FileSinkOptions};
pub use udp::{UdpInput, UdpOutput};

use std::sync::Arc;

use evpipe_core::codec::CodecKind;
use evpipe_core::component::{Component, EventReceiver, EventSender};
use evpipe_core::config::Options;
use evpipe_core::error::EvpipeError;
use evpipe_core::registry::Registry;

/// 이 크레이트의 모든 어댑터를 등록합니다.
pub fn register_components(registry: &mut Registry) {
    registry.register(file::FILE_JSON_OUTPUT, FileOutput::build_json);
    registry.register(file::FILE_CSV_OUTPUT, FileOutput::build_csv);

    registry.register("UDPJSONOutput", udp_json_output);
    registry.register("UDPCSVOutput", udp_csv_output);
    registry.register("UDPRawOutput", udp_raw_output);
    registry.register("UDPStrOutput", udp_str_output);

    registry.register("UDPJSONInput", udp_json_input);
    registry.register("UDPCSVInput", udp_csv_input);
    registry.register("UDPRawInput", udp_raw_input);
    registry.register("UDPStrInput", udp_str_input);
}

type BuildResult = Result<Arc<dyn Component>, EvpipeError>;

fn udp_output(
    index: usize,
    input: Option<EventReceiver>,
    output: Option<EventSender>,
    options: &Options,
) -> BuildResult {
    let (module, tag, kind): (&str, &str, CodecKind) = udp::OUTPUTS[index];
    Ok(Arc::new(UdpOutput::new(module, tag, kind, input, output, options)?))
}

fn udp_input(
    index: usize,
    input: Option<EventReceiver>,
    output: Option<EventSender>,
    options: &Options,
) -> BuildResult {
    let (module, tag, kind): (&str, &str, CodecKind) = udp::INPUTS[index];
    Ok(Arc::new(UdpInput::new(module, tag, kind, input, output, options)?))
}

fn udp_json_output(i: Option<EventReceiver>, o: Option<EventSender>, opts: &Options) -> BuildResult {
    udp_output(0, i, o, opts)
}

fn udp_csv_output(i: Option<EventReceiver>, o: Option<EventSender>, opts: &Options) -> BuildResult {
    udp_output(1, i, o, opts)
}

fn udp_raw_output(i: Option<EventReceiver>, o: Option<EventSender>, opts: &Options) -> BuildResult {
    udp_output(2, i, o, opts)
}

fn udp_str_output(i: Option<EventReceiver>, o: Option<EventSender>, opts: &Options) -> BuildResult {
    udp_output(3, i, o, opts)
}

fn udp_json_input(i: Option<EventReceiver>, o: Option<EventSender>, opts: &Options) -> BuildResult {
    udp_input(0, i, o, opts)
}

fn udp_csv_input(i: Option<EventReceiver>, o: Option<EventSender>, opts: &Options) -> BuildResult {
    udp_input(1, i, o, opts)
}

fn udp_raw_input(i: Option<EventReceiver>, o: Option<EventSender>, opts: &Options) -> BuildResult {
    udp_input(2, i, o, opts)
}

fn udp_str_input(i: Option<EventReceiver>, o: Option<EventSender>, opts: &Options) -> BuildResult {
    udp_input(3, i, o, opts)
}
