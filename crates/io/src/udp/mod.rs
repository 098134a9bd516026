//! UDP 어댑터
//!
//! - [`UdpOutput`]: 이벤트를 인코딩해 데이터그램 하나로 전송하는 싱크
//! - [`UdpInput`]: 데이터그램 하나를 디코딩해 이벤트 하나로 만드는 소스
//!
//! 두 어댑터 모두 코덱 종류만 다른 네 가지 모듈 이름으로 등록됩니다.

pub mod input;
pub mod output;

pub use input::{UdpInput, UdpSourceOptions};
pub use output::{UdpOutput, UdpSinkOptions};

use evpipe_core::codec::CodecKind;

/// (모듈 이름, 태그, 코덱) 목록: 싱크
pub const OUTPUTS: [(&str, &str, CodecKind); 4] = [
    ("UDPJSONOutput", "OUT-UDP-JSON", CodecKind::Json),
    ("UDPCSVOutput", "OUT-UDP-CSV", CodecKind::Csv),
    ("UDPRawOutput", "OUT-UDP-RAW", CodecKind::Raw),
    ("UDPStrOutput", "OUT-UDP-STR", CodecKind::Str),
];

/// (모듈 이름, 태그, 코덱) 목록: 소스
pub const INPUTS: [(&str, &str, CodecKind); 4] = [
    ("UDPJSONInput", "IN-UDP-JSON", CodecKind::Json),
    ("UDPCSVInput", "IN-UDP-CSV", CodecKind::Csv),
    ("UDPRawInput", "IN-UDP-RAW", CodecKind::Raw),
    ("UDPStrInput", "IN-UDP-STR", CodecKind::Str),
];
