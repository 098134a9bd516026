#![no_main]

use evpipe_core::codec::{JsonLineCodec, LineCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let codec = JsonLineCodec;
    let Ok(fields) = codec.decode(data) else {
        return;
    };
    // 디코딩된 레코드는 항상 다시 인코딩/디코딩할 수 있어야 합니다.
    let encoded = codec.encode(&fields).expect("decoded record must encode");
    codec.decode(&encoded).expect("encoded record must decode");
});
