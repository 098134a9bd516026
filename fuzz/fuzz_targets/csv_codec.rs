#![no_main]

use arbitrary::Arbitrary;
use evpipe_core::codec::{CsvLineCodec, LineCodec};
use libfuzzer_sys::fuzz_target;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 헤더 수 (1..=8로 제한)
    columns: u8,
    separator: FuzzSeparator,
    convert: bool,
    line: Vec<u8>,
}

#[derive(Arbitrary, Debug)]
enum FuzzSeparator {
    Comma,
    Semicolon,
    Tab,
    Pipe,
}

impl FuzzSeparator {
    fn as_byte(&self) -> u8 {
        match self {
            FuzzSeparator::Comma => b',',
            FuzzSeparator::Semicolon => b';',
            FuzzSeparator::Tab => b'\t',
            FuzzSeparator::Pipe => b'|',
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let columns = usize::from(input.columns % 8) + 1;
    let headers = (0..columns).map(|i| format!("c{i}")).collect();
    let codec = CsvLineCodec::new(headers, input.separator.as_byte(), input.convert);

    if let Ok(fields) = codec.decode(&input.line) {
        assert_eq!(fields.len(), columns);
        codec.encode(&fields).expect("decoded record must encode");
    }
});
