#![no_main]

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use arbitrary::Arbitrary;
use evpipe_proc::lpm::{Prefix, PrefixTree};
use libfuzzer_sys::fuzz_target;

/// 퍼저용 구조적 입력 (주소 원시 바이트 + 길이)
#[derive(Arbitrary, Debug)]
enum FuzzPrefix {
    V4([u8; 4], u8),
    V6([u8; 16], u8),
}

impl FuzzPrefix {
    fn to_prefix(&self) -> Option<Prefix> {
        match self {
            FuzzPrefix::V4(octets, len) => {
                Prefix::new(IpAddr::V4(Ipv4Addr::from(*octets)), len % 33).ok()
            }
            FuzzPrefix::V6(octets, len) => {
                Prefix::new(IpAddr::V6(Ipv6Addr::from(*octets)), len % 129).ok()
            }
        }
    }
}

fuzz_target!(|prefixes: Vec<FuzzPrefix>| {
    let mut tree = PrefixTree::new();
    let mut inserted = Vec::new();
    for (i, p) in prefixes.iter().take(256).enumerate() {
        let Some(prefix) = p.to_prefix() else {
            continue;
        };
        if tree.insert(prefix, i) {
            inserted.push(prefix);
        }
    }
    assert_eq!(tree.len(), inserted.len());

    // 저장된 프리픽스로 조회하면 최소한 그 자신이 매칭되어야 합니다.
    for prefix in &inserted {
        let (matched, _) = tree.longest_match(prefix).expect("stored prefix must match");
        assert_eq!(matched, prefix);
        let host = Prefix::host(prefix.addr());
        let (covering, _) = tree.longest_match(&host).expect("host inside stored prefix must match");
        assert!(covering.len() >= prefix.len());
    }
});
