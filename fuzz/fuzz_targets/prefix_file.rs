#![no_main]

use evpipe_proc::lpm::parse_prefix_file;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    let table = parse_prefix_file(content);
    assert_eq!(table.tree.len(), table.loaded);

    for query in ["10.0.0.1", "::1", "192.168.0.0/16", "2001:db8::/48"] {
        let _ = table.tree.find(query);
    }
});
