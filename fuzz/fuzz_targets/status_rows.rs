// fuzz/fuzz_targets/status_rows.rs
#![no_main]

use jobbot_types::parse_status_rows;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for row in parse_status_rows(text) {
        let rendered = row.render();
        assert!(rendered.starts_with("\n|"));
    }
});
