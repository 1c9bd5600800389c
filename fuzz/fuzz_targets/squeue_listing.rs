// fuzz/fuzz_targets/squeue_listing.rs
#![no_main]

use jobbot_core::scheduler::{parse_squeue_output, parse_work_dir};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let snapshot = parse_squeue_output(text);
    for (id, record) in &snapshot {
        assert_eq!(id, &record.id);
    }
    let _ = parse_work_dir(text);
});
