// fuzz/fuzz_targets/sidecar_ini.rs
#![no_main]

use jobbot_core::sidecar::IniDocument;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(doc) = IniDocument::parse(text) {
        let _ = doc.get("PR", "repo");
        let _ = doc.has_section("RESULT");
    }
});
