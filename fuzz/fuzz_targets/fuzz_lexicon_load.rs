//! The lexicon loader must never panic on arbitrary JSON-ish bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use undertone::Lexicon;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = Lexicon::from_json_str(text);
    }
});
