//! The parser must never panic or error on input content.

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use undertone::{Lexicon, SignalParser};

const LEXICON: &str = include_str!("../../data/signal_lexicon.json");

fn parser() -> &'static SignalParser {
    static PARSER: OnceLock<SignalParser> = OnceLock::new();
    PARSER.get_or_init(|| {
        let lexicon = Lexicon::from_json_str(LEXICON).expect("shipped lexicon parses");
        SignalParser::new(&lexicon, 1.0, 0.05).expect("shipped lexicon compiles")
    })
}

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let output = parser().parse(text);
        for hit in &output.hits {
            assert!(hit.confidence > 0.05 && hit.confidence <= 1.0);
        }
    }
});
