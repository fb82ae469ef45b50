//! Undertone: lexicon-driven emotional signal parsing and glyph response
//! matching.
//!
//! The pipeline per interaction is `parse → select → compose → feedback`:
//! free text is classified into ranked signal hits against a keyword
//! lexicon, matched to the best response glyph in a SQLite catalog, and
//! answered with the glyph's stored template or a contextual synthesis.
//! Every exchange is appended to a durable JSONL feedback log.
//!
//! The core is single-threaded cooperative: one interaction runs to
//! completion on the calling thread, and no component hides a thread or
//! suspends. The lexicon is immutable after load; catalog writes are
//! serialized by SQLite's writer lock.

pub mod composer;
pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod lexicon;
pub mod parser;
pub mod selector;
pub mod tokenize;

pub use composer::{tone_phrase, Composed, Composer, ResponseSource};
pub use config::EngineConfig;
pub use engine::{process_once, Engine, ProcessOptions, ProcessOutcome};
pub use error::EngineError;
pub use feedback::{FeedbackRecord, FeedbackStats, FeedbackStore};
pub use lexicon::{Lexicon, SignalMeta, FULL_LEXICON_FILE, RUNTIME_LEXICON_FILE};
pub use parser::{ParseOutput, SignalHit, SignalParser};
pub use selector::{GlyphSelector, Selection, SelectionContext};

pub use glyph_store::{CatalogError, ConsolidationMap, Glyph, GlyphCatalog};
