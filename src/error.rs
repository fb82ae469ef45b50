//! Engine-level error types.

use std::path::PathBuf;

use glyph_store::CatalogError;

/// Errors surfaced by the engine.
///
/// Only infrastructure trouble lives here. The parser and composer never
/// fail on input content, and the selector reports "no glyph" instead of
/// erroring on ambiguity.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Engine configuration file unreadable or invalid.
    #[error("cannot load engine config from {path}: {reason}")]
    Config { path: PathBuf, reason: String },
    /// Neither lexicon form was readable at startup.
    #[error("cannot load signal lexicon from {dir}: {reason}")]
    LexiconLoad { dir: PathBuf, reason: String },
    /// The lexicon loaded but its keywords would not compile into a matcher.
    #[error("cannot compile lexicon keywords: {0}")]
    LexiconCompile(String),
    /// Catalog open or storage failure, including busy timeouts.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// A single parse+select call exceeded the CPU-time guard.
    #[error("processing exceeded the CPU-time guard")]
    ProcessingTimeout,
    /// Feedback log I/O failure.
    #[error("feedback log error at {path}: {source}")]
    Feedback {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
