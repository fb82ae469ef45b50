//! Glyph catalog storage for Undertone.
//!
//! A glyph is a stored response unit: a name, a description, an optional
//! verbatim reply template, and an opaque gate label. This crate owns the
//! SQLite table behind the catalog plus the optional consolidation map that
//! redirects redundant names to a canonical identity.

pub mod catalog;
pub mod consolidation;
pub mod types;

pub use catalog::{CatalogError, GlyphCatalog, DEFAULT_BUSY_TIMEOUT};
pub use consolidation::ConsolidationMap;
pub use types::{Glyph, DEPRECATED_PREFIX};
