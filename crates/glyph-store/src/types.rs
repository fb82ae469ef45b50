//! Core types for the glyph catalog.

use serde::{Deserialize, Serialize};

/// Prefix marking a glyph as retired. Deprecated rows stay in the table for
/// provenance but are excluded from selection.
pub const DEPRECATED_PREFIX: &str = "[DEPRECATED]";

/// A stored response glyph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Glyph {
    /// Unique, non-empty name.
    pub glyph_name: String,
    /// Optional human-facing name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Prose description. Also the source material for keyword-derived
    /// scoring when no tags are declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Verbatim reply, used as-is when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_template: Option<String>,
    /// Opaque visibility bucket (e.g. "Gate 6"). No ordering is implied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    /// Optional provenance string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_pair: Option<String>,
    /// Declared signal tags. Empty means undeclared; the selector then
    /// derives a latent signal set from `description` instead.
    #[serde(default)]
    pub signal_tags: Vec<String>,
}

impl Glyph {
    /// A glyph with only a name set; remaining fields are filled by the caller.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            glyph_name: name.into(),
            display_name: None,
            description: None,
            response_template: None,
            gate: None,
            voltage_pair: None,
            signal_tags: Vec::new(),
        }
    }

    pub fn is_deprecated(&self) -> bool {
        self.glyph_name.starts_with(DEPRECATED_PREFIX)
    }

    /// Whether the glyph carries a non-empty stored reply.
    pub fn has_template(&self) -> bool {
        self.response_template
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}
