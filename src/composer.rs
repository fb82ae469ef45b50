//! Response composition.
//!
//! Three reply paths: a glyph's stored template verbatim, a contextual
//! synthesis referencing the glyph by name, or a neutral fallback when
//! nothing matched. Fallback lines and closing prompts rotate on
//! deterministic counters and are injectable for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use glyph_store::Glyph;
use serde::{Deserialize, Serialize};

use crate::parser::SignalHit;

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Template,
    Contextual,
    Fallback,
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseSource::Template => write!(f, "template"),
            ResponseSource::Contextual => write!(f, "contextual"),
            ResponseSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// A composed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Composed {
    pub text: String,
    pub source: ResponseSource,
}

/// Neutral acknowledgements used when no glyph matched.
const FALLBACK_LINES: [&str; 4] = [
    "I'm listening. Say more if you want to.",
    "I'm here. Take whatever space you need.",
    "I'm with you. There's no rush.",
    "Still here, still listening.",
];

/// Closing prompts appended to contextual replies.
const CLOSING_PROMPTS: [&str; 3] = [
    "Does that land anywhere for you?",
    "What part of that feels closest?",
    "Where does that sit with you right now?",
];

/// Human tone phrase for a signal tag.
pub fn tone_phrase(tag: &str) -> &'static str {
    match tag {
        "anger" => "the anger in that",
        "sadness" => "the sadness in this",
        "feeling_unseen" => "how unseen you feel",
        "overwhelm" => "how much is piling up",
        "silence" => "the silence around this",
        "loss" => "this loss",
        "positive" => "something meaningful here",
        _ => "what you're carrying",
    }
}

/// Composes user-facing replies from a selected glyph.
#[derive(Debug)]
pub struct Composer {
    closings: Vec<String>,
    fallbacks: Vec<String>,
    closing_cursor: AtomicUsize,
    fallback_cursor: AtomicUsize,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    pub fn new() -> Self {
        Self::with_lines(
            CLOSING_PROMPTS.iter().map(|s| s.to_string()).collect(),
            FALLBACK_LINES.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Seed the rotations explicitly. Empty lists fall back to the built-in
    /// ones so composition always has something to say.
    pub fn with_lines(closings: Vec<String>, fallbacks: Vec<String>) -> Self {
        let closings = if closings.is_empty() {
            CLOSING_PROMPTS.iter().map(|s| s.to_string()).collect()
        } else {
            closings
        };
        let fallbacks = if fallbacks.is_empty() {
            FALLBACK_LINES.iter().map(|s| s.to_string()).collect()
        } else {
            fallbacks
        };
        Self {
            closings,
            fallbacks,
            closing_cursor: AtomicUsize::new(0),
            fallback_cursor: AtomicUsize::new(0),
        }
    }

    /// Produce the reply for a selected glyph (or the lack of one).
    ///
    /// A non-empty template wins unless `debug` asks for the synthesized
    /// form. The composer never invents a glyph identity: the contextual
    /// reply names the glyph exactly and only quotes its own description.
    pub fn compose(&self, hits: &[SignalHit], glyph: Option<&Glyph>, debug: bool) -> Composed {
        let Some(glyph) = glyph else {
            return self.fallback();
        };
        if !debug {
            if let Some(template) = glyph.response_template.as_deref() {
                if !template.trim().is_empty() {
                    return Composed {
                        text: template.to_string(),
                        source: ResponseSource::Template,
                    };
                }
            }
        }
        self.contextual(hits, glyph)
    }

    /// A neutral acknowledgement from the rotation.
    pub fn fallback(&self) -> Composed {
        let i = self.fallback_cursor.fetch_add(1, Ordering::Relaxed) % self.fallbacks.len();
        Composed {
            text: self.fallbacks[i].clone(),
            source: ResponseSource::Fallback,
        }
    }

    fn contextual(&self, hits: &[SignalHit], glyph: &Glyph) -> Composed {
        let tone = hits
            .first()
            .map(|h| tone_phrase(&h.tag))
            .unwrap_or_else(|| tone_phrase(""));
        let i = self.closing_cursor.fetch_add(1, Ordering::Relaxed) % self.closings.len();
        let closing = &self.closings[i];

        let description = glyph.description.as_deref().map(str::trim).unwrap_or("");
        let mut text = format!("I hear {tone}. It sounds like {}", glyph.glyph_name);
        if description.is_empty() {
            text.push('.');
        } else {
            text.push_str(": ");
            text.push_str(description);
            if !text.ends_with(['.', '!', '?']) {
                text.push('.');
            }
        }
        text.push(' ');
        text.push_str(closing);

        Composed {
            text,
            source: ResponseSource::Contextual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(tag: &str, confidence: f64) -> SignalHit {
        SignalHit {
            tag: tag.into(),
            confidence,
        }
    }

    fn still_insight() -> Glyph {
        let mut g = Glyph::named("Still Insight");
        g.description = Some("Quiet revelation. Truth that arrives without noise.".into());
        g
    }

    #[test]
    fn template_returned_verbatim() {
        let composer = Composer::new();
        let mut g = still_insight();
        g.response_template = Some("Breathe. The answer is already here.".into());

        let out = composer.compose(&[hit("overwhelm", 0.7)], Some(&g), false);
        assert_eq!(out.text, "Breathe. The answer is already here.");
        assert_eq!(out.source, ResponseSource::Template);
    }

    #[test]
    fn debug_forces_contextual() {
        let composer = Composer::new();
        let mut g = still_insight();
        g.response_template = Some("Breathe. The answer is already here.".into());

        let out = composer.compose(&[hit("overwhelm", 0.7)], Some(&g), true);
        assert_eq!(out.source, ResponseSource::Contextual);
        assert!(out.text.contains("Still Insight"));
        assert!(out.text.contains("Quiet revelation"));
        assert!(out.text.contains("how much is piling up"));
    }

    #[test]
    fn templateless_glyph_synthesizes() {
        let composer = Composer::new();
        let out = composer.compose(&[hit("overwhelm", 0.7)], Some(&still_insight()), false);
        assert_eq!(out.source, ResponseSource::Contextual);
        assert!(out.text.starts_with("I hear how much is piling up."));
        assert!(out.text.contains("It sounds like Still Insight: Quiet revelation."));
    }

    #[test]
    fn empty_description_omits_colon_clause() {
        let composer = Composer::with_lines(vec!["Go on.".into()], vec![]);
        let g = Glyph::named("Hollow Bell");
        let out = composer.compose(&[hit("loss", 0.6)], Some(&g), false);
        assert_eq!(out.text, "I hear this loss. It sounds like Hollow Bell. Go on.");
    }

    #[test]
    fn unknown_tag_gets_default_tone() {
        let composer = Composer::with_lines(vec!["Go on.".into()], vec![]);
        let out = composer.compose(&[hit("liminality", 0.6)], Some(&still_insight()), false);
        assert!(out.text.starts_with("I hear what you're carrying."));
    }

    #[test]
    fn no_hits_still_composes() {
        let composer = Composer::with_lines(vec!["Go on.".into()], vec![]);
        let out = composer.compose(&[], Some(&still_insight()), false);
        assert!(out.text.starts_with("I hear what you're carrying."));
    }

    #[test]
    fn no_glyph_is_fallback() {
        let composer = Composer::new();
        let out = composer.compose(&[hit("anger", 0.9)], None, false);
        assert_eq!(out.source, ResponseSource::Fallback);
        assert!(!out.text.is_empty());
    }

    #[test]
    fn fallback_rotation_cycles() {
        let composer = Composer::with_lines(vec![], vec!["one".into(), "two".into()]);
        assert_eq!(composer.fallback().text, "one");
        assert_eq!(composer.fallback().text, "two");
        assert_eq!(composer.fallback().text, "one");
    }

    #[test]
    fn whitespace_template_is_ignored() {
        let composer = Composer::new();
        let mut g = still_insight();
        g.response_template = Some("  ".into());
        let out = composer.compose(&[hit("overwhelm", 0.7)], Some(&g), false);
        assert_eq!(out.source, ResponseSource::Contextual);
    }

    #[test]
    fn tone_table_is_exhaustive_for_shipped_tags() {
        assert_eq!(tone_phrase("anger"), "the anger in that");
        assert_eq!(tone_phrase("sadness"), "the sadness in this");
        assert_eq!(tone_phrase("feeling_unseen"), "how unseen you feel");
        assert_eq!(tone_phrase("overwhelm"), "how much is piling up");
        assert_eq!(tone_phrase("silence"), "the silence around this");
        assert_eq!(tone_phrase("loss"), "this loss");
        assert_eq!(tone_phrase("positive"), "something meaningful here");
        assert_eq!(tone_phrase("anything else"), "what you're carrying");
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ResponseSource::Template).unwrap(),
            "\"template\""
        );
        assert_eq!(
            serde_json::to_string(&ResponseSource::Fallback).unwrap(),
            "\"fallback\""
        );
    }
}
