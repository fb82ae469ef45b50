//! Glyph selection over parser output.
//!
//! Each active glyph is scored against the input's signal vector and the
//! best one above threshold wins. Glyphs that declare signal tags are scored
//! against them directly; the rest get a latent signal set derived from
//! their description by the same parser that classified the input. No
//! latent vectors are cached, so selection always reflects the catalog as
//! stored.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use glyph_store::Glyph;
use tracing::debug;

use crate::error::EngineError;
use crate::parser::{SignalHit, SignalParser};

/// How many glyphs are scored between deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 64;

/// Scoring strategy for one glyph.
enum GlyphScoring<'a> {
    TagDeclared(&'a [String]),
    KeywordDerived,
}

fn scoring_for(glyph: &Glyph) -> GlyphScoring<'_> {
    if glyph.signal_tags.is_empty() {
        GlyphScoring::KeywordDerived
    } else {
        GlyphScoring::TagDeclared(&glyph.signal_tags)
    }
}

/// Context narrowing a selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    /// When set, only glyphs whose gate is in this list are eligible.
    pub allowed_gates: Option<Vec<String>>,
}

/// Outcome of a selection pass.
#[derive(Debug, Clone)]
pub struct Selection {
    pub glyph: Option<Glyph>,
    pub score: f64,
    pub reason: String,
}

impl Selection {
    fn none(reason: impl Into<String>) -> Self {
        Self {
            glyph: None,
            score: 0.0,
            reason: reason.into(),
        }
    }
}

/// Selects at most one glyph for a parsed utterance.
#[derive(Debug)]
pub struct GlyphSelector {
    threshold: f64,
}

impl GlyphSelector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Rank `glyphs` against the input's signal vector and return the best
    /// candidate, or none below threshold. Fully deterministic for a given
    /// catalog state and input.
    ///
    /// The optional `deadline` is the cooperative CPU-time guard; it is
    /// checked every few glyphs so a huge catalog cannot pin the thread.
    pub fn select(
        &self,
        hits: &[SignalHit],
        glyphs: &[Glyph],
        parser: &SignalParser,
        context: &SelectionContext,
        deadline: Option<Instant>,
    ) -> Result<Selection, EngineError> {
        if hits.is_empty() {
            return Ok(Selection::none("no signals detected"));
        }
        if glyphs.is_empty() {
            return Ok(Selection::none("no eligible glyphs"));
        }

        let input: HashMap<&str, f64> =
            hits.iter().map(|h| (h.tag.as_str(), h.confidence)).collect();

        let mut best: Option<(f64, &Glyph)> = None;
        let mut considered = 0usize;
        for glyph in glyphs {
            considered += 1;
            if considered % DEADLINE_CHECK_INTERVAL == 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Err(EngineError::ProcessingTimeout);
                    }
                }
            }

            if let Some(allowed) = &context.allowed_gates {
                match &glyph.gate {
                    Some(gate) if allowed.iter().any(|g| g == gate) => {}
                    _ => continue,
                }
            }

            let score = score_glyph(&input, glyph, parser);
            best = match best {
                None => Some((score, glyph)),
                Some((best_score, best_glyph)) => {
                    if beats(score, glyph, best_score, best_glyph) {
                        Some((score, glyph))
                    } else {
                        Some((best_score, best_glyph))
                    }
                }
            };
        }

        match best {
            None => Ok(Selection::none("no glyphs pass the gate filter")),
            Some((score, _)) if score < self.threshold => {
                debug!(score, threshold = self.threshold, "top glyph below threshold");
                Ok(Selection::none(format!(
                    "top score {score:.3} below threshold {:.2}",
                    self.threshold
                )))
            }
            Some((score, glyph)) => {
                let strategy = match scoring_for(glyph) {
                    GlyphScoring::TagDeclared(_) => "declared tags",
                    GlyphScoring::KeywordDerived => "description keywords",
                };
                Ok(Selection {
                    reason: format!("scored {score:.3} via {strategy}"),
                    glyph: Some(glyph.clone()),
                    score,
                })
            }
        }
    }
}

fn score_glyph(input: &HashMap<&str, f64>, glyph: &Glyph, parser: &SignalParser) -> f64 {
    match scoring_for(glyph) {
        GlyphScoring::TagDeclared(tags) => {
            let matched: f64 = tags
                .iter()
                .filter_map(|tag| input.get(tag.as_str()))
                .map(|confidence| confidence.min(1.0))
                .sum();
            matched / tags.len() as f64
        }
        GlyphScoring::KeywordDerived => {
            let description = glyph.description.as_deref().unwrap_or("");
            if description.is_empty() {
                return 0.0;
            }
            parser
                .parse(description)
                .hits
                .iter()
                .filter_map(|h| input.get(h.tag.as_str()).map(|c| c * h.confidence))
                .sum()
        }
    }
}

/// Score descending; ties go to the shorter name, then lexicographic.
fn beats(score: f64, glyph: &Glyph, best_score: f64, best_glyph: &Glyph) -> bool {
    match score.partial_cmp(&best_score) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Less) | None => false,
        Some(Ordering::Equal) => match glyph
            .glyph_name
            .len()
            .cmp(&best_glyph.glyph_name.len())
        {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => glyph.glyph_name < best_glyph.glyph_name,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Lexicon;

    fn parser() -> SignalParser {
        let lexicon = Lexicon::from_json_str(
            r#"{
            "signals": {
                "anger": { "keywords": ["angry", "rage"], "frequency": 120 },
                "silence": { "keywords": ["quiet", "silence", "noise"], "frequency": 33 },
                "overwhelm": { "keywords": ["stressed", "piling up"], "frequency": 88 }
            }
        }"#,
        )
        .unwrap();
        SignalParser::new(&lexicon, 1.0, 0.05).unwrap()
    }

    fn hit(tag: &str, confidence: f64) -> SignalHit {
        SignalHit {
            tag: tag.into(),
            confidence,
        }
    }

    fn tagged(name: &str, tags: &[&str]) -> Glyph {
        let mut g = Glyph::named(name);
        g.signal_tags = tags.iter().map(|t| t.to_string()).collect();
        g
    }

    fn described(name: &str, description: &str) -> Glyph {
        let mut g = Glyph::named(name);
        g.description = Some(description.into());
        g
    }

    fn select(
        hits: &[SignalHit],
        glyphs: &[Glyph],
        context: &SelectionContext,
    ) -> Selection {
        GlyphSelector::new(0.15)
            .select(hits, glyphs, &parser(), context, None)
            .unwrap()
    }

    #[test]
    fn no_hits_selects_nothing() {
        let glyphs = vec![tagged("Ember", &["anger"])];
        let sel = select(&[], &glyphs, &SelectionContext::default());
        assert!(sel.glyph.is_none());
        assert_eq!(sel.reason, "no signals detected");
    }

    #[test]
    fn empty_catalog_selects_nothing() {
        let sel = select(&[hit("anger", 0.9)], &[], &SelectionContext::default());
        assert!(sel.glyph.is_none());
    }

    #[test]
    fn tag_declared_scoring_prefers_full_overlap() {
        let glyphs = vec![
            tagged("Ember", &["anger"]),
            tagged("Scattered", &["anger", "overwhelm", "silence"]),
        ];
        let sel = select(&[hit("anger", 0.9)], &glyphs, &SelectionContext::default());
        // 0.9/1 beats 0.9/3
        assert_eq!(sel.glyph.unwrap().glyph_name, "Ember");
    }

    #[test]
    fn keyword_derived_scoring_reads_description() {
        let glyphs = vec![
            described("Still Insight", "Quiet revelation. Truth without noise."),
            described("Ember Hold", "Rage held close until it cools."),
        ];
        let sel = select(
            &[hit("silence", 0.8)],
            &glyphs,
            &SelectionContext::default(),
        );
        assert_eq!(sel.glyph.unwrap().glyph_name, "Still Insight");
        assert!(sel.reason.contains("description keywords"));
    }

    #[test]
    fn declared_tags_win_over_description() {
        let mut g = described("Ember Hold", "Rage held close until it cools.");
        g.signal_tags = vec!["silence".into()];
        let sel = select(&[hit("silence", 0.8)], &[g], &SelectionContext::default());
        assert!(sel.reason.contains("declared tags"));
        assert!((sel.score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_returns_none() {
        let glyphs = vec![tagged("Scattered", &["anger", "overwhelm", "silence", "loss"])];
        let sel = select(&[hit("anger", 0.3)], &glyphs, &SelectionContext::default());
        // 0.3/4 = 0.075 < 0.15
        assert!(sel.glyph.is_none());
        assert!(sel.reason.contains("below threshold"));
    }

    #[test]
    fn gate_filter_excludes_other_and_ungated() {
        let mut gated = tagged("Ember", &["anger"]);
        gated.gate = Some("Gate 2".into());
        let mut other = tagged("Emberous", &["anger"]);
        other.gate = Some("Gate 6".into());
        let ungated = tagged("Emberine", &["anger"]);

        let context = SelectionContext {
            allowed_gates: Some(vec!["Gate 2".into()]),
        };
        let sel = select(
            &[hit("anger", 0.9)],
            &[gated.clone(), other, ungated],
            &context,
        );
        assert_eq!(sel.glyph.unwrap().glyph_name, "Ember");

        let context = SelectionContext {
            allowed_gates: Some(vec!["Gate 9".into()]),
        };
        let sel = select(&[hit("anger", 0.9)], &[gated], &context);
        assert!(sel.glyph.is_none());
        assert_eq!(sel.reason, "no glyphs pass the gate filter");
    }

    #[test]
    fn ties_break_on_shorter_then_lexicographic_name() {
        let glyphs = vec![
            tagged("Emberward", &["anger"]),
            tagged("Ember", &["anger"]),
            tagged("Askew", &["anger"]),
        ];
        let sel = select(&[hit("anger", 0.9)], &glyphs, &SelectionContext::default());
        // "Ember" and "Askew" tie on length; "Askew" sorts first
        assert_eq!(sel.glyph.unwrap().glyph_name, "Askew");
    }

    #[test]
    fn expired_deadline_errors() {
        let glyphs: Vec<Glyph> = (0..200)
            .map(|i| tagged(&format!("Glyph {i}"), &["anger"]))
            .collect();
        let deadline = Instant::now() - std::time::Duration::from_millis(1);
        let err = GlyphSelector::new(0.15)
            .select(
                &[hit("anger", 0.9)],
                &glyphs,
                &parser(),
                &SelectionContext::default(),
                Some(deadline),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::ProcessingTimeout));
    }
}
