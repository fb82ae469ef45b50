//! Rule-based signal parser.
//!
//! Classifies an utterance into ranked signal hits by matching lexicon
//! keyword phrases against the normalized token stream. Every phrase is
//! compiled into one Aho-Corasick automaton; overlapping matches are mapped
//! back to token windows, so multi-token phrases only count on a full
//! contiguous match. Negators shortly before a match damp it.

use std::cmp::Ordering;
use std::collections::HashMap;

use aho_corasick::{AhoCorasick, MatchKind};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::lexicon::Lexicon;
use crate::tokenize::{tokenize, Token};

/// Negators that damp a following match.
const NEGATORS: [&str; 7] = ["not", "don't", "never", "no", "isn't", "wasn't", "aren't"];

/// How many tokens before a match are scanned for a negator.
const NEGATION_WINDOW: usize = 3;

/// Score multiplier for a negated hit.
const NEGATION_DAMP: f64 = 0.1;

/// Confidence ceiling for a signal whose every hit was negated.
const NEGATED_CONFIDENCE_CAP: f64 = 0.2;

/// Additional weight per extra token in a matched phrase.
const PHRASE_LENGTH_WEIGHT: f64 = 0.4;

/// Damping applied to the log of the frequency prior.
const FREQUENCY_DAMP: f64 = 0.15;

/// One detected signal with its normalized confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalHit {
    pub tag: String,
    pub confidence: f64,
}

/// Parser output: ranked hits plus the normalized token stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParseOutput {
    /// Hits above the confidence floor, sorted descending.
    pub hits: Vec<SignalHit>,
    /// The normalized tokens the matcher saw.
    pub tokens: Vec<String>,
}

/// Which signal a compiled pattern belongs to, and how long it is.
#[derive(Debug)]
struct PatternInfo {
    tag_idx: usize,
    token_len: usize,
}

/// Lexicon-compiled signal matcher. Build once per loaded lexicon.
#[derive(Debug)]
pub struct SignalParser {
    automaton: Option<AhoCorasick>,
    patterns: Vec<PatternInfo>,
    tags: Vec<String>,
    frequency: Vec<u64>,
    saturation: f64,
    min_confidence: f64,
}

impl SignalParser {
    /// Compile the lexicon's keyword phrases into a matcher.
    pub fn new(
        lexicon: &Lexicon,
        saturation: f64,
        min_confidence: f64,
    ) -> Result<Self, EngineError> {
        let mut tags = Vec::new();
        let mut frequency = Vec::new();
        let mut phrases: Vec<&str> = Vec::new();
        let mut patterns = Vec::new();

        for (tag, meta) in lexicon.signals() {
            let tag_idx = tags.len();
            tags.push(tag.clone());
            frequency.push(meta.frequency);
            for phrase in &meta.keywords {
                patterns.push(PatternInfo {
                    tag_idx,
                    token_len: phrase.split(' ').count(),
                });
                phrases.push(phrase.as_str());
            }
        }

        let automaton = if phrases.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::Standard)
                    .build(&phrases)
                    .map_err(|e| EngineError::LexiconCompile(e.to_string()))?,
            )
        };

        Ok(Self {
            automaton,
            patterns,
            tags,
            frequency,
            saturation,
            min_confidence,
        })
    }

    /// Classify an utterance. Deterministic; never fails on content.
    pub fn parse(&self, text: &str) -> ParseOutput {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return ParseOutput::default();
        }

        // Join tokens with single spaces and remember each token's span so
        // automaton matches can be checked against token boundaries.
        let mut joined = String::new();
        let mut starts: HashMap<usize, usize> = HashMap::new();
        let mut ends: HashMap<usize, usize> = HashMap::new();
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                joined.push(' ');
            }
            starts.insert(joined.len(), i);
            joined.push_str(&token.text);
            ends.insert(joined.len(), i);
        }

        let mut score = vec![0.0f64; self.tags.len()];
        let mut any_clean = vec![false; self.tags.len()];
        let mut matched = vec![false; self.tags.len()];

        if let Some(automaton) = &self.automaton {
            for m in automaton.find_overlapping_iter(&joined) {
                // Mid-token matches ("rage" inside "courage") fail the
                // boundary lookup and are discarded.
                let Some(&first) = starts.get(&m.start()) else {
                    continue;
                };
                if !ends.contains_key(&m.end()) {
                    continue;
                }
                let info = &self.patterns[m.pattern().as_usize()];
                let prior =
                    1.0 + (1.0 + self.frequency[info.tag_idx] as f64).ln() * FREQUENCY_DAMP;
                let mut hit =
                    (1.0 + PHRASE_LENGTH_WEIGHT * (info.token_len as f64 - 1.0)) * prior;
                if is_negated(&tokens, first) {
                    hit *= NEGATION_DAMP;
                } else {
                    any_clean[info.tag_idx] = true;
                }
                score[info.tag_idx] += hit;
                matched[info.tag_idx] = true;
            }
        }

        let mut ranked: Vec<(usize, f64)> = Vec::new();
        for idx in 0..self.tags.len() {
            if !matched[idx] {
                continue;
            }
            let mut confidence = score[idx] / (score[idx] + self.saturation);
            if !any_clean[idx] {
                confidence = confidence.min(NEGATED_CONFIDENCE_CAP);
            }
            if confidence > self.min_confidence {
                ranked.push((idx, confidence));
            }
        }

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.frequency[b.0].cmp(&self.frequency[a.0]))
                .then_with(|| self.tags[a.0].cmp(&self.tags[b.0]))
        });

        ParseOutput {
            hits: ranked
                .into_iter()
                .map(|(idx, confidence)| SignalHit {
                    tag: self.tags[idx].clone(),
                    confidence,
                })
                .collect(),
            tokens: tokens.into_iter().map(|t| t.text).collect(),
        }
    }

    /// Tags known to this parser, in lexicon order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// A negator within the window before `start`, with no clause boundary or
/// "but" in between, negates the match.
fn is_negated(tokens: &[Token], start: usize) -> bool {
    let clause = tokens[start].clause;
    for back in 1..=NEGATION_WINDOW {
        let Some(j) = start.checked_sub(back) else {
            break;
        };
        let token = &tokens[j];
        if token.clause != clause || token.text == "but" {
            break;
        }
        if NEGATORS.contains(&token.text.as_str()) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_lexicon() -> Lexicon {
        Lexicon::from_json_str(
            r#"{
            "signals": {
                "anger": {
                    "keywords": ["angry", "furious", "fed up"],
                    "frequency": 120
                },
                "sadness": {
                    "keywords": ["sad", "heartbroken"],
                    "frequency": 104
                },
                "feeling_unseen": {
                    "keywords": ["ignored", "being ignored", "invisible"],
                    "frequency": 56
                },
                "overwhelm": {
                    "keywords": ["overwhelmed", "piling up", "stressed"],
                    "frequency": 88
                }
            }
        }"#,
        )
        .unwrap()
    }

    fn parser() -> SignalParser {
        SignalParser::new(&test_lexicon(), 1.0, 0.05).unwrap()
    }

    fn confidence(output: &ParseOutput, tag: &str) -> f64 {
        output
            .hits
            .iter()
            .find(|h| h.tag == tag)
            .map(|h| h.confidence)
            .unwrap_or(0.0)
    }

    #[test]
    fn empty_input_yields_nothing() {
        let p = parser();
        assert!(p.parse("").hits.is_empty());
        assert!(p.parse("  !?  ").hits.is_empty());
    }

    #[test]
    fn unknown_tokens_contribute_nothing() {
        let p = parser();
        assert!(p.parse("the weather is mild today").hits.is_empty());
    }

    #[test]
    fn single_keyword_clears_half() {
        let p = parser();
        let out = p.parse("I'm angry");
        assert!(confidence(&out, "anger") >= 0.5);
    }

    #[test]
    fn two_signals_ranked() {
        let p = parser();
        let out = p.parse("I'm angry and sad");
        assert!(confidence(&out, "anger") >= 0.5);
        assert!(confidence(&out, "sadness") >= 0.4);
        // sorted descending
        for pair in out.hits.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn negation_damps() {
        let p = parser();
        let out = p.parse("I am not angry");
        let anger = confidence(&out, "anger");
        assert!(anger < 0.2, "negated anger was {anger}");
    }

    #[test]
    fn negation_capped_even_when_repeated() {
        let p = parser();
        let out = p.parse("not angry, not angry, not angry");
        assert!(confidence(&out, "anger") <= 0.2);
    }

    #[test]
    fn clause_boundary_blocks_negation() {
        let p = parser();
        // negator in the previous sentence does not reach the match
        let out = p.parse("It's not that. I'm angry");
        assert!(confidence(&out, "anger") >= 0.5);
    }

    #[test]
    fn but_blocks_negation() {
        let p = parser();
        let out = p.parse("no buts, but angry");
        assert!(confidence(&out, "anger") >= 0.5);
    }

    #[test]
    fn negator_outside_window_ignored() {
        let p = parser();
        let out = p.parse("not that it matters much anymore angry");
        assert!(confidence(&out, "anger") >= 0.5);
    }

    #[test]
    fn mixed_negated_and_clean_hits_escape_cap() {
        let p = parser();
        let out = p.parse("not angry. just angry at myself");
        assert!(confidence(&out, "anger") > 0.2);
    }

    #[test]
    fn multi_token_phrase_matches_whole_window() {
        let p = parser();
        let out = p.parse("everything keeps piling up");
        assert!(confidence(&out, "overwhelm") >= 0.5);
        // the pieces alone do not match
        assert!(p.parse("a huge pile").hits.is_empty());
    }

    #[test]
    fn overlapping_phrases_stack() {
        let p = parser();
        let single = confidence(&p.parse("invisible"), "feeling_unseen");
        let stacked = confidence(&p.parse("I hate being ignored"), "feeling_unseen");
        assert!(stacked > single);
    }

    #[test]
    fn substring_inside_token_does_not_match() {
        let p = parser();
        // "sad" inside "crusade" must not hit
        assert!(p.parse("a noble crusade").hits.is_empty());
    }

    #[test]
    fn confidences_bounded() {
        let p = parser();
        let out = p.parse("angry furious fed up angry furious fed up angry");
        for hit in &out.hits {
            assert!(hit.confidence > 0.05 && hit.confidence <= 1.0);
        }
    }

    #[test]
    fn parse_is_deterministic() {
        let p = parser();
        let a = p.parse("I'm angry and sad about being ignored");
        let b = p.parse("I'm angry and sad about being ignored");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_lexicon_parses_to_nothing() {
        let lexicon = Lexicon::from_json_str(r#"{"signals": {}}"#).unwrap();
        let p = SignalParser::new(&lexicon, 1.0, 0.05).unwrap();
        assert!(p.parse("angry and sad").hits.is_empty());
    }

    #[test]
    fn tokens_are_reported() {
        let p = parser();
        let out = p.parse("I'm Angry!");
        assert_eq!(out.tokens, vec!["i'm", "angry"]);
    }
}
