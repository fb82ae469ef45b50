//! Lexicon store: signal keyword lists and loose token mappings.
//!
//! Two on-disk forms exist. The full form (`signal_lexicon.json`) carries
//! example utterances per signal; the runtime form
//! (`signal_lexicon_runtime.json`) is the compact distillation with only a
//! count. Both load into the same immutable [`Lexicon`]. The full form also
//! mixes arbitrary top-level token entries next to the `signals` section;
//! those surface verbatim through [`Lexicon::token_mappings`].

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::tokenize::normalize_phrase;

/// File name of the full lexicon form.
pub const FULL_LEXICON_FILE: &str = "signal_lexicon.json";
/// File name of the compact runtime form.
pub const RUNTIME_LEXICON_FILE: &str = "signal_lexicon_runtime.json";

/// Per-signal metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMeta {
    /// Normalized keyword phrases, each a space-joined token list,
    /// de-duplicated in order of first appearance.
    pub keywords: Vec<String>,
    /// Corpus frequency, used as a log-damped prior.
    pub frequency: u64,
    /// Number of example utterances behind this signal.
    pub examples_count: usize,
    /// Contributed by the community rather than the seed set.
    pub community_contributed: bool,
}

/// Immutable, loaded lexicon.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    signals: BTreeMap<String, SignalMeta>,
    token_mappings: HashMap<String, Value>,
}

/// One signal entry as it appears on disk, either form.
#[derive(Debug, Deserialize)]
struct RawSignalEntry {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    frequency: u64,
    #[serde(default)]
    examples: Option<Vec<String>>,
    #[serde(default)]
    examples_count: Option<usize>,
    #[serde(default)]
    community_contributed: bool,
}

impl RawSignalEntry {
    fn into_meta(self) -> SignalMeta {
        let mut seen = std::collections::HashSet::new();
        let mut keywords = Vec::new();
        for phrase in &self.keywords {
            let normalized = normalize_phrase(phrase).join(" ");
            if normalized.is_empty() {
                continue;
            }
            if seen.insert(normalized.clone()) {
                keywords.push(normalized);
            }
        }
        let examples_count = self
            .examples
            .as_ref()
            .map(Vec::len)
            .or(self.examples_count)
            .unwrap_or(0);
        SignalMeta {
            keywords,
            frequency: self.frequency,
            examples_count,
            community_contributed: self.community_contributed,
        }
    }
}

impl Lexicon {
    /// Load from a directory, preferring the runtime form when asked and
    /// present. Fails only when neither form is readable.
    pub fn load(dir: &Path, prefer_runtime: bool) -> Result<Self, EngineError> {
        let runtime = dir.join(RUNTIME_LEXICON_FILE);
        let full = dir.join(FULL_LEXICON_FILE);
        let candidates = if prefer_runtime {
            [&runtime, &full]
        } else {
            [&full, &runtime]
        };

        let mut last_err = String::from("no lexicon file present");
        for path in candidates {
            match fs::read_to_string(path) {
                Ok(text) => match Self::from_json_str(&text) {
                    Ok(lexicon) => {
                        debug!(
                            path = %path.display(),
                            signals = lexicon.signals.len(),
                            "lexicon loaded"
                        );
                        return Ok(lexicon);
                    }
                    Err(e) => last_err = format!("{}: {e}", path.display()),
                },
                Err(e) => last_err = format!("{}: {e}", path.display()),
            }
        }
        Err(EngineError::LexiconLoad {
            dir: dir.to_path_buf(),
            reason: last_err,
        })
    }

    /// Parse a lexicon from JSON text (either form).
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        let root: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(root))
    }

    fn from_value(root: Value) -> Self {
        let mut signals = BTreeMap::new();
        let mut token_mappings = HashMap::new();

        let Value::Object(map) = root else {
            warn!("lexicon root is not an object; loading empty lexicon");
            return Self::default();
        };
        for (key, value) in map {
            if key == "signals" {
                let Value::Object(entries) = value else {
                    warn!("lexicon `signals` key is not an object");
                    continue;
                };
                for (tag, raw) in entries {
                    match serde_json::from_value::<RawSignalEntry>(raw) {
                        Ok(entry) => {
                            signals.insert(tag, entry.into_meta());
                        }
                        Err(e) => warn!("skipping malformed signal entry {tag:?}: {e}"),
                    }
                }
            } else {
                token_mappings.insert(key, value);
            }
        }
        Self {
            signals,
            token_mappings,
        }
    }

    /// Signal tag → metadata, stable per load.
    pub fn signals(&self) -> &BTreeMap<String, SignalMeta> {
        &self.signals
    }

    /// Loose token → metadata entries from the full form, stable per load.
    pub fn token_mappings(&self) -> &HashMap<String, Value> {
        &self.token_mappings
    }

    pub fn signal(&self, tag: &str) -> Option<&SignalMeta> {
        self.signals.get(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Write the compact runtime form of this lexicon.
    pub fn write_runtime(&self, path: &Path) -> Result<(), std::io::Error> {
        let mut signals = serde_json::Map::new();
        for (tag, meta) in &self.signals {
            signals.insert(
                tag.clone(),
                serde_json::json!({
                    "keywords": meta.keywords,
                    "frequency": meta.frequency,
                    "examples_count": meta.examples_count,
                    "community_contributed": meta.community_contributed,
                }),
            );
        }
        let mut root = serde_json::Map::new();
        root.insert("signals".into(), Value::Object(signals));
        for (key, value) in &self.token_mappings {
            root.insert(key.clone(), value.clone());
        }
        let text = serde_json::to_string_pretty(&Value::Object(root))
            .map_err(std::io::Error::other)?;
        fs::write(path, text + "\n")
    }
}
