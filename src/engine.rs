//! The interaction pipeline: parse → select → compose → feedback.
//!
//! One `Engine` owns the loaded lexicon, the compiled parser, the glyph
//! catalog, the composer, and the feedback log. Each interaction runs on the
//! calling thread under a cooperative CPU-time guard; infrastructure trouble
//! mid-call (catalog busy, guard breach) degrades to a fallback reply and
//! the interaction is still logged.

use std::time::{Duration, Instant};

use chrono::Utc;
use glyph_store::GlyphCatalog;
use tracing::{debug, info, warn};

use crate::composer::{Composer, ResponseSource};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::feedback::{FeedbackRecord, FeedbackStore};
use crate::lexicon::Lexicon;
use crate::parser::{ParseOutput, SignalHit, SignalParser};
use crate::selector::{GlyphSelector, Selection, SelectionContext};

/// Per-call options for [`Engine::process`].
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Prefer contextual synthesis over stored templates.
    pub debug: bool,
    /// When set, only glyphs in these gates are eligible.
    pub allowed_gates: Option<Vec<String>>,
}

/// Result of one interaction.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub response_text: String,
    pub source: ResponseSource,
    pub signal_hits: Vec<SignalHit>,
    pub chosen_glyph_name: Option<String>,
}

/// The assembled engine.
#[derive(Debug)]
pub struct Engine {
    lexicon: Lexicon,
    parser: SignalParser,
    selector: GlyphSelector,
    composer: Composer,
    catalog: GlyphCatalog,
    feedback: FeedbackStore,
    cpu_guard: Duration,
}

impl Engine {
    /// Load every store and compile the parser. Lexicon and catalog
    /// failures here are fatal; nothing later in the pipeline is.
    pub fn open(config: &EngineConfig) -> Result<Self, EngineError> {
        let lexicon = Lexicon::load(&config.lexicon_dir, config.prefer_runtime_lexicon)?;
        let parser = SignalParser::new(&lexicon, config.saturation, config.min_confidence)?;
        let catalog = GlyphCatalog::open_with_timeout(
            &config.db_path,
            Duration::from_millis(config.busy_timeout_ms),
        )?;
        let feedback = FeedbackStore::open(&config.feedback_path)?;

        info!(
            signals = lexicon.signals().len(),
            db = %config.db_path.display(),
            "engine ready"
        );
        Ok(Self {
            lexicon,
            parser,
            selector: GlyphSelector::new(config.selection_threshold),
            composer: Composer::new(),
            catalog,
            feedback,
            cpu_guard: Duration::from_millis(config.cpu_guard_ms),
        })
    }

    /// Replace the composer, e.g. to seed deterministic prompts in tests.
    pub fn with_composer(mut self, composer: Composer) -> Self {
        self.composer = composer;
        self
    }

    /// Run one interaction through the pipeline.
    pub fn process(&self, input: &str, options: &ProcessOptions) -> ProcessOutcome {
        let deadline = Instant::now() + self.cpu_guard;
        let parsed = self.parser.parse(input);

        let (composed, chosen) = match self.select_guarded(&parsed, options, deadline) {
            Ok(selection) => {
                debug!(score = selection.score, reason = %selection.reason, "selection complete");
                let composed = self.composer.compose(
                    &parsed.hits,
                    selection.glyph.as_ref(),
                    options.debug,
                );
                (composed, selection.glyph.map(|g| g.glyph_name))
            }
            Err(e) => {
                warn!("selection degraded to fallback: {e}");
                (self.composer.fallback(), None)
            }
        };

        let record = FeedbackRecord {
            timestamp: Utc::now(),
            input_text: input.to_string(),
            signal_hits: parsed.hits.clone(),
            chosen_glyph_name: chosen.clone(),
            response_text: composed.text.clone(),
            response_source: composed.source,
            user_rating: None,
        };
        if let Err(e) = self.feedback.append(&record) {
            warn!("failed to append feedback record: {e}");
        }

        ProcessOutcome {
            response_text: composed.text,
            source: composed.source,
            signal_hits: parsed.hits,
            chosen_glyph_name: chosen,
        }
    }

    fn select_guarded(
        &self,
        parsed: &ParseOutput,
        options: &ProcessOptions,
        deadline: Instant,
    ) -> Result<Selection, EngineError> {
        if Instant::now() >= deadline {
            return Err(EngineError::ProcessingTimeout);
        }
        let glyphs = self.catalog.list_active()?;
        let context = SelectionContext {
            allowed_gates: options.allowed_gates.clone(),
        };
        self.selector
            .select(&parsed.hits, &glyphs, &self.parser, &context, Some(deadline))
    }

    /// Classify without selecting or logging.
    pub fn parse(&self, text: &str) -> ParseOutput {
        self.parser.parse(text)
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn catalog(&self) -> &GlyphCatalog {
        &self.catalog
    }

    pub fn feedback(&self) -> &FeedbackStore {
        &self.feedback
    }
}

/// One-shot convenience: open an engine from `config` and run a single
/// interaction.
pub fn process_once(
    input: &str,
    config: &EngineConfig,
    options: &ProcessOptions,
) -> Result<ProcessOutcome, EngineError> {
    Ok(Engine::open(config)?.process(input, options))
}
