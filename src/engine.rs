//! DeepTreeEcho facade: one entry point over the full pipeline.
//!
//! `echo_compute` is the heartbeat: embed the text, advance the reservoir,
//! fuse the output with signature resonance, fold the result into the
//! character layer, and hand back a `CombinedSignal`. All mutation happens
//! inside that one `&mut self` call, so a `Mutex<DeepTreeEcho>` gives the
//! whole pipeline a single critical section per turn.
//!
//! Training is split for hosts that want it off the hot path: clone the
//! reservoir, `solve_readout` on the clone, then `install_readout` under
//! the lock. `train` does both in place.
//!
//! Persistence keeps only evolving state (reservoir state, window, readout,
//! character, tick); topology, input weights, and projections are rebuilt
//! from config + seed on load.

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::character::{
    estimate_sentiment, CharacterEngine, CharacterReport, CharacterTraits, InteractionContext,
    InteractionRecord, MoodState, ResponseStyle,
};
use crate::config::DeepTreeEchoConfig;
use crate::embed::{InputEmbedder, TurnEmbedder};
use crate::errors::{EchoError, Result};
use crate::gestalt::{GestaltAggregator, GestaltSnapshot};
use crate::readout::LinearReadout;
use crate::reservoir::Reservoir;
use crate::signature::{interaction_key, SignatureRegistry};

/// Everything one `echo_compute` turn produces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombinedSignal {
    /// 1-based compute counter.
    pub tick: u64,
    pub gestalt: GestaltSnapshot,
    pub character_prompt: String,
    pub response_style: ResponseStyle,
}

// ---------------------------------------------------------------------------
// DeepTreeEcho
// ---------------------------------------------------------------------------

pub struct DeepTreeEcho {
    config: DeepTreeEchoConfig,
    registry: Arc<SignatureRegistry>,
    reservoir: Reservoir,
    aggregator: GestaltAggregator,
    character: CharacterEngine,
    embedder: Box<dyn InputEmbedder>,
    last_snapshot: Option<GestaltSnapshot>,
    tick: u64,
}

// The embedder is a trait object, so Debug is summarized by hand.
impl std::fmt::Debug for DeepTreeEcho {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepTreeEcho")
            .field("tick", &self.tick)
            .field("reservoir_size", &self.config.reservoir_size)
            .field("trained", &self.reservoir.is_trained())
            .finish_non_exhaustive()
    }
}

impl DeepTreeEcho {
    /// Build an engine over the baked-in signature registry.
    /// Fails fast with a `Config` error naming the offending option.
    pub fn new(config: DeepTreeEchoConfig) -> Result<Self> {
        Self::with_registry(config, Arc::new(SignatureRegistry::new()?))
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(DeepTreeEchoConfig::default())
    }

    /// Build over a shared registry. The registry is immutable after
    /// construction, so one `Arc` can back any number of engines.
    pub fn with_registry(
        config: DeepTreeEchoConfig,
        registry: Arc<SignatureRegistry>,
    ) -> Result<Self> {
        let dim = config.input_dim;
        Self::with_embedder(config, registry, Box::new(TurnEmbedder::new(dim)))
    }

    /// Full-control constructor with a caller-supplied embedder.
    pub fn with_embedder(
        config: DeepTreeEchoConfig,
        registry: Arc<SignatureRegistry>,
        embedder: Box<dyn InputEmbedder>,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dim() != config.input_dim {
            return Err(EchoError::Config(format!(
                "embedder dim {} does not match input_dim {}",
                embedder.dim(),
                config.input_dim
            )));
        }

        let seed_material = registry.seed_material();
        let output_dim = registry.signatures().len();
        let reservoir = Reservoir::new(&config, seed_material, output_dim)?;
        let mixed = config.seed ^ seed_material;
        let aggregator = GestaltAggregator::new(
            Arc::clone(&registry),
            mixed ^ 3u64.wrapping_mul(2654435761),
        );
        let character = CharacterEngine::new(&config);

        info!(
            "engine ready: {} units, {} domains, input dim {}, seed {}",
            config.reservoir_size, output_dim, config.input_dim, config.seed
        );

        Ok(Self {
            config,
            registry,
            reservoir,
            aggregator,
            character,
            embedder,
            last_snapshot: None,
            tick: 0,
        })
    }

    /// One full turn: embed → reservoir step → gestalt fuse → character
    /// record. Returns the fused signal for the host to act on.
    ///
    /// Shapes are checked before any state moves, so an error leaves the
    /// engine exactly as it was.
    pub fn echo_compute(&mut self, text: &str) -> Result<CombinedSignal> {
        let input = self.embedder.embed(text);
        if input.len() != self.reservoir.input_dim() {
            return Err(EchoError::Shape {
                expected: self.reservoir.input_dim(),
                got: input.len(),
            });
        }

        let key = interaction_key(text);
        let output = self.reservoir.step(&input)?;
        let snapshot = self.aggregator.fuse(&output, key)?;

        self.character.record_interaction(&InteractionContext {
            text: text.to_string(),
            sentiment: estimate_sentiment(text),
            dominant: snapshot.dominant,
        });

        self.tick += 1;
        self.last_snapshot = Some(snapshot.clone());
        debug!(
            "tick {}: key {}, dominant {}, energy {:.4}",
            self.tick,
            key,
            snapshot.dominant.label(),
            snapshot.reservoir_energy
        );

        Ok(CombinedSignal {
            tick: self.tick,
            gestalt: snapshot,
            character_prompt: self.character.generate_personality_prompt(),
            response_style: self.character.response_style(),
        })
    }

    // -- training ----------------------------------------------------------

    /// Queue a supervised pair: the text's embedding against the desired
    /// per-domain activation targets.
    pub fn remember(&mut self, text: &str, target: &[f64]) -> Result<()> {
        let input = self.embedder.embed(text);
        self.reservoir.remember(&input, target)
    }

    /// Retrain the readout in place over the retained window.
    pub fn train(&mut self) -> Result<()> {
        self.reservoir.train()
    }

    /// Solve a fresh readout without mutating anything; pair with
    /// `install_readout` for off-thread training.
    pub fn solve_readout(&self) -> Result<LinearReadout> {
        self.reservoir.solve_readout()
    }

    pub fn install_readout(&mut self, readout: LinearReadout) -> Result<()> {
        self.reservoir.install_readout(readout)
    }

    /// Zero the reservoir state for a fresh trajectory. Training window,
    /// readout, and character are untouched.
    pub fn reset_reservoir(&mut self) {
        self.reservoir.reset();
    }

    // -- accessors -----------------------------------------------------------

    /// Latest gestalt snapshot, or the neutral empty snapshot before the
    /// first `echo_compute`.
    pub fn gestalt_state(&self) -> GestaltSnapshot {
        self.last_snapshot
            .clone()
            .unwrap_or_else(GestaltSnapshot::empty)
    }

    /// Current traits, mood, and lifetime interaction count. Before the
    /// first compute: configured defaults, neutral mood, zero interactions.
    pub fn character_state(&self) -> CharacterReport {
        self.character.report()
    }

    pub fn personality_prompt(&self) -> String {
        self.character.generate_personality_prompt()
    }

    pub fn response_style(&self) -> ResponseStyle {
        self.character.response_style()
    }

    pub fn interaction_history(&self) -> impl Iterator<Item = &InteractionRecord> {
        self.character.history()
    }

    pub fn registry(&self) -> &Arc<SignatureRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DeepTreeEchoConfig {
        &self.config
    }

    pub fn reservoir(&self) -> &Reservoir {
        &self.reservoir
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn spectral_radius(&self) -> f64 {
        self.reservoir.spectral_radius()
    }

    // -- persistence ---------------------------------------------------------

    /// Write evolving state as pretty JSON.
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let data = SaveData {
            config: self.config.clone(),
            tick: self.tick,
            reservoir_state: self.reservoir.state().to_vec(),
            window: self.reservoir.window().cloned().collect(),
            readout: self.reservoir.readout().clone(),
            traits: self.character.traits().clone(),
            mood: *self.character.mood(),
            history: self.character.history().cloned().collect(),
            character_tick: self.character.interaction_count(),
            last_snapshot: self.last_snapshot.clone(),
        };
        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Rebuild an engine from a saved snapshot. Fixed structures come back
    /// from config + seed; a snapshot inconsistent with its own config is
    /// rejected as invalid data.
    pub fn load(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let data: SaveData = serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut engine = Self::new(data.config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        engine
            .reservoir
            .restore(data.reservoir_state, data.window, data.readout)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        engine.character.restore(
            data.traits,
            data.mood,
            data.history,
            data.character_tick,
        );
        if let Some(snapshot) = &data.last_snapshot {
            if snapshot.activations.len() != engine.registry.signatures().len() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    EchoError::State("snapshot activation width mismatch".into()),
                ));
            }
        }
        engine.last_snapshot = data.last_snapshot;
        engine.tick = data.tick;

        info!("engine restored at tick {}", engine.tick);
        Ok(engine)
    }
}

/// Serialized mirror of the engine's evolving state.
#[derive(Serialize, Deserialize)]
struct SaveData {
    config: DeepTreeEchoConfig,
    tick: u64,
    reservoir_state: Vec<f64>,
    window: Vec<(Vec<f64>, Vec<f64>)>,
    readout: LinearReadout,
    traits: CharacterTraits,
    mood: MoodState,
    history: Vec<InteractionRecord>,
    character_tick: u64,
    last_snapshot: Option<GestaltSnapshot>,
}
