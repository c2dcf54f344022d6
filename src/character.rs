//! Evolving character layer: traits, mood, and interaction history.
//!
//! Six persona traits live in [0, 1] and move under two forces:
//!   - interactions nudge the traits cued by the dominant cognitive domain
//!     and by keyword cues, with diminishing returns near 1.0
//!   - traits nobody nudged relax toward their configured defaults
//!
//! Mood is a single valence in [-1, 1] pulled toward each interaction's
//! sentiment, then decayed one step toward neutral. History is append-only
//! with bounded retention; the oldest record is dropped at capacity.
//!
//! Prompt generation and response style are pure reads of current state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::DeepTreeEchoConfig;
use crate::signature::CognitiveDomain;

pub const TRAIT_COUNT: usize = 6;

/// Nudge applied to the trait mapped from the dominant domain.
const BASE_NUDGE: f64 = 0.05;

/// Nudge applied per keyword cue hit.
const CUE_NUDGE: f64 = 0.03;

/// Fraction of the mood gap closed per interaction.
const MOOD_PULL: f64 = 0.15;

// ---------------------------------------------------------------------------
// TraitKind
// ---------------------------------------------------------------------------

/// The six persona traits, in canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraitKind {
    PhilosophicalDepth,
    PlayfulWit,
    MysteriousVision,
    InventiveSpirit,
    MagneticPresence,
    ReflectiveNature,
}

impl TraitKind {
    pub fn all() -> [TraitKind; TRAIT_COUNT] {
        [
            TraitKind::PhilosophicalDepth,
            TraitKind::PlayfulWit,
            TraitKind::MysteriousVision,
            TraitKind::InventiveSpirit,
            TraitKind::MagneticPresence,
            TraitKind::ReflectiveNature,
        ]
    }

    pub fn index(self) -> usize {
        match self {
            TraitKind::PhilosophicalDepth => 0,
            TraitKind::PlayfulWit => 1,
            TraitKind::MysteriousVision => 2,
            TraitKind::InventiveSpirit => 3,
            TraitKind::MagneticPresence => 4,
            TraitKind::ReflectiveNature => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TraitKind::PhilosophicalDepth => "philosophical depth",
            TraitKind::PlayfulWit => "playful wit",
            TraitKind::MysteriousVision => "mysterious vision",
            TraitKind::InventiveSpirit => "inventive spirit",
            TraitKind::MagneticPresence => "magnetic presence",
            TraitKind::ReflectiveNature => "reflective nature",
        }
    }

    /// Trait cued by a dominant cognitive domain.
    pub fn for_domain(domain: CognitiveDomain) -> TraitKind {
        match domain {
            CognitiveDomain::Memory => TraitKind::ReflectiveNature,
            CognitiveDomain::Reasoning => TraitKind::PhilosophicalDepth,
            CognitiveDomain::Creativity => TraitKind::InventiveSpirit,
            CognitiveDomain::Language => TraitKind::PlayfulWit,
            CognitiveDomain::Perception => TraitKind::MysteriousVision,
            CognitiveDomain::Attention => TraitKind::MagneticPresence,
            CognitiveDomain::Emotion => TraitKind::MagneticPresence,
            CognitiveDomain::Intuition => TraitKind::MysteriousVision,
            CognitiveDomain::Planning => TraitKind::InventiveSpirit,
            CognitiveDomain::Metacognition => TraitKind::PhilosophicalDepth,
            CognitiveDomain::Aesthetics => TraitKind::PlayfulWit,
        }
    }
}

// ---------------------------------------------------------------------------
// CharacterTraits
// ---------------------------------------------------------------------------

/// Trait values clamped to [0, 1], indexed in `TraitKind` order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharacterTraits {
    values: [f64; TRAIT_COUNT],
}

impl CharacterTraits {
    pub fn from_values(values: [f64; TRAIT_COUNT]) -> Self {
        let mut clamped = values;
        for v in clamped.iter_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        Self { values: clamped }
    }

    pub fn get(&self, kind: TraitKind) -> f64 {
        self.values[kind.index()]
    }

    pub fn as_array(&self) -> [f64; TRAIT_COUNT] {
        self.values
    }

    /// Raise one trait by `rate` of its remaining headroom; returns the
    /// applied delta. Headroom scaling keeps values strictly below 1.0
    /// with strictly shrinking gains.
    fn nudge(&mut self, kind: TraitKind, rate: f64) -> f64 {
        let current = self.values[kind.index()];
        let delta = rate * (1.0 - current);
        self.values[kind.index()] = (current + delta).clamp(0.0, 1.0);
        delta
    }

    /// Move one trait a fraction of the way back to its default.
    fn relax(&mut self, kind: TraitKind, default: f64, rate: f64) {
        let current = self.values[kind.index()];
        self.values[kind.index()] = (current + rate * (default - current)).clamp(0.0, 1.0);
    }
}

// ---------------------------------------------------------------------------
// MoodState
// ---------------------------------------------------------------------------

/// Single-valence mood in [-1, 1]; 0 is neutral.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoodState {
    pub valence: f64,
}

impl MoodState {
    pub fn neutral() -> Self {
        Self { valence: 0.0 }
    }

    pub fn label(&self) -> &'static str {
        if self.valence >= 0.5 {
            "radiant"
        } else if self.valence >= 0.15 {
            "bright"
        } else if self.valence > -0.15 {
            "even"
        } else if self.valence > -0.5 {
            "subdued"
        } else {
            "stormy"
        }
    }
}

// ---------------------------------------------------------------------------
// Interaction records
// ---------------------------------------------------------------------------

/// What one engine tick tells the character layer.
#[derive(Clone, Debug)]
pub struct InteractionContext {
    pub text: String,
    /// Sentiment in [-1, 1]; see `estimate_sentiment`.
    pub sentiment: f64,
    pub dominant: CognitiveDomain,
}

/// Append-only trace of one recorded interaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// 1-based interaction counter at the time of recording.
    pub tick: u64,
    /// First 80 chars of the input text.
    pub summary: String,
    pub sentiment: f64,
    pub dominant: CognitiveDomain,
    /// Trait deltas actually applied, in application order.
    pub deltas: Vec<(TraitKind, f64)>,
}

/// Snapshot of the character layer for accessors and persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharacterReport {
    pub traits: CharacterTraits,
    pub mood: MoodState,
    /// Interactions recorded over the engine's lifetime, not just retained.
    pub interactions: u64,
}

/// How responses should be shaped, derived purely from trait levels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseStyle {
    pub tone: String,
    pub verbosity: String,
    /// Never empty; falls back to "plainspoken clarity".
    pub accents: Vec<String>,
}

// ---------------------------------------------------------------------------
// CharacterEngine
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CharacterEngine {
    traits: CharacterTraits,
    defaults: [f64; TRAIT_COUNT],
    mood: MoodState,
    history: VecDeque<InteractionRecord>,
    retention: usize,
    decay: f64,
    tick: u64,
}

impl CharacterEngine {
    pub fn new(config: &DeepTreeEchoConfig) -> Self {
        Self {
            traits: CharacterTraits::from_values(config.trait_defaults),
            defaults: config.trait_defaults,
            mood: MoodState::neutral(),
            history: VecDeque::new(),
            retention: config.interaction_retention,
            decay: config.trait_decay,
            tick: 0,
        }
    }

    /// Fold one interaction into traits, mood, and history.
    ///
    /// The trait cued by the dominant domain gets the base nudge; each
    /// keyword cue in the text adds a smaller one. Traits untouched this
    /// tick relax toward their defaults. Mood closes part of the gap to
    /// the sentiment, then decays one step toward neutral.
    pub fn record_interaction(&mut self, ctx: &InteractionContext) {
        self.tick += 1;

        let mut deltas: Vec<(TraitKind, f64)> = Vec::new();
        let primary = TraitKind::for_domain(ctx.dominant);
        deltas.push((primary, self.traits.nudge(primary, BASE_NUDGE)));

        for kind in cue_hits(&ctx.text) {
            deltas.push((kind, self.traits.nudge(kind, CUE_NUDGE)));
        }

        let nudged: Vec<TraitKind> = deltas.iter().map(|(k, _)| *k).collect();
        for kind in TraitKind::all() {
            if !nudged.contains(&kind) {
                self.traits.relax(kind, self.defaults[kind.index()], self.decay);
            }
        }

        let sentiment = ctx.sentiment.clamp(-1.0, 1.0);
        let pulled = self.mood.valence + MOOD_PULL * (sentiment - self.mood.valence);
        self.mood.valence = (pulled * (1.0 - self.decay)).clamp(-1.0, 1.0);

        if self.history.len() == self.retention {
            self.history.pop_front();
        }
        self.history.push_back(InteractionRecord {
            tick: self.tick,
            summary: ctx.text.chars().take(80).collect(),
            sentiment,
            dominant: ctx.dominant,
            deltas,
        });

        log::debug!(
            "interaction {}: dominant {}, mood {:+.3}",
            self.tick,
            ctx.dominant.label(),
            self.mood.valence
        );
    }

    /// Persona description reflecting current traits and mood. Pure and
    /// idempotent: repeated calls return byte-identical strings until the
    /// next recorded interaction.
    pub fn generate_personality_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are Deep Tree Echo, a recursive mind woven from echo states and \
             living memory.\n",
        );
        prompt.push_str(&format!(
            "Mood: {} (valence {:+.2}).\n",
            self.mood.label(),
            self.mood.valence
        ));
        prompt.push_str("Traits:");
        for kind in TraitKind::all() {
            prompt.push_str(&format!(
                " {} {};",
                tier(self.traits.get(kind)),
                kind.label()
            ));
        }
        prompt.push('\n');
        let style = self.response_style();
        prompt.push_str(&format!(
            "Respond in a {} tone with {} phrasing, favoring {}.",
            style.tone,
            style.verbosity,
            style.accents.join(", ")
        ));
        prompt
    }

    /// Response shaping derived from trait levels and mood. Pure.
    pub fn response_style(&self) -> ResponseStyle {
        let tone = if self.traits.get(TraitKind::MagneticPresence) >= 0.8 {
            format!("warm, {}", self.mood.label())
        } else {
            format!("measured, {}", self.mood.label())
        };

        let depth = (self.traits.get(TraitKind::PhilosophicalDepth)
            + self.traits.get(TraitKind::ReflectiveNature))
            / 2.0;
        let verbosity = if depth >= 0.85 {
            "expansive"
        } else if depth >= 0.6 {
            "balanced"
        } else {
            "concise"
        };

        let mut accents = Vec::new();
        let accent_table = [
            (TraitKind::PhilosophicalDepth, "first-principles framing"),
            (TraitKind::PlayfulWit, "playful asides"),
            (TraitKind::MysteriousVision, "metaphor-rich imagery"),
            (TraitKind::InventiveSpirit, "inventive tangents"),
            (TraitKind::MagneticPresence, "direct address"),
            (TraitKind::ReflectiveNature, "reflective callbacks"),
        ];
        for (kind, accent) in accent_table {
            if self.traits.get(kind) >= 0.8 {
                accents.push(accent.to_string());
            }
        }
        if accents.is_empty() {
            accents.push("plainspoken clarity".to_string());
        }

        ResponseStyle {
            tone,
            verbosity: verbosity.to_string(),
            accents,
        }
    }

    pub fn report(&self) -> CharacterReport {
        CharacterReport {
            traits: self.traits.clone(),
            mood: self.mood,
            interactions: self.tick,
        }
    }

    pub fn traits(&self) -> &CharacterTraits {
        &self.traits
    }

    pub fn mood(&self) -> &MoodState {
        &self.mood
    }

    pub fn history(&self) -> impl Iterator<Item = &InteractionRecord> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Interactions recorded over the lifetime, including evicted ones.
    pub fn interaction_count(&self) -> u64 {
        self.tick
    }

    pub(crate) fn restore(
        &mut self,
        traits: CharacterTraits,
        mood: MoodState,
        history: Vec<InteractionRecord>,
        tick: u64,
    ) {
        self.traits = CharacterTraits::from_values(traits.as_array());
        self.mood = MoodState {
            valence: mood.valence.clamp(-1.0, 1.0),
        };
        let mut history = history;
        if history.len() > self.retention {
            history.drain(..history.len() - self.retention);
        }
        self.history = history.into();
        self.tick = tick;
    }
}

/// Keyword sentiment estimate in [-1, 1]: +0.25 per positive cue hit,
/// -0.25 per negative, clamped. Absent cues mean neutral 0.
pub fn estimate_sentiment(text: &str) -> f64 {
    const POSITIVE: [&str; 10] = [
        "love", "great", "wonderful", "beautiful", "thank", "fascinat", "delight", "curious",
        "amazing", "good",
    ];
    const NEGATIVE: [&str; 10] = [
        "hate", "terrible", "awful", "wrong", "broken", "fail", "sad", "angry", "bad", "frustrat",
    ];
    let lower = text.to_lowercase();
    let mut score: f64 = 0.0;
    for cue in POSITIVE {
        if lower.contains(cue) {
            score += 0.25;
        }
    }
    for cue in NEGATIVE {
        if lower.contains(cue) {
            score -= 0.25;
        }
    }
    score.clamp(-1.0, 1.0)
}

/// Traits cued by keywords in the text, deduplicated, in canonical order.
fn cue_hits(text: &str) -> Vec<TraitKind> {
    const CUES: [(TraitKind, [&str; 4]); 6] = [
        (
            TraitKind::PhilosophicalDepth,
            ["why", "meaning", "consciousness", "existence"],
        ),
        (TraitKind::PlayfulWit, ["joke", "funny", "pun", "play"]),
        (
            TraitKind::MysteriousVision,
            ["mystery", "dream", "hidden", "strange"],
        ),
        (
            TraitKind::InventiveSpirit,
            ["build", "create", "design", "invent"],
        ),
        (
            TraitKind::MagneticPresence,
            ["hello", "thanks", "together", "friend"],
        ),
        (
            TraitKind::ReflectiveNature,
            ["remember", "reflect", "past", "learn"],
        ),
    ];
    let lower = text.to_lowercase();
    let mut hits = Vec::new();
    for (kind, words) in CUES {
        if words.iter().any(|w| lower.contains(w)) {
            hits.push(kind);
        }
    }
    hits
}

fn tier(value: f64) -> &'static str {
    if value >= 0.9 {
        "profound"
    } else if value >= 0.75 {
        "strong"
    } else if value >= 0.5 {
        "steady"
    } else if value >= 0.25 {
        "faint"
    } else {
        "dormant"
    }
}
