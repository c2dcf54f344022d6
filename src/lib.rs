//! Deep Tree Echo — reservoir-backed cognitive signal engine.
//!
//! Core mapping:
//!   - SignatureRegistry = rooted-tree counts + prime resonance (symbolic layer)
//!   - Reservoir = leaky echo state network wired as a complete k-ary tree
//!   - GestaltAggregator = projection magnitude + resonance → dominant domain
//!   - CharacterEngine = six evolving persona traits, mood, bounded history
//!   - DeepTreeEcho = embed → step → fuse → record, one critical section per turn

pub mod errors;
pub mod config;
pub mod signature;
pub mod readout;
pub mod reservoir;
pub mod gestalt;
pub mod embed;
pub mod character;
pub mod engine;
