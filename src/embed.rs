//! Text-to-vector embedding for reservoir input.
//!
//! The engine drives the reservoir with fixed-width vectors in [-1, 1].
//! `InputEmbedder` is the seam: the default `TurnEmbedder` is a cheap
//! deterministic byte-statistics embedding, and callers can swap in their
//! own (token embeddings, learned encoders) without touching the engine.

/// Maps text to a fixed-width vector with components in [-1, 1].
/// Implementations must be deterministic: equal text, equal vector.
pub trait InputEmbedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f64>;
}

/// Default embedder: the leading slots carry surface statistics of the
/// text, the rest carry seeded byte-fold hashes. Empty text embeds to
/// the zero vector.
#[derive(Clone, Debug)]
pub struct TurnEmbedder {
    dim: usize,
}

impl TurnEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl InputEmbedder for TurnEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f64> {
        let mut out = vec![0.0; self.dim];
        let bytes = text.as_bytes();
        if bytes.is_empty() {
            return out;
        }
        let len = bytes.len() as f64;

        let mean = bytes.iter().map(|&b| b as f64).sum::<f64>() / len;
        let vowels = bytes
            .iter()
            .filter(|b| matches!(b.to_ascii_lowercase(), b'a' | b'e' | b'i' | b'o' | b'u'))
            .count() as f64;
        let spaces = bytes.iter().filter(|b| b.is_ascii_whitespace()).count() as f64;
        let digits = bytes.iter().filter(|b| b.is_ascii_digit()).count() as f64;

        let stats = [
            (len / 64.0).tanh(),
            (mean - 96.0) / 96.0,
            (vowels / len) * 2.0 - 1.0,
            (spaces / len) * 2.0 - 1.0,
            (digits / len) * 2.0 - 1.0,
            if text.contains('?') { 1.0 } else { -1.0 },
        ];
        for (slot, &s) in out.iter_mut().zip(stats.iter()) {
            *slot = s.clamp(-1.0, 1.0);
        }

        // Remaining slots: seeded byte folds, one independent hash per slot
        for (i, slot) in out.iter_mut().enumerate().skip(stats.len()) {
            let mut h: u64 = 0x9E37_79B9 ^ (i as u64).wrapping_mul(2654435761);
            for &b in bytes {
                h = h.wrapping_mul(131).wrapping_add(b as u64).rotate_left(7);
            }
            *slot = (h as f64 / u64::MAX as f64) * 2.0 - 1.0;
        }
        out
    }
}
