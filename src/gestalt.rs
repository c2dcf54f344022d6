//! Gestalt fusion of reservoir output and signature resonance.
//!
//! The aggregator is the bridge between the numeric reservoir and the
//! symbolic registry: each cognitive domain gets a fixed unit projection
//! over the reservoir's output channels, and its activation is the
//! weighted projection magnitude plus the domain's resonance with the
//! current input key. Fusion is pure — same output vector and key always
//! produce the same snapshot, and nothing in the aggregator mutates.

use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{EchoError, Result};
use crate::signature::{CognitiveDomain, SignatureRegistry, DOMAIN_COUNT};

// ---------------------------------------------------------------------------
// GestaltSnapshot
// ---------------------------------------------------------------------------

/// Read-only fused view of one engine tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GestaltSnapshot {
    /// Per-domain activation, indexed by domain enumeration order.
    pub activations: Vec<f64>,
    /// Domain with the highest activation; ties go to the lowest index.
    pub dominant: CognitiveDomain,
    /// Interaction key the resonance terms were computed against.
    pub input_key: u64,
    /// L2 norm of the raw reservoir output.
    pub reservoir_energy: f64,
}

impl GestaltSnapshot {
    /// Neutral snapshot reported before the first compute: all activations
    /// zero, dominant at the first enumerated domain, key 0.
    pub fn empty() -> Self {
        Self {
            activations: vec![0.0; DOMAIN_COUNT],
            dominant: CognitiveDomain::all()[0],
            input_key: 0,
            reservoir_energy: 0.0,
        }
    }

    /// Activation of a single domain.
    pub fn activation_of(&self, domain: CognitiveDomain) -> f64 {
        self.activations[domain.index()]
    }

    /// Domains sorted by activation, strongest first. Equal activations
    /// keep enumeration order.
    pub fn ranked(&self) -> Vec<(CognitiveDomain, f64)> {
        let mut pairs: Vec<(CognitiveDomain, f64)> = CognitiveDomain::all()
            .iter()
            .map(|&d| (d, self.activations[d.index()]))
            .collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs
    }
}

// ---------------------------------------------------------------------------
// GestaltAggregator
// ---------------------------------------------------------------------------

/// Fuses reservoir output with registry resonance into a `GestaltSnapshot`.
///
/// Projections are drawn once at construction from the mixed seed; two
/// aggregators built from the same registry and seed fuse identically.
#[derive(Clone, Debug)]
pub struct GestaltAggregator {
    registry: Arc<SignatureRegistry>,
    /// DOMAIN_COUNT × DOMAIN_COUNT row-major, one unit row per domain.
    projections: Vec<f64>,
}

impl GestaltAggregator {
    pub fn new(registry: Arc<SignatureRegistry>, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut projections = vec![0.0; DOMAIN_COUNT * DOMAIN_COUNT];
        for d in 0..DOMAIN_COUNT {
            let row = &mut projections[d * DOMAIN_COUNT..(d + 1) * DOMAIN_COUNT];
            for w in row.iter_mut() {
                *w = rng.gen_range(-1.0..1.0);
            }
            let norm: f64 = row.iter().map(|w| w * w).sum::<f64>().sqrt();
            if norm > 1e-12 {
                for w in row.iter_mut() {
                    *w /= norm;
                }
            } else {
                row[d] = 1.0;
            }
        }
        Self { registry, projections }
    }

    /// Fuse one reservoir output vector with the interaction key.
    ///
    /// activation[d] = gestalt_weight[d] · |projection[d] · output|
    ///               + normalized resonance of d's primes against the key
    pub fn fuse(&self, reservoir_output: &[f64], input_key: u64) -> Result<GestaltSnapshot> {
        if reservoir_output.len() != DOMAIN_COUNT {
            return Err(EchoError::Shape {
                expected: DOMAIN_COUNT,
                got: reservoir_output.len(),
            });
        }

        let signatures = self.registry.signatures();
        let mut activations = vec![0.0; DOMAIN_COUNT];
        for (d, sig) in signatures.iter().enumerate() {
            let row = &self.projections[d * DOMAIN_COUNT..(d + 1) * DOMAIN_COUNT];
            let projected: f64 = row
                .iter()
                .zip(reservoir_output)
                .map(|(w, y)| w * y)
                .sum();
            let mut activation = sig.gestalt_weight * projected.abs();
            if sig.resonates_with(input_key) {
                activation += sig.normalized_resonance();
            }
            activations[d] = activation;
        }

        // Strict greater-than keeps the lowest index on ties
        let mut dominant = 0;
        for (d, &a) in activations.iter().enumerate() {
            if a > activations[dominant] {
                dominant = d;
            }
        }

        let reservoir_energy = reservoir_output
            .iter()
            .map(|y| y * y)
            .sum::<f64>()
            .sqrt();

        Ok(GestaltSnapshot {
            activations,
            dominant: signatures[dominant].domain,
            input_key,
            reservoir_energy,
        })
    }

    pub fn registry(&self) -> &Arc<SignatureRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> GestaltAggregator {
        let registry = Arc::new(SignatureRegistry::new().unwrap());
        GestaltAggregator::new(registry, 0xFEED)
    }

    #[test]
    fn fuse_rejects_wrong_output_width() {
        let agg = aggregator();
        let err = agg.fuse(&[0.0; 5], 42).unwrap_err();
        assert_eq!(err, EchoError::Shape { expected: DOMAIN_COUNT, got: 5 });
    }

    #[test]
    fn fuse_is_pure() {
        let agg = aggregator();
        let output: Vec<f64> = (0..DOMAIN_COUNT).map(|i| (i as f64 * 0.3).sin()).collect();
        let a = agg.fuse(&output, 77).unwrap();
        let b = agg.fuse(&output, 77).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_output_and_unit_key_tie_break_to_first_domain() {
        let agg = aggregator();
        // Key 1 has no prime factors, so no resonance anywhere; activations
        // are all exactly zero and the tie must resolve to the first domain.
        let snap = agg.fuse(&vec![0.0; DOMAIN_COUNT], 1).unwrap();
        assert!(snap.activations.iter().all(|&a| a == 0.0));
        assert_eq!(snap.dominant, CognitiveDomain::Memory);
        assert_eq!(snap.reservoir_energy, 0.0);
    }

    #[test]
    fn resonance_adds_exactly_on_resonating_domains() {
        let agg = aggregator();
        let output: Vec<f64> = (0..DOMAIN_COUNT).map(|i| (i as f64 * 0.7).cos()).collect();
        let plain = agg.fuse(&output, 1).unwrap();
        let keyed = agg.fuse(&output, 6).unwrap();

        for sig in agg.registry().signatures() {
            let d = sig.domain.index();
            let diff = keyed.activations[d] - plain.activations[d];
            let expected = if sig.resonates_with(6) {
                sig.normalized_resonance()
            } else {
                0.0
            };
            assert!(
                (diff - expected).abs() < 1e-12,
                "{}: resonance delta {diff}, expected {expected}",
                sig.domain.label()
            );
        }
    }

    #[test]
    fn dominant_matches_argmax() {
        let agg = aggregator();
        let output: Vec<f64> = (0..DOMAIN_COUNT)
            .map(|i| ((i * i) as f64 * 0.13).sin())
            .collect();
        let snap = agg.fuse(&output, 30030).unwrap();
        let max = snap
            .activations
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(snap.activation_of(snap.dominant), max);
    }

    #[test]
    fn ranked_is_descending() {
        let agg = aggregator();
        let output: Vec<f64> = (0..DOMAIN_COUNT).map(|i| (i as f64).tanh()).collect();
        let snap = agg.fuse(&output, 210).unwrap();
        let ranked = snap.ranked();
        assert_eq!(ranked.len(), DOMAIN_COUNT);
        for pair in ranked.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        assert_eq!(ranked[0].0, snap.dominant);
    }

    #[test]
    fn twin_aggregators_fuse_identically() {
        let registry = Arc::new(SignatureRegistry::new().unwrap());
        let a = GestaltAggregator::new(Arc::clone(&registry), 99);
        let b = GestaltAggregator::new(registry, 99);
        let output: Vec<f64> = (0..DOMAIN_COUNT).map(|i| (i as f64 * 0.21).sin()).collect();
        assert_eq!(a.fuse(&output, 1009).unwrap(), b.fuse(&output, 1009).unwrap());
    }
}
