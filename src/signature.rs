//! Tensor signature registry — the fixed symbolic layer.
//!
//! Grounded in two constant tables:
//!   - TREE_SEQUENCE: rooted-tree counts (OEIS A000081, from a(1)), one
//!     term per cognitive domain
//!   - COGNITIVE_PRIMES: the 11 primes backing prime-factor resonance
//!
//! Each of the 11 domains gets one immutable TensorSignature binding a
//! gestalt weight to a small prime subset. Subsets form an overlapping
//! ring: domain i holds {P[i], P[(i+1) mod 11]}, so adjacent domains share
//! exactly one prime and resonance spreads across related domains.
//!
//! `resonance_of` is a pure set computation — permuting how any prime set
//! is stored never changes the result.

use serde::{Deserialize, Serialize};

use crate::errors::{EchoError, Result};

/// Rooted-tree counts, OEIS A000081 starting at a(1).
pub const TREE_SEQUENCE: [u64; DOMAIN_COUNT] =
    [1, 1, 2, 4, 9, 20, 48, 115, 286, 719, 1842];

/// The fixed prime list backing resonance computation.
pub const COGNITIVE_PRIMES: [u64; DOMAIN_COUNT] =
    [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31];

/// Normalization constant for per-signature resonance values.
/// Prime, so no squarefree product of COGNITIVE_PRIMES ever maps to 0.
pub const RESONANCE_MODULUS: u64 = 1009;

/// Number of cognitive domains (and signatures, and primes).
pub const DOMAIN_COUNT: usize = 11;

// ---------------------------------------------------------------------------
// CognitiveDomain — fixed enumeration
// ---------------------------------------------------------------------------

/// The fixed set of cognitive domains, in enumeration order.
///
/// The order is load-bearing: activation ties in gestalt fusion break
/// toward the lowest index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CognitiveDomain {
    Memory,
    Reasoning,
    Creativity,
    Language,
    Perception,
    Attention,
    Emotion,
    Intuition,
    Planning,
    Metacognition,
    Aesthetics,
}

impl CognitiveDomain {
    /// All domains in enumeration order.
    pub fn all() -> [CognitiveDomain; DOMAIN_COUNT] {
        use CognitiveDomain::*;
        [
            Memory, Reasoning, Creativity, Language, Perception, Attention,
            Emotion, Intuition, Planning, Metacognition, Aesthetics,
        ]
    }

    /// Position in enumeration order.
    pub fn index(&self) -> usize {
        Self::all().iter().position(|d| d == self).unwrap_or(0)
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "Memory",
            Self::Reasoning => "Reasoning",
            Self::Creativity => "Creativity",
            Self::Language => "Language",
            Self::Perception => "Perception",
            Self::Attention => "Attention",
            Self::Emotion => "Emotion",
            Self::Intuition => "Intuition",
            Self::Planning => "Planning",
            Self::Metacognition => "Metacognition",
            Self::Aesthetics => "Aesthetics",
        }
    }
}

// ---------------------------------------------------------------------------
// TensorSignature
// ---------------------------------------------------------------------------

/// Immutable descriptor binding a cognitive domain to a prime subset and a
/// gestalt weight. One instance per domain, created once at registry
/// construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TensorSignature {
    pub domain: CognitiveDomain,
    /// Contribution weight in (0, 1].
    pub gestalt_weight: f64,
    /// Primes assigned to this domain, drawn from COGNITIVE_PRIMES.
    pub primes: Vec<u64>,
    /// Product of assigned primes mod RESONANCE_MODULUS.
    pub resonance: u64,
}

impl TensorSignature {
    /// Whether any of this signature's primes divides the key.
    pub fn resonates_with(&self, key: u64) -> bool {
        key > 1 && self.primes.iter().any(|&p| key % p == 0)
    }

    /// Resonance value normalized to [0, 1).
    pub fn normalized_resonance(&self) -> f64 {
        self.resonance as f64 / RESONANCE_MODULUS as f64
    }
}

/// Construction input for one signature: domain, weight, prime subset.
/// The subset may be given in any order.
#[derive(Clone, Debug)]
pub struct SignatureSpec {
    pub domain: CognitiveDomain,
    pub gestalt_weight: f64,
    pub primes: Vec<u64>,
}

/// The fixed default signature table.
pub fn default_signature_specs() -> Vec<SignatureSpec> {
    let p = &COGNITIVE_PRIMES;
    let weights = [
        0.88, 0.95, 0.92, 0.90, 0.84, 0.86, 0.82, 0.89, 0.87, 0.94, 0.91,
    ];
    CognitiveDomain::all()
        .iter()
        .enumerate()
        .map(|(i, &domain)| SignatureSpec {
            domain,
            gestalt_weight: weights[i],
            primes: vec![p[i], p[(i + 1) % DOMAIN_COUNT]],
        })
        .collect()
}

// ---------------------------------------------------------------------------
// SignatureRegistry
// ---------------------------------------------------------------------------

/// The fixed, read-only signature registry.
///
/// Validated once at load; safely shared across any number of engines
/// (typically behind an `Arc`).
#[derive(Clone, Debug)]
pub struct SignatureRegistry {
    sequence: Vec<u64>,
    primes: Vec<u64>,
    signatures: Vec<TensorSignature>,
}

impl SignatureRegistry {
    /// Build the registry from the built-in tables.
    pub fn new() -> Result<Self> {
        Self::with_tables(&TREE_SEQUENCE, &COGNITIVE_PRIMES, &default_signature_specs())
    }

    /// Build a registry from explicit tables, validating everything.
    ///
    /// Fails with `EchoError::Config` on: wrong sequence length, wrong
    /// prime count, non-increasing or composite primes, weights outside
    /// (0, 1], empty subsets, subsets not drawn from the prime list, or
    /// a domain missing/duplicated in the spec list.
    pub fn with_tables(
        sequence: &[u64],
        primes: &[u64],
        specs: &[SignatureSpec],
    ) -> Result<Self> {
        if sequence.len() != DOMAIN_COUNT {
            return Err(EchoError::Config(format!(
                "tree sequence must have {DOMAIN_COUNT} terms, got {}",
                sequence.len()
            )));
        }
        if primes.len() != DOMAIN_COUNT {
            return Err(EchoError::Config(format!(
                "prime list must have {DOMAIN_COUNT} entries, got {}",
                primes.len()
            )));
        }
        for pair in primes.windows(2) {
            if pair[1] <= pair[0] {
                return Err(EchoError::Config(format!(
                    "prime list not strictly increasing at {} -> {}",
                    pair[0], pair[1]
                )));
            }
        }
        for &p in primes {
            if !is_prime(p) {
                return Err(EchoError::Config(format!("{p} is not prime")));
            }
        }
        if specs.len() != DOMAIN_COUNT {
            return Err(EchoError::Config(format!(
                "expected {DOMAIN_COUNT} signature specs, got {}",
                specs.len()
            )));
        }

        // One signature per domain, assembled in enumeration order.
        let mut signatures: Vec<Option<TensorSignature>> = vec![None; DOMAIN_COUNT];
        for spec in specs {
            let idx = spec.domain.index();
            if signatures[idx].is_some() {
                return Err(EchoError::Config(format!(
                    "duplicate signature for domain {}",
                    spec.domain.label()
                )));
            }
            if !spec.gestalt_weight.is_finite()
                || spec.gestalt_weight <= 0.0
                || spec.gestalt_weight > 1.0
            {
                return Err(EchoError::Config(format!(
                    "gestalt weight {} for {} outside (0, 1]",
                    spec.gestalt_weight,
                    spec.domain.label()
                )));
            }
            if spec.primes.is_empty() {
                return Err(EchoError::Config(format!(
                    "empty prime subset for {}",
                    spec.domain.label()
                )));
            }
            for &p in &spec.primes {
                if !primes.contains(&p) {
                    return Err(EchoError::Config(format!(
                        "prime {p} for {} not in the prime list",
                        spec.domain.label()
                    )));
                }
            }
            let resonance = spec
                .primes
                .iter()
                .fold(1u64, |acc, &p| (acc * p) % RESONANCE_MODULUS);
            signatures[idx] = Some(TensorSignature {
                domain: spec.domain,
                gestalt_weight: spec.gestalt_weight,
                primes: spec.primes.clone(),
                resonance,
            });
        }
        let signatures: Vec<TensorSignature> = signatures
            .into_iter()
            .map(|s| {
                s.ok_or_else(|| EchoError::Config("missing signature for a domain".into()))
            })
            .collect::<Result<_>>()?;

        log::debug!(
            "signature registry loaded: {} domains, {} primes",
            signatures.len(),
            primes.len()
        );

        Ok(Self {
            sequence: sequence.to_vec(),
            primes: primes.to_vec(),
            signatures,
        })
    }

    /// The fixed ordered set of tensor signatures.
    pub fn signatures(&self) -> &[TensorSignature] {
        &self.signatures
    }

    /// The rooted-tree counting sequence.
    pub fn tree_counts(&self) -> &[u64] {
        &self.sequence
    }

    /// The fixed prime list.
    pub fn primes(&self) -> &[u64] {
        &self.primes
    }

    /// Resonance score for an input key.
    ///
    /// Factors the key against the prime list and sums the gestalt weights
    /// of signatures whose prime sets intersect the factorization.
    /// Deterministic and order-independent; keys 0 and 1 have no prime
    /// factors in the list and score 0.0.
    pub fn resonance_of(&self, key: u64) -> f64 {
        if key <= 1 {
            return 0.0;
        }
        self.signatures
            .iter()
            .filter(|sig| sig.resonates_with(key))
            .map(|sig| sig.gestalt_weight)
            .sum()
    }

    /// Deterministic seed material folded from the fixed tables.
    ///
    /// Reservoir construction mixes this into its RNG seed, tying every
    /// weight draw back to the registry.
    pub fn seed_material(&self) -> u64 {
        let mut acc = 0xA000_0081u64;
        for &t in &self.sequence {
            acc = acc.wrapping_mul(31).wrapping_add(t);
        }
        for &p in &self.primes {
            acc ^= p.wrapping_mul(2654435761);
        }
        acc
    }
}

/// Derive the integer key for a conversational turn.
///
/// Wrapping polynomial accumulation over the UTF-8 bytes; stable across
/// platforms and engine instances.
pub fn interaction_key(text: &str) -> u64 {
    text.bytes()
        .fold(0u64, |k, b| k.wrapping_mul(131).wrapping_add(b as u64))
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2u64;
    while d <= n / d {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}
