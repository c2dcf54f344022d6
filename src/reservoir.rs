//! Tree-structured echo state reservoir.
//!
//! The recurrent core: a fixed-size state vector advanced once per input
//! through sparse tree-shaped connectivity. Internal weights are drawn
//! once at construction and never trained; only the linear readout learns
//! (ridge regression over the retained training window).
//!
//! Architecture:
//!   input → W_in → [leaky tanh update over tree edges] → state → readout
//!
//! Stability: the tree weight matrix is rescaled at construction so its
//! spectral radius (geometric-mean power iteration estimate) sits at
//! 0.95 × the configured ceiling. Radius ≥ 1 risks runaway activations;
//! the margin keeps the estimate error from crossing the ceiling.
//!
//! State is never reset implicitly — `reset` is the only way to start a
//! fresh trajectory.

use std::collections::VecDeque;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::DeepTreeEchoConfig;
use crate::errors::{EchoError, Result};
use crate::readout::LinearReadout;

/// Margin applied below the configured ceiling when rescaling tree weights.
const RADIUS_MARGIN: f64 = 0.95;

/// Iterations for the spectral radius estimate.
const RADIUS_ITERS: usize = 128;

// ---------------------------------------------------------------------------
// TreeTopology — adjacency-by-index arena
// ---------------------------------------------------------------------------

/// Rooted-tree connectivity over reservoir units.
///
/// Node 0 is the root; node i hangs under (i-1)/k for branching factor k
/// (a complete k-ary tree). Each parent/child edge carries one weight per
/// direction, stored as incoming lists for cache-friendly iteration.
/// Built once; topology never changes afterwards.
#[derive(Clone, Debug)]
pub struct TreeTopology {
    pub parent: Vec<Option<usize>>,
    pub children: Vec<Vec<usize>>,
    /// incoming[i] = (source unit, edge weight) for every edge into i
    incoming: Vec<Vec<(usize, f64)>>,
    /// Post-scaling radius estimate
    spectral_radius: f64,
}

impl TreeTopology {
    /// Build a complete k-ary tree over `size` units with seeded edge
    /// weights, rescaled below `ceiling`.
    pub fn new(size: usize, branching: usize, ceiling: f64, seed: u64) -> Self {
        let mut parent = vec![None; size];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); size];
        for i in 1..size {
            let p = (i - 1) / branching;
            parent[i] = Some(p);
            children[p].push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); size];
        for (i, &p) in parent.iter().enumerate() {
            if let Some(p) = p {
                // One weight per direction of the edge
                incoming[i].push((p, rng.gen_range(-1.0..1.0)));
                incoming[p].push((i, rng.gen_range(-1.0..1.0)));
            }
        }

        // Rescale so the radius estimate lands at RADIUS_MARGIN × ceiling.
        // ρ(cW) = c·ρ(W), so the scaling is exact up to estimator error.
        let raw = estimate_spectral_radius(&incoming, size, RADIUS_ITERS, &mut rng);
        if raw > 1e-12 {
            let scale = ceiling * RADIUS_MARGIN / raw;
            for edges in incoming.iter_mut() {
                for (_, w) in edges.iter_mut() {
                    *w *= scale;
                }
            }
        }
        let spectral_radius = estimate_spectral_radius(&incoming, size, RADIUS_ITERS, &mut rng);

        Self { parent, children, incoming, spectral_radius }
    }

    /// W_tree · state, sparse over tree edges.
    pub fn apply(&self, state: &[f64], out: &mut [f64]) {
        for (i, edges) in self.incoming.iter().enumerate() {
            let mut sum = 0.0;
            for &(src, w) in edges {
                sum += w * state[src];
            }
            out[i] = sum;
        }
    }

    /// Spectral radius estimate of the scaled edge weights.
    pub fn spectral_radius(&self) -> f64 {
        self.spectral_radius
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.incoming.iter().map(|e| e.len()).sum()
    }
}

/// Spectral radius via geometric-mean growth of repeated application
/// (converges for complex dominant pairs too, where plain power iteration
/// oscillates).
fn estimate_spectral_radius(
    incoming: &[Vec<(usize, f64)>],
    n: usize,
    iters: usize,
    rng: &mut ChaCha8Rng,
) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let mut v: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm < 1e-15 {
        return 0.0;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }

    let mut log_growth = 0.0;
    let mut next = vec![0.0; n];
    for _ in 0..iters {
        for (i, edges) in incoming.iter().enumerate() {
            let mut sum = 0.0;
            for &(src, w) in edges {
                sum += w * v[src];
            }
            next[i] = sum;
        }
        let norm: f64 = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-15 {
            return 0.0;
        }
        log_growth += norm.ln();
        for (vi, ni) in v.iter_mut().zip(&next) {
            *vi = ni / norm;
        }
    }
    (log_growth / iters as f64).exp()
}

// ---------------------------------------------------------------------------
// Reservoir
// ---------------------------------------------------------------------------

/// The echo state network: tree topology, input weights, live state,
/// bounded training window, and the trained readout.
#[derive(Clone, Debug)]
pub struct Reservoir {
    size: usize,
    input_dim: usize,
    output_dim: usize,
    leak: f64,
    ridge_lambda: f64,
    window_cap: usize,
    topology: TreeTopology,
    /// Input weights, size × input_dim row-major, scaled by 1/√input_dim
    /// to keep pre-activations in tanh's responsive range.
    w_in: Vec<f64>,
    state: Vec<f64>,
    readout: LinearReadout,
    window: VecDeque<(Vec<f64>, Vec<f64>)>,
}

impl Reservoir {
    /// Build a reservoir from a validated config.
    ///
    /// `seed_material` is the registry's fold of its fixed tables; it is
    /// mixed with the config seed before any weight draw. `output_dim` is
    /// the readout width (one channel per cognitive domain).
    pub fn new(
        config: &DeepTreeEchoConfig,
        seed_material: u64,
        output_dim: usize,
    ) -> Result<Self> {
        config.validate()?;
        if output_dim == 0 {
            return Err(EchoError::Config("output_dim must be positive".into()));
        }

        let size = config.reservoir_size;
        let input_dim = config.input_dim;
        let mixed = config.seed ^ seed_material;

        let topology = TreeTopology::new(
            size,
            config.branching_factor,
            config.spectral_radius,
            mixed ^ 1u64.wrapping_mul(2654435761),
        );

        let mut rng = ChaCha8Rng::seed_from_u64(mixed ^ 2u64.wrapping_mul(2654435761));
        let in_scale = 1.0 / (input_dim as f64).sqrt();
        let w_in: Vec<f64> = (0..size * input_dim)
            .map(|_| rng.gen_range(-1.0..1.0) * in_scale)
            .collect();

        log::info!(
            "reservoir built: {size} units, {} edges, radius {:.4} (ceiling {})",
            topology.edge_count(),
            topology.spectral_radius(),
            config.spectral_radius
        );

        Ok(Self {
            size,
            input_dim,
            output_dim,
            leak: config.leak_rate,
            ridge_lambda: config.ridge_lambda,
            window_cap: config.training_window,
            topology,
            w_in,
            state: vec![0.0; size],
            readout: LinearReadout::new(size, output_dim),
            window: VecDeque::with_capacity(config.training_window.min(1024)),
        })
    }

    /// One discrete tick:
    /// `new_state = tanh(leak·old + (1−leak)·(W_in·input + W_tree·old))`.
    ///
    /// Returns the readout projection of the new state. A shape failure
    /// leaves the state untouched.
    pub fn step(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        self.check_input(input)?;
        let next = self.advance(&self.state, input);
        self.state = next;
        Ok(self.readout.forward(&self.state))
    }

    /// Append an (input, target) pair to the training window, evicting the
    /// oldest entry at capacity.
    pub fn remember(&mut self, input: &[f64], target: &[f64]) -> Result<()> {
        self.check_input(input)?;
        if target.len() != self.output_dim {
            return Err(EchoError::Shape {
                expected: self.output_dim,
                got: target.len(),
            });
        }
        if self.window.len() == self.window_cap {
            self.window.pop_front();
        }
        self.window.push_back((input.to_vec(), target.to_vec()));
        Ok(())
    }

    /// Retrain the readout over the retained window and install the result.
    ///
    /// On failure the previous readout stays installed and subsequent
    /// `step` outputs are unchanged.
    pub fn train(&mut self) -> Result<()> {
        let readout = self.solve_readout().map_err(|e| {
            log::warn!("readout training failed: {e}");
            e
        })?;
        self.install_readout(readout)
    }

    /// Ridge-solve a fresh readout from the window without touching the
    /// live reservoir. Pure with respect to `self`; safe to run from a
    /// background task on a clone and install the result under the lock.
    ///
    /// The window's inputs are replayed from a zero scratch state (washout
    /// semantics), so the solution is a function of the window alone.
    pub fn solve_readout(&self) -> Result<LinearReadout> {
        if self.window.is_empty() {
            return Err(EchoError::Training("training window is empty".into()));
        }
        let mut scratch = vec![0.0; self.size];
        let mut states = Vec::with_capacity(self.window.len());
        let mut targets = Vec::with_capacity(self.window.len());
        for (input, target) in &self.window {
            scratch = self.advance(&scratch, input);
            states.push(scratch.clone());
            targets.push(target.clone());
        }
        let readout = LinearReadout::solve_ridge(
            &states,
            &targets,
            self.size,
            self.output_dim,
            self.ridge_lambda,
        )?;
        log::info!(
            "readout trained over {} window entries (λ = {})",
            self.window.len(),
            self.ridge_lambda
        );
        Ok(readout)
    }

    /// Swap in a readout produced by `solve_readout` — a single assignment,
    /// so concurrent observers see pre- or post-training weights, never a
    /// blend.
    pub fn install_readout(&mut self, readout: LinearReadout) -> Result<()> {
        if readout.feature_dim != self.size || readout.output_dim != self.output_dim {
            return Err(EchoError::State(format!(
                "readout shape {}×{} does not fit reservoir {}×{}",
                readout.output_dim, readout.feature_dim, self.output_dim, self.size
            )));
        }
        self.readout = readout;
        Ok(())
    }

    /// Explicitly zero the state vector for a fresh trajectory.
    /// The training window and readout are kept.
    pub fn reset(&mut self) {
        self.state.fill(0.0);
    }

    /// Current echo state.
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// Number of retained training pairs.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Whether a successful train has run.
    pub fn is_trained(&self) -> bool {
        self.readout.trained
    }

    /// Post-scaling spectral radius estimate of the tree weights.
    pub fn spectral_radius(&self) -> f64 {
        self.topology.spectral_radius()
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn readout(&self) -> &LinearReadout {
        &self.readout
    }

    pub fn window(&self) -> impl Iterator<Item = &(Vec<f64>, Vec<f64>)> {
        self.window.iter()
    }

    /// Restore evolving state from a persisted snapshot. The topology and
    /// input weights are rebuilt from config + seed by the caller; only
    /// state, window, and readout travel.
    pub(crate) fn restore(
        &mut self,
        state: Vec<f64>,
        window: Vec<(Vec<f64>, Vec<f64>)>,
        readout: LinearReadout,
    ) -> Result<()> {
        if state.len() != self.size {
            return Err(EchoError::State(format!(
                "snapshot state has {} units, reservoir has {}",
                state.len(),
                self.size
            )));
        }
        for (input, target) in &window {
            if input.len() != self.input_dim || target.len() != self.output_dim {
                return Err(EchoError::State(
                    "snapshot window entry shape mismatch".into(),
                ));
            }
        }
        if window.len() > self.window_cap {
            return Err(EchoError::State(format!(
                "snapshot window has {} entries, capacity is {}",
                window.len(),
                self.window_cap
            )));
        }
        self.install_readout(readout)?;
        self.state = state;
        self.window = window.into();
        Ok(())
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_dim {
            return Err(EchoError::Shape {
                expected: self.input_dim,
                got: input.len(),
            });
        }
        Ok(())
    }

    /// Pure state update shared by `step` and window replay.
    fn advance(&self, state: &[f64], input: &[f64]) -> Vec<f64> {
        let mut pre = vec![0.0; self.size];
        self.topology.apply(state, &mut pre);
        for i in 0..self.size {
            let row = &self.w_in[i * self.input_dim..(i + 1) * self.input_dim];
            let mut drive = 0.0;
            for (w, x) in row.iter().zip(input) {
                drive += w * x;
            }
            pre[i] = (self.leak * state[i] + (1.0 - self.leak) * (drive + pre[i])).tanh();
        }
        pre
    }
}
