//! Grammatical evolution for the gaggle swarm.
//!
//! A [`Genome`] is a fixed-length sequence of small integer codons. The
//! [`Grammar`] decodes any genome into a behaviour tree by modulo-selecting
//! productions while threading a wrapping cursor through the codons, bounded
//! by an explicit depth limit so every genome yields a valid tree. Fitness
//! is purely structural ([`fitness`]), and [`GenomePool`] runs the
//! decentralized selection/crossover/mutation/culling round each agent
//! applies to its private pool.

mod decode;
pub mod fitness;
mod genome;
mod grammar;
mod pool;

pub use genome::Genome;
pub use grammar::{CompositeKind, Grammar, Production};
pub use pool::{GenomeEntry, GenomePool, RoundOutcome};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by genome construction, grammar validation, and decoding.
///
/// Everything here is a configuration defect: decoding against a validated
/// grammar cannot fail for any non-empty genome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeneticsError {
    #[error("invalid evolution configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("grammar symbol `{0}` is not defined")]
    UnknownSymbol(String),
    #[error("grammar symbol `{0}` has no productions")]
    EmptyProductions(String),
    #[error("terminal `{0}` does not name a behaviour node")]
    UnknownTerminal(String),
    #[error("parameter symbol `{0}` must resolve to terminal fragments through aliases")]
    MalformedParameter(String),
    #[error("start symbol expanded to {count} nodes, expected exactly one")]
    AmbiguousRoot { count: usize },
    #[error("genome must contain at least one codon")]
    EmptyGenome,
}

/// Metric ranking crossover children during the culling step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CullMetric {
    /// Keep the structurally most diverse children (default).
    #[default]
    Diversity,
    /// Keep the fittest children.
    Fitness,
    /// Keep children in arrival order, no reranking.
    Arrival,
}

/// Knobs of the decentralized genetic algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Codons per genome.
    pub genome_size: usize,
    /// Upper bound (inclusive) for initial codon values.
    pub codon_init_max: u8,
    /// Bit width mutated per codon, in `[1, 8]`.
    pub codon_bits: u32,
    /// Pool size above which an evolutionary round triggers, and the size
    /// pools are culled back to.
    pub storage_threshold: usize,
    /// Parents kept by truncation selection (clamped to the pool size).
    pub truncation_size: usize,
    /// Per-pair probability that a selected pair produces children.
    pub crossover_prob: f32,
    /// Per-codon bit-flip probability.
    pub mutation_prob: f32,
    /// Expansion depth at which decoding falls back to the no-op node.
    pub max_tree_depth: u32,
    pub cull_metric: CullMetric,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            genome_size: 10,
            codon_init_max: 50,
            codon_bits: 8,
            storage_threshold: 7,
            truncation_size: 8,
            crossover_prob: 0.9,
            mutation_prob: 0.1,
            max_tree_depth: 10,
            cull_metric: CullMetric::Diversity,
        }
    }
}

impl EvolutionConfig {
    /// Reject configurations the evolutionary round cannot run under.
    pub fn validate(&self) -> Result<(), GeneticsError> {
        if self.genome_size == 0 {
            return Err(GeneticsError::InvalidConfig("genome_size must be at least 1"));
        }
        if self.codon_bits == 0 || self.codon_bits > 8 {
            return Err(GeneticsError::InvalidConfig("codon_bits must be in [1, 8]"));
        }
        if self.storage_threshold == 0 {
            return Err(GeneticsError::InvalidConfig("storage_threshold must be at least 1"));
        }
        if self.truncation_size == 0 {
            return Err(GeneticsError::InvalidConfig("truncation_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.crossover_prob) {
            return Err(GeneticsError::InvalidConfig("crossover_prob must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.mutation_prob) {
            return Err(GeneticsError::InvalidConfig("mutation_prob must be in [0, 1]"));
        }
        Ok(())
    }
}
