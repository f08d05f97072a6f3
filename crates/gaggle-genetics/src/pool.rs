//! Per-agent genome pools and the decentralized evolutionary round.

use std::cmp::Reverse;
use std::sync::Arc;

use gaggle_behavior::BehaviorNode;
use ordered_float::OrderedFloat;
use rand::Rng;

use crate::fitness;
use crate::grammar::Grammar;
use crate::{CullMetric, EvolutionConfig, Genome, GeneticsError};

/// A genome bundled with its decoded tree and cached structural fitness.
///
/// Entries are immutable once built, which keeps the three fields
/// consistent by construction: operators mutate bare [`Genome`] values and
/// build a fresh entry from the result.
#[derive(Clone, Debug)]
pub struct GenomeEntry {
    genome: Genome,
    tree: Arc<BehaviorNode>,
    fitness: f32,
}

impl GenomeEntry {
    /// Decode `genome` under `grammar` and cache its structural fitness.
    pub fn new(
        genome: Genome,
        grammar: &Grammar,
        config: &EvolutionConfig,
    ) -> Result<Self, GeneticsError> {
        let tree = grammar.decode(&genome, config.max_tree_depth)?;
        let fitness = fitness::score(&tree);
        Ok(Self {
            genome,
            tree: Arc::new(tree),
            fitness,
        })
    }

    #[must_use]
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    #[must_use]
    pub fn tree(&self) -> &BehaviorNode {
        &self.tree
    }

    /// Shared handle to the tree, for ticking it while the entry stays in
    /// a pool.
    #[must_use]
    pub fn tree_handle(&self) -> Arc<BehaviorNode> {
        Arc::clone(&self.tree)
    }

    #[must_use]
    pub fn fitness(&self) -> f32 {
        self.fitness
    }
}

/// Counts reported by one evolutionary round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Entries kept by truncation selection.
    pub parents: usize,
    /// Entries in the pool after culling.
    pub children: usize,
}

/// An agent's private, ordered collection of genome entries.
///
/// Exchange appends without bound between rounds; a round replaces the
/// whole pool with at most `storage_threshold` children.
#[derive(Clone, Debug, Default)]
pub struct GenomePool {
    entries: Vec<GenomeEntry>,
}

impl GenomePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: GenomeEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[GenomeEntry] {
        &self.entries
    }

    /// Whether the pool has grown past `storage_threshold` and a round is
    /// due.
    #[must_use]
    pub fn is_saturated(&self, storage_threshold: usize) -> bool {
        self.entries.len() > storage_threshold
    }

    /// The fittest entry; the earliest on ties.
    #[must_use]
    pub fn best(&self) -> Option<&GenomeEntry> {
        self.entries
            .iter()
            .reduce(|best, entry| if entry.fitness > best.fitness { entry } else { best })
    }

    /// Run one evolutionary round: truncation selection, pairwise
    /// single-point crossover, per-codon mutation, rebuild, cull. The pool
    /// is replaced entirely by the children; an empty result is legal when
    /// every pair skips crossover.
    ///
    /// Per pair, the draw order is fixed: one participation draw, then the
    /// crossover point, then each child's mutation draws. Skipped pairs
    /// consume only the participation draw.
    pub fn evolve<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        grammar: &Grammar,
        config: &EvolutionConfig,
    ) -> Result<RoundOutcome, GeneticsError> {
        self.entries
            .sort_by_key(|entry| Reverse(OrderedFloat(entry.fitness)));
        let parent_count = config.truncation_size.min(self.entries.len());
        let parents = &self.entries[..parent_count];

        let mut children = Vec::with_capacity(parent_count);
        for pair in parents.chunks_exact(2) {
            if !rng.random_bool(f64::from(config.crossover_prob)) {
                continue;
            }
            let point = rng.random_range(0..pair[0].genome.len());
            let (mut left, mut right) = pair[0].genome.crossover(&pair[1].genome, point);
            left.mutate(rng, config.mutation_prob, config.codon_bits);
            right.mutate(rng, config.mutation_prob, config.codon_bits);
            children.push(GenomeEntry::new(left, grammar, config)?);
            children.push(GenomeEntry::new(right, grammar, config)?);
        }

        match config.cull_metric {
            CullMetric::Diversity => children
                .sort_by_cached_key(|entry| Reverse(OrderedFloat(fitness::diversity(&entry.tree)))),
            CullMetric::Fitness => {
                children.sort_by_key(|entry| Reverse(OrderedFloat(entry.fitness)));
            }
            CullMetric::Arrival => {}
        }
        children.truncate(config.storage_threshold);

        let outcome = RoundOutcome {
            parents: parent_count,
            children: children.len(),
        };
        self.entries = children;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn entry(codons: &[u8], grammar: &Grammar, config: &EvolutionConfig) -> GenomeEntry {
        let genome = Genome::new(codons.to_vec()).expect("non-empty genome");
        GenomeEntry::new(genome, grammar, config).expect("entry")
    }

    fn random_pool(
        seed: u64,
        size: usize,
        grammar: &Grammar,
        config: &EvolutionConfig,
    ) -> GenomePool {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut pool = GenomePool::new();
        for _ in 0..size {
            let genome = Genome::random(&mut rng, config.genome_size, config.codon_init_max)
                .expect("genome");
            pool.push(GenomeEntry::new(genome, grammar, config).expect("entry"));
        }
        pool
    }

    #[test]
    fn entries_cache_the_structural_fitness() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig::default();
        let entry = entry(&[3; 10], &grammar, &config);
        assert!((entry.fitness() - 5.0 / 33.0).abs() < 1e-6);
        assert_eq!(entry.tree().distinct_names().len(), 7);
    }

    #[test]
    fn best_prefers_the_earliest_entry_on_ties() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig::default();
        let mut pool = GenomePool::new();
        // Same selections, so the same tree and fitness, but distinct genomes.
        pool.push(entry(&[3; 20], &grammar, &config));
        pool.push(entry(&[3; 10], &grammar, &config));
        let best = pool.best().expect("non-empty pool");
        assert_eq!(best.genome().len(), 20);
    }

    #[test]
    fn saturation_is_strictly_above_the_threshold() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig::default();
        let mut pool = GenomePool::new();
        for _ in 0..config.storage_threshold {
            pool.push(entry(&[3; 10], &grammar, &config));
        }
        assert!(!pool.is_saturated(config.storage_threshold));
        pool.push(entry(&[3; 10], &grammar, &config));
        assert!(pool.is_saturated(config.storage_threshold));
    }

    #[test]
    fn rounds_cull_the_pool_to_the_threshold() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig {
            crossover_prob: 1.0,
            ..EvolutionConfig::default()
        };
        for seed in [1u64, 2, 3] {
            let mut pool = random_pool(seed, 12, &grammar, &config);
            let mut rng = SmallRng::seed_from_u64(seed ^ 0xFFFF);
            let outcome = pool.evolve(&mut rng, &grammar, &config).expect("round");
            assert!(pool.len() <= config.storage_threshold);
            assert_eq!(outcome.parents, config.truncation_size);
            assert_eq!(outcome.children, pool.len());
        }
    }

    #[test]
    fn zero_crossover_probability_leaves_an_empty_pool() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig {
            crossover_prob: 0.0,
            ..EvolutionConfig::default()
        };
        let mut pool = random_pool(9, 10, &grammar, &config);
        let mut rng = SmallRng::seed_from_u64(9);
        let outcome = pool.evolve(&mut rng, &grammar, &config).expect("round");
        assert!(pool.is_empty());
        assert_eq!(outcome.children, 0);
    }

    #[test]
    fn identical_parents_cross_into_identical_children() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig {
            crossover_prob: 1.0,
            mutation_prob: 0.0,
            truncation_size: 2,
            ..EvolutionConfig::default()
        };
        let mut pool = GenomePool::new();
        pool.push(entry(&[7; 10], &grammar, &config));
        pool.push(entry(&[7; 10], &grammar, &config));
        let mut rng = SmallRng::seed_from_u64(4);
        pool.evolve(&mut rng, &grammar, &config).expect("round");
        assert_eq!(pool.len(), 2);
        for child in pool.entries() {
            assert_eq!(child.genome().codons(), &[7; 10]);
        }
    }

    #[test]
    fn rounds_are_deterministic_under_a_seed() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig::default();
        let mut first = random_pool(21, 11, &grammar, &config);
        let mut second = first.clone();
        first
            .evolve(&mut SmallRng::seed_from_u64(5), &grammar, &config)
            .expect("round");
        second
            .evolve(&mut SmallRng::seed_from_u64(5), &grammar, &config)
            .expect("round");

        let codons = |pool: &GenomePool| {
            pool.entries()
                .iter()
                .map(|entry| entry.genome().codons().to_vec())
                .collect::<Vec<_>>()
        };
        assert_eq!(codons(&first), codons(&second));
    }

    #[test]
    fn diversity_culling_orders_children_by_diversity() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig {
            crossover_prob: 1.0,
            ..EvolutionConfig::default()
        };
        let mut pool = random_pool(33, 14, &grammar, &config);
        let mut rng = SmallRng::seed_from_u64(33);
        pool.evolve(&mut rng, &grammar, &config).expect("round");
        assert!(!pool.is_empty());
        let ranks: Vec<f32> = pool
            .entries()
            .iter()
            .map(|entry| fitness::diversity(entry.tree()))
            .collect();
        assert!(ranks.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn fitness_culling_orders_children_by_fitness() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig {
            crossover_prob: 1.0,
            cull_metric: CullMetric::Fitness,
            ..EvolutionConfig::default()
        };
        let mut pool = random_pool(8, 14, &grammar, &config);
        let mut rng = SmallRng::seed_from_u64(8);
        pool.evolve(&mut rng, &grammar, &config).expect("round");
        assert!(!pool.is_empty());
        let ranks: Vec<f32> = pool
            .entries()
            .iter()
            .map(GenomeEntry::fitness)
            .collect();
        assert!(ranks.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn truncation_clamps_to_small_pools() {
        let grammar = Grammar::standard();
        let config = EvolutionConfig {
            crossover_prob: 1.0,
            ..EvolutionConfig::default()
        };
        let mut pool = random_pool(2, 3, &grammar, &config);
        let mut rng = SmallRng::seed_from_u64(2);
        let outcome = pool.evolve(&mut rng, &grammar, &config).expect("round");
        assert_eq!(outcome.parents, 3);
        // One pair crosses, the odd parent contributes nothing.
        assert_eq!(outcome.children, 2);
    }
}
