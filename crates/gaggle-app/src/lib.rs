//! Experiment driver: learning phases that evolve a fresh population, and
//! testing phases that replay a chosen genome with evolution frozen.

use anyhow::{Context, Result};
use gaggle_core::{Genome, SwarmConfig, World};

/// Aggregated observations from running one phase to completion.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseOutcome {
    pub steps: u64,
    pub exchanges: usize,
    pub rounds: usize,
    pub adoptions: usize,
    /// Fraction of food inside the hub radius at the end of the phase.
    pub food_at_hub: f32,
    /// Fraction of debris beyond the clearing boundary at the end.
    pub debris_cleared: f32,
    pub mean_fitness: f32,
}

fn run_world(world: &mut World, steps: u64) -> Result<PhaseOutcome> {
    let mut exchanges = 0;
    let mut rounds = 0;
    let mut adoptions = 0;
    for _ in 0..steps {
        let report = world.step().context("world step failed")?;
        exchanges += report.exchanges;
        rounds += report.rounds;
        adoptions += report.adoptions;
    }
    Ok(PhaseOutcome {
        steps,
        exchanges,
        rounds,
        adoptions,
        food_at_hub: world.food_at_hub_fraction(),
        debris_cleared: world.debris_cleared_fraction(),
        mean_fitness: world.mean_active_fitness(),
    })
}

/// Evolve a fresh population for `steps` ticks and hand back the best
/// genome found, if any.
pub fn run_learning_phase(
    config: SwarmConfig,
    steps: u64,
) -> Result<(PhaseOutcome, Option<(Genome, f32)>)> {
    let mut world = World::new(config).context("building learning world")?;
    let outcome = run_world(&mut world, steps)?;
    let best = world.best_genome();
    Ok((outcome, best))
}

/// Replay `template` across a frozen population for `steps` ticks.
pub fn run_testing_phase(
    config: SwarmConfig,
    template: Genome,
    steps: u64,
) -> Result<PhaseOutcome> {
    let mut world = World::from_template(config, template).context("building testing world")?;
    run_world(&mut world, steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> SwarmConfig {
        SwarmConfig {
            agent_count: 6,
            food_count: 8,
            debris_count: 8,
            rng_seed: Some(9),
            ..SwarmConfig::default()
        }
    }

    #[test]
    fn learning_phase_reports_and_selects() {
        let (outcome, best) = run_learning_phase(tiny_config(), 4).expect("learning");
        assert_eq!(outcome.steps, 4);
        assert!((0.0..=1.0).contains(&outcome.food_at_hub));
        assert!((0.0..=1.0).contains(&outcome.debris_cleared));

        let (genome, fitness) = best.expect("candidate genome");
        assert_eq!(genome.len(), tiny_config().evolution.genome_size);
        assert!(fitness >= 0.0);
    }

    #[test]
    fn testing_phase_runs_frozen() {
        let template = Genome::new(vec![3; 10]).expect("genome");
        let outcome = run_testing_phase(tiny_config(), template, 4).expect("testing");
        assert_eq!(outcome.steps, 4);
        assert_eq!(outcome.exchanges, 0);
        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.adoptions, 0);
    }
}
