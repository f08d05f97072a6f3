use anyhow::Result;
use gaggle_app::{run_learning_phase, run_testing_phase};
use gaggle_core::SwarmConfig;
use tracing::{info, warn};

fn main() -> Result<()> {
    init_tracing();

    let trials = env_u64("GAGGLE_TRIALS", 3);
    let learning_steps = env_u64("GAGGLE_LEARNING_STEPS", 400);
    let testing_steps = env_u64("GAGGLE_TESTING_STEPS", 100);
    let agents = env_u64("GAGGLE_AGENTS", 100) as usize;
    let base_seed = std::env::var("GAGGLE_SEED")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok());

    info!(
        trials,
        learning_steps, testing_steps, agents, "Starting gaggle experiments"
    );

    for trial in 0..trials {
        let config = SwarmConfig {
            agent_count: agents,
            rng_seed: base_seed.map(|seed| seed.wrapping_add(trial)),
            ..SwarmConfig::default()
        };

        let (learning, best) = run_learning_phase(config.clone(), learning_steps)?;
        info!(
            trial,
            exchanges = learning.exchanges,
            rounds = learning.rounds,
            adoptions = learning.adoptions,
            food_at_hub = learning.food_at_hub,
            debris_cleared = learning.debris_cleared,
            mean_fitness = learning.mean_fitness,
            "Learning phase complete",
        );

        let Some((genome, fitness)) = best else {
            warn!(trial, "Learning phase produced no candidate genome");
            continue;
        };
        info!(trial, fitness, codons = genome.len(), "Best genome selected");

        let testing = run_testing_phase(config, genome, testing_steps)?;
        info!(
            trial,
            food_at_hub = testing.food_at_hub,
            debris_cleared = testing.debris_cleared,
            mean_fitness = testing.mean_fitness,
            "Testing phase complete",
        );
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
