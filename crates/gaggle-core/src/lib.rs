//! Swarm world, agents, and the evolutionary stepping pipeline.
//!
//! A [`World`] owns a bounded plane with one hub, one or more foraging
//! sites, and scatterings of food and debris. Each agent carries a decoded
//! behaviour tree that is ticked once per step through an explicit motor
//! context, and a private genome pool evolved by local exchange. Everything
//! random flows through one seeded `SmallRng`, so equal seeds replay equal
//! runs.

use gaggle_behavior::{Actor, Target};
use gaggle_genetics::{GenomeEntry, GenomePool, GeneticsError, Grammar};
use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};
use std::f32::consts::TAU;
use std::fmt;
use thiserror::Error;

pub use gaggle_behavior::{Landmark, Resource};
pub use gaggle_genetics::{CullMetric, EvolutionConfig, Genome};

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// Convenience alias for associating side data with agents.
pub type AgentMap<T> = SecondaryMap<AgentId, T>;

/// A point on the simulation plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// One `step` along the unit vector toward `target`, snapping onto it
    /// when already within reach.
    #[must_use]
    fn step_towards(self, target: Self, step: f32) -> Self {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance <= step {
            return target;
        }
        Self {
            x: self.x + step * dx / distance,
            y: self.y + step * dy / distance,
        }
    }

    /// One `step` along the unit vector away from `target`, clamped to the
    /// plane. Standing exactly on the target leaves no direction to flee.
    #[must_use]
    fn step_away(self, target: Self, step: f32, extent: f32) -> Self {
        let dx = self.x - target.x;
        let dy = self.y - target.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance <= f32::EPSILON {
            return self;
        }
        Self {
            x: self.x + step * dx / distance,
            y: self.y + step * dy / distance,
        }
        .clamped(extent)
    }

    #[must_use]
    fn clamped(self, extent: f32) -> Self {
        Self {
            x: self.x.clamp(-extent, extent),
            y: self.y.clamp(-extent, extent),
        }
    }
}

/// The central nest landmark.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hub {
    pub position: Position,
    pub radius: f32,
}

/// A foraging site landmark.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub position: Position,
    pub radius: f32,
}

/// A carriable world item.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub resource: Resource,
    pub position: Position,
    /// Claimed items are carried and excluded from nearest-object queries.
    pub claimed: bool,
}

/// An outstanding claim tying a carried item to its carrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Index into the world's item table.
    pub item: usize,
    pub resource: Resource,
}

/// Physical state of one agent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentBody {
    pub position: Position,
    pub claim: Option<Claim>,
}

/// Per-agent scratch state refreshed by sensing and consumed during the
/// same step's tick. Nearest references are recomputed every step and
/// never stale across steps; the visited/avoided flags are step-scoped.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Blackboard {
    /// Index of the nearest unclaimed food item, if any.
    pub nearest_food: Option<usize>,
    /// Index of the nearest unclaimed debris item, if any.
    pub nearest_debris: Option<usize>,
    /// Whether the agent stands within the hub radius.
    pub hub_in_range: bool,
    /// Index of the nearest site whose radius covers the agent, if any.
    pub site_in_range: Option<usize>,
    pub visited_hub: bool,
    pub visited_site: bool,
    pub avoided_hub: bool,
    pub avoided_site: bool,
}

/// Evolutionary state of one agent.
#[derive(Clone, Debug)]
pub struct AgentMind {
    pub blackboard: Blackboard,
    /// The genome whose tree is ticked each step.
    pub active: GenomeEntry,
    pub pool: GenomePool,
    /// Template-seeded testing populations set this false to freeze the
    /// population: no exchange, no rounds, no adoption.
    pub evolving: bool,
}

/// Errors surfaced while building or stepping a world.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Genome or grammar defect.
    #[error(transparent)]
    Genetics(#[from] GeneticsError),
}

/// Static configuration for a gaggle world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Half-width of the square plane; positions live in `[-extent, extent]²`.
    pub world_extent: f32,
    /// Agents spawned at the hub.
    pub agent_count: usize,
    /// Foraging sites placed around the hub.
    pub site_count: usize,
    /// Food items scattered near a randomly chosen site.
    pub food_count: usize,
    /// Debris items scattered around the hub.
    pub debris_count: usize,
    /// Distance from the origin to each site centre.
    pub site_distance: f32,
    pub site_radius: f32,
    pub nest_radius: f32,
    /// Distance from the hub beyond which debris counts as cleared.
    pub debris_boundary: f32,
    /// Half-extent of the food scatter box around its site.
    pub food_scatter: f32,
    /// Half-extent of the debris scatter box around the hub.
    pub debris_scatter: f32,
    /// Movement step length per motor call.
    pub agent_speed: f32,
    /// Radius within which genome exchange reaches neighbours.
    pub exchange_radius: f32,
    /// Per-step probability that an evolving agent broadcasts its genome.
    pub interaction_prob: f32,
    /// Evolution knobs shared by every agent.
    pub evolution: EvolutionConfig,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            world_extent: 100.0,
            agent_count: 100,
            site_count: 1,
            food_count: 100,
            debris_count: 100,
            site_distance: 30.0,
            site_radius: 10.0,
            nest_radius: 10.0,
            debris_boundary: 30.0,
            food_scatter: 2.0,
            debris_scatter: 8.0,
            agent_speed: 2.0,
            exchange_radius: 5.0,
            interaction_prob: 0.85,
            evolution: EvolutionConfig::default(),
            rng_seed: None,
        }
    }
}

impl SwarmConfig {
    /// Reject configurations a world cannot be built from.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.world_extent <= 0.0 {
            return Err(WorldError::InvalidConfig("world_extent must be positive"));
        }
        if self.site_count == 0 {
            return Err(WorldError::InvalidConfig("site_count must be at least 1"));
        }
        if self.site_distance <= 0.0 {
            return Err(WorldError::InvalidConfig("site_distance must be positive"));
        }
        if self.site_radius <= 0.0 || self.nest_radius <= 0.0 {
            return Err(WorldError::InvalidConfig("landmark radii must be positive"));
        }
        if self.debris_boundary <= 0.0 {
            return Err(WorldError::InvalidConfig("debris_boundary must be positive"));
        }
        if self.food_scatter < 0.0 || self.debris_scatter < 0.0 {
            return Err(WorldError::InvalidConfig("scatter extents must be non-negative"));
        }
        if self.agent_speed <= 0.0 {
            return Err(WorldError::InvalidConfig("agent_speed must be positive"));
        }
        if self.exchange_radius <= 0.0 {
            return Err(WorldError::InvalidConfig("exchange_radius must be positive"));
        }
        if !(0.0..=1.0).contains(&self.interaction_prob) {
            return Err(WorldError::InvalidConfig("interaction_prob must be in [0, 1]"));
        }
        self.evolution.validate()?;
        Ok(())
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Events of one simulation step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Tick just completed.
    pub tick: u64,
    /// Genome copies delivered to neighbour pools.
    pub exchanges: usize,
    /// Evolutionary rounds run.
    pub rounds: usize,
    /// Agents that adopted a pool genome.
    pub adoptions: usize,
}

/// Nearest-object view computed per agent during sensing.
#[derive(Clone, Copy)]
struct SensedView {
    nearest_food: Option<usize>,
    nearest_debris: Option<usize>,
    hub_in_range: bool,
    site_in_range: Option<usize>,
}

/// The simulation world: geometry, items, agents, and one RNG.
pub struct World {
    config: SwarmConfig,
    grammar: Grammar,
    tick: u64,
    rng: SmallRng,
    bodies: SlotMap<AgentId, AgentBody>,
    minds: AgentMap<AgentMind>,
    hub: Hub,
    sites: Vec<Site>,
    items: Vec<Item>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("agents", &self.bodies.len())
            .field("sites", &self.sites.len())
            .field("items", &self.items.len())
            .finish()
    }
}

impl World {
    /// Build a world with a freshly randomized genome per agent.
    pub fn new(config: SwarmConfig) -> Result<Self, WorldError> {
        Self::build(config, None)
    }

    /// Build a world whose whole population starts from `template` with
    /// evolution frozen; the testing phase of an experiment.
    pub fn from_template(config: SwarmConfig, template: Genome) -> Result<Self, WorldError> {
        Self::build(config, Some(template))
    }

    fn build(config: SwarmConfig, template: Option<Genome>) -> Result<Self, WorldError> {
        config.validate()?;
        let grammar = Grammar::standard();
        grammar.validate()?;
        let mut rng = config.seeded_rng();

        let hub = Hub {
            position: Position::ORIGIN,
            radius: config.nest_radius,
        };
        let sites: Vec<Site> = (0..config.site_count)
            .map(|_| {
                let angle = rng.random_range(0.0..TAU);
                Site {
                    position: Position::new(
                        config.site_distance * angle.cos(),
                        config.site_distance * angle.sin(),
                    ),
                    radius: config.site_radius,
                }
            })
            .collect();

        let mut items = Vec::with_capacity(config.food_count + config.debris_count);
        let food_site = sites[rng.random_range(0..sites.len())].position;
        for _ in 0..config.food_count {
            let position = Position::new(
                food_site.x + rng.random_range(-config.food_scatter..=config.food_scatter),
                food_site.y + rng.random_range(-config.food_scatter..=config.food_scatter),
            );
            items.push(Item {
                resource: Resource::Food,
                position,
                claimed: false,
            });
        }
        for _ in 0..config.debris_count {
            let position = Position::new(
                hub.position.x + rng.random_range(-config.debris_scatter..=config.debris_scatter),
                hub.position.y + rng.random_range(-config.debris_scatter..=config.debris_scatter),
            );
            items.push(Item {
                resource: Resource::Debris,
                position,
                claimed: false,
            });
        }

        let mut bodies = SlotMap::with_key();
        let mut minds = AgentMap::new();
        for _ in 0..config.agent_count {
            let genome = match &template {
                Some(template) => template.clone(),
                None => Genome::random(
                    &mut rng,
                    config.evolution.genome_size,
                    config.evolution.codon_init_max,
                )?,
            };
            let active = GenomeEntry::new(genome, &grammar, &config.evolution)?;
            let id = bodies.insert(AgentBody {
                position: hub.position,
                claim: None,
            });
            minds.insert(
                id,
                AgentMind {
                    blackboard: Blackboard::default(),
                    active,
                    pool: GenomePool::new(),
                    evolving: template.is_none(),
                },
            );
        }

        Ok(Self {
            config,
            grammar,
            tick: 0,
            rng,
            bodies,
            minds,
            hub,
            sites,
            items,
        })
    }

    /// Advance one tick through sense, act, and update phases.
    pub fn step(&mut self) -> Result<StepReport, WorldError> {
        self.tick += 1;
        let mut report = StepReport {
            tick: self.tick,
            ..StepReport::default()
        };
        self.stage_sense(&mut report)?;
        self.stage_act(&mut report)?;
        self.stage_update(&mut report)?;
        Ok(report)
    }

    /// Refresh every agent's nearest-object view, then run genome exchange
    /// over agents in shuffled order.
    fn stage_sense(&mut self, report: &mut StepReport) -> Result<(), WorldError> {
        self.refresh_blackboards();
        self.run_exchange(report)
    }

    /// Nearest-object sensing is a pure function of world state per agent,
    /// so it is computed in parallel over a position snapshot and written
    /// back serially. No randomness is consumed here.
    fn refresh_blackboards(&mut self) {
        let handles: Vec<AgentId> = self.bodies.keys().collect();
        if handles.is_empty() {
            return;
        }
        let positions: Vec<Position> = handles.iter().map(|&id| self.bodies[id].position).collect();
        let items = &self.items;
        let sites = &self.sites;
        let hub = self.hub;

        let views: Vec<SensedView> = positions
            .par_iter()
            .map(|&position| SensedView {
                nearest_food: nearest_item(items, Resource::Food, position),
                nearest_debris: nearest_item(items, Resource::Debris, position),
                hub_in_range: position.distance(hub.position) <= hub.radius,
                site_in_range: nearest_site_in_range(sites, position),
            })
            .collect();

        for (idx, id) in handles.iter().enumerate() {
            if let Some(mind) = self.minds.get_mut(*id) {
                let view = views[idx];
                mind.blackboard.nearest_food = view.nearest_food;
                mind.blackboard.nearest_debris = view.nearest_debris;
                mind.blackboard.hub_in_range = view.hub_in_range;
                mind.blackboard.site_in_range = view.site_in_range;
            }
        }
    }

    /// One participation draw per evolving agent; on success its active
    /// genome is copied to every evolving neighbour within the exchange
    /// radius, decoded fresh by each receiver. Copies land immediately, so
    /// they are visible to this step's evolutionary rounds.
    fn run_exchange(&mut self, report: &mut StepReport) -> Result<(), WorldError> {
        let mut order: Vec<AgentId> = self.bodies.keys().collect();
        order.shuffle(&mut self.rng);

        for sender in order {
            let Some(mind) = self.minds.get(sender) else {
                continue;
            };
            if !mind.evolving {
                continue;
            }
            if !self.rng.random_bool(f64::from(self.config.interaction_prob)) {
                continue;
            }
            let genome = self.minds[sender].active.genome().clone();
            let Some(sender_position) = self.bodies.get(sender).map(|body| body.position) else {
                continue;
            };
            let receivers: Vec<AgentId> = self
                .bodies
                .iter()
                .filter(|(other, body)| {
                    *other != sender
                        && body.position.distance(sender_position) <= self.config.exchange_radius
                        && self.minds.get(*other).is_some_and(|mind| mind.evolving)
                })
                .map(|(other, _)| other)
                .collect();
            for receiver in receivers {
                let entry =
                    GenomeEntry::new(genome.clone(), &self.grammar, &self.config.evolution)?;
                if let Some(receiver_mind) = self.minds.get_mut(receiver) {
                    receiver_mind.pool.push(entry);
                    report.exchanges += 1;
                }
            }
        }
        Ok(())
    }

    /// Tick every agent's tree in shuffled order, running an evolutionary
    /// round wherever a pool has saturated.
    fn stage_act(&mut self, report: &mut StepReport) -> Result<(), WorldError> {
        let mut order: Vec<AgentId> = self.bodies.keys().collect();
        order.shuffle(&mut self.rng);

        for id in order {
            self.act_one(id, report)?;
        }
        Ok(())
    }

    fn act_one(&mut self, id: AgentId, report: &mut StepReport) -> Result<(), WorldError> {
        let tree = {
            let Some(mind) = self.minds.get_mut(id) else {
                return Ok(());
            };
            mind.blackboard.visited_hub = false;
            mind.blackboard.visited_site = false;
            mind.blackboard.avoided_hub = false;
            mind.blackboard.avoided_site = false;
            mind.active.tree_handle()
        };

        self.sync_carried_item(id);
        self.refresh_visited(id);
        {
            let Some(body) = self.bodies.get_mut(id) else {
                return Ok(());
            };
            let Some(mind) = self.minds.get_mut(id) else {
                return Ok(());
            };
            let mut context = MotorContext {
                config: &self.config,
                hub: &self.hub,
                sites: &self.sites,
                items: &mut self.items,
                rng: &mut self.rng,
                body,
                blackboard: &mut mind.blackboard,
            };
            tree.tick(&mut context);
        }
        self.refresh_visited(id);
        self.sync_carried_item(id);

        let due = self.minds.get(id).is_some_and(|mind| {
            mind.evolving
                && mind
                    .pool
                    .is_saturated(self.config.evolution.storage_threshold)
        });
        if due {
            if let Some(mind) = self.minds.get_mut(id) {
                mind.pool
                    .evolve(&mut self.rng, &self.grammar, &self.config.evolution)?;
                report.rounds += 1;
            }
        }
        Ok(())
    }

    /// Adopt the pool's best genome wherever it strictly beats the active
    /// one, in shuffled order.
    fn stage_update(&mut self, report: &mut StepReport) -> Result<(), WorldError> {
        let mut order: Vec<AgentId> = self.bodies.keys().collect();
        order.shuffle(&mut self.rng);

        for id in order {
            let candidate = {
                let Some(mind) = self.minds.get(id) else {
                    continue;
                };
                if !mind.evolving {
                    continue;
                }
                match mind.pool.best() {
                    Some(best) if best.fitness() > mind.active.fitness() => {
                        Some(best.genome().clone())
                    }
                    _ => None,
                }
            };
            let Some(genome) = candidate else {
                continue;
            };
            let entry = GenomeEntry::new(genome, &self.grammar, &self.config.evolution)?;
            if let Some(mind) = self.minds.get_mut(id) {
                mind.active = entry;
                report.adoptions += 1;
            }
        }
        Ok(())
    }

    /// A claimed item's position follows its carrier.
    fn sync_carried_item(&mut self, id: AgentId) {
        let Some(body) = self.bodies.get(id) else {
            return;
        };
        if let Some(claim) = body.claim {
            let position = body.position;
            if let Some(item) = self.items.get_mut(claim.item) {
                item.position = position;
            }
        }
    }

    /// Mark landmarks whose radius currently covers the agent.
    fn refresh_visited(&mut self, id: AgentId) {
        let Some(body) = self.bodies.get(id) else {
            return;
        };
        let position = body.position;
        let hub_in = position.distance(self.hub.position) <= self.hub.radius;
        let site_in = self
            .sites
            .iter()
            .any(|site| position.distance(site.position) <= site.radius);
        if let Some(mind) = self.minds.get_mut(id) {
            mind.blackboard.visited_hub |= hub_in;
            mind.blackboard.visited_site |= site_in;
        }
    }

    #[must_use]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.bodies.len()
    }

    #[must_use]
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.bodies.keys().collect()
    }

    #[must_use]
    pub fn body(&self, id: AgentId) -> Option<&AgentBody> {
        self.bodies.get(id)
    }

    #[must_use]
    pub fn body_mut(&mut self, id: AgentId) -> Option<&mut AgentBody> {
        self.bodies.get_mut(id)
    }

    #[must_use]
    pub fn mind(&self, id: AgentId) -> Option<&AgentMind> {
        self.minds.get(id)
    }

    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    #[must_use]
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// The population's best active genome by cached fitness, with its
    /// fitness; the earliest agent wins ties.
    #[must_use]
    pub fn best_genome(&self) -> Option<(Genome, f32)> {
        self.minds
            .values()
            .map(|mind| &mind.active)
            .reduce(|best, entry| {
                if entry.fitness() > best.fitness() {
                    entry
                } else {
                    best
                }
            })
            .map(|entry| (entry.genome().clone(), entry.fitness()))
    }

    /// Mean cached fitness of the active genomes.
    #[must_use]
    pub fn mean_active_fitness(&self) -> f32 {
        if self.minds.is_empty() {
            return 0.0;
        }
        let total: f32 = self.minds.values().map(|mind| mind.active.fitness()).sum();
        total / self.minds.len() as f32
    }

    /// Fraction of food lying within the hub radius.
    #[must_use]
    pub fn food_at_hub_fraction(&self) -> f32 {
        let mut total = 0usize;
        let mut at_hub = 0usize;
        for item in self.items.iter().filter(|item| item.resource == Resource::Food) {
            total += 1;
            if item.position.distance(self.hub.position) <= self.hub.radius {
                at_hub += 1;
            }
        }
        if total == 0 {
            0.0
        } else {
            at_hub as f32 / total as f32
        }
    }

    /// Fraction of debris lying beyond the debris boundary.
    #[must_use]
    pub fn debris_cleared_fraction(&self) -> f32 {
        let mut total = 0usize;
        let mut cleared = 0usize;
        for item in self
            .items
            .iter()
            .filter(|item| item.resource == Resource::Debris)
        {
            total += 1;
            if item.position.distance(self.hub.position) > self.config.debris_boundary {
                cleared += 1;
            }
        }
        if total == 0 {
            0.0
        } else {
            cleared as f32 / total as f32
        }
    }
}

/// Index of the nearest unclaimed item of `resource`, ties broken by
/// iteration order.
fn nearest_item(items: &[Item], resource: Resource, from: Position) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.resource == resource && !item.claimed)
        .min_by_key(|(_, item)| OrderedFloat(from.distance(item.position)))
        .map(|(index, _)| index)
}

/// Index of the nearest site whose radius covers `from`, if any.
fn nearest_site_in_range(sites: &[Site], from: Position) -> Option<usize> {
    sites
        .iter()
        .enumerate()
        .filter(|(_, site)| from.distance(site.position) <= site.radius)
        .min_by_key(|(_, site)| OrderedFloat(from.distance(site.position)))
        .map(|(index, _)| index)
}

/// Mutable evaluation context handed to a tree for one tick. Borrows the
/// world's disjoint pieces so conditions read the blackboard while motor
/// calls move the body and claim items.
struct MotorContext<'w> {
    config: &'w SwarmConfig,
    hub: &'w Hub,
    sites: &'w [Site],
    items: &'w mut Vec<Item>,
    rng: &'w mut SmallRng,
    body: &'w mut AgentBody,
    blackboard: &'w mut Blackboard,
}

impl MotorContext<'_> {
    fn nearest_ref(&self, resource: Resource) -> Option<usize> {
        match resource {
            Resource::Food => self.blackboard.nearest_food,
            Resource::Debris => self.blackboard.nearest_debris,
        }
    }

    /// The hub, or the nearest site when several exist.
    fn landmark_position(&self, landmark: Landmark) -> Option<Position> {
        match landmark {
            Landmark::Hub => Some(self.hub.position),
            Landmark::Site => self
                .sites
                .iter()
                .min_by_key(|site| OrderedFloat(self.body.position.distance(site.position)))
                .map(|site| site.position),
        }
    }
}

impl Actor for MotorContext<'_> {
    fn is_carrying(&self, resource: Resource) -> bool {
        self.body
            .claim
            .is_some_and(|claim| claim.resource == resource)
    }

    fn is_carryable(&self, resource: Resource) -> bool {
        self.body.claim.is_none() && self.nearest_ref(resource).is_some()
    }

    fn is_droppable(&self, landmark: Landmark) -> bool {
        match landmark {
            Landmark::Hub => self.blackboard.hub_in_range,
            Landmark::Site => self.blackboard.site_in_range.is_some(),
        }
    }

    fn neighbour_known(&self, target: Target) -> bool {
        match target {
            Target::Food => self.blackboard.nearest_food.is_some(),
            Target::Debris => self.blackboard.nearest_debris.is_some(),
            Target::Hub => self.blackboard.hub_in_range,
            Target::Site => self.blackboard.site_in_range.is_some(),
        }
    }

    fn visited_before(&self, landmark: Landmark) -> bool {
        match landmark {
            Landmark::Hub => self.blackboard.visited_hub,
            Landmark::Site => self.blackboard.visited_site,
        }
    }

    fn did_avoid(&self, landmark: Landmark) -> bool {
        match landmark {
            Landmark::Hub => self.blackboard.avoided_hub,
            Landmark::Site => self.blackboard.avoided_site,
        }
    }

    fn can_move(&self) -> bool {
        self.config.agent_speed > 0.0
    }

    /// Claim the sensed item if it is still unclaimed and within one
    /// movement step; the agent snaps onto it. A reference gone stale since
    /// sensing fails here rather than erroring.
    fn pick_up(&mut self, resource: Resource) -> bool {
        if self.body.claim.is_some() {
            return false;
        }
        let Some(index) = self.nearest_ref(resource) else {
            return false;
        };
        let Some(item) = self.items.get_mut(index) else {
            return false;
        };
        if item.claimed || item.resource != resource {
            return false;
        }
        if self.body.position.distance(item.position) > self.config.agent_speed {
            return false;
        }
        item.claimed = true;
        self.body.position = item.position;
        self.body.claim = Some(Claim { item: index, resource });
        true
    }

    fn drop_off(&mut self, resource: Resource) -> bool {
        let Some(claim) = self.body.claim else {
            return false;
        };
        if claim.resource != resource {
            return false;
        }
        if let Some(item) = self.items.get_mut(claim.item) {
            item.claimed = false;
            item.position = self.body.position;
        }
        self.body.claim = None;
        true
    }

    fn explore(&mut self) {
        let angle = self.rng.random_range(0.0..TAU);
        let step = self.config.agent_speed;
        let next = Position::new(
            self.body.position.x + step * angle.cos(),
            self.body.position.y + step * angle.sin(),
        );
        self.body.position = next.clamped(self.config.world_extent);
    }

    fn move_towards(&mut self, landmark: Landmark) {
        if let Some(target) = self.landmark_position(landmark) {
            self.body.position = self
                .body
                .position
                .step_towards(target, self.config.agent_speed);
        }
    }

    fn move_away(&mut self, landmark: Landmark) {
        if let Some(target) = self.landmark_position(landmark) {
            self.body.position = self.body.position.step_away(
                target,
                self.config.agent_speed,
                self.config.world_extent,
            );
        }
        match landmark {
            Landmark::Hub => self.blackboard.avoided_hub = true,
            Landmark::Site => self.blackboard.avoided_site = true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SwarmConfig {
        SwarmConfig {
            agent_count: 4,
            food_count: 6,
            debris_count: 6,
            rng_seed: Some(0xDEADBEEF),
            ..SwarmConfig::default()
        }
    }

    fn context_for(world: &mut World, id: AgentId) -> MotorContext<'_> {
        let body = world.bodies.get_mut(id).expect("body");
        let mind = world.minds.get_mut(id).expect("mind");
        MotorContext {
            config: &world.config,
            hub: &world.hub,
            sites: &world.sites,
            items: &mut world.items,
            rng: &mut world.rng,
            body,
            blackboard: &mut mind.blackboard,
        }
    }

    #[test]
    fn default_config_validates() {
        assert_eq!(SwarmConfig::default().validate(), Ok(()));
    }

    #[test]
    fn config_rejects_each_defect_class() {
        let cases = [
            SwarmConfig {
                world_extent: 0.0,
                ..SwarmConfig::default()
            },
            SwarmConfig {
                site_count: 0,
                ..SwarmConfig::default()
            },
            SwarmConfig {
                agent_speed: 0.0,
                ..SwarmConfig::default()
            },
            SwarmConfig {
                exchange_radius: 0.0,
                ..SwarmConfig::default()
            },
            SwarmConfig {
                interaction_prob: 1.5,
                ..SwarmConfig::default()
            },
            SwarmConfig {
                nest_radius: -1.0,
                ..SwarmConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(WorldError::InvalidConfig(_))),
                "expected rejection for {config:?}"
            );
        }

        let bad_evolution = SwarmConfig {
            evolution: EvolutionConfig {
                genome_size: 0,
                ..EvolutionConfig::default()
            },
            ..SwarmConfig::default()
        };
        assert!(matches!(
            bad_evolution.validate(),
            Err(WorldError::Genetics(_))
        ));
    }

    #[test]
    fn worlds_spawn_the_configured_population() {
        let config = small_config();
        let world = World::new(config.clone()).expect("world");

        assert_eq!(world.agent_count(), config.agent_count);
        assert_eq!(world.items().len(), config.food_count + config.debris_count);
        assert_eq!(world.sites().len(), config.site_count);
        for id in world.agent_ids() {
            let body = world.body(id).expect("body");
            assert_eq!(body.position, Position::ORIGIN);
            assert!(body.claim.is_none());
            assert!(world.mind(id).expect("mind").evolving);
        }
        for site in world.sites() {
            let radial = site.position.distance(Position::ORIGIN);
            assert!((radial - config.site_distance).abs() < 1e-3);
        }
        for item in world.items() {
            match item.resource {
                Resource::Food => {
                    let site = world.sites()[0].position;
                    assert!((item.position.x - site.x).abs() <= config.food_scatter + 1e-3);
                    assert!((item.position.y - site.y).abs() <= config.food_scatter + 1e-3);
                }
                Resource::Debris => {
                    assert!(item.position.x.abs() <= config.debris_scatter + 1e-3);
                    assert!(item.position.y.abs() <= config.debris_scatter + 1e-3);
                }
            }
        }
    }

    #[test]
    fn template_worlds_freeze_the_population() {
        let template = Genome::new(vec![3; 10]).expect("genome");
        let world = World::from_template(small_config(), template.clone()).expect("world");
        for id in world.agent_ids() {
            let mind = world.mind(id).expect("mind");
            assert!(!mind.evolving);
            assert_eq!(mind.active.genome(), &template);
        }
    }

    #[test]
    fn step_towards_snaps_within_reach() {
        let from = Position::new(0.0, 0.0);
        assert_eq!(from.step_towards(Position::new(1.0, 0.0), 2.0), Position::new(1.0, 0.0));
        let far = from.step_towards(Position::new(10.0, 0.0), 2.0);
        assert!((far.x - 2.0).abs() < 1e-6);
        assert!(far.y.abs() < 1e-6);
    }

    #[test]
    fn pickup_claims_snaps_and_blocks_double_carry() {
        let mut world = World::new(small_config()).expect("world");
        let id = world.agent_ids()[0];
        let target = world
            .items
            .iter()
            .position(|item| item.resource == Resource::Food)
            .expect("food item");
        world.items[target].position = Position::new(50.0, 50.0);
        world.bodies[id].position = Position::new(49.0, 50.0);
        world.refresh_blackboards();

        let mut context = context_for(&mut world, id);
        assert!(context.is_carryable(Resource::Food));
        assert!(context.pick_up(Resource::Food));
        assert!(context.is_carrying(Resource::Food));
        assert!(!context.pick_up(Resource::Food), "hands already full");
        assert!(!context.is_carryable(Resource::Food));

        assert_eq!(world.bodies[id].position, Position::new(50.0, 50.0));
        assert!(world.items[target].claimed);
        assert_eq!(
            world.bodies[id].claim,
            Some(Claim {
                item: target,
                resource: Resource::Food
            })
        );
    }

    #[test]
    fn pickup_fails_out_of_reach_or_stale() {
        let mut world = World::new(small_config()).expect("world");
        let id = world.agent_ids()[0];
        let target = world
            .items
            .iter()
            .position(|item| item.resource == Resource::Food)
            .expect("food item");
        world.items[target].position = Position::new(50.0, 50.0);
        world.bodies[id].position = Position::new(40.0, 50.0);
        world.refresh_blackboards();

        let mut context = context_for(&mut world, id);
        assert!(!context.pick_up(Resource::Food), "ten units exceeds one step");

        // Another agent claims the item between sensing and acting.
        world.bodies[id].position = Position::new(49.0, 50.0);
        world.refresh_blackboards();
        world.items[target].claimed = true;
        let mut context = context_for(&mut world, id);
        assert!(!context.pick_up(Resource::Food), "stale reference must fail");
    }

    #[test]
    fn drop_releases_at_the_current_position() {
        let mut world = World::new(small_config()).expect("world");
        let id = world.agent_ids()[0];
        let target = world
            .items
            .iter()
            .position(|item| item.resource == Resource::Debris)
            .expect("debris item");
        world.items[target].position = Position::new(50.0, 50.0);
        world.bodies[id].position = Position::new(50.0, 49.0);
        world.refresh_blackboards();

        let mut context = context_for(&mut world, id);
        assert!(context.pick_up(Resource::Debris));
        assert!(!context.drop_off(Resource::Food), "wrong kind");
        context.body.position = Position::new(60.0, 60.0);
        assert!(context.drop_off(Resource::Debris));
        assert!(!context.drop_off(Resource::Debris), "nothing left to drop");

        assert!(!world.items[target].claimed);
        assert_eq!(world.items[target].position, Position::new(60.0, 60.0));
        assert!(world.bodies[id].claim.is_none());
    }

    #[test]
    fn explore_stays_inside_the_plane() {
        let config = SwarmConfig {
            world_extent: 5.0,
            site_distance: 3.0,
            site_radius: 1.0,
            nest_radius: 1.0,
            debris_boundary: 2.0,
            debris_scatter: 1.0,
            food_scatter: 0.5,
            ..small_config()
        };
        let mut world = World::new(config).expect("world");
        let id = world.agent_ids()[0];
        let extent = world.config.world_extent;
        let mut context = context_for(&mut world, id);
        for _ in 0..200 {
            context.explore();
            assert!(context.body.position.x.abs() <= extent);
            assert!(context.body.position.y.abs() <= extent);
        }
    }

    #[test]
    fn move_towards_snaps_onto_the_hub() {
        let mut world = World::new(small_config()).expect("world");
        let id = world.agent_ids()[0];
        world.bodies[id].position = Position::new(1.5, 0.0);
        let mut context = context_for(&mut world, id);
        context.move_towards(Landmark::Hub);
        assert_eq!(context.body.position, Position::ORIGIN);
    }

    #[test]
    fn move_away_recedes_and_flags_avoidance() {
        let mut world = World::new(small_config()).expect("world");
        let id = world.agent_ids()[0];
        world.bodies[id].position = Position::new(1.0, 0.0);
        let mut context = context_for(&mut world, id);
        context.move_away(Landmark::Hub);
        assert_eq!(context.body.position, Position::new(3.0, 0.0));
        assert!(context.blackboard.avoided_hub);
        assert!(context.did_avoid(Landmark::Hub));
        assert!(!context.blackboard.avoided_site);
    }

    #[test]
    fn fleeing_from_atop_the_landmark_stays_put() {
        let mut world = World::new(small_config()).expect("world");
        let id = world.agent_ids()[0];
        world.bodies[id].position = Position::ORIGIN;
        let mut context = context_for(&mut world, id);
        context.move_away(Landmark::Hub);
        assert_eq!(context.body.position, Position::ORIGIN);
        assert!(context.blackboard.avoided_hub);
    }

    #[test]
    fn visited_flags_follow_the_agent() {
        let mut world = World::new(small_config()).expect("world");
        let id = world.agent_ids()[0];
        world.refresh_visited(id);
        assert!(world.minds[id].blackboard.visited_hub, "spawned at the hub");

        world.minds[id].blackboard.visited_hub = false;
        world.bodies[id].position = Position::new(90.0, 90.0);
        world.refresh_visited(id);
        assert!(!world.minds[id].blackboard.visited_hub);
    }

    #[test]
    fn adoption_requires_strictly_better_fitness() {
        let template = Genome::new(vec![3; 10]).expect("genome");
        let mut world =
            World::from_template(small_config(), template.clone()).expect("world");
        let id = world.agent_ids()[0];
        world.minds[id].evolving = true;

        // An equal-fitness candidate must not be adopted.
        let equal = GenomeEntry::new(template.clone(), &world.grammar, &world.config.evolution)
            .expect("entry");
        world.minds[id].pool.push(equal);
        let mut report = StepReport::default();
        world.stage_update(&mut report).expect("update");
        assert_eq!(report.adoptions, 0);
        assert_eq!(world.minds[id].active.genome(), &template);

        // All-zero codons decode to a move-towards tree that scores higher.
        let better = Genome::new(vec![0; 10]).expect("genome");
        let entry = GenomeEntry::new(better.clone(), &world.grammar, &world.config.evolution)
            .expect("entry");
        world.minds[id].pool.push(entry);
        let mut report = StepReport::default();
        world.stage_update(&mut report).expect("update");
        assert_eq!(report.adoptions, 1);
        assert_eq!(world.minds[id].active.genome(), &better);
        assert!(world.minds[id].active.fitness() > 0.5);
    }

    #[test]
    fn metrics_react_to_item_placement() {
        let mut world = World::new(small_config()).expect("world");
        for item in &mut world.items {
            item.position = match item.resource {
                Resource::Food => Position::ORIGIN,
                Resource::Debris => Position::new(50.0, 50.0),
            };
        }
        assert_eq!(world.food_at_hub_fraction(), 1.0);
        assert_eq!(world.debris_cleared_fraction(), 1.0);

        for item in &mut world.items {
            item.position = match item.resource {
                Resource::Food => Position::new(50.0, 50.0),
                Resource::Debris => Position::ORIGIN,
            };
        }
        assert_eq!(world.food_at_hub_fraction(), 0.0);
        assert_eq!(world.debris_cleared_fraction(), 0.0);
    }

    #[test]
    fn nearest_item_breaks_ties_by_iteration_order() {
        let items = [
            Item {
                resource: Resource::Food,
                position: Position::new(1.0, 0.0),
                claimed: false,
            },
            Item {
                resource: Resource::Food,
                position: Position::new(-1.0, 0.0),
                claimed: false,
            },
            Item {
                resource: Resource::Debris,
                position: Position::new(0.5, 0.0),
                claimed: false,
            },
        ];
        assert_eq!(nearest_item(&items, Resource::Food, Position::ORIGIN), Some(0));
        assert_eq!(nearest_item(&items, Resource::Debris, Position::ORIGIN), Some(2));

        let mut claimed = items;
        claimed[0].claimed = true;
        assert_eq!(nearest_item(&claimed, Resource::Food, Position::ORIGIN), Some(1));
        assert_eq!(nearest_item(&[], Resource::Food, Position::ORIGIN), None);
    }
}
