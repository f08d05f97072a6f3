//! Behaviour-tree building blocks for the gaggle swarm.
//!
//! The crate is deliberately world-agnostic: trees are closed tagged unions
//! of condition/action/composite nodes, and every tick receives an explicit
//! mutable [`Actor`] context supplying the predicates and motor operations.
//! The simulation core implements [`Actor`] over its world state; tests can
//! implement it over scripted stubs.

mod node;
mod ppa;

pub use node::{Action, BehaviorNode, Condition, NODE_VOCABULARY};
pub use ppa::{carry_template, drop_template, ppa};

use serde::{Deserialize, Serialize};

/// Two-valued tick outcome. Actions are instantaneous, so there is no
/// "running" state to report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    /// Flip the outcome, as the inverter decorator does.
    #[must_use]
    pub fn invert(self) -> Self {
        match self {
            Self::Success => Self::Failure,
            Self::Failure => Self::Success,
        }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for Status {
    fn from(outcome: bool) -> Self {
        if outcome { Self::Success } else { Self::Failure }
    }
}

/// Fixed landmarks agents navigate between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Landmark {
    Hub,
    Site,
}

impl Landmark {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Hub => "Hub",
            Self::Site => "Site",
        }
    }
}

/// Carriable item kinds. Food is foraged toward the hub, debris is hauled
/// out of the nest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    Food,
    Debris,
}

impl Resource {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Debris => "Debris",
        }
    }
}

/// Anything a neighbour-sensing condition can refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Food,
    Debris,
    Hub,
    Site,
}

impl Target {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Debris => "Debris",
            Self::Hub => "Hub",
            Self::Site => "Site",
        }
    }
}

impl From<Landmark> for Target {
    fn from(landmark: Landmark) -> Self {
        match landmark {
            Landmark::Hub => Self::Hub,
            Landmark::Site => Self::Site,
        }
    }
}

impl From<Resource> for Target {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Food => Self::Food,
            Resource::Debris => Self::Debris,
        }
    }
}

/// Evaluation context handed to every node during a tick.
///
/// Predicate methods take `&self` and must not mutate observable state;
/// motor methods take `&mut self` and perform at most one world-visible
/// effect per call. Implementations decide what "known" or "droppable"
/// mean; the tree only composes the answers.
pub trait Actor {
    fn is_carrying(&self, resource: Resource) -> bool;
    fn is_carryable(&self, resource: Resource) -> bool;
    fn is_droppable(&self, landmark: Landmark) -> bool;
    fn neighbour_known(&self, target: Target) -> bool;
    fn visited_before(&self, landmark: Landmark) -> bool;
    fn did_avoid(&self, landmark: Landmark) -> bool;
    fn can_move(&self) -> bool;

    /// Claim a nearby unclaimed item of `resource` kind. Returns whether a
    /// claim happened.
    fn pick_up(&mut self, resource: Resource) -> bool;
    /// Release the carried item if it matches `resource` exactly.
    fn drop_off(&mut self, resource: Resource) -> bool;
    /// One movement step in a random direction.
    fn explore(&mut self);
    /// One movement step toward the landmark, snapping when within reach.
    fn move_towards(&mut self, landmark: Landmark);
    /// One movement step away from the landmark.
    fn move_away(&mut self, landmark: Landmark);
}
