//! The closed node set and its recursive tick dispatch.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ppa::{carry_template, drop_template};
use crate::{Actor, Landmark, Resource, Status, Target};

/// Read-only predicates over the acting agent and its blackboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    IsCarrying(Resource),
    IsCarryable(Resource),
    IsDroppable(Landmark),
    NeighbourObjects(Target),
    IsVisitedBefore(Landmark),
    DidAvoid(Landmark),
    CanMove,
}

impl Condition {
    fn check(self, actor: &dyn Actor) -> Status {
        let holds = match self {
            Self::IsCarrying(resource) => actor.is_carrying(resource),
            Self::IsCarryable(resource) => actor.is_carryable(resource),
            Self::IsDroppable(landmark) => actor.is_droppable(landmark),
            Self::NeighbourObjects(target) => actor.neighbour_known(target),
            Self::IsVisitedBefore(landmark) => actor.visited_before(landmark),
            Self::DidAvoid(landmark) => actor.did_avoid(landmark),
            Self::CanMove => actor.can_move(),
        };
        Status::from(holds)
    }

    #[must_use]
    fn name(self) -> &'static str {
        match self {
            Self::IsCarrying(Resource::Food) => "IsCarrying_Food",
            Self::IsCarrying(Resource::Debris) => "IsCarrying_Debris",
            Self::IsCarryable(Resource::Food) => "IsCarryable_Food",
            Self::IsCarryable(Resource::Debris) => "IsCarryable_Debris",
            Self::IsDroppable(Landmark::Hub) => "IsDroppable_Hub",
            Self::IsDroppable(Landmark::Site) => "IsDroppable_Site",
            Self::NeighbourObjects(Target::Food) => "NeighbourObjects_Food",
            Self::NeighbourObjects(Target::Debris) => "NeighbourObjects_Debris",
            Self::NeighbourObjects(Target::Hub) => "NeighbourObjects_Hub",
            Self::NeighbourObjects(Target::Site) => "NeighbourObjects_Site",
            Self::IsVisitedBefore(Landmark::Hub) => "IsVisitedBefore_Hub",
            Self::IsVisitedBefore(Landmark::Site) => "IsVisitedBefore_Site",
            Self::DidAvoid(Landmark::Hub) => "DidAvoid_Hub",
            Self::DidAvoid(Landmark::Site) => "DidAvoid_Site",
            Self::CanMove => "CanMove",
        }
    }
}

/// Motor calls; each performs exactly one operation on the [`Actor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Explore,
    MoveTowards(Landmark),
    MoveAway(Landmark),
    PickUp(Resource),
    Drop(Resource),
}

impl Action {
    fn perform(self, actor: &mut dyn Actor) -> Status {
        match self {
            Self::Explore => {
                actor.explore();
                Status::Success
            }
            Self::MoveTowards(landmark) => {
                actor.move_towards(landmark);
                Status::Success
            }
            Self::MoveAway(landmark) => {
                actor.move_away(landmark);
                Status::Success
            }
            Self::PickUp(resource) => Status::from(actor.pick_up(resource)),
            Self::Drop(resource) => Status::from(actor.drop_off(resource)),
        }
    }

    #[must_use]
    fn name(self) -> &'static str {
        match self {
            Self::Explore => "Explore",
            Self::MoveTowards(Landmark::Hub) => "MoveTowards_Hub",
            Self::MoveTowards(Landmark::Site) => "MoveTowards_Site",
            Self::MoveAway(Landmark::Hub) => "MoveAway_Hub",
            Self::MoveAway(Landmark::Site) => "MoveAway_Site",
            Self::PickUp(Resource::Food) => "PickUp_Food",
            Self::PickUp(Resource::Debris) => "PickUp_Debris",
            Self::Drop(Resource::Food) => "Drop_Food",
            Self::Drop(Resource::Debris) => "Drop_Debris",
        }
    }
}

/// A decoded behaviour tree. Immutable after construction; replaced
/// wholesale when its genome is rebuilt.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorNode {
    Condition(Condition),
    Action(Action),
    /// First-success composite; restarts from the first child every tick.
    Selector(Vec<BehaviorNode>),
    /// First-failure composite; restarts from the first child every tick.
    Sequence(Vec<BehaviorNode>),
    /// Inverter decorator.
    Invert(Box<BehaviorNode>),
    /// Always-succeeding no-op; the depth-limit fallback.
    Success,
}

impl BehaviorNode {
    /// Evaluate the subtree once against `actor`.
    ///
    /// A selector with no children fails; a sequence with no children
    /// succeeds vacuously.
    pub fn tick(&self, actor: &mut dyn Actor) -> Status {
        match self {
            Self::Condition(condition) => condition.check(&*actor),
            Self::Action(action) => action.perform(actor),
            Self::Selector(children) => {
                for child in children {
                    if child.tick(actor).is_success() {
                        return Status::Success;
                    }
                }
                Status::Failure
            }
            Self::Sequence(children) => {
                for child in children {
                    if !child.tick(actor).is_success() {
                        return Status::Failure;
                    }
                }
                Status::Success
            }
            Self::Invert(child) => child.tick(actor).invert(),
            Self::Success => Status::Success,
        }
    }

    /// Display name used by the structural fitness metrics. Inverted nodes
    /// derive their name from the wrapped child.
    #[must_use]
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            Self::Condition(condition) => Cow::Borrowed(condition.name()),
            Self::Action(action) => Cow::Borrowed(action.name()),
            Self::Selector(_) => Cow::Borrowed("Selector"),
            Self::Sequence(_) => Cow::Borrowed("Sequence"),
            Self::Invert(child) => Cow::Owned(format!("{}_invert", child.name())),
            Self::Success => Cow::Borrowed("Success"),
        }
    }

    /// Instantiate the node a grammar terminal names, e.g. `MoveTowards_Hub`
    /// or the carry/drop templates. Returns `None` for names outside the
    /// closed set.
    #[must_use]
    pub fn from_terminal(name: &str) -> Option<Self> {
        match name {
            "Success" => return Some(Self::Success),
            "Explore" => return Some(Self::Action(Action::Explore)),
            "CanMove" => return Some(Self::Condition(Condition::CanMove)),
            _ => {}
        }
        let (kind, label) = name.split_once('_')?;
        let node = match kind {
            "MoveTowards" => Self::Action(Action::MoveTowards(parse_landmark(label)?)),
            "MoveAway" => Self::Action(Action::MoveAway(parse_landmark(label)?)),
            "CompositeCarry" => carry_template(parse_resource(label)?),
            "CompositeDrop" => drop_template(parse_resource(label)?),
            "NeighbourObjects" => {
                Self::Condition(Condition::NeighbourObjects(parse_target(label)?))
            }
            "NeighbourObjectsInvert" => Self::Invert(Box::new(Self::Condition(
                Condition::NeighbourObjects(parse_target(label)?),
            ))),
            "IsCarrying" => Self::Condition(Condition::IsCarrying(parse_resource(label)?)),
            "IsCarryingInvert" => Self::Invert(Box::new(Self::Condition(Condition::IsCarrying(
                parse_resource(label)?,
            )))),
            "IsCarryable" => Self::Condition(Condition::IsCarryable(parse_resource(label)?)),
            "IsVisitedBefore" => {
                Self::Condition(Condition::IsVisitedBefore(parse_landmark(label)?))
            }
            "IsVisitedBeforeInvert" => Self::Invert(Box::new(Self::Condition(
                Condition::IsVisitedBefore(parse_landmark(label)?),
            ))),
            "IsDroppable" => Self::Condition(Condition::IsDroppable(parse_landmark(label)?)),
            "DidAvoid" => Self::Condition(Condition::DidAvoid(parse_landmark(label)?)),
            _ => return None,
        };
        Some(node)
    }

    /// Pre-order traversal over every node in the subtree.
    pub fn visit<'a>(&'a self, visitor: &mut impl FnMut(&'a BehaviorNode)) {
        visitor(self);
        match self {
            Self::Selector(children) | Self::Sequence(children) => {
                for child in children {
                    child.visit(visitor);
                }
            }
            Self::Invert(child) => child.visit(visitor),
            Self::Condition(_) | Self::Action(_) | Self::Success => {}
        }
    }

    /// Set of distinct display names appearing in the subtree. An inverted
    /// node reads as a single `_invert` name; the wrapped condition is part
    /// of it, not a separate entry.
    #[must_use]
    pub fn distinct_names(&self) -> BTreeSet<Cow<'static, str>> {
        fn collect(node: &BehaviorNode, names: &mut BTreeSet<Cow<'static, str>>) {
            names.insert(node.name());
            if let BehaviorNode::Selector(children) | BehaviorNode::Sequence(children) = node {
                for child in children {
                    collect(child, names);
                }
            }
        }
        let mut names = BTreeSet::new();
        collect(self, &mut names);
        names
    }

    /// Height of the subtree, counting this node as one level.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Selector(children) | Self::Sequence(children) => {
                1 + children.iter().map(Self::depth).max().unwrap_or(0)
            }
            Self::Invert(child) => 1 + child.depth(),
            Self::Condition(_) | Self::Action(_) | Self::Success => 1,
        }
    }
}

fn parse_landmark(label: &str) -> Option<Landmark> {
    match label {
        "Hub" => Some(Landmark::Hub),
        "Site" => Some(Landmark::Site),
        _ => None,
    }
}

fn parse_resource(label: &str) -> Option<Resource> {
    match label {
        "Food" => Some(Resource::Food),
        "Debris" => Some(Resource::Debris),
        _ => None,
    }
}

fn parse_target(label: &str) -> Option<Target> {
    match label {
        "Food" => Some(Target::Food),
        "Debris" => Some(Target::Debris),
        "Hub" => Some(Target::Hub),
        "Site" => Some(Target::Site),
        _ => None,
    }
}

/// Every display name the decoder can emit. The fitness diversity term is
/// normalized against this closed vocabulary.
pub const NODE_VOCABULARY: &[&str] = &[
    "Selector",
    "Sequence",
    "Success",
    "Explore",
    "CanMove",
    "MoveTowards_Hub",
    "MoveTowards_Site",
    "MoveAway_Hub",
    "MoveAway_Site",
    "PickUp_Food",
    "PickUp_Debris",
    "Drop_Food",
    "Drop_Debris",
    "IsCarrying_Food",
    "IsCarrying_Debris",
    "IsCarrying_Food_invert",
    "IsCarrying_Debris_invert",
    "IsCarryable_Food",
    "IsCarryable_Debris",
    "IsDroppable_Hub",
    "IsDroppable_Site",
    "NeighbourObjects_Food",
    "NeighbourObjects_Debris",
    "NeighbourObjects_Hub",
    "NeighbourObjects_Site",
    "NeighbourObjects_Food_invert",
    "NeighbourObjects_Debris_invert",
    "NeighbourObjects_Hub_invert",
    "NeighbourObjects_Site_invert",
    "IsVisitedBefore_Hub",
    "IsVisitedBefore_Site",
    "IsVisitedBefore_Hub_invert",
    "IsVisitedBefore_Site_invert",
    "DidAvoid_Hub",
    "DidAvoid_Site",
];
