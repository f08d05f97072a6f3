//! Postcondition-precondition-action templates.
//!
//! The PPA shape makes goal-directed actions idempotent: once the
//! postcondition holds, reticking the tree succeeds through the first
//! selector branch without re-running the action.

use crate::Resource;
use crate::node::{Action, BehaviorNode, Condition};

/// Assemble a PPA selector: `Selector[postcondition, Sequence[preconditions.., action]]`.
#[must_use]
pub fn ppa(
    postcondition: BehaviorNode,
    preconditions: Vec<BehaviorNode>,
    action: BehaviorNode,
) -> BehaviorNode {
    let mut stages = preconditions;
    stages.push(action);
    BehaviorNode::Selector(vec![postcondition, BehaviorNode::Sequence(stages)])
}

/// Carry template: pick up a nearby item of `resource` kind unless one is
/// already carried.
#[must_use]
pub fn carry_template(resource: Resource) -> BehaviorNode {
    ppa(
        BehaviorNode::Condition(Condition::IsCarrying(resource)),
        vec![
            BehaviorNode::Condition(Condition::NeighbourObjects(resource.into())),
            BehaviorNode::Condition(Condition::IsCarryable(resource)),
        ],
        BehaviorNode::Action(Action::PickUp(resource)),
    )
}

/// Drop template: release the carried item of `resource` kind; settles once
/// nothing of that kind is carried.
#[must_use]
pub fn drop_template(resource: Resource) -> BehaviorNode {
    ppa(
        BehaviorNode::Invert(Box::new(BehaviorNode::Condition(Condition::IsCarrying(
            resource,
        )))),
        vec![BehaviorNode::Condition(Condition::IsCarrying(resource))],
        BehaviorNode::Action(Action::Drop(resource)),
    )
}
