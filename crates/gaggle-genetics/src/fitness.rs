//! Structural fitness over decoded trees.
//!
//! Fitness never looks at ticking outcomes. It is a shape proxy: how many
//! distinct node names a tree wires together, plus a bonus for moving
//! toward landmarks. Cheap enough to evaluate at every entry build.

use gaggle_behavior::{Action, BehaviorNode, Landmark, NODE_VOCABULARY};

/// Names every non-degenerate tree carries (a root composite plus one
/// leaf); the diversity term measures what a tree wires beyond them.
const BASELINE_NAMES: usize = 2;

/// Normalized distinct-name count in `[0, 1]`. Trees using the baseline
/// vocabulary or less score zero; a tree exercising the whole vocabulary
/// scores one.
#[must_use]
pub fn diversity(tree: &BehaviorNode) -> f32 {
    let distinct = tree.distinct_names().len() as f32;
    let baseline = BASELINE_NAMES as f32;
    let span = NODE_VOCABULARY.len() as f32 - baseline;
    ((distinct - baseline) / span).clamp(0.0, 1.0)
}

/// How many of the two landmarks the tree contains a move-towards action
/// for. Counted structurally over the node variants, not by name matching.
#[must_use]
pub fn exploration(tree: &BehaviorNode) -> usize {
    let mut hub = false;
    let mut site = false;
    tree.visit(&mut |node| {
        if let BehaviorNode::Action(Action::MoveTowards(landmark)) = node {
            match landmark {
                Landmark::Hub => hub = true,
                Landmark::Site => site = true,
            }
        }
    });
    usize::from(hub) + usize::from(site)
}

/// Combined structural score: diversity plus half the exploration bonus.
#[must_use]
pub fn score(tree: &BehaviorNode) -> f32 {
    diversity(tree) + exploration(tree) as f32 / 2.0
}
