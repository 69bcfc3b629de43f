//! Selection of the head target a syncing chain should pursue, from the
//! targets its member peers advertise.

use types::{Hash256, Slot};

/// A peer-advertised head: the slot and root the peer claims to be at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTarget {
    pub slot: Slot,
    pub root: Hash256,
}

/// Pick the target to sync towards: the highest advertised slot wins; a
/// tie on slot is resolved by the most common `(slot, root)` pair; a
/// remaining tie keeps the first-seen target. Deterministic for a given
/// input order.
pub fn select_chain_target(targets: &[ChainTarget]) -> Option<ChainTarget> {
    let max_slot = targets.iter().map(|target| target.slot).max()?;

    // Count (slot, root) multiplicity among the highest-slot targets,
    // preserving first-seen order.
    let mut counts: Vec<(ChainTarget, usize)> = Vec::new();
    for target in targets.iter().filter(|target| target.slot == max_slot) {
        if let Some((_, count)) = counts
            .iter_mut()
            .find(|(candidate, _)| candidate.root == target.root)
        {
            *count += 1;
        } else {
            counts.push((*target, 1));
        }
    }

    // A strictly-greater count is required to displace an earlier
    // candidate, so the first seen wins ties.
    let mut best: Option<(ChainTarget, usize)> = None;
    for (candidate, count) in counts {
        match &best {
            Some((_, best_count)) if count <= *best_count => {}
            _ => best = Some((candidate, count)),
        }
    }

    best.map(|(target, _)| target)
}
