use crate::JustifiedBalances;
use crate::error::{Error, InvalidBestNodeInfo};
use crate::proto_array_fork_choice::{Block, ExecutionStatus};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use std::collections::{HashMap, HashSet};
use types::{
    ChainSpec, Checkpoint, Epoch, EthSpec, ExecutionBlockHash, FixedBytesExtended, Hash256, Slot,
};

/// Stores the necessary data to keep track of the most recent proposer
/// boost and remove it once it expires.
#[derive(Default, PartialEq, Clone, Copy, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct ProposerBoost {
    pub root: Hash256,
    pub score: u64,
}

#[derive(Clone, PartialEq, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct ProtoNode {
    pub slot: Slot,
    pub state_root: Hash256,
    /// The root of the block at the start of this node's epoch, used for
    /// attestation target validation.
    pub target_root: Hash256,
    pub root: Hash256,
    pub parent: Option<usize>,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub weight: u64,
    pub best_child: Option<usize>,
    pub best_descendant: Option<usize>,
    /// Indicates if an execution node has marked this block as valid. Also
    /// contains the execution block hash.
    pub execution_status: ExecutionStatus,
}

/// Indicates the block (and its ancestors) which should have their execution
/// payloads marked invalid.
#[derive(Clone, Debug, PartialEq)]
pub enum InvalidationOperation {
    /// Invalidate only `block_root` and its descendants, not its ancestors.
    InvalidateOne { block_root: Hash256 },
    /// Invalidate `head_block_root` (unless `!always_invalidate_head`) and
    /// all ancestors back to (but excluding) the block with the
    /// `latest_valid_ancestor` payload hash, plus all descendants of any
    /// invalidated block.
    InvalidateMany {
        head_block_root: Hash256,
        always_invalidate_head: bool,
        latest_valid_ancestor: ExecutionBlockHash,
    },
}

impl InvalidationOperation {
    pub fn block_root(&self) -> Hash256 {
        match self {
            InvalidationOperation::InvalidateOne { block_root } => *block_root,
            InvalidationOperation::InvalidateMany {
                head_block_root, ..
            } => *head_block_root,
        }
    }

    pub fn latest_valid_ancestor(&self) -> Option<ExecutionBlockHash> {
        match self {
            InvalidationOperation::InvalidateOne { .. } => None,
            InvalidationOperation::InvalidateMany {
                latest_valid_ancestor,
                ..
            } => Some(*latest_valid_ancestor),
        }
    }

    pub fn invalidate_block_root(&self) -> bool {
        match self {
            InvalidationOperation::InvalidateOne { .. } => true,
            InvalidationOperation::InvalidateMany {
                always_invalidate_head,
                ..
            } => *always_invalidate_head,
        }
    }
}

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct ProtoArray {
    /// Do not attempt to prune the tree unless it has at least this many
    /// nodes. Small prunes simply waste time.
    pub prune_threshold: usize,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub nodes: Vec<ProtoNode>,
    pub indices: HashMap<Hash256, usize>,
    pub previous_proposer_boost: ProposerBoost,
}

impl ProtoArray {
    /// Iterate backwards through the array, touching all nodes and their
    /// parents and potentially the best-child of each parent.
    ///
    /// The structure of the `self.nodes` array ensures that the child of
    /// each node is always touched before its parent.
    ///
    /// For each node, the following is done:
    ///
    /// - Update the node's weight with the corresponding delta (and the
    ///   proposer boost, where applicable).
    /// - Backpropagate each node's delta to its parent's delta.
    /// - Compare the current node with the parent's best-child, updating
    ///   it if the current node should become the best child.
    /// - Update the parent's best-descendant with the current node or its
    ///   best-descendant, if appropriate.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_score_changes<E: EthSpec>(
        &mut self,
        mut deltas: Vec<i64>,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        new_justified_balances: &JustifiedBalances,
        proposer_boost_root: Hash256,
        current_slot: Slot,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        if deltas.len() != self.indices.len() {
            return Err(Error::InvalidDeltaLen {
                deltas: deltas.len(),
                indices: self.indices.len(),
            });
        }

        if justified_checkpoint != self.justified_checkpoint
            || finalized_checkpoint != self.finalized_checkpoint
        {
            self.justified_checkpoint = justified_checkpoint;
            self.finalized_checkpoint = finalized_checkpoint;
        }

        // Default the proposer boost score to zero. It is set in the loop
        // below iff `proposer_boost_root` names a known node.
        let mut proposer_score = 0;

        for node_index in (0..self.nodes.len()).rev() {
            let node = self
                .nodes
                .get_mut(node_index)
                .ok_or(Error::InvalidNodeIndex(node_index))?;

            // There is no need to adjust the balances or manage parent of
            // the zero hash since it is an alias to the genesis block.
            if node.root == Hash256::zero() {
                continue;
            }

            let mut node_delta = deltas
                .get(node_index)
                .copied()
                .ok_or(Error::InvalidNodeDelta(node_index))?;

            // If we find the node for which the proposer boost was
            // previously applied, decrease the delta by the previous score
            // amount.
            if self.previous_proposer_boost.root != Hash256::zero()
                && self.previous_proposer_boost.root == node.root
            {
                node_delta = node_delta
                    .checked_sub(self.previous_proposer_boost.score as i64)
                    .ok_or(Error::DeltaOverflow(node_index))?;
            }
            // If we find the node matching the current proposer boost root,
            // increase the delta by the new score amount.
            if let Some(proposer_score_boost) = spec.proposer_score_boost
                && proposer_boost_root != Hash256::zero()
                && proposer_boost_root == node.root
            {
                proposer_score =
                    calculate_committee_fraction::<E>(new_justified_balances, proposer_score_boost)
                        .ok_or(Error::ProposerBoostOverflow(node_index))?;
                node_delta = node_delta
                    .checked_add(proposer_score as i64)
                    .ok_or(Error::DeltaOverflow(node_index))?;
            }

            // Invalid nodes must never carry weight.
            if node.execution_status.is_invalid() {
                node.weight = 0;
            } else if node_delta < 0 {
                node.weight = node
                    .weight
                    .checked_sub(node_delta.unsigned_abs())
                    .ok_or(Error::DeltaOverflow(node_index))?;
            } else {
                node.weight = node
                    .weight
                    .checked_add(node_delta as u64)
                    .ok_or(Error::DeltaOverflow(node_index))?;
            }

            // Back-propagate the node's delta to its parent.
            if let Some(parent_index) = node.parent {
                let parent_delta = deltas
                    .get_mut(parent_index)
                    .ok_or(Error::InvalidParentDelta(parent_index))?;
                *parent_delta = parent_delta
                    .checked_add(node_delta)
                    .ok_or(Error::DeltaOverflow(parent_index))?;
            }
        }

        // Store the current proposer boost for removal next time.
        self.previous_proposer_boost = ProposerBoost {
            root: proposer_boost_root,
            score: proposer_score,
        };

        // A second back-to-front pass updates best-child and
        // best-descendant once all child weights are final.
        for node_index in (0..self.nodes.len()).rev() {
            let parent_index = self
                .nodes
                .get(node_index)
                .ok_or(Error::InvalidNodeIndex(node_index))?
                .parent;
            if let Some(parent_index) = parent_index {
                self.maybe_update_best_child_and_descendant::<E>(
                    parent_index,
                    node_index,
                    current_slot,
                )?;
            }
        }

        Ok(())
    }

    /// Register a block with the fork choice.
    ///
    /// It is only sane to supply an unknown parent for the first block
    /// applied to the array (the anchor).
    pub fn on_block<E: EthSpec>(&mut self, block: Block, current_slot: Slot) -> Result<(), Error> {
        // If the block is already known, simply ignore it.
        if self.indices.contains_key(&block.root) {
            return Ok(());
        }

        let node_index = self.nodes.len();

        let node = ProtoNode {
            slot: block.slot,
            state_root: block.state_root,
            target_root: block.target_root,
            root: block.root,
            parent: block
                .parent_root
                .and_then(|parent_root| self.indices.get(&parent_root).copied()),
            justified_checkpoint: block.justified_checkpoint,
            finalized_checkpoint: block.finalized_checkpoint,
            weight: 0,
            best_child: None,
            best_descendant: None,
            execution_status: block.execution_status,
        };

        self.indices.insert(node.root, node_index);
        self.nodes.push(node.clone());

        if let Some(parent_index) = node.parent {
            self.maybe_update_best_child_and_descendant::<E>(
                parent_index,
                node_index,
                current_slot,
            )?;
        }

        Ok(())
    }

    /// Follows the best-descendant links to find the best block (i.e. head
    /// block) starting from the justified root.
    ///
    /// ## Notes
    ///
    /// The result of this function is not guaranteed to be accurate if
    /// `on_block` has been called without a subsequent
    /// `apply_score_changes` call. This is because `on_block` does not
    /// attempt to walk backwards through the tree and update the
    /// best-child/best-descendant links.
    pub fn find_head<E: EthSpec>(
        &self,
        justified_root: &Hash256,
        current_slot: Slot,
    ) -> Result<Hash256, Error> {
        let justified_index = self
            .indices
            .get(justified_root)
            .copied()
            .ok_or(Error::JustifiedNodeUnknown(*justified_root))?;

        let justified_node = self
            .nodes
            .get(justified_index)
            .ok_or(Error::InvalidJustifiedIndex(justified_index))?;

        let best_descendant_index = justified_node.best_descendant.unwrap_or(justified_index);

        let best_node = self
            .nodes
            .get(best_descendant_index)
            .ok_or(Error::InvalidBestDescendant(best_descendant_index))?;

        // Perform a sanity check that the node is indeed valid to be the
        // head. A failure here indicates an internal inconsistency; the
        // caller keeps the previous head.
        if !self.node_is_viable_for_head::<E>(best_node, current_slot) {
            return Err(Error::InvalidBestNode(Box::new(InvalidBestNodeInfo {
                current_slot,
                start_root: *justified_root,
                justified_checkpoint: self.justified_checkpoint,
                finalized_checkpoint: self.finalized_checkpoint,
                head_root: best_node.root,
                head_justified_checkpoint: best_node.justified_checkpoint,
                head_finalized_checkpoint: best_node.finalized_checkpoint,
            })));
        }

        Ok(best_node.root)
    }

    /// Update the tree with new finalization information. The tree is only
    /// actually pruned if both of the two following criteria are met:
    ///
    /// - The supplied finalized root is different to the last finalized
    ///   root this function was called with.
    /// - The number of nodes preceding the finalized node exceeds
    ///   `self.prune_threshold`, to avoid expensive micro-prunes.
    pub fn maybe_prune(&mut self, finalized_root: Hash256) -> Result<(), Error> {
        let finalized_index = *self
            .indices
            .get(&finalized_root)
            .ok_or(Error::FinalizedNodeUnknown(finalized_root))?;

        if finalized_index < self.prune_threshold {
            // Pruning at small numbers incurs more cost than benefit.
            return Ok(());
        }

        // Remove the `self.indices` key/values for all the to-be-deleted
        // nodes.
        for node_index in 0..finalized_index {
            let root = &self
                .nodes
                .get(node_index)
                .ok_or(Error::InvalidNodeIndex(node_index))?
                .root;
            self.indices.remove(root);
        }

        // Drop all the nodes prior to finalization.
        self.nodes = self.nodes.split_off(finalized_index);

        // Adjust the indices map.
        for (_root, index) in self.indices.iter_mut() {
            *index = index
                .checked_sub(finalized_index)
                .ok_or(Error::IndexOverflow("indices"))?;
        }

        // Iterate through all the existing nodes and adjust their indices
        // to match the new layout of `self.nodes`. Links into the pruned
        // region are dropped.
        for node in self.nodes.iter_mut() {
            node.parent = node
                .parent
                .and_then(|parent| parent.checked_sub(finalized_index));
            node.best_child = node
                .best_child
                .and_then(|child| child.checked_sub(finalized_index));
            node.best_descendant = node
                .best_descendant
                .and_then(|descendant| descendant.checked_sub(finalized_index));
        }

        Ok(())
    }

    /// Observe the parent at `parent_index` with respect to the child at
    /// `child_index` and potentially modify the `parent.best_child` and
    /// `parent.best_descendant` values.
    ///
    /// There are four outcomes:
    ///
    /// - The child is already the best child but it's now invalid due to a
    ///   FFG change and should be removed.
    /// - The child is already the best child and the parent is updated
    ///   with the new best-descendant.
    /// - The child is not the best child but becomes the best child.
    /// - The child is not the best child and does not become the best
    ///   child.
    fn maybe_update_best_child_and_descendant<E: EthSpec>(
        &mut self,
        parent_index: usize,
        child_index: usize,
        current_slot: Slot,
    ) -> Result<(), Error> {
        let child = self
            .nodes
            .get(child_index)
            .ok_or(Error::InvalidNodeIndex(child_index))?;

        let parent = self
            .nodes
            .get(parent_index)
            .ok_or(Error::InvalidNodeIndex(parent_index))?;

        let child_leads_to_viable_head =
            self.node_leads_to_viable_head::<E>(child, current_slot)?;

        // These three variables are aliases to the three options that we
        // may set the `parent.best_child` and `parent.best_descendant` to.
        let change_to_none = (None, None);
        let change_to_child = (
            Some(child_index),
            Some(child.best_descendant.unwrap_or(child_index)),
        );
        let no_change = (parent.best_child, parent.best_descendant);

        let (new_best_child, new_best_descendant) =
            if let Some(best_child_index) = parent.best_child {
                if best_child_index == child_index && !child_leads_to_viable_head {
                    // The child is already the best-child of the parent but
                    // it's not viable for the head, remove it.
                    change_to_none
                } else if best_child_index == child_index {
                    // The child is the best-child already. Refresh the
                    // best-descendant: it may have changed.
                    change_to_child
                } else {
                    let best_child = self
                        .nodes
                        .get(best_child_index)
                        .ok_or(Error::InvalidBestChildIndex(best_child_index))?;

                    let best_child_leads_to_viable_head =
                        self.node_leads_to_viable_head::<E>(best_child, current_slot)?;

                    if child_leads_to_viable_head && !best_child_leads_to_viable_head {
                        // The child leads to a viable head, but the current
                        // best-child doesn't.
                        change_to_child
                    } else if !child_leads_to_viable_head && best_child_leads_to_viable_head {
                        // The best child leads to a viable head, but the
                        // child doesn't.
                        no_change
                    } else if child.weight == best_child.weight {
                        // Tie-breaker of equal weights by root.
                        if child.root >= best_child.root {
                            change_to_child
                        } else {
                            no_change
                        }
                    } else if child.weight > best_child.weight {
                        change_to_child
                    } else {
                        no_change
                    }
                }
            } else if child_leads_to_viable_head {
                // There is no current best-child and the child is viable.
                change_to_child
            } else {
                // There is no current best-child but the child is not
                // viable.
                no_change
            };

        let parent = self
            .nodes
            .get_mut(parent_index)
            .ok_or(Error::InvalidNodeIndex(parent_index))?;

        parent.best_child = new_best_child;
        parent.best_descendant = new_best_descendant;

        Ok(())
    }

    /// Indicates if the node itself is viable for the head, or if its best
    /// descendant is viable for the head.
    fn node_leads_to_viable_head<E: EthSpec>(
        &self,
        node: &ProtoNode,
        current_slot: Slot,
    ) -> Result<bool, Error> {
        let best_descendant_is_viable_for_head =
            if let Some(best_descendant_index) = node.best_descendant {
                let best_descendant = self
                    .nodes
                    .get(best_descendant_index)
                    .ok_or(Error::InvalidBestDescendant(best_descendant_index))?;

                self.node_is_viable_for_head::<E>(best_descendant, current_slot)
            } else {
                false
            };

        Ok(best_descendant_is_viable_for_head
            || self.node_is_viable_for_head::<E>(node, current_slot))
    }

    /// This is the equivalent to the `filter_block_tree` function in the
    /// consensus spec:
    ///
    /// https://github.com/ethereum/eth2.0-specs/blob/v0.12.1/specs/phase0/fork-choice.md#filter_block_tree
    ///
    /// Any node that has a different finalized or justified epoch should
    /// not be viable for the head, and neither should any node with an
    /// invalid execution payload.
    pub fn node_is_viable_for_head<E: EthSpec>(
        &self,
        node: &ProtoNode,
        current_slot: Slot,
    ) -> bool {
        if node.execution_status.is_invalid() {
            return false;
        }

        let genesis_epoch = Epoch::new(0);
        let current_epoch = current_slot.epoch(E::slots_per_epoch());

        // The voting source (the justified checkpoint of the node's state)
        // may lag the store's justified checkpoint by up to two epochs
        // without disqualifying the node.
        let correct_justified = self.justified_checkpoint.epoch == genesis_epoch
            || node.justified_checkpoint == self.justified_checkpoint
            || node.justified_checkpoint.epoch + 2 >= current_epoch;

        let correct_finalized = self.finalized_checkpoint.epoch == genesis_epoch
            || node.finalized_checkpoint == self.finalized_checkpoint;

        correct_justified && correct_finalized
    }

    /// Return a reverse iterator over the nodes which comprise the chain
    /// ending at `block_root`.
    pub fn iter_nodes<'a>(&'a self, block_root: &Hash256) -> Iter<'a> {
        let next_node_index = self.indices.get(block_root).copied();
        Iter {
            next_node_index,
            proto_array: self,
        }
    }

    /// Returns an iterator over the roots and slots of the chain ending at
    /// `block_root`.
    pub fn iter_block_roots<'a>(
        &'a self,
        block_root: &Hash256,
    ) -> impl Iterator<Item = (Hash256, Slot)> + 'a {
        self.iter_nodes(block_root)
            .map(|node| (node.root, node.slot))
    }

    /// Returns `true` if the `descendant_root` has an ancestor with
    /// `ancestor_root`. Always returns `false` if either input root is
    /// unknown. Still returns `true` if `ancestor_root == descendant_root`.
    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        self.indices
            .get(&ancestor_root)
            .and_then(|ancestor_index| self.nodes.get(*ancestor_index))
            .map(|ancestor| {
                self.iter_block_roots(&descendant_root)
                    .take_while(|(_root, slot)| *slot >= ancestor.slot)
                    .any(|(root, slot)| slot == ancestor.slot && root == ancestor_root)
            })
            .unwrap_or(false)
    }

    /// Returns `true` if `root` is equal to or a descendant of the
    /// finalized checkpoint root.
    pub fn is_finalized_checkpoint_or_descendant<E: EthSpec>(&self, root: Hash256) -> bool {
        let finalized_root = self.finalized_checkpoint.root;
        let finalized_slot = self
            .finalized_checkpoint
            .epoch
            .start_slot(E::slots_per_epoch());

        let Some(node) = self
            .indices
            .get(&root)
            .and_then(|index| self.nodes.get(*index))
        else {
            return false;
        };

        // If the node's checkpoints already carry the finalized checkpoint
        // it must descend from it.
        if node.finalized_checkpoint == self.finalized_checkpoint
            || node.justified_checkpoint == self.finalized_checkpoint
        {
            return true;
        }

        // Otherwise walk back to the finalized slot.
        self.iter_block_roots(&root)
            .take_while(|(_root, slot)| *slot >= finalized_slot)
            .any(|(ancestor_root, slot)| slot == finalized_slot && ancestor_root == finalized_root)
    }

    /// Mark the payload of `block_root` valid, propagating validity to all
    /// optimistic ancestors.
    pub fn propagate_execution_payload_validation(
        &mut self,
        block_root: Hash256,
    ) -> Result<(), Error> {
        let index = *self
            .indices
            .get(&block_root)
            .ok_or(Error::NodeUnknown(block_root))?;
        self.propagate_execution_payload_validation_by_index(index)
    }

    fn propagate_execution_payload_validation_by_index(
        &mut self,
        verified_node_index: usize,
    ) -> Result<(), Error> {
        let mut index = verified_node_index;
        loop {
            let node = self
                .nodes
                .get_mut(index)
                .ok_or(Error::InvalidNodeIndex(index))?;
            let parent_index = node.parent;
            match node.execution_status {
                // There is no need to proceed further up the chain, every
                // block above a valid or irrelevant one is already settled.
                ExecutionStatus::Valid(_) | ExecutionStatus::Irrelevant(_) => return Ok(()),
                ExecutionStatus::Optimistic(payload_block_hash) => {
                    node.execution_status = ExecutionStatus::Valid(payload_block_hash)
                }
                // A valid payload can never descend from an invalid one.
                ExecutionStatus::Invalid(payload_block_hash) => {
                    return Err(Error::InvalidAncestorOfValidPayload {
                        ancestor_block_root: node.root,
                        ancestor_payload_block_hash: payload_block_hash,
                    });
                }
            }

            match parent_index {
                Some(parent_index) => index = parent_index,
                None => return Ok(()),
            }
        }
    }

    /// Invalidates the payloads described by `op`: the named block (per
    /// `op.invalidate_block_root()`), its ancestors back to the latest
    /// valid ancestor, and every descendant of any invalidated block.
    ///
    /// Invalidated nodes keep their position in the array so that ancestry
    /// queries continue to work; they are simply excluded from head
    /// selection and their weights zeroed on the next score application.
    pub fn propagate_execution_payload_invalidation(
        &mut self,
        op: &InvalidationOperation,
    ) -> Result<(), Error> {
        let head_block_root = op.block_root();
        let latest_valid_ancestor_hash = op.latest_valid_ancestor();

        let head_index = *self
            .indices
            .get(&head_block_root)
            .ok_or(Error::NodeUnknown(head_block_root))?;

        let mut invalidated_indices: HashSet<usize> = HashSet::new();
        let mut index = Some(head_index);
        let mut is_first_node = true;

        // Ascend from the head block, invalidating as we go.
        while let Some(node_index) = index {
            let node = self
                .nodes
                .get_mut(node_index)
                .ok_or(Error::InvalidNodeIndex(node_index))?;
            let parent = node.parent;

            // The latest valid ancestor bounds the invalidation; it (and
            // everything above it) keeps its status. If it was optimistic
            // it is now known valid.
            if let Some(lvh) = latest_valid_ancestor_hash
                && node.execution_status.block_hash() == Some(lvh)
            {
                self.propagate_execution_payload_validation_by_index(node_index)?;
                break;
            }

            match node.execution_status {
                ExecutionStatus::Valid(payload_block_hash) => {
                    if is_first_node {
                        // It would be a logic error to invalidate a payload
                        // that we have already deemed valid.
                        return Err(Error::ValidExecutionStatusBecameInvalid {
                            block_root: node.root,
                            payload_block_hash,
                        });
                    }
                    // The LVH did not match any block below a known-valid
                    // payload. Do not invalidate above it.
                    break;
                }
                ExecutionStatus::Optimistic(payload_block_hash)
                | ExecutionStatus::Invalid(payload_block_hash) => {
                    if !is_first_node || op.invalidate_block_root() {
                        node.execution_status = ExecutionStatus::Invalid(payload_block_hash);
                        node.best_child = None;
                        node.best_descendant = None;
                        invalidated_indices.insert(node_index);
                    }

                    // Without a latest-valid-ancestor bound only the named
                    // block (and, below, its descendants) are invalidated.
                    if latest_valid_ancestor_hash.is_none() {
                        break;
                    }
                }
                // Pre-merge blocks terminate the ascent.
                ExecutionStatus::Irrelevant(_) => break,
            }

            is_first_node = false;
            index = parent;
        }

        // Children always carry higher indices than their parents, so one
        // forward pass invalidates all descendants.
        for node_index in 0..self.nodes.len() {
            let parent_invalidated = self
                .nodes
                .get(node_index)
                .ok_or(Error::InvalidNodeIndex(node_index))?
                .parent
                .is_some_and(|parent_index| invalidated_indices.contains(&parent_index));

            if parent_invalidated {
                let node = self
                    .nodes
                    .get_mut(node_index)
                    .ok_or(Error::InvalidNodeIndex(node_index))?;
                let block_hash = node
                    .execution_status
                    .block_hash()
                    .unwrap_or_else(ExecutionBlockHash::zero);
                node.execution_status = ExecutionStatus::Invalid(block_hash);
                node.best_child = None;
                node.best_descendant = None;
                invalidated_indices.insert(node_index);
            }
        }

        Ok(())
    }
}

/// Reverse iterator over a chain of nodes, from a block back through its
/// ancestors.
pub struct Iter<'a> {
    next_node_index: Option<usize>,
    proto_array: &'a ProtoArray,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ProtoNode;

    fn next(&mut self) -> Option<Self::Item> {
        let next_node_index = self.next_node_index?;
        let node = self.proto_array.nodes.get(next_node_index)?;
        self.next_node_index = node.parent;
        Some(node)
    }
}

/// A fraction of the committee weight used as the proposer boost and
/// re-org thresholds: `total_balance / slots_per_epoch * percent / 100`.
pub fn calculate_committee_fraction<E: EthSpec>(
    justified_balances: &JustifiedBalances,
    fraction_percent: u64,
) -> Option<u64> {
    justified_balances
        .total_effective_balance
        .checked_div(E::slots_per_epoch())?
        .checked_mul(fraction_percent)?
        .checked_div(100)
}
