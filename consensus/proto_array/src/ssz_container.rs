use crate::proto_array::ProposerBoost;
use crate::{
    Error, JustifiedBalances,
    proto_array::{ProtoArray, ProtoNode},
    proto_array_fork_choice::{ElasticList, ProtoArrayForkChoice, VoteTracker},
};
use ssz_derive::{Decode, Encode};
use std::collections::HashMap;
use types::Checkpoint;

/// The persisted form of `ProtoArrayForkChoice`. The `indices` map is
/// rebuilt from node order on load.
#[derive(Encode, Decode)]
pub struct SszContainer {
    pub votes: Vec<VoteTracker>,
    pub balances: Vec<u64>,
    pub prune_threshold: usize,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub previous_proposer_boost: ProposerBoost,
    pub nodes: Vec<ProtoNode>,
}

impl From<&ProtoArrayForkChoice> for SszContainer {
    fn from(from: &ProtoArrayForkChoice) -> Self {
        let proto_array = &from.proto_array;

        Self {
            votes: from.votes.0.clone(),
            balances: from.balances.effective_balances.clone(),
            prune_threshold: proto_array.prune_threshold,
            justified_checkpoint: proto_array.justified_checkpoint,
            finalized_checkpoint: proto_array.finalized_checkpoint,
            previous_proposer_boost: proto_array.previous_proposer_boost,
            nodes: proto_array.nodes.clone(),
        }
    }
}

impl TryFrom<(SszContainer, JustifiedBalances)> for ProtoArrayForkChoice {
    type Error = Error;

    fn try_from(
        (from, balances): (SszContainer, JustifiedBalances),
    ) -> Result<Self, Self::Error> {
        let indices: HashMap<_, _> = from
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.root, index))
            .collect();

        let proto_array = ProtoArray {
            prune_threshold: from.prune_threshold,
            justified_checkpoint: from.justified_checkpoint,
            finalized_checkpoint: from.finalized_checkpoint,
            nodes: from.nodes,
            indices,
            previous_proposer_boost: from.previous_proposer_boost,
        };

        Ok(Self {
            proto_array,
            votes: ElasticList(from.votes),
            balances,
        })
    }
}
