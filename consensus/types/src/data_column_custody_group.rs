use crate::{ChainSpec, ColumnIndex, Uint256};
use std::collections::BTreeSet;

pub type CustodyIndex = u64;

/// The column indices covered by `custody_group`, interleaved so adjacent
/// groups custody disjoint, evenly-spread columns.
pub fn compute_columns_for_custody_group(
    custody_group: CustodyIndex,
    spec: &ChainSpec,
) -> impl Iterator<Item = ColumnIndex> + '_ {
    let columns_per_group = spec.number_of_columns / spec.number_of_custody_groups;
    (0..columns_per_group).map(move |i| spec.number_of_custody_groups * i + custody_group)
}

/// Derives the set of custody groups for a node from its raw node id.
///
/// Walks successive ids starting at the node's own, hashing each and
/// reducing modulo the group count, until `custody_group_count` distinct
/// groups are collected. The result is sorted.
pub fn get_custody_groups(
    raw_node_id: [u8; 32],
    custody_group_count: u64,
    spec: &ChainSpec,
) -> Vec<CustodyIndex> {
    let custody_group_count = custody_group_count.min(spec.number_of_custody_groups);
    let mut groups = BTreeSet::new();
    let mut current_id = Uint256::from_be_bytes(raw_node_id);

    while (groups.len() as u64) < custody_group_count {
        let digest = ethereum_hashing::hash(&current_id.to_le_bytes::<32>());
        let group_seed = u64::from_le_bytes(
            digest[0..8]
                .try_into()
                .expect("digest is at least 8 bytes"),
        );
        groups.insert(group_seed % spec.number_of_custody_groups);
        current_id = current_id.wrapping_add(Uint256::from(1_u64));
    }

    groups.into_iter().collect()
}
