//! Tracks which data columns this node custodies and must sample.
//!
//! The custody group set is derived deterministically from the node id;
//! the expected-column set of every `Columns` block input is fixed from
//! this context at creation.

use types::{ChainSpec, ColumnIndex, compute_columns_for_custody_group, get_custody_groups};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodyContext {
    custody_group_count: u64,
    sampling_columns: Vec<ColumnIndex>,
}

impl CustodyContext {
    /// Derive the custody set for a node, custodying at least the spec's
    /// minimum `custody_requirement` groups.
    pub fn new(raw_node_id: [u8; 32], custody_group_count: u64, spec: &ChainSpec) -> Self {
        let custody_group_count = custody_group_count
            .max(spec.custody_requirement)
            .min(spec.number_of_custody_groups);
        let groups = get_custody_groups(raw_node_id, custody_group_count, spec);

        let mut sampling_columns: Vec<ColumnIndex> = groups
            .iter()
            .flat_map(|group| compute_columns_for_custody_group(*group, spec))
            .collect();
        sampling_columns.sort_unstable();

        Self {
            custody_group_count,
            sampling_columns,
        }
    }

    /// A supernode custodies every column.
    pub fn supernode(spec: &ChainSpec) -> Self {
        Self {
            custody_group_count: spec.number_of_custody_groups,
            sampling_columns: (0..spec.number_of_columns).collect(),
        }
    }

    pub fn custody_group_count(&self) -> u64 {
        self.custody_group_count
    }

    /// The column indices this node samples, ascending.
    pub fn sampling_columns(&self) -> &[ColumnIndex] {
        &self.sampling_columns
    }

    pub fn is_custody_column(&self, index: ColumnIndex) -> bool {
        self.sampling_columns.binary_search(&index).is_ok()
    }
}
