//! Gossip admission and KZG cell verification for data-column sidecars.

use crate::beacon_chain::{BeaconChain, BeaconChainTypes};
use crate::metrics;
use crate::observed_data_sidecars::{self, ObservationStrategy};
use crate::{GossipVerdict, PeerId};
use kzg::{Cell, KzgCommitment, KzgError, KzgProof, KzgVerifier};
use slot_clock::SlotClock;
use std::marker::PhantomData;
use std::sync::Arc;
use types::{ColumnIndex, DataColumnSidecar, EthSpec, Hash256, Slot};

#[derive(Debug)]
pub enum GossipDataColumnError {
    /// The column index is outside the matrix.
    InvalidColumnIndex { index: ColumnIndex, max: u64 },
    /// The column is structurally inconsistent (cell/commitment/proof
    /// count mismatch).
    InconsistentLengths {
        cells: usize,
        commitments: usize,
        proofs: usize,
    },
    /// The column is not in this node's custody set; we neither verify
    /// nor propagate it.
    NotCustodyColumn(ColumnIndex),
    FutureSlot {
        message_slot: Slot,
        latest_permissible_slot: Slot,
    },
    PastFinalizedSlot {
        column_slot: Slot,
        finalized_slot: Slot,
    },
    RepeatSidecar {
        proposer_index: u64,
        slot: Slot,
        index: ColumnIndex,
    },
    InvalidKzgProof,
    KzgError(KzgError),
    ObservationError(observed_data_sidecars::Error),
    UnableToReadSlot,
}

impl GossipDataColumnError {
    pub fn verdict(&self) -> GossipVerdict {
        match self {
            GossipDataColumnError::NotCustodyColumn(_)
            | GossipDataColumnError::FutureSlot { .. }
            | GossipDataColumnError::PastFinalizedSlot { .. }
            | GossipDataColumnError::RepeatSidecar { .. }
            | GossipDataColumnError::ObservationError(_)
            | GossipDataColumnError::UnableToReadSlot => GossipVerdict::Ignore,
            GossipDataColumnError::InvalidColumnIndex { .. }
            | GossipDataColumnError::InconsistentLengths { .. }
            | GossipDataColumnError::InvalidKzgProof
            | GossipDataColumnError::KzgError(_) => GossipVerdict::Reject,
        }
    }
}

impl From<observed_data_sidecars::Error> for GossipDataColumnError {
    fn from(e: observed_data_sidecars::Error) -> Self {
        GossipDataColumnError::ObservationError(e)
    }
}

/// A data column whose cell proofs verified against the block's
/// commitments.
#[derive(Debug, Clone)]
pub struct KzgVerifiedDataColumn {
    column: Arc<DataColumnSidecar>,
}

impl KzgVerifiedDataColumn {
    pub fn new(
        column: Arc<DataColumnSidecar>,
        kzg: &dyn KzgVerifier,
    ) -> Result<Self, KzgError> {
        verify_kzg_for_data_column_list(std::iter::once(&column), kzg)?;
        Ok(Self { column })
    }

    pub fn from_batch(
        columns: Vec<Arc<DataColumnSidecar>>,
        kzg: &dyn KzgVerifier,
    ) -> Result<Vec<Self>, KzgError> {
        verify_kzg_for_data_column_list(columns.iter(), kzg)?;
        Ok(columns
            .into_iter()
            .map(|column| Self { column })
            .collect())
    }

    pub fn as_data_column(&self) -> &DataColumnSidecar {
        &self.column
    }

    pub fn into_inner(self) -> Arc<DataColumnSidecar> {
        self.column
    }

    pub fn index(&self) -> ColumnIndex {
        self.column.index
    }
}

/// Verify the cells of every column in one batched call. Each cell is
/// checked against its blob's commitment at the column's index.
pub fn verify_kzg_for_data_column_list<'a, I>(
    column_iter: I,
    kzg: &dyn KzgVerifier,
) -> Result<(), KzgError>
where
    I: Iterator<Item = &'a Arc<DataColumnSidecar>>,
{
    let mut commitments: Vec<KzgCommitment> = vec![];
    let mut cell_indices: Vec<u64> = vec![];
    let mut cells: Vec<&Cell> = vec![];
    let mut proofs: Vec<KzgProof> = vec![];

    for column in column_iter {
        if column.column.len() != column.kzg_commitments.len()
            || column.column.len() != column.kzg_proofs.len()
        {
            return Err(KzgError::InvalidInput(format!(
                "column {} has {} cells, {} commitments, {} proofs",
                column.index,
                column.column.len(),
                column.kzg_commitments.len(),
                column.kzg_proofs.len()
            )));
        }
        for (row, cell) in column.column.iter().enumerate() {
            commitments.push(column.kzg_commitments[row]);
            cell_indices.push(column.index);
            cells.push(cell);
            proofs.push(column.kzg_proofs[row]);
        }
    }

    if cells.is_empty() {
        return Ok(());
    }

    if kzg.verify_cell_batch(&commitments, &cell_indices, &cells, &proofs)? {
        Ok(())
    } else {
        Err(KzgError::VerificationFailed)
    }
}

/// A data-column sidecar that passed gossip admission.
pub struct GossipVerifiedDataColumn<O: ObservationStrategy> {
    column: KzgVerifiedDataColumn,
    _phantom: PhantomData<O>,
}

impl<O: ObservationStrategy> GossipVerifiedDataColumn<O> {
    pub fn block_root(&self) -> Hash256 {
        self.column.as_data_column().block_root()
    }

    pub fn slot(&self) -> Slot {
        self.column.as_data_column().slot()
    }

    pub fn index(&self) -> ColumnIndex {
        self.column.index()
    }

    pub fn into_inner(self) -> Arc<DataColumnSidecar> {
        self.column.into_inner()
    }
}

pub fn validate_data_column_sidecar_for_gossip<T: BeaconChainTypes, O: ObservationStrategy>(
    chain: &BeaconChain<T>,
    column: Arc<DataColumnSidecar>,
    peer_id: Option<&PeerId>,
) -> Result<GossipVerifiedDataColumn<O>, GossipDataColumnError> {
    let column_slot = column.slot();
    let proposer_index = column.block_proposer_index();

    if column.index >= chain.spec.number_of_columns {
        return Err(GossipDataColumnError::InvalidColumnIndex {
            index: column.index,
            max: chain.spec.number_of_columns,
        });
    }

    if column.column.len() != column.kzg_commitments.len()
        || column.column.len() != column.kzg_proofs.len()
    {
        return Err(GossipDataColumnError::InconsistentLengths {
            cells: column.column.len(),
            commitments: column.kzg_commitments.len(),
            proofs: column.kzg_proofs.len(),
        });
    }

    // Columns outside the custody set belong to subnets we should not be
    // subscribed to.
    if !chain.custody_context.is_custody_column(column.index) {
        return Err(GossipDataColumnError::NotCustodyColumn(column.index));
    }

    let latest_permissible_slot = chain
        .slot_clock
        .now_with_future_tolerance(chain.spec.maximum_gossip_clock_disparity())
        .ok_or(GossipDataColumnError::UnableToReadSlot)?;
    if column_slot > latest_permissible_slot {
        return Err(GossipDataColumnError::FutureSlot {
            message_slot: column_slot,
            latest_permissible_slot,
        });
    }

    let finalized_slot = chain
        .canonical_head
        .fork_choice_read_lock()
        .finalized_checkpoint()
        .epoch
        .start_slot(T::EthSpec::slots_per_epoch());
    if column_slot <= finalized_slot {
        return Err(GossipDataColumnError::PastFinalizedSlot {
            column_slot,
            finalized_slot,
        });
    }

    if chain
        .observed_column_sidecars
        .read()
        .is_known(column_slot, proposer_index, column.index)?
    {
        return Err(GossipDataColumnError::RepeatSidecar {
            proposer_index,
            slot: column_slot,
            index: column.index,
        });
    }

    let verified =
        KzgVerifiedDataColumn::new(column, chain.kzg.as_ref()).map_err(|e| match e {
            KzgError::VerificationFailed => GossipDataColumnError::InvalidKzgProof,
            other => GossipDataColumnError::KzgError(other),
        })?;

    if O::observe() {
        let previously_observed = chain.observed_column_sidecars.write().observe_sidecar(
            column_slot,
            proposer_index,
            verified.index(),
        )?;
        if previously_observed {
            return Err(GossipDataColumnError::RepeatSidecar {
                proposer_index,
                slot: column_slot,
                index: verified.index(),
            });
        }
    }

    metrics::inc_counter(&metrics::GOSSIP_DATA_COLUMNS_VERIFIED);
    tracing::debug!(
        block_root = ?verified.as_data_column().block_root(),
        index = verified.index(),
        ?peer_id,
        "Gossip data column verified"
    );

    Ok(GossipVerifiedDataColumn {
        column: verified,
        _phantom: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observed_data_sidecars::Observe;
    use crate::test_utils::ChainHarness;
    use types::{ChainSpec, Epoch, KzgCommitment};

    fn fulu_harness() -> (ChainHarness, Arc<types::SignedBeaconBlock>) {
        let mut spec = ChainSpec::minimal();
        spec.fulu_fork_epoch = Some(Epoch::new(0));
        let harness = ChainHarness::with_spec(spec);
        harness.set_slot(1);
        let block = harness.make_block(1, harness.anchor_root, vec![KzgCommitment::empty()]);
        (harness, block)
    }

    fn custody_index(harness: &ChainHarness) -> ColumnIndex {
        harness.chain.custody_context.sampling_columns()[0]
    }

    fn non_custody_index(harness: &ChainHarness) -> ColumnIndex {
        (0..harness.spec.number_of_columns)
            .find(|index| !harness.chain.custody_context.is_custody_column(*index))
            .expect("harness node is not a supernode")
    }

    #[test]
    fn accepts_custody_column() {
        let (harness, block) = fulu_harness();
        let column = harness.make_column(&block, custody_index(&harness));
        let verified =
            validate_data_column_sidecar_for_gossip::<_, Observe>(&harness.chain, column, None)
                .unwrap();
        assert_eq!(verified.block_root(), block.canonical_root());
    }

    #[test]
    fn ignores_non_custody_column() {
        let (harness, block) = fulu_harness();
        let column = harness.make_column(&block, non_custody_index(&harness));
        let err =
            validate_data_column_sidecar_for_gossip::<_, Observe>(&harness.chain, column, None)
                .unwrap_err();
        assert!(matches!(err, GossipDataColumnError::NotCustodyColumn(_)));
        assert_eq!(err.verdict(), GossipVerdict::Ignore);
    }

    #[test]
    fn rejects_out_of_matrix_index() {
        let (harness, block) = fulu_harness();
        let mut column = (*harness.make_column(&block, custody_index(&harness))).clone();
        column.index = harness.spec.number_of_columns + 1;
        let err = validate_data_column_sidecar_for_gossip::<_, Observe>(
            &harness.chain,
            Arc::new(column),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GossipDataColumnError::InvalidColumnIndex { .. }
        ));
        assert_eq!(err.verdict(), GossipVerdict::Reject);
    }

    #[test]
    fn rejects_inconsistent_lengths() {
        let (harness, block) = fulu_harness();
        let mut column = (*harness.make_column(&block, custody_index(&harness))).clone();
        column.kzg_proofs.pop();
        let err = validate_data_column_sidecar_for_gossip::<_, Observe>(
            &harness.chain,
            Arc::new(column),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GossipDataColumnError::InconsistentLengths { .. }
        ));
        assert_eq!(err.verdict(), GossipVerdict::Reject);
    }

    #[test]
    fn duplicate_column_is_ignored() {
        let (harness, block) = fulu_harness();
        let column = harness.make_column(&block, custody_index(&harness));

        validate_data_column_sidecar_for_gossip::<_, Observe>(
            &harness.chain,
            column.clone(),
            None,
        )
        .unwrap();
        let err =
            validate_data_column_sidecar_for_gossip::<_, Observe>(&harness.chain, column, None)
                .unwrap_err();
        assert!(matches!(err, GossipDataColumnError::RepeatSidecar { .. }));
    }
}
