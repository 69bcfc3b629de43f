use crate::{
    DBColumn, Error, KeyValueStore, KeyValueStoreOp, StoreItem, get_key_for_col, metrics, slot_key,
};
use ssz::{Decode, Encode};
use tracing::debug;
use types::{
    BeaconState, BlobSidecarList, DataColumnSidecarList, Hash256, SignedBeaconBlock, Slot,
};

/// Singleton key for the persisted fork choice.
const FORK_CHOICE_KEY: &[u8] = b"fork_choice";

/// The split store: non-finalized ("hot") blocks and their sidecars keyed
/// by root, finalized ("archive") blocks and states keyed by slot.
pub struct HotColdDB<S: KeyValueStore> {
    db: S,
}

impl<S: KeyValueStore> HotColdDB<S> {
    pub fn new(db: S) -> Self {
        Self { db }
    }

    /*
     * Hot store: blocks and sidecars by root.
     */

    pub fn put_block(&self, block_root: &Hash256, block: &SignedBeaconBlock) -> Result<(), Error> {
        metrics::inc_counter(&metrics::STORE_BEACON_BLOCK_WRITES);
        self.db.put_bytes(
            DBColumn::BeaconBlock,
            block_root.as_slice(),
            &block.as_store_bytes(),
        )
    }

    pub fn get_block(&self, block_root: &Hash256) -> Result<Option<SignedBeaconBlock>, Error> {
        self.db
            .get_bytes(DBColumn::BeaconBlock, block_root.as_slice())?
            .map(|bytes| SignedBeaconBlock::from_store_bytes(&bytes))
            .transpose()
    }

    pub fn block_exists(&self, block_root: &Hash256) -> Result<bool, Error> {
        self.db
            .key_exists(DBColumn::BeaconBlock, block_root.as_slice())
    }

    pub fn put_blobs(&self, block_root: &Hash256, blobs: &BlobSidecarList) -> Result<(), Error> {
        self.db.put_bytes(
            DBColumn::BlobSidecar,
            block_root.as_slice(),
            &blobs.as_ssz_bytes(),
        )
    }

    pub fn get_blobs(&self, block_root: &Hash256) -> Result<Option<BlobSidecarList>, Error> {
        self.db
            .get_bytes(DBColumn::BlobSidecar, block_root.as_slice())?
            .map(|bytes| BlobSidecarList::from_ssz_bytes(&bytes).map_err(Into::into))
            .transpose()
    }

    pub fn put_data_columns(
        &self,
        block_root: &Hash256,
        columns: &DataColumnSidecarList,
    ) -> Result<(), Error> {
        self.db.put_bytes(
            DBColumn::DataColumnSidecar,
            block_root.as_slice(),
            &columns.as_ssz_bytes(),
        )
    }

    pub fn get_data_columns(
        &self,
        block_root: &Hash256,
    ) -> Result<Option<DataColumnSidecarList>, Error> {
        self.db
            .get_bytes(DBColumn::DataColumnSidecar, block_root.as_slice())?
            .map(|bytes| DataColumnSidecarList::from_ssz_bytes(&bytes).map_err(Into::into))
            .transpose()
    }

    /*
     * Archive store: blocks and states by slot.
     */

    pub fn put_archive_block(&self, block: &SignedBeaconBlock) -> Result<(), Error> {
        metrics::inc_counter(&metrics::STORE_ARCHIVE_BLOCK_WRITES);
        self.db.put_bytes(
            DBColumn::ArchiveBlock,
            &slot_key(block.slot()),
            &block.as_store_bytes(),
        )
    }

    pub fn get_archive_block(&self, slot: Slot) -> Result<Option<SignedBeaconBlock>, Error> {
        self.db
            .get_bytes(DBColumn::ArchiveBlock, &slot_key(slot))?
            .map(|bytes| SignedBeaconBlock::from_store_bytes(&bytes))
            .transpose()
    }

    /// Return archive blocks with `start_slot <= slot < start_slot + count`
    /// in ascending slot order. Skipped slots yield no entry.
    pub fn get_archive_blocks_by_range(
        &self,
        start_slot: Slot,
        count: u64,
    ) -> Result<Vec<SignedBeaconBlock>, Error> {
        let end_slot = Slot::new(start_slot.as_u64().saturating_add(count));
        self.db
            .iter_range(DBColumn::ArchiveBlock, &slot_key(start_slot), &slot_key(end_slot))?
            .into_iter()
            .map(|(_key, bytes)| SignedBeaconBlock::from_store_bytes(&bytes))
            .collect()
    }

    pub fn put_archive_state(&self, state: &BeaconState) -> Result<(), Error> {
        self.db.put_bytes(
            DBColumn::ArchiveState,
            &slot_key(state.slot),
            &state.as_store_bytes(),
        )
    }

    pub fn get_archive_state(&self, slot: Slot) -> Result<Option<BeaconState>, Error> {
        self.db
            .get_bytes(DBColumn::ArchiveState, &slot_key(slot))?
            .map(|bytes| BeaconState::from_store_bytes(&bytes))
            .transpose()
    }

    /// Move a block (and drop its sidecars) from the hot store to the
    /// archive, atomically.
    pub fn migrate_block_to_archive(&self, block_root: &Hash256) -> Result<(), Error> {
        let block = self
            .get_block(block_root)?
            .ok_or(Error::BlockNotFound(*block_root))?;

        metrics::inc_counter(&metrics::STORE_ARCHIVE_BLOCK_WRITES);
        self.db.do_atomically(vec![
            KeyValueStoreOp::PutKeyValue(
                get_key_for_col(DBColumn::ArchiveBlock, &slot_key(block.slot())),
                block.as_store_bytes(),
            ),
            KeyValueStoreOp::DeleteKey(get_key_for_col(
                DBColumn::BeaconBlock,
                block_root.as_slice(),
            )),
            KeyValueStoreOp::DeleteKey(get_key_for_col(
                DBColumn::BlobSidecar,
                block_root.as_slice(),
            )),
            KeyValueStoreOp::DeleteKey(get_key_for_col(
                DBColumn::DataColumnSidecar,
                block_root.as_slice(),
            )),
        ])
    }

    /// Delete a non-finalized block and its sidecars, e.g. after it has
    /// been orphaned by finality.
    pub fn delete_block(&self, block_root: &Hash256) -> Result<(), Error> {
        self.db.do_atomically(vec![
            KeyValueStoreOp::DeleteKey(get_key_for_col(
                DBColumn::BeaconBlock,
                block_root.as_slice(),
            )),
            KeyValueStoreOp::DeleteKey(get_key_for_col(
                DBColumn::BlobSidecar,
                block_root.as_slice(),
            )),
            KeyValueStoreOp::DeleteKey(get_key_for_col(
                DBColumn::DataColumnSidecar,
                block_root.as_slice(),
            )),
        ])
    }

    /// Batch-delete all archive block and state rows strictly below
    /// `cutoff_slot`. Returns the number of rows removed.
    pub fn prune_archive_below(&self, cutoff_slot: Slot) -> Result<usize, Error> {
        let mut batch = vec![];

        for column in [DBColumn::ArchiveBlock, DBColumn::ArchiveState] {
            for (key, _value) in
                self.db
                    .iter_range(column, &slot_key(Slot::new(0)), &slot_key(cutoff_slot))?
            {
                batch.push(KeyValueStoreOp::DeleteKey(get_key_for_col(column, &key)));
            }
        }

        let deleted = batch.len();
        if deleted > 0 {
            debug!(rows = deleted, %cutoff_slot, "Pruning archive rows");
            self.db.do_atomically(batch)?;
            metrics::inc_counter_by(&metrics::STORE_PRUNED_ROWS, deleted as u64);
        }

        Ok(deleted)
    }

    /// Lowest slot for which an archive block row exists.
    pub fn oldest_archive_block_slot(&self) -> Result<Option<Slot>, Error> {
        Ok(self
            .db
            .iter_range(
                DBColumn::ArchiveBlock,
                &slot_key(Slot::new(0)),
                &slot_key(Slot::max_value()),
            )?
            .first()
            .map(|(key, _)| {
                let mut bytes = [0_u8; 8];
                bytes.copy_from_slice(&key[..8]);
                Slot::new(u64::from_be_bytes(bytes))
            }))
    }

    /*
     * Fork choice persistence.
     */

    pub fn put_fork_choice_bytes(&self, bytes: &[u8]) -> Result<(), Error> {
        self.db
            .put_bytes(DBColumn::ForkChoice, FORK_CHOICE_KEY, bytes)
    }

    pub fn get_fork_choice_bytes(&self) -> Result<Option<Vec<u8>>, Error> {
        self.db.get_bytes(DBColumn::ForkChoice, FORK_CHOICE_KEY)
    }
}
