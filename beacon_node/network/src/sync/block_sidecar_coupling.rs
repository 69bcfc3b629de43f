//! Couples a by-range blocks response with its corresponding by-range
//! blob or column responses, producing paired components once every
//! request in the set has completed.

use beacon_chain::block_input::registry::BlockInputRegistry;
use beacon_chain::block_input::{BlockInputError, SourceMeta};
use slot_clock::SlotClock;
use std::collections::HashMap;
use std::sync::Arc;
use types::{
    BlobSidecar, ColumnIndex, DataColumnSidecar, EthSpec, Hash256, SignedBeaconBlock,
};

pub type RangeRequestId = u32;

/// The DA data paired with one block of a range response.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBlockData {
    NoData,
    Blobs(Vec<Arc<BlobSidecar>>),
    Columns(Vec<Arc<DataColumnSidecar>>),
}

enum ByRangeRequest<T> {
    Active(RangeRequestId),
    Complete(T),
}

impl<T> ByRangeRequest<T> {
    fn finish(&mut self, id: RangeRequestId, data: T) -> Result<(), String> {
        match self {
            Self::Active(expected_id) => {
                if *expected_id != id {
                    return Err(format!("unexpected req_id expected {expected_id} got {id}"));
                }
                *self = Self::Complete(data);
                Ok(())
            }
            Self::Complete(_) => Err("request already complete".to_owned()),
        }
    }

    fn to_finished(&self) -> Option<&T> {
        match self {
            Self::Active(_) => None,
            Self::Complete(data) => Some(data),
        }
    }
}

enum RangeDataRequest {
    NoData,
    Blobs(ByRangeRequest<Vec<Arc<BlobSidecar>>>),
    Columns {
        requests: HashMap<RangeRequestId, ByRangeRequest<Vec<Arc<DataColumnSidecar>>>>,
        expected_custody_columns: Vec<ColumnIndex>,
    },
}

/// Blocks we have received awaiting their corresponding sidecars, and
/// sidecars awaiting their corresponding blocks.
pub struct RangeBlockComponents {
    blocks_request: ByRangeRequest<Vec<Arc<SignedBeaconBlock>>>,
    block_data_request: RangeDataRequest,
}

impl RangeBlockComponents {
    pub fn new(
        blocks_req_id: RangeRequestId,
        blobs_req_id: Option<RangeRequestId>,
        data_columns: Option<(Vec<RangeRequestId>, Vec<ColumnIndex>)>,
    ) -> Self {
        let block_data_request = if let Some(blobs_req_id) = blobs_req_id {
            RangeDataRequest::Blobs(ByRangeRequest::Active(blobs_req_id))
        } else if let Some((requests, expected_custody_columns)) = data_columns {
            RangeDataRequest::Columns {
                requests: requests
                    .into_iter()
                    .map(|id| (id, ByRangeRequest::Active(id)))
                    .collect(),
                expected_custody_columns,
            }
        } else {
            RangeDataRequest::NoData
        };

        Self {
            blocks_request: ByRangeRequest::Active(blocks_req_id),
            block_data_request,
        }
    }

    pub fn add_blocks(
        &mut self,
        req_id: RangeRequestId,
        blocks: Vec<Arc<SignedBeaconBlock>>,
    ) -> Result<(), String> {
        self.blocks_request.finish(req_id, blocks)
    }

    pub fn add_blobs(
        &mut self,
        req_id: RangeRequestId,
        blobs: Vec<Arc<BlobSidecar>>,
    ) -> Result<(), String> {
        match &mut self.block_data_request {
            RangeDataRequest::NoData => Err("received blobs but expected no data".to_owned()),
            RangeDataRequest::Blobs(request) => request.finish(req_id, blobs),
            RangeDataRequest::Columns { .. } => {
                Err("received blobs but expected data columns".to_owned())
            }
        }
    }

    pub fn add_custody_columns(
        &mut self,
        req_id: RangeRequestId,
        columns: Vec<Arc<DataColumnSidecar>>,
    ) -> Result<(), String> {
        match &mut self.block_data_request {
            RangeDataRequest::NoData => {
                Err("received data columns but expected no data".to_owned())
            }
            RangeDataRequest::Blobs(_) => {
                Err("received data columns but expected blobs".to_owned())
            }
            RangeDataRequest::Columns { requests, .. } => {
                let request = requests
                    .get_mut(&req_id)
                    .ok_or(format!("unknown data columns by range req_id {req_id}"))?;
                request.finish(req_id, columns)
            }
        }
    }

    /// Returns `None` while any request in the set is outstanding. Once
    /// everything landed, pairs each block with its data or fails if the
    /// responses do not couple.
    #[allow(clippy::type_complexity)]
    pub fn responses(
        &self,
    ) -> Option<Result<Vec<(Arc<SignedBeaconBlock>, RangeBlockData)>, String>> {
        let blocks = self.blocks_request.to_finished()?;

        match &self.block_data_request {
            RangeDataRequest::NoData => Some(Ok(blocks
                .iter()
                .map(|block| (block.clone(), RangeBlockData::NoData))
                .collect())),
            RangeDataRequest::Blobs(request) => {
                let blobs = request.to_finished()?;
                Some(Self::pair_blobs(blocks, blobs))
            }
            RangeDataRequest::Columns {
                requests,
                expected_custody_columns,
            } => {
                let mut data_columns = vec![];
                for request in requests.values() {
                    data_columns.extend(request.to_finished()?.iter().cloned());
                }
                Some(Self::pair_columns(
                    blocks,
                    data_columns,
                    expected_custody_columns,
                ))
            }
        }
    }

    /// Blobs arrive slot-ordered; pair them to blocks by slot. Any blob
    /// for a slot without a block (or left over at the end) is an error.
    fn pair_blobs(
        blocks: &[Arc<SignedBeaconBlock>],
        blobs: &[Arc<BlobSidecar>],
    ) -> Result<Vec<(Arc<SignedBeaconBlock>, RangeBlockData)>, String> {
        let mut responses = Vec::with_capacity(blocks.len());
        let mut blob_iter = blobs.iter().peekable();

        for block in blocks {
            let mut blob_list = vec![];
            while blob_iter
                .peek()
                .is_some_and(|sidecar| sidecar.slot() == block.slot())
            {
                blob_list.push(blob_iter.next().expect("peeked entry exists").clone());
            }

            let mut seen_indices = std::collections::HashSet::new();
            for blob in &blob_list {
                if !seen_indices.insert(blob.index) {
                    return Err(format!(
                        "repeat blob index {} at slot {}",
                        blob.index,
                        block.slot()
                    ));
                }
            }

            responses.push((
                block.clone(),
                if blob_list.is_empty() {
                    RangeBlockData::NoData
                } else {
                    RangeBlockData::Blobs(blob_list)
                },
            ));
        }

        if let Some(stray) = blob_iter.next() {
            return Err(format!(
                "blob at slot {} does not pair with any block",
                stray.slot()
            ));
        }

        Ok(responses)
    }

    /// Columns pair to blocks by root; every expected custody column must
    /// be present for every block carrying data, and nothing may be left
    /// over.
    fn pair_columns(
        blocks: &[Arc<SignedBeaconBlock>],
        data_columns: Vec<Arc<DataColumnSidecar>>,
        expected_custody_columns: &[ColumnIndex],
    ) -> Result<Vec<(Arc<SignedBeaconBlock>, RangeBlockData)>, String> {
        let mut columns_by_block: HashMap<Hash256, HashMap<ColumnIndex, Arc<DataColumnSidecar>>> =
            HashMap::new();

        for column in data_columns {
            let block_root = column.block_root();
            let index = column.index;
            if columns_by_block
                .entry(block_root)
                .or_default()
                .insert(index, column)
                .is_some()
            {
                return Err(format!(
                    "repeated column block_root {block_root:?} index {index}"
                ));
            }
        }

        let mut responses = Vec::with_capacity(blocks.len());
        for block in blocks {
            let block_root = block.canonical_root();
            responses.push((
                block.clone(),
                if block.num_expected_blobs() > 0 {
                    let Some(mut columns_by_index) = columns_by_block.remove(&block_root) else {
                        return Err(format!("no columns for block {block_root:?} with data"));
                    };

                    let mut custody_columns = vec![];
                    for index in expected_custody_columns {
                        let Some(column) = columns_by_index.remove(index) else {
                            return Err(format!(
                                "no column for block {block_root:?} index {index}"
                            ));
                        };
                        custody_columns.push(column);
                    }

                    if !columns_by_index.is_empty() {
                        let remaining = columns_by_index.keys().collect::<Vec<_>>();
                        return Err(format!(
                            "not all columns consumed for block {block_root:?}: {remaining:?}"
                        ));
                    }

                    RangeBlockData::Columns(custody_columns)
                } else {
                    RangeBlockData::NoData
                },
            ));
        }

        if !columns_by_block.is_empty() {
            let remaining = columns_by_block.keys().collect::<Vec<_>>();
            return Err(format!("not all columns consumed: {remaining:?}"));
        }

        Ok(responses)
    }
}

/// Feed a completed, paired range response into the block input registry.
pub fn import_range_components<E: EthSpec, S: SlotClock>(
    registry: &BlockInputRegistry<E, S>,
    components: Vec<(Arc<SignedBeaconBlock>, RangeBlockData)>,
    source: SourceMeta,
) -> Result<(), BlockInputError> {
    for (block, data) in components {
        registry.add_block(block, source.clone(), false)?;
        match data {
            RangeBlockData::NoData => {}
            RangeBlockData::Blobs(blobs) => {
                for blob in blobs {
                    registry.add_blob(blob, source.clone())?;
                }
            }
            RangeBlockData::Columns(columns) => {
                for column in columns {
                    registry.add_column(column, source.clone())?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_chain::test_utils::{ChainHarness, make_block_raw};
    use types::{KzgCommitment, KzgProof};

    fn block_with_blobs(slot: u64, blobs: usize) -> Arc<SignedBeaconBlock> {
        Arc::new(make_block_raw(
            slot,
            types::Hash256::repeat_byte(slot as u8),
            vec![KzgCommitment::empty(); blobs],
        ))
    }

    fn blob_for(block: &SignedBeaconBlock, index: u64) -> Arc<BlobSidecar> {
        Arc::new(BlobSidecar {
            index,
            blob: kzg::Blob::new(vec![0; 8]),
            kzg_commitment: KzgCommitment::empty(),
            kzg_proof: KzgProof::empty(),
            signed_block_header: block.signed_block_header(),
        })
    }

    fn column_for(block: &SignedBeaconBlock, index: ColumnIndex) -> Arc<DataColumnSidecar> {
        let blobs = block.num_expected_blobs();
        Arc::new(DataColumnSidecar {
            index,
            column: vec![kzg::Cell::new(vec![0; 8]); blobs],
            kzg_commitments: block.message().body.blob_kzg_commitments.clone(),
            kzg_proofs: vec![KzgProof::empty(); blobs],
            signed_block_header: block.signed_block_header(),
        })
    }

    #[test]
    fn blocks_without_data_complete_immediately() {
        let blocks = vec![block_with_blobs(1, 0), block_with_blobs(2, 0)];
        let mut info = RangeBlockComponents::new(1, None, None);
        assert!(info.responses().is_none());

        info.add_blocks(1, blocks).unwrap();
        let responses = info.responses().unwrap().unwrap();
        assert_eq!(responses.len(), 2);
        assert!(
            responses
                .iter()
                .all(|(_, data)| *data == RangeBlockData::NoData)
        );
    }

    #[test]
    fn empty_blob_response_pairs_with_expired_data() {
        let blocks = vec![block_with_blobs(1, 2)];
        let mut info = RangeBlockComponents::new(1, Some(2), None);

        info.add_blocks(1, blocks).unwrap();
        assert!(info.responses().is_none());

        // The peer returned no blobs (e.g. past the DA horizon); pairing
        // still succeeds with empty data.
        info.add_blobs(2, vec![]).unwrap();
        let responses = info.responses().unwrap().unwrap();
        assert_eq!(responses[0].1, RangeBlockData::NoData);
    }

    #[test]
    fn blobs_pair_by_slot() {
        let block_1 = block_with_blobs(1, 2);
        let block_2 = block_with_blobs(2, 1);
        let blobs = vec![
            blob_for(&block_1, 0),
            blob_for(&block_1, 1),
            blob_for(&block_2, 0),
        ];

        let mut info = RangeBlockComponents::new(1, Some(2), None);
        info.add_blocks(1, vec![block_1, block_2]).unwrap();
        info.add_blobs(2, blobs).unwrap();

        let responses = info.responses().unwrap().unwrap();
        match &responses[0].1 {
            RangeBlockData::Blobs(blobs) => assert_eq!(blobs.len(), 2),
            other => panic!("expected blobs, got {other:?}"),
        }
        match &responses[1].1 {
            RangeBlockData::Blobs(blobs) => assert_eq!(blobs.len(), 1),
            other => panic!("expected blobs, got {other:?}"),
        }
    }

    #[test]
    fn stray_blobs_fail_the_coupling() {
        let block = block_with_blobs(1, 1);
        let stray_block = block_with_blobs(9, 1);
        let mut info = RangeBlockComponents::new(1, Some(2), None);

        info.add_blocks(1, vec![block.clone()]).unwrap();
        info.add_blobs(2, vec![blob_for(&block, 0), blob_for(&stray_block, 0)])
            .unwrap();

        assert!(info.responses().unwrap().is_err());
    }

    #[test]
    fn columns_couple_across_batched_requests() {
        let expected_columns = vec![1_u64, 2, 3, 4];
        let blocks = vec![block_with_blobs(1, 1), block_with_blobs(2, 1)];

        let mut info = RangeBlockComponents::new(
            0,
            None,
            Some((vec![1, 2], expected_columns.clone())),
        );
        info.add_blocks(0, blocks.clone()).unwrap();
        assert!(info.responses().is_none());

        // Columns 1 and 2 arrive in one batch, 3 and 4 in another.
        info.add_custody_columns(
            1,
            blocks
                .iter()
                .flat_map(|b| [column_for(b, 1), column_for(b, 2)])
                .collect(),
        )
        .unwrap();
        assert!(info.responses().is_none());

        info.add_custody_columns(
            2,
            blocks
                .iter()
                .flat_map(|b| [column_for(b, 3), column_for(b, 4)])
                .collect(),
        )
        .unwrap();

        let responses = info.responses().unwrap().unwrap();
        for (_block, data) in &responses {
            match data {
                RangeBlockData::Columns(columns) => {
                    let indices: Vec<_> = columns.iter().map(|c| c.index).collect();
                    assert_eq!(indices, expected_columns);
                }
                other => panic!("expected columns, got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_custody_column_fails_the_coupling() {
        let blocks = vec![block_with_blobs(1, 1)];
        let mut info = RangeBlockComponents::new(0, None, Some((vec![1], vec![1, 2])));

        info.add_blocks(0, blocks.clone()).unwrap();
        info.add_custody_columns(1, vec![column_for(&blocks[0], 1)])
            .unwrap();

        assert!(info.responses().unwrap().is_err());
    }

    #[test]
    fn unknown_request_ids_are_rejected() {
        let mut info = RangeBlockComponents::new(7, Some(8), None);
        assert!(info.add_blocks(9, vec![]).is_err());
        assert!(info.add_blobs(9, vec![]).is_err());
    }

    #[test]
    fn paired_components_feed_the_registry() {
        let harness = ChainHarness::new();
        harness.set_slot(8);

        let block = harness.make_block(
            1,
            harness.anchor_root,
            vec![KzgCommitment::empty()],
        );
        let blob = harness.make_blob(&block, 0);

        let mut info = RangeBlockComponents::new(1, Some(2), None);
        info.add_blocks(1, vec![block.clone()]).unwrap();
        info.add_blobs(2, vec![blob]).unwrap();
        let components = info.responses().unwrap().unwrap();

        import_range_components(
            &harness.chain.block_input_registry,
            components,
            harness.gossip_source("range-peer"),
        )
        .unwrap();

        let input = harness
            .chain
            .block_input_registry
            .get(&block.canonical_root())
            .unwrap();
        assert!(input.has_block_and_all_data());
    }
}
