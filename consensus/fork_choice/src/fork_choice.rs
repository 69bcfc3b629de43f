use crate::ForkChoiceStore;
use crate::metrics;
use proto_array::{
    Block as ProtoBlock, ExecutionStatus, InvalidationOperation, ProtoArrayForkChoice,
};
use ssz::{Decode, Encode};
use ssz_derive::{Decode, Encode};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;
use types::{
    BeaconState, Checkpoint, Epoch, EthSpec, ExecutionBlockHash, FixedBytesExtended, Hash256,
    IndexedAttestation, SignedBeaconBlock, Slot,
};

/// The number of intervals per slot: the proposer boost window is the
/// first interval.
pub const INTERVALS_PER_SLOT: u64 = 3;

#[derive(Debug)]
pub enum Error<T> {
    InvalidAttestation(InvalidAttestation),
    InvalidBlock(InvalidBlock),
    ProtoArrayStringError(String),
    ProtoArrayError(proto_array::Error),
    InvalidProtoArrayBytes(String),
    MissingProtoArrayBlock(Hash256),
    InconsistentOnTick {
        previous_slot: Slot,
        time: Slot,
    },
    ForkChoiceStoreError(T),
    UnableToSetJustifiedCheckpoint(T),
    AfterBlockFailed(T),
    InvalidAnchor {
        block_slot: Slot,
        state_slot: Slot,
    },
    InvalidPayloadStatus {
        block_slot: Slot,
        block_root: Hash256,
        payload_verification_status: PayloadVerificationStatus,
    },
    MissingJustifiedBlock {
        justified_checkpoint: Checkpoint,
    },
    MissingFinalizedBlock {
        finalized_checkpoint: Checkpoint,
    },
    FailedToProcessInvalidExecutionPayload(String),
    FailedToProcessValidExecutionPayload(String),
}

impl<T> From<InvalidAttestation> for Error<T> {
    fn from(e: InvalidAttestation) -> Self {
        Error::InvalidAttestation(e)
    }
}

impl<T> From<String> for Error<T> {
    fn from(e: String) -> Self {
        Error::ProtoArrayStringError(e)
    }
}

impl<T> From<proto_array::Error> for Error<T> {
    fn from(e: proto_array::Error) -> Self {
        Error::ProtoArrayError(e)
    }
}

#[derive(Debug)]
pub enum InvalidBlock {
    UnknownParent(Hash256),
    FutureSlot {
        current_slot: Slot,
        block_slot: Slot,
    },
    FinalizedSlot {
        finalized_slot: Slot,
        block_slot: Slot,
    },
    NotFinalizedDescendant {
        finalized_root: Hash256,
        block_ancestor: Option<Hash256>,
    },
}

#[derive(Debug)]
pub enum InvalidAttestation {
    /// The attestations aggregation bits were empty when they shouldn't be.
    EmptyAggregationBitfield,
    /// The `attestation.data.beacon_block_root` block is unknown.
    UnknownHeadBlock { beacon_block_root: Hash256 },
    /// The `attestation.data.slot` is not from the same epoch as
    /// `data.target.epoch` and therefore the attestation is invalid.
    BadTargetEpoch { target: Epoch, slot: Slot },
    /// The target root of the attestation points to a block that we have
    /// not verified.
    UnknownTargetRoot(Hash256),
    /// The attestation is for an epoch in the future (with respect to the
    /// gossip clock disparity).
    FutureEpoch {
        attestation_epoch: Epoch,
        current_epoch: Epoch,
    },
    /// The attestation is for an epoch in the past (with respect to the
    /// gossip clock disparity).
    PastEpoch {
        attestation_epoch: Epoch,
        current_epoch: Epoch,
    },
    /// The attestation references a target root that does not match what
    /// is stored in our database.
    InvalidTarget {
        attestation: Hash256,
        local: Hash256,
    },
    /// The attestation is attesting to a state that is later than itself.
    /// (Viz., attesting to the future).
    AttestsToFutureBlock { block: Slot, attestation: Slot },
}

/// Indicates if a block has been verified by an execution payload.
///
/// There is no variant for "invalid", since such a block should never be
/// added to fork choice.
#[derive(Clone, Copy, Debug, PartialEq, Encode, Decode)]
#[ssz(enum_behaviour = "tag")]
pub enum PayloadVerificationStatus {
    /// An EL has declared the execution payload to be valid.
    Verified,
    /// An EL has not yet made a determination about the execution payload.
    Optimistic,
    /// The block is either pre-merge-fork, or prior to the terminal PoW
    /// block.
    Irrelevant,
}

impl PayloadVerificationStatus {
    /// Returns `true` if the payload was optimistically imported.
    pub fn is_optimistic(&self) -> bool {
        match self {
            PayloadVerificationStatus::Verified => false,
            PayloadVerificationStatus::Optimistic => true,
            PayloadVerificationStatus::Irrelevant => false,
        }
    }
}

/// Calculate the first slot in `epoch`.
fn compute_start_slot_at_epoch<E: EthSpec>(epoch: Epoch) -> Slot {
    epoch.start_slot(E::slots_per_epoch())
}

/// Used for queuing attestations from the current slot. Only contains the
/// minimum necessary information about the attestation.
#[derive(Clone, PartialEq, Encode, Decode)]
pub struct QueuedAttestation {
    slot: Slot,
    attesting_indices: Vec<u64>,
    block_root: Hash256,
    target_epoch: Epoch,
}

impl From<&IndexedAttestation> for QueuedAttestation {
    fn from(a: &IndexedAttestation) -> Self {
        Self {
            slot: a.data.slot,
            attesting_indices: a.attesting_indices.clone(),
            block_root: a.data.beacon_block_root,
            target_epoch: a.data.target.epoch,
        }
    }
}

/// Returns all values in `self.queued_attestations` that have a slot that
/// is earlier than the current slot. Also removes those values from
/// `self.queued_attestations`.
fn dequeue_attestations(
    current_slot: Slot,
    queued_attestations: &mut Vec<QueuedAttestation>,
) -> Vec<QueuedAttestation> {
    let remaining = queued_attestations.split_off(
        queued_attestations
            .iter()
            .position(|a| a.slot >= current_slot)
            .unwrap_or(queued_attestations.len()),
    );

    metrics::inc_counter_by(
        &metrics::FORK_CHOICE_DEQUEUED_ATTESTATIONS,
        queued_attestations.len() as u64,
    );

    std::mem::replace(queued_attestations, remaining)
}

/// Denotes whether an attestation we are processing was received from a
/// block or from gossip. Equivalent to the `is_from_block` `bool` in:
///
/// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/fork-choice.md#validate_on_attestation
#[derive(Clone, Copy)]
pub enum AttestationFromBlock {
    True,
    False,
}

/// Parameters which are cached between calls to `ForkChoice::get_head`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkchoiceUpdateParameters {
    /// The most recent result of running `ForkChoice::get_head`.
    pub head_root: Hash256,
    pub head_hash: Option<ExecutionBlockHash>,
    pub justified_hash: Option<ExecutionBlockHash>,
    pub finalized_hash: Option<ExecutionBlockHash>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForkChoiceView {
    pub head_block_root: Hash256,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}

/// Provides an implementation of "Ethereum 2.0 Phase 0 -- Beacon Chain
/// Fork Choice":
///
/// https://github.com/ethereum/eth2.0-specs/blob/v0.12.1/specs/phase0/fork-choice.md#ethereum-20-phase-0----beacon-chain-fork-choice
///
/// ## Detail
///
/// This struct wraps `ProtoArrayForkChoice` and provides:
///
/// - Management of the justified state and caching of balances.
/// - Queuing of attestations from the current slot.
pub struct ForkChoice<T, E> {
    /// Storage for `ForkChoice`, modelled off the spec `Store` object.
    fc_store: T,
    /// The underlying representation of the block DAG.
    proto_array: ProtoArrayForkChoice,
    /// Attestations that arrived at the current slot and must be queued
    /// for later processing.
    queued_attestations: Vec<QueuedAttestation>,
    /// Stores a cache of the values required to be sent to the execution
    /// layer.
    forkchoice_update_parameters: ForkchoiceUpdateParameters,
    _phantom: PhantomData<E>,
}

impl<T, E> ForkChoice<T, E>
where
    T: ForkChoiceStore<E>,
    E: EthSpec,
{
    /// Instantiates `Self` from an anchor (genesis or another finalized
    /// checkpoint).
    pub fn from_anchor(
        fc_store: T,
        anchor_block_root: Hash256,
        anchor_block: &SignedBeaconBlock,
        anchor_state: &BeaconState,
        current_slot: Option<Slot>,
        spec: &types::ChainSpec,
    ) -> Result<Self, Error<T::Error>> {
        // Sanity check: the anchor must lie on an epoch boundary.
        if anchor_state.slot % E::slots_per_epoch() != 0 {
            return Err(Error::InvalidAnchor {
                block_slot: anchor_block.slot(),
                state_slot: anchor_state.slot,
            });
        }

        let finalized_block_slot = anchor_block.slot();
        let finalized_block_state_root = anchor_block.state_root();

        let execution_block_hash = anchor_block.message().body.execution_block_hash;
        let execution_status = if execution_block_hash == ExecutionBlockHash::zero() {
            // A zero payload hash means execution is not yet enabled.
            ExecutionStatus::irrelevant()
        } else {
            // Assume that this payload is valid, since the anchor should be
            // a trusted block and state.
            ExecutionStatus::Valid(execution_block_hash)
        };

        // If the current slot is not provided, use the value that was last
        // provided to the store.
        let current_slot = current_slot.unwrap_or_else(|| fc_store.get_current_slot());

        let proto_array = ProtoArrayForkChoice::new::<E>(
            current_slot,
            finalized_block_slot,
            finalized_block_state_root,
            *fc_store.justified_checkpoint(),
            *fc_store.finalized_checkpoint(),
            execution_status,
        )?;

        let mut fork_choice = Self {
            fc_store,
            proto_array,
            queued_attestations: vec![],
            forkchoice_update_parameters: ForkchoiceUpdateParameters {
                head_hash: None,
                justified_hash: None,
                finalized_hash: None,
                // This will be updated during the next call to
                // `Self::get_head`.
                head_root: Hash256::zero(),
            },
            _phantom: PhantomData,
        };

        // Ensure that `fork_choice.forkchoice_update_parameters.head_root`
        // is updated.
        let head_root = fork_choice.get_head(current_slot, spec)?;
        debug!(?anchor_block_root, ?head_root, "Fork choice initialized");

        Ok(fork_choice)
    }

    /// Returns cached information that can be used to issue a
    /// `forkchoiceUpdated` message to an execution engine.
    ///
    /// These values are updated each time `Self::get_head` is called.
    pub fn get_forkchoice_update_parameters(&self) -> ForkchoiceUpdateParameters {
        self.forkchoice_update_parameters
    }

    /// Returns the block root of an ancestor of `block_root` at the given
    /// `slot`. (Note: `slot` refers to the block that is *returned*, not
    /// the one that is supplied.)
    ///
    /// The result may be `Ok(None)` if the block does not descend from the
    /// finalized block. This is an artifact of proto-array, sometimes it
    /// contains descendants of blocks that have been pruned.
    pub fn get_ancestor(
        &self,
        block_root: Hash256,
        ancestor_slot: Slot,
    ) -> Result<Option<Hash256>, Error<T::Error>> {
        let block = self
            .proto_array
            .get_block(&block_root)
            .ok_or(Error::MissingProtoArrayBlock(block_root))?;

        match block.slot.cmp(&ancestor_slot) {
            Ordering::Greater => Ok(self
                .proto_array
                .core_proto_array()
                .iter_block_roots(&block_root)
                // Search for a slot that is **less than or equal to** the
                // target slot. We check for lower slots to account for skip
                // slots.
                .find(|(_, slot)| *slot <= ancestor_slot)
                .map(|(root, _)| root)),
            // Root is older than queried slot, thus a skip slot. Return
            // most recent root prior to slot.
            Ordering::Less => Ok(Some(block_root)),
            Ordering::Equal => Ok(Some(block_root)),
        }
    }

    /// Run the fork choice rule to determine the head.
    ///
    /// ## Specification
    ///
    /// Is equivalent to:
    ///
    /// https://github.com/ethereum/eth2.0-specs/blob/v0.12.1/specs/phase0/fork-choice.md#get_head
    pub fn get_head(
        &mut self,
        system_time_current_slot: Slot,
        spec: &types::ChainSpec,
    ) -> Result<Hash256, Error<T::Error>> {
        // Provide the slot (as per the system clock) to the `fc_store` and
        // then return its view of the current slot. The `fc_store` will
        // ensure that the `current_slot` is never decreasing, a property
        // which we must maintain.
        let current_slot = self.update_time(system_time_current_slot)?;

        let store = &mut self.fc_store;

        let head_root = self.proto_array.find_head::<E>(
            *store.justified_checkpoint(),
            *store.finalized_checkpoint(),
            store.justified_balances(),
            store.proposer_boost_root(),
            store.equivocating_indices(),
            current_slot,
            spec,
        )?;

        // Cache some values for the next forkchoiceUpdate call to the
        // execution layer.
        let head_hash = self
            .get_block(&head_root)
            .and_then(|b| b.execution_status.block_hash());
        let justified_root = self.justified_checkpoint().root;
        let finalized_root = self.finalized_checkpoint().root;
        let justified_hash = self
            .get_block(&justified_root)
            .and_then(|b| b.execution_status.block_hash());
        let finalized_hash = self
            .get_block(&finalized_root)
            .and_then(|b| b.execution_status.block_hash());
        self.forkchoice_update_parameters = ForkchoiceUpdateParameters {
            head_root,
            head_hash,
            justified_hash,
            finalized_hash,
        };

        metrics::set_gauge(&metrics::FORK_CHOICE_NODES, self.proto_array.len() as i64);

        Ok(head_root)
    }

    /// Return information about:
    ///
    /// - The LMD head of the chain.
    /// - The FFG checkpoints.
    ///
    /// The information is "cached" since the last call to
    /// `Self::get_head`.
    pub fn cached_fork_choice_view(&self) -> ForkChoiceView {
        ForkChoiceView {
            head_block_root: self.forkchoice_update_parameters.head_root,
            justified_checkpoint: self.justified_checkpoint(),
            finalized_checkpoint: self.finalized_checkpoint(),
        }
    }

    /// See `ProtoArrayForkChoice::process_execution_payload_validation`
    /// for documentation.
    pub fn on_valid_execution_payload(
        &mut self,
        block_root: Hash256,
    ) -> Result<(), Error<T::Error>> {
        self.proto_array
            .process_execution_payload_validation(block_root)
            .map_err(Error::FailedToProcessValidExecutionPayload)
    }

    /// See `ProtoArrayForkChoice::process_execution_payload_invalidation`
    /// for documentation.
    pub fn on_invalid_execution_payload(
        &mut self,
        op: &InvalidationOperation,
    ) -> Result<(), Error<T::Error>> {
        self.proto_array
            .process_execution_payload_invalidation(op)
            .map_err(Error::FailedToProcessInvalidExecutionPayload)
    }

    /// Add `block` to the fork choice DAG.
    ///
    /// - `block_root` is the root of `block.
    /// - The root of `state` matches `block.state_root`.
    ///
    /// ## Specification
    ///
    /// Approximates:
    ///
    /// https://github.com/ethereum/eth2.0-specs/blob/v0.12.1/specs/phase0/fork-choice.md#on_block
    ///
    /// It only approximates the specification since it does not run the
    /// `state_transition` check. That should have already been called
    /// upstream and it's too expensive to call again.
    ///
    /// ## Notes:
    ///
    /// The supplied block **must** pass the `state_transition` function as
    /// it will not be run here.
    pub fn on_block(
        &mut self,
        system_time_current_slot: Slot,
        block: &SignedBeaconBlock,
        block_root: Hash256,
        block_delay: Duration,
        state: &BeaconState,
        payload_verification_status: PayloadVerificationStatus,
        spec: &types::ChainSpec,
    ) -> Result<(), Error<T::Error>> {
        let _timer = metrics::start_timer(&metrics::FORK_CHOICE_ON_BLOCK_TIMES);

        // If this block has already been processed we do not need to
        // reprocess it. We check this immediately in case re-processing the
        // block mutates some property of the global fork choice store,
        // e.g. the justified checkpoints or the proposer boost root.
        if self.proto_array.contains_block(&block_root) {
            return Ok(());
        }

        // Provide the slot (as per the system clock) to the `fc_store` and
        // then return its view of the current slot.
        let current_slot = self.update_time(system_time_current_slot)?;

        // Parent block must be known.
        let parent_root = block.parent_root();
        if !self.proto_array.contains_block(&parent_root) {
            return Err(Error::InvalidBlock(InvalidBlock::UnknownParent(
                parent_root,
            )));
        }

        // Blocks cannot be in the future. If they are, their consideration
        // must be delayed until they are in the past.
        //
        // Note: presently, we do not delay consideration. We just drop the
        // block.
        if block.slot() > current_slot {
            return Err(Error::InvalidBlock(InvalidBlock::FutureSlot {
                current_slot,
                block_slot: block.slot(),
            }));
        }

        // Check that block is later than the finalized epoch slot
        // (optimization to reduce calls to get_ancestor).
        let finalized_slot =
            compute_start_slot_at_epoch::<E>(self.fc_store.finalized_checkpoint().epoch);
        if block.slot() <= finalized_slot {
            return Err(Error::InvalidBlock(InvalidBlock::FinalizedSlot {
                finalized_slot,
                block_slot: block.slot(),
            }));
        }

        // Check block is a descendant of the finalized block at the
        // checkpoint finalized slot. Since `block.slot > finalized_slot`
        // it is equivalent to search from the parent root, which avoids
        // adding `block` to the array first.
        let block_ancestor = self.get_ancestor(parent_root, finalized_slot)?;
        let finalized_root = self.fc_store.finalized_checkpoint().root;
        if block_ancestor != Some(finalized_root) {
            return Err(Error::InvalidBlock(InvalidBlock::NotFinalizedDescendant {
                finalized_root,
                block_ancestor,
            }));
        }

        // Add proposer score boost if the block is timely.
        let is_before_attesting_interval =
            block_delay < Duration::from_secs(spec.seconds_per_slot / INTERVALS_PER_SLOT);
        let is_first_block = self.fc_store.proposer_boost_root().is_zero();
        if current_slot == block.slot() && is_before_attesting_interval && is_first_block {
            self.fc_store.set_proposer_boost_root(block_root);
        }

        // Update store with checkpoints if necessary.
        self.update_checkpoints(
            state.current_justified_checkpoint,
            state.finalized_checkpoint,
            state,
        )?;

        // The target root of this block's epoch: the block itself when it
        // opens the epoch, otherwise its most recent epoch-boundary
        // ancestor.
        let target_slot = block
            .slot()
            .epoch(E::slots_per_epoch())
            .start_slot(E::slots_per_epoch());
        let target_root = if block.slot() == target_slot {
            block_root
        } else {
            self.get_ancestor(parent_root, target_slot)?
                .unwrap_or(parent_root)
        };

        self.fc_store
            .on_verified_block(block, block_root, state)
            .map_err(Error::AfterBlockFailed)?;

        let execution_block_hash = block.message().body.execution_block_hash;
        let execution_status = if execution_block_hash == ExecutionBlockHash::zero() {
            // The block is post-merge-fork, but pre-terminal-PoW block. We
            // don't need to verify the payload.
            ExecutionStatus::irrelevant()
        } else {
            match payload_verification_status {
                PayloadVerificationStatus::Verified => ExecutionStatus::Valid(execution_block_hash),
                PayloadVerificationStatus::Optimistic => {
                    ExecutionStatus::Optimistic(execution_block_hash)
                }
                // It would be a logic error to declare a block irrelevant
                // if it has an execution payload with a non-zero block
                // hash.
                PayloadVerificationStatus::Irrelevant => {
                    return Err(Error::InvalidPayloadStatus {
                        block_slot: block.slot(),
                        block_root,
                        payload_verification_status,
                    });
                }
            }
        };

        // This does not apply a vote to the block, it just makes fork
        // choice aware of the block so it can still be identified as the
        // head even if it doesn't have any votes.
        self.proto_array.process_block::<E>(
            ProtoBlock {
                slot: block.slot(),
                root: block_root,
                parent_root: Some(parent_root),
                target_root,
                state_root: block.state_root(),
                justified_checkpoint: state.current_justified_checkpoint,
                finalized_checkpoint: state.finalized_checkpoint,
                execution_status,
            },
            current_slot,
        )?;

        Ok(())
    }

    /// Update checkpoints in store if necessary. Checkpoints are only ever
    /// advanced to higher epochs, which keeps finality monotone.
    fn update_checkpoints(
        &mut self,
        justified_checkpoint: Checkpoint,
        finalized_checkpoint: Checkpoint,
        state: &BeaconState,
    ) -> Result<(), Error<T::Error>> {
        // Update justified checkpoint.
        if justified_checkpoint.epoch > self.fc_store.justified_checkpoint().epoch {
            self.fc_store
                .set_justified_checkpoint(justified_checkpoint, state)
                .map_err(Error::UnableToSetJustifiedCheckpoint)?;
        }

        // Update finalized checkpoint.
        if finalized_checkpoint.epoch > self.fc_store.finalized_checkpoint().epoch {
            self.fc_store.set_finalized_checkpoint(finalized_checkpoint);
        }

        Ok(())
    }

    /// Validates the `epoch` against the current time according to the
    /// fork choice store.
    ///
    /// ## Specification
    ///
    /// Equivalent to:
    ///
    /// https://github.com/ethereum/consensus-specs/blob/dev/specs/phase0/fork-choice.md#validate_target_epoch_against_current_time
    fn validate_target_epoch_against_current_time(
        &self,
        target_epoch: Epoch,
    ) -> Result<(), InvalidAttestation> {
        let slot_now = self.fc_store.get_current_slot();
        let epoch_now = slot_now.epoch(E::slots_per_epoch());

        // Attestation must be from the current or previous epoch.
        if target_epoch > epoch_now {
            return Err(InvalidAttestation::FutureEpoch {
                attestation_epoch: target_epoch,
                current_epoch: epoch_now,
            });
        } else if target_epoch + 1 < epoch_now {
            return Err(InvalidAttestation::PastEpoch {
                attestation_epoch: target_epoch,
                current_epoch: epoch_now,
            });
        }
        Ok(())
    }

    /// Validates the `indexed_attestation` for application to fork choice.
    ///
    /// ## Specification
    ///
    /// Equivalent to:
    ///
    /// https://github.com/ethereum/eth2.0-specs/blob/v0.12.1/specs/phase0/fork-choice.md#validate_on_attestation
    fn validate_on_attestation(
        &self,
        indexed_attestation: &IndexedAttestation,
        is_from_block: AttestationFromBlock,
    ) -> Result<(), InvalidAttestation> {
        // There is no point in processing an attestation with an empty
        // bitfield. Reject it immediately.
        //
        // This is not in the specification, however it should be
        // transparent to other nodes. We return early here to avoid
        // wasting precious resources verifying the rest of it.
        if indexed_attestation.is_empty() {
            return Err(InvalidAttestation::EmptyAggregationBitfield);
        }

        let target = indexed_attestation.data.target;

        if matches!(is_from_block, AttestationFromBlock::False) {
            self.validate_target_epoch_against_current_time(target.epoch)?;
        }

        if target.epoch != indexed_attestation.data.slot.epoch(E::slots_per_epoch()) {
            return Err(InvalidAttestation::BadTargetEpoch {
                target: target.epoch,
                slot: indexed_attestation.data.slot,
            });
        }

        // Attestation target must be for a known block.
        //
        // We do not delay the block for later processing to reduce
        // complexity and DoS attack surface.
        if !self.proto_array.contains_block(&target.root) {
            return Err(InvalidAttestation::UnknownTargetRoot(target.root));
        }

        // Load the block for `attestation.data.beacon_block_root`.
        //
        // This indirectly checks to see if the
        // `attestation.data.beacon_block_root` is in our fork choice. Any
        // known, non-finalized block should be in fork choice, so this
        // check immediately filters out attestations that attest to a
        // block that has not been processed.
        //
        // Attestations must be for a known block. If the block is unknown,
        // we simply drop the attestation and do not delay consideration
        // for later.
        let block = self
            .proto_array
            .get_block(&indexed_attestation.data.beacon_block_root)
            .ok_or(InvalidAttestation::UnknownHeadBlock {
                beacon_block_root: indexed_attestation.data.beacon_block_root,
            })?;

        // If an attestation points to a block that is from an earlier slot
        // than the attestation, then all slots between the block and
        // attestation must be skipped. Therefore if the block is from a
        // prior epoch to the attestation, then the target root must be
        // equal to the root of the block that is being attested to.
        let expected_target = if target.epoch > block.slot.epoch(E::slots_per_epoch()) {
            indexed_attestation.data.beacon_block_root
        } else {
            block.target_root
        };

        if expected_target != target.root {
            return Err(InvalidAttestation::InvalidTarget {
                attestation: target.root,
                local: expected_target,
            });
        }

        // Attestations must not be for blocks in the future. If this is
        // the case, the attestation should not be considered.
        if block.slot > indexed_attestation.data.slot {
            return Err(InvalidAttestation::AttestsToFutureBlock {
                block: block.slot,
                attestation: indexed_attestation.data.slot,
            });
        }

        Ok(())
    }

    /// Register `attestation` with the fork choice DAG so that it may
    /// influence future calls to `Self::get_head`.
    ///
    /// ## Specification
    ///
    /// Approximates:
    ///
    /// https://github.com/ethereum/eth2.0-specs/blob/v0.12.1/specs/phase0/fork-choice.md#on_attestation
    ///
    /// It only approximates the specification since it does not perform
    /// `is_valid_indexed_attestation` since that should already have been
    /// called upstream and it's too expensive to call again.
    pub fn on_attestation(
        &mut self,
        system_time_current_slot: Slot,
        attestation: &IndexedAttestation,
        is_from_block: AttestationFromBlock,
    ) -> Result<(), Error<T::Error>> {
        let _timer = metrics::start_timer(&metrics::FORK_CHOICE_ON_ATTESTATION_TIMES);

        self.update_time(system_time_current_slot)?;

        // Ignore any attestations to the zero hash.
        //
        // This is an edge case that results from the spec aliasing the
        // zero hash to the genesis block. Attesters may attest to the zero
        // hash if they have never seen a block.
        //
        // We have two options here:
        //
        //  1. Apply all zero-hash attestations to the genesis block.
        //  2. Ignore all attestations to the zero hash.
        //
        // (1) becomes weird once we hit finality and fork choice drops the
        // genesis block. (2) is fine because votes to the genesis block
        // are not useful; all validators implicitly attest to genesis just
        // by being present in the chain.
        if attestation.data.beacon_block_root == Hash256::zero() {
            return Ok(());
        }

        self.validate_on_attestation(attestation, is_from_block)?;

        if attestation.data.slot < self.fc_store.get_current_slot() {
            for validator_index in &attestation.attesting_indices {
                self.proto_array.process_attestation(
                    *validator_index as usize,
                    attestation.data.beacon_block_root,
                    attestation.data.target.epoch,
                )?;
            }
        } else {
            // The spec declares:
            //
            // ```
            // Attestations can only affect the fork choice of subsequent
            // slots. Delay consideration in the fork choice until their
            // slot is in the past.
            // ```
            self.queued_attestations
                .push(QueuedAttestation::from(attestation));
        }

        Ok(())
    }

    /// Apply an attester slashing to fork choice.
    ///
    /// We assume that the attester slashing provided to this function has
    /// already been verified.
    pub fn on_attester_slashing(&mut self, slashing: &types::AttesterSlashing) {
        let attesting_indices_set = slashing.intersecting_indices();
        self.fc_store
            .extend_equivocating_indices(attesting_indices_set);
    }

    /// Call `on_tick` for all slots between `fc_store.get_current_slot()`
    /// and the provided `current_slot`. Returns the value of
    /// `self.fc_store.get_current_slot`.
    pub fn update_time(&mut self, current_slot: Slot) -> Result<Slot, Error<T::Error>> {
        while self.fc_store.get_current_slot() < current_slot {
            let previous_slot = self.fc_store.get_current_slot();
            // Note: we are relying upon `on_tick` to update
            // `fc_store.time` to ensure we don't get stuck in a loop.
            self.on_tick(previous_slot + 1)?
        }

        // Process any attestations that might now be eligible.
        self.process_attestation_queue()?;

        Ok(self.fc_store.get_current_slot())
    }

    /// Called whenever the current time increases.
    ///
    /// ## Specification
    ///
    /// Equivalent to:
    ///
    /// https://github.com/ethereum/eth2.0-specs/blob/v0.12.1/specs/phase0/fork-choice.md#on_tick
    fn on_tick(&mut self, time: Slot) -> Result<(), Error<T::Error>> {
        let store = &mut self.fc_store;
        let previous_slot = store.get_current_slot();

        if time > previous_slot + 1 {
            return Err(Error::InconsistentOnTick {
                previous_slot,
                time,
            });
        }

        // Update store time.
        store.set_current_slot(time);

        // Reset proposer boost scoring.
        store.set_proposer_boost_root(Hash256::zero());

        Ok(())
    }

    /// Processes and removes from the queue any queued attestations which
    /// may now be eligible for processing due to the slot clock
    /// incrementing.
    fn process_attestation_queue(&mut self) -> Result<(), Error<T::Error>> {
        for attestation in dequeue_attestations(
            self.fc_store.get_current_slot(),
            &mut self.queued_attestations,
        ) {
            for validator_index in attestation.attesting_indices.iter() {
                self.proto_array.process_attestation(
                    *validator_index as usize,
                    attestation.block_root,
                    attestation.target_epoch,
                )?;
            }
        }

        Ok(())
    }

    /// Returns `true` if the block is known **and** a descendant of the
    /// finalized root.
    pub fn contains_block(&self, block_root: &Hash256) -> bool {
        self.proto_array.contains_block(block_root)
            && self.is_finalized_checkpoint_or_descendant(*block_root)
    }

    /// Returns a `ProtoBlock` if the block is known **and** a descendant
    /// of the finalized root.
    pub fn get_block(&self, block_root: &Hash256) -> Option<ProtoBlock> {
        if self.is_finalized_checkpoint_or_descendant(*block_root) {
            self.proto_array.get_block(block_root)
        } else {
            None
        }
    }

    /// Returns an `ExecutionStatus` if the block is known **and** a
    /// descendant of the finalized root.
    pub fn get_block_execution_status(&self, block_root: &Hash256) -> Option<ExecutionStatus> {
        if self.is_finalized_checkpoint_or_descendant(*block_root) {
            self.proto_array.get_block_execution_status(block_root)
        } else {
            None
        }
    }

    /// Returns the weight of the given block, if it is known.
    pub fn get_block_weight(&self, block_root: &Hash256) -> Option<u64> {
        self.proto_array.get_weight(block_root)
    }

    /// Returns the `ProtoBlock` for the justified checkpoint.
    pub fn get_justified_block(&self) -> Result<ProtoBlock, Error<T::Error>> {
        let justified_checkpoint = self.justified_checkpoint();
        self.get_block(&justified_checkpoint.root)
            .ok_or(Error::MissingJustifiedBlock {
                justified_checkpoint,
            })
    }

    /// Returns the `ProtoBlock` for the finalized checkpoint.
    pub fn get_finalized_block(&self) -> Result<ProtoBlock, Error<T::Error>> {
        let finalized_checkpoint = self.finalized_checkpoint();
        self.get_block(&finalized_checkpoint.root)
            .ok_or(Error::MissingFinalizedBlock {
                finalized_checkpoint,
            })
    }

    /// The safe beacon block for the execution layer is the justified
    /// block root.
    pub fn get_safe_beacon_block_root(&self) -> Hash256 {
        self.justified_checkpoint().root
    }

    /// The execution block hash of the justified block, or zero if it has
    /// no payload.
    pub fn get_safe_execution_block_hash(&self) -> ExecutionBlockHash {
        self.proto_array
            .get_block_execution_status(&self.get_safe_beacon_block_root())
            .and_then(|status| status.block_hash())
            .unwrap_or_else(ExecutionBlockHash::zero)
    }

    /// Return `true` if `block_root` is equal to the finalized checkpoint,
    /// or a known descendant of it.
    pub fn is_finalized_checkpoint_or_descendant(&self, block_root: Hash256) -> bool {
        self.proto_array
            .is_finalized_checkpoint_or_descendant::<E>(block_root)
    }

    /// Returns `true` if `descendant_root` is a descendant of
    /// `ancestor_root`.
    pub fn is_descendant(&self, ancestor_root: Hash256, descendant_root: Hash256) -> bool {
        self.proto_array.is_descendant(ancestor_root, descendant_root)
    }

    /// Returns `true` if the block is known and its execution status is
    /// optimistic or invalid.
    pub fn is_optimistic_or_invalid_block(
        &self,
        block_root: &Hash256,
    ) -> Result<bool, Error<T::Error>> {
        self.proto_array
            .get_block_execution_status(block_root)
            .map(|status| status.is_optimistic_or_invalid())
            .ok_or(Error::MissingProtoArrayBlock(*block_root))
    }

    /// Return the current finalized checkpoint.
    pub fn finalized_checkpoint(&self) -> Checkpoint {
        *self.fc_store.finalized_checkpoint()
    }

    /// Return the justified checkpoint.
    pub fn justified_checkpoint(&self) -> Checkpoint {
        *self.fc_store.justified_checkpoint()
    }

    /// Returns the latest message for a given validator, if any.
    ///
    /// Returns `(block_root, block_epoch)`.
    pub fn latest_message(&self, validator_index: usize) -> Option<(Hash256, Epoch)> {
        self.proto_array.latest_message(validator_index)
    }

    /// Returns a reference to the underlying fork choice DAG.
    pub fn proto_array(&self) -> &ProtoArrayForkChoice {
        &self.proto_array
    }

    /// Returns a mutable reference to the underlying fork choice DAG.
    pub fn proto_array_mut(&mut self) -> &mut ProtoArrayForkChoice {
        &mut self.proto_array
    }

    /// Returns a reference to the underlying `fc_store`.
    pub fn fc_store(&self) -> &T {
        &self.fc_store
    }

    /// Returns a reference to the currently queued attestations.
    pub fn queued_attestations(&self) -> &[QueuedAttestation] {
        &self.queued_attestations
    }

    /// Returns the store's proposer boost root.
    pub fn proposer_boost_root(&self) -> Hash256 {
        self.fc_store.proposer_boost_root()
    }

    /// Prunes the proto array up to the finalized checkpoint, keeping the
    /// array bounded.
    pub fn prune(&mut self) -> Result<(), Error<T::Error>> {
        let finalized_root = self.fc_store.finalized_checkpoint().root;
        debug!(?finalized_root, "Pruning fork choice");

        self.proto_array
            .maybe_prune(finalized_root)
            .map_err(Into::into)
    }

    /// Instantiate `Self` from some `PersistedForkChoice` generated by a
    /// earlier call to `Self::to_persisted`.
    pub fn from_persisted(
        persisted: PersistedForkChoice,
        fc_store: T,
    ) -> Result<Self, Error<T::Error>> {
        let proto_array = ProtoArrayForkChoice::from_bytes(
            &persisted.proto_array_bytes,
            fc_store.justified_balances().clone(),
        )
        .map_err(Error::InvalidProtoArrayBytes)?;

        Ok(Self {
            fc_store,
            proto_array,
            queued_attestations: persisted.queued_attestations,
            // Will be updated in the next call to `Self::get_head`.
            forkchoice_update_parameters: ForkchoiceUpdateParameters {
                head_hash: None,
                justified_hash: None,
                finalized_hash: None,
                head_root: Hash256::zero(),
            },
            _phantom: PhantomData,
        })
    }

    /// Takes a snapshot of `Self` and stores it in `PersistedForkChoice`,
    /// allowing this struct to be persisted to disk.
    pub fn to_persisted(&self) -> PersistedForkChoice {
        PersistedForkChoice {
            proto_array_bytes: self.proto_array().as_bytes(),
            queued_attestations: self.queued_attestations().to_vec(),
        }
    }
}

/// Helper struct that is used to encode/decode the state of the
/// `ForkChoice` as SSZ bytes.
///
/// This is used when persisting the state of the fork choice to disk.
#[derive(Encode, Decode, Clone)]
pub struct PersistedForkChoice {
    pub proto_array_bytes: Vec<u8>,
    pub queued_attestations: Vec<QueuedAttestation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto_array::JustifiedBalances;
    use std::collections::BTreeSet;
    use types::{
        AttestationData, BeaconBlock, BeaconBlockBody, ChainSpec, MainnetEthSpec, SignatureBytes,
    };

    type E = MainnetEthSpec;

    #[derive(Debug)]
    struct TestStoreError;

    /// A minimal store for driving `ForkChoice` in tests.
    struct TestStore {
        current_slot: Slot,
        justified_checkpoint: Checkpoint,
        justified_balances: JustifiedBalances,
        finalized_checkpoint: Checkpoint,
        proposer_boost_root: Hash256,
        equivocating_indices: BTreeSet<u64>,
    }

    impl TestStore {
        fn new(anchor: Checkpoint, balances: Vec<u64>) -> Self {
            Self {
                current_slot: Slot::new(0),
                justified_checkpoint: anchor,
                justified_balances: JustifiedBalances::from_effective_balances(balances),
                finalized_checkpoint: anchor,
                proposer_boost_root: Hash256::zero(),
                equivocating_indices: BTreeSet::new(),
            }
        }
    }

    impl ForkChoiceStore<E> for TestStore {
        type Error = TestStoreError;

        fn get_current_slot(&self) -> Slot {
            self.current_slot
        }

        fn set_current_slot(&mut self, slot: Slot) {
            self.current_slot = slot;
        }

        fn on_verified_block(
            &mut self,
            _block: &SignedBeaconBlock,
            _block_root: Hash256,
            _state: &BeaconState,
        ) -> Result<(), Self::Error> {
            Ok(())
        }

        fn justified_checkpoint(&self) -> &Checkpoint {
            &self.justified_checkpoint
        }

        fn justified_balances(&self) -> &JustifiedBalances {
            &self.justified_balances
        }

        fn finalized_checkpoint(&self) -> &Checkpoint {
            &self.finalized_checkpoint
        }

        fn set_finalized_checkpoint(&mut self, checkpoint: Checkpoint) {
            self.finalized_checkpoint = checkpoint;
        }

        fn set_justified_checkpoint(
            &mut self,
            checkpoint: Checkpoint,
            state: &BeaconState,
        ) -> Result<(), Self::Error> {
            self.justified_checkpoint = checkpoint;
            self.justified_balances = JustifiedBalances::from_justified_state(state);
            Ok(())
        }

        fn equivocating_indices(&self) -> &BTreeSet<u64> {
            &self.equivocating_indices
        }

        fn extend_equivocating_indices(&mut self, indices: impl IntoIterator<Item = u64>) {
            self.equivocating_indices.extend(indices);
        }

        fn proposer_boost_root(&self) -> Hash256 {
            self.proposer_boost_root
        }

        fn set_proposer_boost_root(&mut self, proposer_boost_root: Hash256) {
            self.proposer_boost_root = proposer_boost_root;
        }
    }

    fn make_block(slot: u64, parent_root: Hash256) -> SignedBeaconBlock {
        SignedBeaconBlock {
            message: BeaconBlock {
                slot: Slot::new(slot),
                proposer_index: slot,
                parent_root,
                state_root: Hash256::from_low_u64_be(slot + 1000),
                body: BeaconBlockBody::default(),
            },
            signature: SignatureBytes::empty(),
        }
    }

    fn state_for(
        slot: u64,
        justified: Checkpoint,
        finalized: Checkpoint,
        balances: Vec<u64>,
    ) -> BeaconState {
        BeaconState {
            slot: Slot::new(slot),
            current_justified_checkpoint: justified,
            finalized_checkpoint: finalized,
            balances,
        }
    }

    fn new_fork_choice() -> (ForkChoice<TestStore, E>, ChainSpec, Checkpoint, Hash256) {
        let spec = ChainSpec::mainnet();
        let anchor_block = make_block(0, Hash256::zero());
        let anchor_root = anchor_block.canonical_root();
        let anchor = Checkpoint {
            epoch: Epoch::new(0),
            root: anchor_root,
        };
        let store = TestStore::new(anchor, vec![32_000_000_000; 4]);
        let anchor_state = state_for(0, anchor, anchor, vec![32_000_000_000; 4]);

        let fork_choice = ForkChoice::from_anchor(
            store,
            anchor_root,
            &anchor_block,
            &anchor_state,
            Some(Slot::new(0)),
            &spec,
        )
        .unwrap();

        (fork_choice, spec, anchor, anchor_root)
    }

    fn import_block(
        fork_choice: &mut ForkChoice<TestStore, E>,
        block: &SignedBeaconBlock,
        state: &BeaconState,
        current_slot: Slot,
        spec: &ChainSpec,
    ) -> Result<Hash256, Error<TestStoreError>> {
        let block_root = block.canonical_root();
        fork_choice.on_block(
            current_slot,
            block,
            block_root,
            Duration::from_secs(6),
            state,
            PayloadVerificationStatus::Irrelevant,
            spec,
        )?;
        Ok(block_root)
    }

    #[test]
    fn rejects_unknown_parent() {
        let (mut fork_choice, spec, anchor, _) = new_fork_choice();
        let orphan = make_block(1, Hash256::from_low_u64_be(999));
        let state = state_for(1, anchor, anchor, vec![]);

        let result = import_block(&mut fork_choice, &orphan, &state, Slot::new(1), &spec);
        assert!(matches!(
            result,
            Err(Error::InvalidBlock(InvalidBlock::UnknownParent(_)))
        ));
    }

    #[test]
    fn rejects_future_blocks() {
        let (mut fork_choice, spec, anchor, anchor_root) = new_fork_choice();
        let block = make_block(5, anchor_root);
        let state = state_for(5, anchor, anchor, vec![]);

        let result = import_block(&mut fork_choice, &block, &state, Slot::new(1), &spec);
        assert!(matches!(
            result,
            Err(Error::InvalidBlock(InvalidBlock::FutureSlot { .. }))
        ));
    }

    #[test]
    fn head_tracks_imported_chain() {
        let (mut fork_choice, spec, anchor, anchor_root) = new_fork_choice();
        let balances = vec![32_000_000_000_u64; 4];

        let block_1 = make_block(1, anchor_root);
        let root_1 = import_block(
            &mut fork_choice,
            &block_1,
            &state_for(1, anchor, anchor, balances.clone()),
            Slot::new(1),
            &spec,
        )
        .unwrap();

        let block_2 = make_block(2, root_1);
        let root_2 = import_block(
            &mut fork_choice,
            &block_2,
            &state_for(2, anchor, anchor, balances),
            Slot::new(2),
            &spec,
        )
        .unwrap();

        let head = fork_choice.get_head(Slot::new(2), &spec).unwrap();
        assert_eq!(head, root_2);
        assert!(fork_choice.is_descendant(anchor_root, root_2));
        assert_eq!(
            fork_choice.get_forkchoice_update_parameters().head_root,
            root_2
        );
    }

    #[test]
    fn current_slot_attestations_are_queued_then_applied() {
        let (mut fork_choice, spec, anchor, anchor_root) = new_fork_choice();
        let balances = vec![32_000_000_000_u64; 4];

        let block_1 = make_block(1, anchor_root);
        let root_1 = import_block(
            &mut fork_choice,
            &block_1,
            &state_for(1, anchor, anchor, balances),
            Slot::new(1),
            &spec,
        )
        .unwrap();

        let attestation = IndexedAttestation {
            attesting_indices: vec![0, 1],
            data: AttestationData {
                slot: Slot::new(1),
                index: 0,
                beacon_block_root: root_1,
                source: anchor,
                target: Checkpoint {
                    epoch: Epoch::new(0),
                    root: anchor_root,
                },
            },
            signature: SignatureBytes::empty(),
        };

        // The attestation is for the current slot: it must be queued.
        fork_choice
            .on_attestation(Slot::new(1), &attestation, AttestationFromBlock::False)
            .unwrap();
        assert_eq!(fork_choice.queued_attestations().len(), 1);
        assert!(fork_choice.latest_message(0).is_none());

        // Once the clock moves past the attestation slot it is applied.
        fork_choice.update_time(Slot::new(2)).unwrap();
        assert_eq!(fork_choice.queued_attestations().len(), 0);
        assert_eq!(
            fork_choice.latest_message(0),
            Some((root_1, Epoch::new(0)))
        );
    }

    #[test]
    fn finalized_checkpoint_is_monotone() {
        let (mut fork_choice, spec, anchor, anchor_root) = new_fork_choice();
        let balances = vec![32_000_000_000_u64; 4];
        let slots_per_epoch = E::slots_per_epoch();

        let mut parent_root = anchor_root;
        let mut finalized_epochs = vec![];

        // Import two epochs of blocks, advancing finality to epoch 1, then
        // attempt a state claiming a *lower* finalized epoch.
        for slot in 1..=(2 * slots_per_epoch) {
            let block = make_block(slot, parent_root);
            let justified = Checkpoint {
                epoch: Epoch::new(slot / slots_per_epoch),
                root: anchor_root,
            };
            let finalized = Checkpoint {
                epoch: Epoch::new((slot / slots_per_epoch).saturating_sub(1)),
                root: anchor_root,
            };
            parent_root = import_block(
                &mut fork_choice,
                &block,
                &state_for(slot, justified, finalized, balances.clone()),
                Slot::new(slot),
                &spec,
            )
            .unwrap();
            finalized_epochs.push(fork_choice.finalized_checkpoint().epoch);
        }

        assert!(
            finalized_epochs.windows(2).all(|w| w[0] <= w[1]),
            "finalized epoch must never decrease"
        );
        assert_eq!(
            fork_choice.finalized_checkpoint().epoch,
            Epoch::new(1),
            "finality should have advanced"
        );
    }

    #[test]
    fn safe_block_is_justified_block() {
        let (mut fork_choice, spec, anchor, anchor_root) = new_fork_choice();
        let balances = vec![32_000_000_000_u64; 4];

        assert_eq!(
            fork_choice.get_safe_beacon_block_root(),
            fork_choice.justified_checkpoint().root
        );

        let block_1 = make_block(1, anchor_root);
        import_block(
            &mut fork_choice,
            &block_1,
            &state_for(1, anchor, anchor, balances),
            Slot::new(1),
            &spec,
        )
        .unwrap();

        assert_eq!(
            fork_choice.get_safe_beacon_block_root(),
            fork_choice.justified_checkpoint().root
        );
        // The anchor has no payload, so the safe execution hash is zero.
        assert_eq!(
            fork_choice.get_safe_execution_block_hash(),
            ExecutionBlockHash::zero()
        );
    }

    #[test]
    fn persisted_round_trip() {
        let (mut fork_choice, spec, anchor, anchor_root) = new_fork_choice();
        let balances = vec![32_000_000_000_u64; 4];

        let block_1 = make_block(1, anchor_root);
        import_block(
            &mut fork_choice,
            &block_1,
            &state_for(1, anchor, anchor, balances.clone()),
            Slot::new(1),
            &spec,
        )
        .unwrap();

        let persisted = fork_choice.to_persisted();
        let bytes = persisted.as_ssz_bytes();
        let recovered = PersistedForkChoice::from_ssz_bytes(&bytes).unwrap();

        let store = TestStore::new(anchor, balances);
        let restored = ForkChoice::<TestStore, E>::from_persisted(recovered, store).unwrap();
        assert!(restored.contains_block(&block_1.canonical_root()));
    }
}
