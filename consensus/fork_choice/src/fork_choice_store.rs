use proto_array::JustifiedBalances;
use std::collections::BTreeSet;
use std::fmt::Debug;
use types::{BeaconState, Checkpoint, EthSpec, Hash256, SignedBeaconBlock, Slot};

/// Approximates the `Store` in "Ethereum 2.0 Phase 0 -- Beacon Chain Fork
/// Choice":
///
/// https://github.com/ethereum/eth2.0-specs/blob/v0.12.1/specs/phase0/fork-choice.md#store
///
/// ## Detail
///
/// This is only an approximation for two reasons:
///
/// - The time values in the `Store` are represented using `Slot` instead
///   of UNIX epoch `u64` values.
/// - Time is not part of the persisted store; it is provided fresh by the
///   wall clock on restart.
pub trait ForkChoiceStore<E: EthSpec>: Sized {
    type Error: Debug;

    /// Returns the last value passed to `Self::set_current_slot`.
    fn get_current_slot(&self) -> Slot;

    /// Set the value to be returned by `Self::get_current_slot`.
    ///
    /// ## Notes
    ///
    /// This should only ever be called from within `ForkChoice::on_tick`.
    fn set_current_slot(&mut self, slot: Slot);

    /// Called whenever `ForkChoice::on_block` has verified a block.
    /// Allows the implementer to performing caching or other housekeeping
    /// duties.
    fn on_verified_block(
        &mut self,
        block: &SignedBeaconBlock,
        block_root: Hash256,
        state: &BeaconState,
    ) -> Result<(), Self::Error>;

    /// Returns the justified checkpoint.
    fn justified_checkpoint(&self) -> &Checkpoint;

    /// Returns balances from the justified state.
    fn justified_balances(&self) -> &JustifiedBalances;

    /// Returns the finalized checkpoint.
    fn finalized_checkpoint(&self) -> &Checkpoint;

    /// Sets the finalized checkpoint.
    fn set_finalized_checkpoint(&mut self, checkpoint: Checkpoint);

    /// Sets the justified checkpoint, deriving the justified balances from
    /// `state`.
    fn set_justified_checkpoint(
        &mut self,
        checkpoint: Checkpoint,
        state: &BeaconState,
    ) -> Result<(), Self::Error>;

    /// Returns the equivocating indices.
    fn equivocating_indices(&self) -> &BTreeSet<u64>;

    /// Adds to the set of equivocating indices.
    fn extend_equivocating_indices(&mut self, indices: impl IntoIterator<Item = u64>);

    /// Returns the proposer boost root, if any.
    fn proposer_boost_root(&self) -> Hash256;

    /// Sets the proposer boost root.
    fn set_proposer_boost_root(&mut self, proposer_boost_root: Hash256);
}
