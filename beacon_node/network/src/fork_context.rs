//! Fork-digest computation for gossip topics and req/resp framing.

use std::sync::Arc;
use types::{ChainSpec, Epoch, EthSpec, ForkName, Hash256, Slot};

pub type ForkDigest = [u8; 4];

/// Derives per-fork digests from the fork schedule and the genesis
/// validators root.
#[derive(Debug, Clone)]
pub struct ForkContext {
    spec: Arc<ChainSpec>,
    genesis_validators_root: Hash256,
}

impl ForkContext {
    pub fn new(spec: Arc<ChainSpec>, genesis_validators_root: Hash256) -> Self {
        Self {
            spec,
            genesis_validators_root,
        }
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    /// The fork active at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        self.spec.fork_name_at_epoch(epoch)
    }

    /// The digest peers expect on messages for `epoch`.
    pub fn fork_digest_at_epoch(&self, epoch: Epoch) -> ForkDigest {
        self.digest_for(self.spec.fork_name_at_epoch(epoch))
    }

    pub fn fork_digest_at_slot<E: EthSpec>(&self, slot: Slot) -> ForkDigest {
        self.fork_digest_at_epoch(slot.epoch(E::slots_per_epoch()))
    }

    /// The status topic is fork-agnostic: always the phase0 digest.
    pub fn phase0_digest(&self) -> ForkDigest {
        self.digest_for(ForkName::Base)
    }

    fn digest_for(&self, fork: ForkName) -> ForkDigest {
        compute_fork_digest(self.spec.fork_version(fork), self.genesis_validators_root)
    }
}

/// Digest of `(fork_version, genesis_validators_root)`, truncated to four
/// bytes.
pub fn compute_fork_digest(
    fork_version: [u8; 4],
    genesis_validators_root: Hash256,
) -> ForkDigest {
    let mut preimage = Vec::with_capacity(4 + 32);
    preimage.extend_from_slice(&fork_version);
    preimage.extend_from_slice(genesis_validators_root.as_slice());
    let digest = ethereum_hashing::hash(&preimage);

    let mut fork_digest = [0; 4];
    fork_digest.copy_from_slice(&digest[0..4]);
    fork_digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{FixedBytesExtended, MinimalEthSpec};

    fn context() -> ForkContext {
        let mut spec = ChainSpec::minimal();
        spec.fulu_fork_epoch = Some(Epoch::new(10));
        ForkContext::new(Arc::new(spec), Hash256::from_low_u64_be(42))
    }

    #[test]
    fn digests_differ_across_forks() {
        let context = context();
        let electra = context.fork_digest_at_epoch(Epoch::new(5));
        let fulu = context.fork_digest_at_epoch(Epoch::new(10));
        assert_ne!(electra, fulu);
    }

    #[test]
    fn digest_is_stable_within_a_fork() {
        let context = context();
        assert_eq!(
            context.fork_digest_at_epoch(Epoch::new(5)),
            context.fork_digest_at_epoch(Epoch::new(9)),
        );
    }

    #[test]
    fn status_digest_is_pinned_to_phase0() {
        let context = context();
        assert_eq!(
            context.phase0_digest(),
            compute_fork_digest(
                context.spec().genesis_fork_version,
                Hash256::from_low_u64_be(42)
            )
        );
        // Regardless of how deep into the fork schedule the clock is.
        assert_ne!(
            context.phase0_digest(),
            context.fork_digest_at_slot::<MinimalEthSpec>(Slot::new(100))
        );
    }

    #[test]
    fn digest_depends_on_genesis_root() {
        let spec = Arc::new(ChainSpec::minimal());
        let a = ForkContext::new(spec.clone(), Hash256::from_low_u64_be(1));
        let b = ForkContext::new(spec, Hash256::from_low_u64_be(2));
        assert_ne!(a.phase0_digest(), b.phase0_digest());
    }
}
