use crate::{Epoch, EthSpec, ForkName, Slot};
use std::time::Duration;

/// Runtime chain configuration: fork schedule, data-availability horizons
/// and gossip admission bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSpec {
    pub seconds_per_slot: u64,

    /*
     * Fork schedule. Fork versions index the gossip fork digest.
     */
    pub genesis_fork_version: [u8; 4],
    pub altair_fork_version: [u8; 4],
    pub altair_fork_epoch: Option<Epoch>,
    pub bellatrix_fork_version: [u8; 4],
    pub bellatrix_fork_epoch: Option<Epoch>,
    pub capella_fork_version: [u8; 4],
    pub capella_fork_epoch: Option<Epoch>,
    pub deneb_fork_version: [u8; 4],
    pub deneb_fork_epoch: Option<Epoch>,
    pub electra_fork_version: [u8; 4],
    pub electra_fork_epoch: Option<Epoch>,
    pub fulu_fork_version: [u8; 4],
    pub fulu_fork_epoch: Option<Epoch>,

    /*
     * Networking and retention horizons.
     */
    pub maximum_gossip_clock_disparity_millis: u64,
    pub min_epochs_for_blob_sidecars_requests: u64,
    pub min_epochs_for_data_column_sidecars_requests: u64,
    pub min_epochs_for_block_requests: u64,

    /*
     * Data availability.
     */
    pub max_blobs_per_block: u64,
    pub max_blobs_per_block_electra: u64,
    pub number_of_columns: u64,
    pub number_of_custody_groups: u64,
    pub custody_requirement: u64,
    pub samples_per_slot: u64,

    /*
     * Fork choice.
     */
    pub proposer_score_boost: Option<u64>,

    /*
     * Sync committees.
     */
    pub sync_committee_subnet_count: u64,
}

impl ChainSpec {
    /// Returns the name of the fork active at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        let scheduled = [
            (ForkName::Fulu, self.fulu_fork_epoch),
            (ForkName::Electra, self.electra_fork_epoch),
            (ForkName::Deneb, self.deneb_fork_epoch),
            (ForkName::Capella, self.capella_fork_epoch),
            (ForkName::Bellatrix, self.bellatrix_fork_epoch),
            (ForkName::Altair, self.altair_fork_epoch),
        ];
        for (fork, fork_epoch) in scheduled {
            if let Some(fork_epoch) = fork_epoch
                && epoch >= fork_epoch
            {
                return fork;
            }
        }
        ForkName::Base
    }

    pub fn fork_name_at_slot<E: EthSpec>(&self, slot: Slot) -> ForkName {
        self.fork_name_at_epoch(slot.epoch(E::slots_per_epoch()))
    }

    pub fn fork_version(&self, fork: ForkName) -> [u8; 4] {
        match fork {
            ForkName::Base => self.genesis_fork_version,
            ForkName::Altair => self.altair_fork_version,
            ForkName::Bellatrix => self.bellatrix_fork_version,
            ForkName::Capella => self.capella_fork_version,
            ForkName::Deneb => self.deneb_fork_version,
            ForkName::Electra => self.electra_fork_version,
            ForkName::Fulu => self.fulu_fork_version,
        }
    }

    pub fn fork_epoch(&self, fork: ForkName) -> Option<Epoch> {
        match fork {
            ForkName::Base => Some(Epoch::new(0)),
            ForkName::Altair => self.altair_fork_epoch,
            ForkName::Bellatrix => self.bellatrix_fork_epoch,
            ForkName::Capella => self.capella_fork_epoch,
            ForkName::Deneb => self.deneb_fork_epoch,
            ForkName::Electra => self.electra_fork_epoch,
            ForkName::Fulu => self.fulu_fork_epoch,
        }
    }

    /// Returns `true` if column sampling (PeerDAS) is active at `epoch`.
    pub fn is_peer_das_enabled_for_epoch(&self, epoch: Epoch) -> bool {
        self.fulu_fork_epoch
            .is_some_and(|fork_epoch| epoch >= fork_epoch)
    }

    pub fn max_blobs_per_block(&self, epoch: Epoch) -> u64 {
        if self.fork_name_at_epoch(epoch).electra_enabled() {
            self.max_blobs_per_block_electra
        } else {
            self.max_blobs_per_block
        }
    }

    pub fn maximum_gossip_clock_disparity(&self) -> Duration {
        Duration::from_millis(self.maximum_gossip_clock_disparity_millis)
    }

    pub fn seconds_per_slot(&self) -> Duration {
        Duration::from_secs(self.seconds_per_slot)
    }

    /// The DA retention horizon for the fork active at `epoch`: blocks
    /// older than this many epochs no longer require sidecars.
    pub fn min_epochs_for_data_sidecars_requests(&self, epoch: Epoch) -> u64 {
        if self.is_peer_das_enabled_for_epoch(epoch) {
            self.min_epochs_for_data_column_sidecars_requests
        } else {
            self.min_epochs_for_blob_sidecars_requests
        }
    }

    pub fn mainnet() -> Self {
        Self {
            seconds_per_slot: 12,
            genesis_fork_version: [0x00, 0x00, 0x00, 0x00],
            altair_fork_version: [0x01, 0x00, 0x00, 0x00],
            altair_fork_epoch: Some(Epoch::new(74240)),
            bellatrix_fork_version: [0x02, 0x00, 0x00, 0x00],
            bellatrix_fork_epoch: Some(Epoch::new(144896)),
            capella_fork_version: [0x03, 0x00, 0x00, 0x00],
            capella_fork_epoch: Some(Epoch::new(194048)),
            deneb_fork_version: [0x04, 0x00, 0x00, 0x00],
            deneb_fork_epoch: Some(Epoch::new(269568)),
            electra_fork_version: [0x05, 0x00, 0x00, 0x00],
            electra_fork_epoch: Some(Epoch::new(364032)),
            fulu_fork_version: [0x06, 0x00, 0x00, 0x00],
            fulu_fork_epoch: Some(Epoch::new(411392)),
            maximum_gossip_clock_disparity_millis: 500,
            min_epochs_for_blob_sidecars_requests: 4096,
            min_epochs_for_data_column_sidecars_requests: 4096,
            min_epochs_for_block_requests: 33024,
            max_blobs_per_block: 6,
            max_blobs_per_block_electra: 9,
            number_of_columns: 128,
            number_of_custody_groups: 128,
            custody_requirement: 4,
            samples_per_slot: 8,
            proposer_score_boost: Some(40),
            sync_committee_subnet_count: 4,
        }
    }

    /// All forks through Electra active from genesis, Fulu unscheduled.
    /// Tests flip individual fields as needed.
    pub fn minimal() -> Self {
        Self {
            seconds_per_slot: 6,
            altair_fork_epoch: Some(Epoch::new(0)),
            bellatrix_fork_epoch: Some(Epoch::new(0)),
            capella_fork_epoch: Some(Epoch::new(0)),
            deneb_fork_epoch: Some(Epoch::new(0)),
            electra_fork_epoch: Some(Epoch::new(0)),
            fulu_fork_epoch: None,
            min_epochs_for_blob_sidecars_requests: 4096,
            min_epochs_for_data_column_sidecars_requests: 4096,
            min_epochs_for_block_requests: 272,
            ..Self::mainnet()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    #[test]
    fn fork_schedule_ordering() {
        let spec = ChainSpec::mainnet();
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(0)), ForkName::Base);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(74240)), ForkName::Altair);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(269568)), ForkName::Deneb);
        assert_eq!(
            spec.fork_name_at_epoch(Epoch::new(364032)),
            ForkName::Electra
        );
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(500000)), ForkName::Fulu);
    }

    #[test]
    fn fork_name_at_slot_uses_epoch_boundary() {
        let mut spec = ChainSpec::minimal();
        spec.fulu_fork_epoch = Some(Epoch::new(2));
        let slots_per_epoch = MainnetEthSpec::slots_per_epoch();
        assert_eq!(
            spec.fork_name_at_slot::<MainnetEthSpec>(Slot::new(2 * slots_per_epoch - 1)),
            ForkName::Electra
        );
        assert_eq!(
            spec.fork_name_at_slot::<MainnetEthSpec>(Slot::new(2 * slots_per_epoch)),
            ForkName::Fulu
        );
    }

    #[test]
    fn max_blobs_per_block_by_fork() {
        let spec = ChainSpec::mainnet();
        assert_eq!(spec.max_blobs_per_block(Epoch::new(269568)), 6);
        assert_eq!(spec.max_blobs_per_block(Epoch::new(364032)), 9);
    }
}
