//! Types for the consensus-layer ingestion core.
//!
//! Containers here are reduced to the fields this core consumes; full
//! state-transition containers live with the state-transition collaborator.

pub mod attestation;
pub mod beacon_block;
pub mod beacon_block_header;
pub mod beacon_state;
pub mod blob_sidecar;
pub mod chain_spec;
pub mod checkpoint;
pub mod data_column_custody_group;
pub mod data_column_sidecar;
pub mod eth_spec;
pub mod execution_block_hash;
pub mod fork_name;
pub mod payload_market;
pub mod slot_epoch;
pub mod sync_committee;

pub use attestation::{
    AggregateAndProof, AttestationData, AttesterSlashing, IndexedAttestation,
    SignedAggregateAndProof,
};
pub use beacon_block::{BeaconBlock, BeaconBlockBody, SignedBeaconBlock};
pub use beacon_block_header::{BeaconBlockHeader, SignedBeaconBlockHeader};
pub use beacon_state::BeaconState;
pub use blob_sidecar::{BlobIdentifier, BlobSidecar, BlobSidecarList};
pub use chain_spec::ChainSpec;
pub use checkpoint::Checkpoint;
pub use data_column_custody_group::{
    CustodyIndex, compute_columns_for_custody_group, get_custody_groups,
};
pub use data_column_sidecar::{
    ColumnIndex, DataColumnIdentifier, DataColumnSidecar, DataColumnSidecarList,
};
pub use eth_spec::{EthSpec, MainnetEthSpec, MinimalEthSpec};
pub use execution_block_hash::ExecutionBlockHash;
pub use fork_name::ForkName;
pub use payload_market::{
    ExecutionPayloadBid, ExecutionPayloadEnvelope, SignedExecutionPayloadBid,
    SignedExecutionPayloadEnvelope,
};
pub use slot_epoch::{Epoch, Slot};
pub use sync_committee::{
    ContributionAndProof, SignedContributionAndProof, SyncCommitteeContribution,
    SyncCommitteeMessage,
};

pub use bls::{PublicKeyBytes, SignatureBytes};
pub use fixed_bytes::{FixedBytesExtended, Hash256};
pub use kzg::{Blob, Cell, KzgCommitment, KzgProof};

pub type Uint256 = alloy_primitives::U256;
pub type ValidatorIndex = u64;
pub type BuilderIndex = u64;
