//! `StoreItem` implementations for the consensus containers this node
//! persists.

use crate::{DBColumn, Error, StoreItem};
use ssz::{Decode, Encode};
use types::{BeaconState, SignedBeaconBlock};

impl StoreItem for SignedBeaconBlock {
    fn db_column() -> DBColumn {
        DBColumn::BeaconBlock
    }

    fn as_store_bytes(&self) -> Vec<u8> {
        self.as_ssz_bytes()
    }

    fn from_store_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::from_ssz_bytes(bytes)?)
    }
}

impl StoreItem for BeaconState {
    fn db_column() -> DBColumn {
        DBColumn::ArchiveState
    }

    fn as_store_bytes(&self) -> Vec<u8> {
        self.as_ssz_bytes()
    }

    fn from_store_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::from_ssz_bytes(bytes)?)
    }
}
