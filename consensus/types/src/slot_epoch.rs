//! The `Slot` and `Epoch` types are unsigned 64-bit counts since genesis.
//!
//! Both are transparent over `u64` for SSZ, tree-hash and serde so they
//! interoperate with anything that speaks raw integers, while keeping the
//! two units from being mixed up in signatures.

use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Rem, Sub, SubAssign};
use tree_hash::{Hash256, PackedEncoding, TreeHash, TreeHashType};

#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
#[serde(transparent)]
#[ssz(struct_behaviour = "transparent")]
pub struct Slot(u64);

#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
#[serde(transparent)]
#[ssz(struct_behaviour = "transparent")]
pub struct Epoch(u64);

macro_rules! impl_tree_hash_transparent {
    ($type:ident) => {
        impl TreeHash for $type {
            fn tree_hash_type() -> TreeHashType {
                u64::tree_hash_type()
            }

            fn tree_hash_packed_encoding(&self) -> PackedEncoding {
                self.0.tree_hash_packed_encoding()
            }

            fn tree_hash_packing_factor() -> usize {
                u64::tree_hash_packing_factor()
            }

            fn tree_hash_root(&self) -> Hash256 {
                self.0.tree_hash_root()
            }
        }
    };
}

impl_tree_hash_transparent!(Slot);
impl_tree_hash_transparent!(Epoch);

macro_rules! impl_common {
    ($type:ident) => {
        impl $type {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn as_u64(&self) -> u64 {
                self.0
            }

            pub const fn as_usize(&self) -> usize {
                self.0 as usize
            }

            pub const fn max_value() -> Self {
                Self(u64::MAX)
            }

            pub fn saturating_add<T: Into<u64>>(&self, other: T) -> Self {
                Self(self.0.saturating_add(other.into()))
            }

            pub fn saturating_sub<T: Into<u64>>(&self, other: T) -> Self {
                Self(self.0.saturating_sub(other.into()))
            }

            pub fn checked_sub<T: Into<u64>>(&self, other: T) -> Option<Self> {
                self.0.checked_sub(other.into()).map(Self)
            }
        }

        impl From<u64> for $type {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$type> for u64 {
            fn from(value: $type) -> u64 {
                value.0
            }
        }

        impl Add<u64> for $type {
            type Output = Self;
            fn add(self, other: u64) -> Self {
                Self(self.0 + other)
            }
        }

        impl Add<$type> for $type {
            type Output = Self;
            fn add(self, other: $type) -> Self {
                Self(self.0 + other.0)
            }
        }

        impl AddAssign<u64> for $type {
            fn add_assign(&mut self, other: u64) {
                self.0 += other;
            }
        }

        impl Sub<u64> for $type {
            type Output = Self;
            fn sub(self, other: u64) -> Self {
                Self(self.0 - other)
            }
        }

        impl Sub<$type> for $type {
            type Output = Self;
            fn sub(self, other: $type) -> Self {
                Self(self.0 - other.0)
            }
        }

        impl SubAssign<u64> for $type {
            fn sub_assign(&mut self, other: u64) {
                self.0 -= other;
            }
        }

        impl Mul<u64> for $type {
            type Output = Self;
            fn mul(self, other: u64) -> Self {
                Self(self.0 * other)
            }
        }

        impl Div<u64> for $type {
            type Output = Self;
            fn div(self, other: u64) -> Self {
                Self(self.0 / other)
            }
        }

        impl Rem<u64> for $type {
            type Output = Self;
            fn rem(self, other: u64) -> Self {
                Self(self.0 % other)
            }
        }

        impl PartialEq<u64> for $type {
            fn eq(&self, other: &u64) -> bool {
                self.0 == *other
            }
        }

        impl PartialOrd<u64> for $type {
            fn partial_cmp(&self, other: &u64) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($type), self.0)
            }
        }

        impl std::str::FromStr for $type {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                u64::from_str(s).map(Self)
            }
        }
    };
}

impl_common!(Slot);
impl_common!(Epoch);

impl Slot {
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch(self.0 / slots_per_epoch)
    }
}

impl Epoch {
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot(self.0.saturating_mul(slots_per_epoch))
    }

    pub fn end_slot(self, slots_per_epoch: u64) -> Slot {
        Slot(
            self.0
                .saturating_add(1)
                .saturating_mul(slots_per_epoch)
                .saturating_sub(1),
        )
    }

    /// An iterator over all slots in `self`.
    pub fn slot_iter(self, slots_per_epoch: u64) -> impl Iterator<Item = Slot> {
        let start = self.start_slot(slots_per_epoch).as_u64();
        (start..start + slots_per_epoch).map(Slot::new)
    }
}
