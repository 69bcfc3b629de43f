//! Byte-level BLS primitives and the batch-verification seam.
//!
//! The actual pairing backend is an external collaborator; this crate only
//! carries the fixed-width byte containers that flow through blocks and
//! attestations, plus the `BlsBatchVerifier` trait the verification
//! pipelines call into.

use fixed_bytes::Hash256;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;

pub const PUBLIC_KEY_BYTES_LEN: usize = 48;
pub const SIGNATURE_BYTES_LEN: usize = 96;

macro_rules! bytes_struct {
    ($name:ident, $len:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub fn empty() -> Self {
                Self([0; $len])
            }

            pub fn as_serialized(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self)
            }
        }

        impl Encode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $len
            }

            fn ssz_bytes_len(&self) -> usize {
                $len
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.0)
            }
        }

        impl Decode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $len
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                if bytes.len() != $len {
                    return Err(DecodeError::InvalidByteLength {
                        len: bytes.len(),
                        expected: $len,
                    });
                }
                let mut array = [0; $len];
                array.copy_from_slice(bytes);
                Ok(Self(array))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&format!("{}", self))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let string = String::deserialize(deserializer)?;
                let bytes = hex::decode(string.trim_start_matches("0x"))
                    .map_err(D::Error::custom)?;
                if bytes.len() != $len {
                    return Err(D::Error::custom("incorrect byte length"));
                }
                let mut array = [0; $len];
                array.copy_from_slice(&bytes);
                Ok(Self(array))
            }
        }
    };
}

bytes_struct!(
    PublicKeyBytes,
    PUBLIC_KEY_BYTES_LEN,
    "A compressed BLS public key, not guaranteed to lie on the curve."
);
bytes_struct!(
    SignatureBytes,
    SIGNATURE_BYTES_LEN,
    "A compressed BLS signature, not guaranteed to lie on the curve."
);

/// One entry of a batch verification: all `pubkeys` signed `signing_root`
/// producing the aggregate `signature`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureSet {
    pub pubkeys: Vec<PublicKeyBytes>,
    pub signing_root: Hash256,
    pub signature: SignatureBytes,
}

/// Batch verification seam. Implementations are expected to be offloaded
/// onto a worker pool by the caller; the trait itself stays synchronous.
pub trait BlsBatchVerifier: Send + Sync {
    /// Returns `true` only if every set in the batch verifies.
    fn verify_batch(&self, sets: &[SignatureSet]) -> bool;
}

/// Accepts every signature. Only for tests and interop harnesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysValidBls;

impl BlsBatchVerifier for AlwaysValidBls {
    fn verify_batch(&self, _sets: &[SignatureSet]) -> bool {
        true
    }
}

/// Rejects every signature. Only for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysInvalidBls;

impl BlsBatchVerifier for AlwaysInvalidBls {
    fn verify_batch(&self, _sets: &[SignatureSet]) -> bool {
        false
    }
}
