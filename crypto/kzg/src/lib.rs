//! KZG byte primitives and the batched verification seam.
//!
//! The polynomial-commitment backend is an external collaborator. Blobs
//! and cells are treated as opaque byte payloads here; only the backend
//! interprets them.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;

pub const BYTES_PER_COMMITMENT: usize = 48;
pub const BYTES_PER_PROOF: usize = 48;

macro_rules! point_struct {
    ($name:ident, $len:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub fn empty() -> Self {
                Self([0; $len])
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

point_struct!(
    KzgCommitment,
    BYTES_PER_COMMITMENT,
    "A KZG commitment binding a blob."
);
point_struct!(
    KzgProof,
    BYTES_PER_PROOF,
    "A KZG proof for a blob or cell against its commitment."
);

macro_rules! opaque_bytes_struct {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Vec<u8>);

        impl $name {
            pub fn new(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({} bytes)", stringify!($name), self.0.len())
            }
        }

        impl Encode for $name {
            fn is_ssz_fixed_len() -> bool {
                false
            }

            fn ssz_bytes_len(&self) -> usize {
                self.0.len()
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.0)
            }
        }

        impl Decode for $name {
            fn is_ssz_fixed_len() -> bool {
                false
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                Ok(Self(bytes.to_vec()))
            }
        }
    };
}

opaque_bytes_struct!(Blob, "An opaque blob payload bound by a commitment.");
opaque_bytes_struct!(Cell, "One cell of the extended-blob matrix.");

#[derive(Debug, Clone, PartialEq)]
pub enum KzgError {
    /// The backend rejected the batch.
    VerificationFailed,
    /// Inputs were structurally malformed (length mismatches etc).
    InvalidInput(String),
    /// The backend itself errored.
    BackendError(String),
}

impl fmt::Display for KzgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KzgError::VerificationFailed => write!(f, "kzg verification failed"),
            KzgError::InvalidInput(reason) => write!(f, "invalid kzg input: {reason}"),
            KzgError::BackendError(reason) => write!(f, "kzg backend error: {reason}"),
        }
    }
}

/// Batched KZG verification seam.
///
/// Both methods return `Ok(true)` if the whole batch verifies, `Ok(false)`
/// if the batch is well-formed but does not verify, and `Err` on
/// structural or backend failure.
pub trait KzgVerifier: Send + Sync {
    fn verify_blob_batch(
        &self,
        blobs: &[&Blob],
        commitments: &[KzgCommitment],
        proofs: &[KzgProof],
    ) -> Result<bool, KzgError>;

    fn verify_cell_batch(
        &self,
        commitments: &[KzgCommitment],
        cell_indices: &[u64],
        cells: &[&Cell],
        proofs: &[KzgProof],
    ) -> Result<bool, KzgError>;
}

/// Verifier that accepts every structurally well-formed batch. Used in
/// tests and for data recovered from a trusted execution engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustedKzg;

impl KzgVerifier for TrustedKzg {
    fn verify_blob_batch(
        &self,
        blobs: &[&Blob],
        commitments: &[KzgCommitment],
        proofs: &[KzgProof],
    ) -> Result<bool, KzgError> {
        if blobs.len() != commitments.len() || blobs.len() != proofs.len() {
            return Err(KzgError::InvalidInput(format!(
                "blob batch length mismatch: {} blobs, {} commitments, {} proofs",
                blobs.len(),
                commitments.len(),
                proofs.len()
            )));
        }
        Ok(true)
    }

    fn verify_cell_batch(
        &self,
        commitments: &[KzgCommitment],
        cell_indices: &[u64],
        cells: &[&Cell],
        proofs: &[KzgProof],
    ) -> Result<bool, KzgError> {
        if commitments.len() != cells.len()
            || cell_indices.len() != cells.len()
            || proofs.len() != cells.len()
        {
            return Err(KzgError::InvalidInput(format!(
                "cell batch length mismatch: {} commitments, {} indices, {} cells, {} proofs",
                commitments.len(),
                cell_indices.len(),
                cells.len(),
                proofs.len()
            )));
        }
        Ok(true)
    }
}
