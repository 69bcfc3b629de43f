pub use alloy_primitives::{B256, FixedBytes};

pub type Hash256 = B256;
pub type Hash64 = alloy_primitives::B64;

/// Helpers that existed on the pre-alloy hash types and that the rest of
/// the codebase still leans on.
pub trait FixedBytesExtended {
    fn from_low_u64_be(value: u64) -> Self;
    fn from_low_u64_le(value: u64) -> Self;
    fn zero() -> Self;
}

impl<const N: usize> FixedBytesExtended for FixedBytes<N> {
    fn from_low_u64_be(value: u64) -> Self {
        let value_bytes = value.to_be_bytes();
        let mut buffer = [0x0; N];
        let bytes_to_copy = value_bytes.len().min(buffer.len());
        // Panic-free because bytes_to_copy <= buffer.len()
        let start_index = buffer.len().saturating_sub(bytes_to_copy);
        // Panic-free because start_index <= buffer.len()
        // and bytes_to_copy <= value_bytes.len()
        buffer
            .get_mut(start_index..)
            .expect("start_index <= buffer.len()")
            .copy_from_slice(
                value_bytes
                    .get(value_bytes.len().saturating_sub(bytes_to_copy)..)
                    .expect("bytes_to_copy <= value_byte.len()"),
            );
        Self::from(buffer)
    }

    fn from_low_u64_le(value: u64) -> Self {
        let value_bytes = value.to_le_bytes();
        let mut buffer = [0x0; N];
        let bytes_to_copy = value_bytes.len().min(buffer.len());
        buffer
            .get_mut(..bytes_to_copy)
            .expect("bytes_to_copy <= buffer.len()")
            .copy_from_slice(
                value_bytes
                    .get(..bytes_to_copy)
                    .expect("bytes_to_copy <= value_byte.len()"),
            );
        Self::from(buffer)
    }

    fn zero() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_low_u64_be_matches_expected_layout() {
        let hash = Hash256::from_low_u64_be(0x0102_0304);
        assert_eq!(&hash.as_slice()[28..], &[0x01, 0x02, 0x03, 0x04]);
        assert!(hash.as_slice()[..28].iter().all(|b| *b == 0));
    }

    #[test]
    fn from_low_u64_le_matches_expected_layout() {
        let hash = Hash256::from_low_u64_le(0x0102_0304);
        assert_eq!(&hash.as_slice()[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert!(hash.as_slice()[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn zero_is_all_zero() {
        assert_eq!(Hash256::zero(), Hash256::ZERO);
    }
}
