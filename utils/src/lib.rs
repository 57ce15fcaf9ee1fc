#![allow(clippy::missing_errors_doc)]

pub mod fs;

/// Integer base-2 logarithm of a power of two.
///
/// Returns `None` for zero and values that are not a power of two.
#[must_use]
pub fn log2_exact(value: u64) -> Option<u32> {
    if value.is_power_of_two() {
        Some(value.trailing_zeros())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_log2_exact() {
        assert_eq!(super::log2_exact(1), Some(0));
        assert_eq!(super::log2_exact(64), Some(6));
        assert_eq!(super::log2_exact(4096), Some(12));
        assert_eq!(super::log2_exact(0), None);
        assert_eq!(super::log2_exact(48), None);
    }
}
