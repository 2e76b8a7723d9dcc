/// mask covering the lowest `width` bits. `width` is clamped to 32.
#[inline]
pub const fn mask_lower(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width).wrapping_sub(1)
    }
}

/// `log2` of a power of two.
#[inline]
pub const fn log2(pow2: u32) -> u32 {
    pow2.trailing_zeros()
}

#[inline]
pub const fn is_pow2(v: u32) -> bool {
    v != 0 && v & (v - 1) == 0
}

/// renders the lowest `width` bits of `value`, MSB first, zero-padded.
pub fn bit_string(value: u32, width: u32) -> String {
    if width == 0 {
        return String::new();
    }
    let width = width.min(32) as usize;
    format!("{:0width$b}", value & mask_lower(width as u32))
}

/// number of bits needed to hold the binary literal `digits` (leading zeros ignored).
pub fn significant_bits(digits: &str) -> usize {
    digits.trim_start_matches('0').len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_lower() {
        assert_eq!(0, mask_lower(0));
        assert_eq!(0b111, mask_lower(3));
        assert_eq!(0x3FFF_FFFF, mask_lower(30));
        assert_eq!(u32::MAX, mask_lower(32));
        assert_eq!(u32::MAX, mask_lower(40));
    }
    #[test]
    fn test_pow2() {
        assert!(is_pow2(1));
        assert!(is_pow2(4096));
        assert!(is_pow2(1 << 31));
        assert!(!is_pow2(0));
        assert!(!is_pow2(12));
        assert_eq!(0, log2(1));
        assert_eq!(12, log2(4096));
    }
    #[test]
    fn test_bit_string() {
        assert_eq!("", bit_string(0b1011, 0));
        assert_eq!("0000001011", bit_string(0b1011, 10));
        // bits above the width are dropped
        assert_eq!("011", bit_string(0b1011, 3));
        assert_eq!("1".repeat(32), bit_string(u32::MAX, 32));
    }
    #[test]
    fn test_significant_bits() {
        assert_eq!(0, significant_bits("0000"));
        assert_eq!(3, significant_bits("000101"));
        assert_eq!(33, significant_bits(&format!("1{}", "0".repeat(32))));
    }
}
