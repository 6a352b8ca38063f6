use num::BigUint;

pub trait Math {
    fn pow2(self) -> usize;
    fn log_2(self) -> usize;
}

impl Math for usize {
    #[inline]
    fn pow2(self) -> usize {
        let base: usize = 2;
        base.pow(self as u32)
    }

    fn log_2(self) -> usize {
        assert_ne!(self, 0);

        if self.is_power_of_two() {
            (1usize.leading_zeros() - self.leading_zeros()) as usize
        } else {
            (0usize.leading_zeros() - self.leading_zeros()) as usize
        }
    }
}

/// The result of this function is only approximately `ln(a)`
/// [`Explanation of usage`]
///
/// [`Explanation of usage`]: https://github.com/scipr-lab/zexe/issues/79#issue-556220473
pub fn ln_without_floats(a: usize) -> usize {
    // log2(a) * ln(2)
    (a.log_2() * 69 / 100) as usize
}

/// Bits of `x`, least significant first, exactly `x.bits()` of them.
pub fn bits_le(x: &BigUint) -> impl DoubleEndedIterator<Item = bool> + '_ {
    let digits = x.to_u32_digits();
    let num_bits = x.bits() as usize;
    (0..num_bits).map(move |i| (digits[i / 32] >> (i % 32)) & 1 == 1)
}

/// Reads `width` (<= 32) bits of `x` starting at bit `offset`; bits past the end read as zero.
pub fn read_bits(digits: &[u32], offset: usize, width: usize) -> u32 {
    debug_assert!(width <= 32);
    if width == 0 {
        return 0;
    }
    let idx = offset / 32;
    let shift = offset % 32;
    let lo = digits.get(idx).copied().unwrap_or(0) as u64;
    let hi = digits.get(idx + 1).copied().unwrap_or(0) as u64;
    let window = ((hi << 32) | lo) >> shift;
    (window & ((1u64 << width) - 1)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_2_rounds_up() {
        assert_eq!(1usize.log_2(), 0);
        assert_eq!(8usize.log_2(), 3);
        assert_eq!(9usize.log_2(), 4);
        assert_eq!(5usize.pow2(), 32);
    }

    #[test]
    fn read_bits_across_digits() {
        let x = BigUint::parse_bytes(b"f00000000f", 16).unwrap();
        let digits = x.to_u32_digits();
        assert_eq!(read_bits(&digits, 0, 4), 0xf);
        assert_eq!(read_bits(&digits, 28, 8), 0x00);
        assert_eq!(read_bits(&digits, 36, 4), 0xf);
        assert_eq!(read_bits(&digits, 40, 16), 0);
        let bits: Vec<bool> = bits_le(&BigUint::from(6u32)).collect();
        assert_eq!(bits, vec![false, true, true]);
    }
}
