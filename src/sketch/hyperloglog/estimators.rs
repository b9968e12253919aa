pub type CounterType = u8;

const TWO_32: f64 = 4_294_967_296.0;

// `leading_zeros` is defined for zero and returns the width, which is the
// value the register update expects.
#[inline]
pub fn clz32(x: u32) -> u32 {
    x.leading_zeros()
}

#[inline]
pub fn clz64(x: u64) -> u32 {
    x.leading_zeros()
}

#[inline]
pub fn clz128(x: u128) -> u32 {
    let high = (x >> 64) as u64;
    if high != 0 {
        clz64(high)
    } else {
        64 + clz64(x as u64)
    }
}

/// Normalization constant for `m` registers.
pub fn alpha(m: usize) -> f64 {
    0.7213 / (1.0 + 1.079 / (m as f64))
}

/// Inverse of the sum of register weights, `1 / sum(2^-r)`.
pub fn harmonic_mean(registers: &[CounterType]) -> f64 {
    let sum: f64 = registers
        .iter()
        .map(|&r| 2f64.powi(-i32::from(r)))
        .sum();
    1. / sum
}

/// `alpha_m * m^2 / sum(2^-r)`, multiplied in an order that never forms `m^2`.
pub fn raw_estimate(registers: &[CounterType], alpha_m: f64) -> f64 {
    let m = registers.len() as f64;
    (alpha_m * harmonic_mean(registers) * m) * m
}

pub fn count_zeros(registers: &[CounterType]) -> usize {
    registers.iter().filter(|&&r| r == 0).count()
}

/// Apply the small-range (linear counting) and large-range corrections.
///
/// The large-range correction only exists for 32-bit hashes.
pub fn bias_correction(raw_estimate: f64, registers: &[CounterType], hash_bits: u32) -> f64 {
    let m = registers.len() as f64;

    if raw_estimate <= 2.5 * m {
        let zeros = count_zeros(registers);
        if zeros != 0 {
            return m * (m / zeros as f64).ln();
        }
    }

    if hash_bits == 32 && raw_estimate > TWO_32 / 30. {
        return -TWO_32 * (1. - raw_estimate / TWO_32).ln();
    }

    raw_estimate
}

pub fn estimate(registers: &[CounterType], alpha_m: f64, hash_bits: u32) -> usize {
    let e = raw_estimate(registers, alpha_m);
    bias_correction(e, registers, hash_bits) as usize
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clz_widths() {
        assert_eq!(clz32(0), 32);
        assert_eq!(clz32(1), 31);
        assert_eq!(clz32(u32::MAX), 0);

        assert_eq!(clz64(0), 64);
        assert_eq!(clz64(1 << 40), 23);

        assert_eq!(clz128(0), 128);
        assert_eq!(clz128(1), 127);
        assert_eq!(clz128(1 << 64), 63);
        assert_eq!(clz128(u128::MAX), 0);
        assert_eq!(clz128(0x0000_0000_0000_0000_8000_0000_0000_0000), 64);
    }

    #[test]
    fn alpha_values() {
        assert!((alpha(16) - 0.7213 / (1. + 1.079 / 16.)).abs() < 1e-12);
        assert!(alpha(1 << 20) < 0.7213);
        assert!(alpha(1 << 20) > 0.7212);
    }

    #[test]
    fn empty_registers() {
        let registers = vec![0; 1024];
        assert!((harmonic_mean(&registers) - 1. / 1024.).abs() < 1e-15);

        let e = raw_estimate(&registers, alpha(1024));
        assert!((e - alpha(1024) * 1024.).abs() < 1e-9);

        assert_eq!(estimate(&registers, alpha(1024), 64), 0);
    }

    #[test]
    fn linear_counting_regime() {
        let mut registers = vec![0; 1024];
        registers[7] = 3;

        // one occupied bucket: 1024 * ln(1024 / 1023)
        assert_eq!(estimate(&registers, alpha(1024), 64), 1);

        for r in registers.iter_mut().take(100) {
            *r = 1;
        }
        let expected = 1024. * (1024f64 / 924.).ln();
        assert_eq!(estimate(&registers, alpha(1024), 64), expected as usize);
    }

    #[test]
    fn saturated_registers_skip_linear_counting() {
        let registers = vec![1; 16];
        let e = raw_estimate(&registers, alpha(16));
        assert!(e <= 2.5 * 16.);
        assert_eq!(count_zeros(&registers), 0);
        assert_eq!(bias_correction(e, &registers, 64), e);
        assert_eq!(estimate(&registers, alpha(16), 64), e as usize);
    }

    #[test]
    fn large_range_only_for_32_bits() {
        let registers = vec![24; 16];
        let e = raw_estimate(&registers, alpha(16));
        assert!(e > TWO_32 / 30.);

        let corrected = bias_correction(e, &registers, 32);
        assert!(corrected > e);
        assert_eq!(corrected, -TWO_32 * (1. - e / TWO_32).ln());

        assert_eq!(bias_correction(e, &registers, 64), e);
        assert_eq!(bias_correction(e, &registers, 128), e);
    }

    #[test]
    fn high_registers_do_not_overflow() {
        let registers = vec![120; 8];
        let e = raw_estimate(&registers, alpha(8));
        assert!(e.is_finite());
        assert!(e > 1e30);

        let registers = vec![128; 4];
        assert!(harmonic_mean(&registers).is_finite());
    }
}
