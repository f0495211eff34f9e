//! Conversions between emulated CPU ticks and wall-clock units.
//!
//! All conversions go through `u128` intermediates and saturate at `u64::MAX`, so callers can feed
//! arbitrary values without overflow panics.

/// Clock rate of the application cores, in ticks per second.
pub const BASE_CLOCK_RATE_ARM11: u64 = 268_111_856;

const US_PER_SEC: u128 = 1_000_000;
const MS_PER_SEC: u128 = 1_000;
const NS_PER_SEC: u128 = 1_000_000_000;

#[inline]
fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Converts CPU ticks to whole microseconds (rounded down).
pub fn cycles_to_us(cycles: u64) -> u64 {
    saturate(u128::from(cycles) * US_PER_SEC / u128::from(BASE_CLOCK_RATE_ARM11))
}

pub fn us_to_cycles(us: u64) -> u64 {
    saturate(u128::from(us) * u128::from(BASE_CLOCK_RATE_ARM11) / US_PER_SEC)
}

pub fn ms_to_cycles(ms: u64) -> u64 {
    saturate(u128::from(ms) * u128::from(BASE_CLOCK_RATE_ARM11) / MS_PER_SEC)
}

pub fn ns_to_cycles(ns: u64) -> u64 {
    saturate(u128::from(ns) * u128::from(BASE_CLOCK_RATE_ARM11) / NS_PER_SEC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_second_of_cycles_is_one_million_us() {
        assert_eq!(cycles_to_us(BASE_CLOCK_RATE_ARM11), 1_000_000);
        assert_eq!(ms_to_cycles(1_000), BASE_CLOCK_RATE_ARM11);
        assert_eq!(us_to_cycles(1_000_000), BASE_CLOCK_RATE_ARM11);
        assert_eq!(ns_to_cycles(1_000_000_000), BASE_CLOCK_RATE_ARM11);
    }

    #[test]
    fn sub_microsecond_cycle_counts_round_down() {
        // ~268 cycles per microsecond.
        assert_eq!(cycles_to_us(200), 0);
        assert_eq!(cycles_to_us(269), 1);
    }

    #[test]
    fn large_inputs_saturate_instead_of_overflowing() {
        assert_eq!(us_to_cycles(u64::MAX), u64::MAX);
        assert_eq!(ms_to_cycles(u64::MAX), u64::MAX);

        let expected =
            u128::from(u64::MAX) * 1_000_000 / u128::from(BASE_CLOCK_RATE_ARM11);
        assert_eq!(u128::from(cycles_to_us(u64::MAX)), expected);
    }
}
