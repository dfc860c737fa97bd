use crate::error::StateError;
use alloy_primitives::{I256, U256};

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = -MIN_TICK;

/// `get_sqrt_ratio_at_tick(MIN_TICK)`
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);
/// `get_sqrt_ratio_at_tick(MAX_TICK)`
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([6743328256752651558, 17280870778742802505, 4294805859, 0]);

/// log_sqrt(1.0001)(2) as Q128
const LOG_SQRT_10001: I256 =
    I256::from_raw(U256::from_limbs([11745905768312294533, 13863, 0, 0]));
/// Error bounds of the log approximation, Q128.
const TICK_LOW: I256 = I256::from_raw(U256::from_limbs([
    6552757943157144234,
    184476617836266586,
    0,
    0,
]));
const TICK_HIGH: I256 = I256::from_raw(U256::from_limbs([
    4998474450511881007,
    15793544031827761793,
    0,
    0,
]));

/// Returns the sqrt price (Q64.96 fixed‑point) at a given tick, that is
/// `sqrt(1.0001^tick) * 2^96`, or `StateError::TickOutOfBounds` if
/// `|tick| > MAX_TICK`.
///
/// The absolute tick is decomposed into bits; every set bit multiplies in
/// a precomputed `1 / sqrt(1.0001)^(2^i)` factor in Q128. Positive ticks
/// invert the product, and the final Q128 → Q96 conversion rounds up so
/// that `get_tick_at_sqrt_ratio` of the result is always `tick`.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, StateError> {
    let abs_tick = tick.unsigned_abs();

    if abs_tick > MAX_TICK as u32 {
        return Err(StateError::TickOutOfBounds);
    }

    let mut ratio = if abs_tick & 1 != 0 {
        U256::from_limbs([12262481743371124737, 18445821805675392311, 0, 0])
    } else {
        U256::from_limbs([0, 0, 1, 0])
    };

    macro_rules! apply_multiplier {
        ($bit:expr, $l0:expr, $l1:expr) => {
            if abs_tick & $bit != 0 {
                ratio = ratio.wrapping_mul(U256::from_limbs([$l0, $l1, 0, 0])) >> 128usize;
            }
        };
    }

    apply_multiplier!(0x2, 6459403834229662010, 18444899583751176498);
    apply_multiplier!(0x4, 17226890335427755468, 18443055278223354162);
    apply_multiplier!(0x8, 2032852871939366096, 18439367220385604838);
    apply_multiplier!(0x10, 14545316742740207172, 18431993317065449817);
    apply_multiplier!(0x20, 5129152022828963008, 18417254355718160513);
    apply_multiplier!(0x40, 4894419605888772193, 18387811781193591352);
    apply_multiplier!(0x80, 1280255884321894483, 18329067761203520168);
    apply_multiplier!(0x100, 15924666964335305636, 18212142134806087854);
    apply_multiplier!(0x200, 8010504389359918676, 17980523815641551639);
    apply_multiplier!(0x400, 10668036004952895731, 17526086738831147013);
    apply_multiplier!(0x800, 4878133418470705625, 16651378430235024244);
    apply_multiplier!(0x1000, 9537173718739605541, 15030750278693429944);
    apply_multiplier!(0x2000, 9972618978014552549, 12247334978882834399);
    apply_multiplier!(0x4000, 10428997489610666743, 8131365268884726200);
    apply_multiplier!(0x8000, 9305304367709015974, 3584323654723342297);
    apply_multiplier!(0x10000, 14301143598189091785, 696457651847595233);
    apply_multiplier!(0x20000, 7393154844743099908, 26294789957452057);
    apply_multiplier!(0x40000, 2209338891292245656, 37481735321082);
    apply_multiplier!(0x80000, 10518117631919034274, 76158723);

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q128.96, rounding up
    let rounds_up = ratio.as_limbs()[0] & 0xFFFF_FFFF != 0;
    Ok((ratio >> 32usize) + U256::from(rounds_up as u8))
}

const MASK_128: U256 = U256::from_limbs([u64::MAX, u64::MAX, 0, 0]);
const MASK_64: U256 = U256::from_limbs([u64::MAX, 0, 0, 0]);
const MASK_32: U256 = U256::from_limbs([u32::MAX as u64, 0, 0, 0]);
const MASK_16: U256 = U256::from_limbs([u16::MAX as u64, 0, 0, 0]);
const MASK_8: U256 = U256::from_limbs([u8::MAX as u64, 0, 0, 0]);
const MASK_4: U256 = U256::from_limbs([0xF, 0, 0, 0]);
const MASK_2: U256 = U256::from_limbs([0x3, 0, 0, 0]);

/// Binary search for the most significant bit, returning it as `u32`.
#[inline(always)]
fn msb_of(mut r: U256) -> u32 {
    let mut msb: u32 = 0;

    macro_rules! msb_step {
        ($mask:expr, $bits:expr) => {
            if r > $mask {
                msb |= $bits;
                r >>= $bits as usize;
            }
        };
    }

    msb_step!(MASK_128, 128);
    msb_step!(MASK_64, 64);
    msb_step!(MASK_32, 32);
    msb_step!(MASK_16, 16);
    msb_step!(MASK_8, 8);
    msb_step!(MASK_4, 4);
    msb_step!(MASK_2, 2);
    msb_step!(U256::ONE, 1);

    msb
}

/// Computes the greatest tick whose sqrt ratio is less than or equal to
/// `sqrt_price_x96`, enforcing `MIN_SQRT_RATIO <= sqrt_price_x96 < MAX_SQRT_RATIO`.
///
/// log2 of the Q128 ratio is found from its msb plus 14 bits of
/// fraction obtained by repeated squaring; converting to base sqrt(1.0001)
/// yields two candidate ticks, disambiguated with one forward evaluation.
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32, StateError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(StateError::SqrtPriceOutOfBounds);
    }

    let ratio = sqrt_price_x96 << 32usize;
    let msb = msb_of(ratio);

    let mut r = if msb >= 128 {
        ratio >> (msb - 127) as usize
    } else {
        ratio << (127 - msb) as usize
    };

    let mut log_2: I256 =
        (I256::from_raw(U256::from(msb)) - I256::from_raw(U256::from(128u8))) << 64usize;

    for shift in (50..=63usize).rev() {
        r = r.wrapping_mul(r) >> 127usize;
        let f = r >> 128usize;
        log_2 |= I256::from_raw(f << shift);
        r >>= f.as_limbs()[0] as usize;
    }

    let log_sqrt10001 = log_2.wrapping_mul(LOG_SQRT_10001);
    let tick_low = (log_sqrt10001 - TICK_LOW).asr(128).low_i32();
    let tick_high = (log_sqrt10001 + TICK_HIGH).asr(128).low_i32();

    Ok(if tick_low == tick_high {
        tick_low
    } else if get_sqrt_ratio_at_tick(tick_high)? <= sqrt_price_x96 {
        tick_high
    } else {
        tick_low
    })
}

/// Largest liquidity a single tick may reference for the given spacing:
/// `u128::MAX` split evenly across every usable tick, so the active
/// liquidity can never overflow even if every tick is fully used.
///
/// Spacing must lie in `1..=MAX_TICK`.
pub fn tick_spacing_to_max_liquidity_per_tick(tick_spacing: i32) -> Result<u128, StateError> {
    if !(1..=MAX_TICK).contains(&tick_spacing) {
        return Err(StateError::InvalidTickSpacing);
    }
    let min_tick = (MIN_TICK / tick_spacing) * tick_spacing;
    let max_tick = (MAX_TICK / tick_spacing) * tick_spacing;
    let num_ticks = ((max_tick - min_tick) / tick_spacing) as u128 + 1;
    Ok(u128::MAX / num_ticks)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use std::{ops::Sub, str::FromStr};

    #[test]
    fn test_get_sqrt_ratio_at_tick_bounds() {
        assert!(matches!(
            get_sqrt_ratio_at_tick(MIN_TICK - 1),
            Err(StateError::TickOutOfBounds)
        ));
        assert!(matches!(
            get_sqrt_ratio_at_tick(MAX_TICK + 1),
            Err(StateError::TickOutOfBounds)
        ));
    }

    #[test]
    fn test_get_sqrt_ratio_at_tick_values() {
        assert_eq!(get_sqrt_ratio_at_tick(MIN_TICK).unwrap(), MIN_SQRT_RATIO);
        assert_eq!(
            get_sqrt_ratio_at_tick(MIN_TICK + 1).unwrap(),
            U256::from(4295343490u64),
            "sqrt ratio at min + 1 incorrect"
        );
        assert_eq!(
            get_sqrt_ratio_at_tick(MAX_TICK - 1).unwrap(),
            U256::from_str("1461373636630004318706518188784493106690254656249").unwrap(),
            "sqrt ratio at max - 1 incorrect"
        );
        assert_eq!(get_sqrt_ratio_at_tick(MAX_TICK).unwrap(), MAX_SQRT_RATIO);
        assert_eq!(
            MAX_SQRT_RATIO,
            U256::from_str("1461446703485210103287273052203988822378723970342").unwrap()
        );
        assert_eq!(get_sqrt_ratio_at_tick(0).unwrap(), crate::Q96);

        let expected: [(i32, &str); 12] = [
            (50, "79426470787362580746886972461"),
            (100, "79625275426524748796330556128"),
            (250, "80224679980005306637834519095"),
            (500, "81233731461783161732293370115"),
            (1000, "83290069058676223003182343270"),
            (2500, "89776708723587163891445672585"),
            (3000, "92049301871182272007977902845"),
            (4000, "96768528593268422080558758223"),
            (5000, "101729702841318637793976746270"),
            (50000, "965075977353221155028623082916"),
            (150000, "143194173941309278083010301478497"),
            (500000, "5697689776495288729098254600827762987878"),
        ];
        for (tick, value) in expected {
            assert_eq!(
                get_sqrt_ratio_at_tick(tick).unwrap(),
                U256::from_str(value).unwrap(),
                "sqrt ratio at {tick} incorrect"
            );
        }
    }

    #[test]
    fn test_get_tick_at_sqrt_ratio() {
        assert!(matches!(
            get_tick_at_sqrt_ratio(MIN_SQRT_RATIO.sub(U256::ONE)),
            Err(StateError::SqrtPriceOutOfBounds)
        ));
        assert!(matches!(
            get_tick_at_sqrt_ratio(MAX_SQRT_RATIO),
            Err(StateError::SqrtPriceOutOfBounds)
        ));

        assert_eq!(get_tick_at_sqrt_ratio(MIN_SQRT_RATIO).unwrap(), MIN_TICK);
        assert_eq!(
            get_tick_at_sqrt_ratio(U256::from(4295343490u64)).unwrap(),
            MIN_TICK + 1
        );
        assert_eq!(
            get_tick_at_sqrt_ratio(
                U256::from_str("1461373636630004318706518188784493106690254656249").unwrap()
            )
            .unwrap(),
            MAX_TICK - 1
        );
        assert_eq!(
            get_tick_at_sqrt_ratio(MAX_SQRT_RATIO - U256::ONE).unwrap(),
            MAX_TICK - 1
        );
    }

    #[test]
    fn price_just_below_a_tick_maps_to_the_previous_tick() {
        for tick in [-50_000, -1, 1, 60, 12_345] {
            let ratio = get_sqrt_ratio_at_tick(tick).unwrap();
            assert_eq!(get_tick_at_sqrt_ratio(ratio - U256::ONE).unwrap(), tick - 1);
        }
    }

    #[test]
    fn max_liquidity_per_tick_for_standard_spacings() {
        assert_eq!(
            tick_spacing_to_max_liquidity_per_tick(10).unwrap(),
            1917569901783203986719870431555990u128
        );
        assert_eq!(
            tick_spacing_to_max_liquidity_per_tick(60).unwrap(),
            11505743598341114571880798222544994u128
        );
        assert_eq!(
            tick_spacing_to_max_liquidity_per_tick(200).unwrap(),
            38350317471085141830651933667504588u128
        );
        // entire range in a single tick pair
        assert_eq!(
            tick_spacing_to_max_liquidity_per_tick(887272).unwrap(),
            u128::MAX / 3
        );
    }

    #[test]
    fn max_liquidity_per_tick_rejects_unusable_spacings() {
        for spacing in [0, -60, MAX_TICK + 1] {
            assert!(matches!(
                tick_spacing_to_max_liquidity_per_tick(spacing),
                Err(StateError::InvalidTickSpacing)
            ));
        }
    }

    proptest! {
        #[test]
        fn tick_round_trips_through_sqrt_ratio(tick in MIN_TICK..=MAX_TICK) {
            let ratio = get_sqrt_ratio_at_tick(tick).unwrap();
            if tick < MAX_TICK {
                prop_assert_eq!(get_tick_at_sqrt_ratio(ratio).unwrap(), tick);
            } else {
                prop_assert_eq!(ratio, MAX_SQRT_RATIO);
            }
        }

        #[test]
        fn sqrt_ratio_strictly_increases_with_tick(tick in MIN_TICK..MAX_TICK) {
            let lower = get_sqrt_ratio_at_tick(tick).unwrap();
            let upper = get_sqrt_ratio_at_tick(tick + 1).unwrap();
            prop_assert!(lower < upper);
        }

        #[test]
        fn tick_at_ratio_brackets_the_input(
            limbs in any::<[u64; 3]>(),
        ) {
            let raw = U256::from_limbs([limbs[0], limbs[1], limbs[2] & 0xFFFF_FFFF, 0]);
            prop_assume!(raw >= MIN_SQRT_RATIO && raw < MAX_SQRT_RATIO);
            let tick = get_tick_at_sqrt_ratio(raw).unwrap();
            prop_assert!(get_sqrt_ratio_at_tick(tick).unwrap() <= raw);
            prop_assert!(get_sqrt_ratio_at_tick(tick + 1).unwrap() > raw);
        }
    }
}
