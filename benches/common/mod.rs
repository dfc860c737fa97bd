#![allow(dead_code)]

use clmm_pool_engine::config::{FeeTier, PoolConfig};
use clmm_pool_engine::math::{
    bit_math, liquidity_amounts, math_helpers, sqrt_price_math, swap_math, tick_bitmap, tick_math,
};
use clmm_pool_engine::pool::callback::{MemoryHost, PayingCallback};
use clmm_pool_engine::pool::liquidity::MintParams;
use clmm_pool_engine::pool::swap::SwapParams;
use clmm_pool_engine::{Address, FastMap, I256, Q96, U256, V3Pool};
use criterion::{BatchSize, Criterion, black_box};

const LP: Address = Address::repeat_byte(0x11);
const TRADER: Address = Address::repeat_byte(0x22);

pub fn bench_tick_math(c: &mut Criterion) {
    let ticks = [-887272, -200_000, -600, 0, 1, 600, 200_000, 887272];
    c.bench_function("tick_math/get_sqrt_ratio_at_tick", |b| {
        b.iter(|| {
            for tick in ticks {
                black_box(tick_math::get_sqrt_ratio_at_tick(black_box(tick)).unwrap());
            }
        })
    });

    let prices: Vec<U256> = ticks
        .iter()
        .map(|tick| tick_math::get_sqrt_ratio_at_tick(*tick).unwrap())
        .filter(|price| *price < tick_math::MAX_SQRT_RATIO)
        .collect();
    c.bench_function("tick_math/get_tick_at_sqrt_ratio", |b| {
        b.iter(|| {
            for price in &prices {
                black_box(tick_math::get_tick_at_sqrt_ratio(black_box(*price)).unwrap());
            }
        })
    });
}

pub fn bench_sqrt_price_math(c: &mut Criterion) {
    let price = Q96;
    let liquidity = 10u128.pow(18);
    let amount = U256::from(10u128.pow(15));
    let target = tick_math::get_sqrt_ratio_at_tick(-600).unwrap();

    c.bench_function("sqrt_price_math/next_from_input", |b| {
        b.iter(|| {
            black_box(
                sqrt_price_math::get_next_sqrt_price_from_input(
                    black_box(price),
                    black_box(liquidity),
                    black_box(amount),
                    true,
                )
                .unwrap(),
            )
        })
    });
    c.bench_function("sqrt_price_math/next_from_output", |b| {
        b.iter(|| {
            black_box(
                sqrt_price_math::get_next_sqrt_price_from_output(
                    black_box(price),
                    black_box(liquidity),
                    black_box(amount),
                    false,
                )
                .unwrap(),
            )
        })
    });
    c.bench_function("sqrt_price_math/amount_deltas", |b| {
        b.iter(|| {
            black_box(
                sqrt_price_math::get_amount_0_delta_base(target, price, liquidity, true).unwrap(),
            );
            black_box(
                sqrt_price_math::get_amount_1_delta_base(target, price, liquidity, true).unwrap(),
            );
        })
    });
}

pub fn bench_swap_math(c: &mut Criterion) {
    let target = tick_math::get_sqrt_ratio_at_tick(-600).unwrap();
    let liquidity = 10u128.pow(18);
    let exact_in = I256::from_raw(U256::from(10u128.pow(15)));
    let exact_out = -exact_in;

    c.bench_function("swap_math/compute_swap_step_exact_in", |b| {
        b.iter(|| {
            black_box(
                swap_math::compute_swap_step(
                    black_box(Q96),
                    black_box(target),
                    liquidity,
                    black_box(exact_in),
                    3000,
                )
                .unwrap(),
            )
        })
    });
    c.bench_function("swap_math/compute_swap_step_exact_out", |b| {
        b.iter(|| {
            black_box(
                swap_math::compute_swap_step(
                    black_box(Q96),
                    black_box(target),
                    liquidity,
                    black_box(exact_out),
                    3000,
                )
                .unwrap(),
            )
        })
    });
}

pub fn bench_math_helpers(c: &mut Criterion) {
    let a = U256::MAX >> 3usize;
    let b = U256::from(10u128.pow(30));
    let denominator = U256::MAX >> 1usize;
    c.bench_function("math_helpers/mul_div", |bench| {
        bench.iter(|| {
            black_box(math_helpers::mul_div(black_box(a), black_box(b), black_box(denominator)))
        })
    });
    c.bench_function("math_helpers/mul_div_rounding_up", |bench| {
        bench.iter(|| {
            black_box(math_helpers::mul_div_rounding_up(
                black_box(a),
                black_box(b),
                black_box(denominator),
            ))
        })
    });
}

pub fn bench_tick_bitmap(c: &mut Criterion) {
    let mut bitmap: FastMap<i16, U256> = FastMap::default();
    for tick in (-6_000..=6_000).step_by(600) {
        tick_bitmap::flip_tick(&mut bitmap, tick, 60).unwrap();
    }
    c.bench_function("tick_bitmap/next_initialized_tick_within_one_word", |b| {
        b.iter(|| {
            black_box(
                tick_bitmap::next_initialized_tick_within_one_word(&bitmap, black_box(30), 60, true)
                    .unwrap(),
            );
            black_box(
                tick_bitmap::next_initialized_tick_within_one_word(&bitmap, black_box(30), 60, false)
                    .unwrap(),
            );
        })
    });
    c.bench_function("tick_bitmap/flip_tick", |b| {
        b.iter(|| {
            tick_bitmap::flip_tick(&mut bitmap, black_box(120), 60).unwrap();
        })
    });
}

pub fn bench_bit_math(c: &mut Criterion) {
    let x = U256::from(1u8) << 200usize | U256::from(1u8) << 3usize;
    c.bench_function("bit_math/msb_lsb", |b| {
        b.iter(|| {
            black_box(bit_math::most_significant_bit(black_box(x)).unwrap());
            black_box(bit_math::least_significant_bit(black_box(x)).unwrap());
        })
    });
}

pub fn bench_liquidity_amounts(c: &mut Criterion) {
    let lower = tick_math::get_sqrt_ratio_at_tick(-600).unwrap();
    let upper = tick_math::get_sqrt_ratio_at_tick(600).unwrap();
    let amount = U256::from(10u128.pow(18));
    c.bench_function("liquidity_amounts/get_liquidity_for_amounts", |b| {
        b.iter(|| {
            black_box(
                liquidity_amounts::get_liquidity_for_amounts(
                    black_box(Q96),
                    lower,
                    upper,
                    amount,
                    amount,
                )
                .unwrap(),
            )
        })
    });
}

/// 0.3% pool at price 1 with liquidity stacked over several ranges so that
/// large swaps cross ticks.
pub fn funded_pool() -> (V3Pool, MemoryHost) {
    let config = PoolConfig::from_fee_tier(
        Address::repeat_byte(0xfa),
        Address::repeat_byte(0x0a),
        Address::repeat_byte(0x01),
        Address::repeat_byte(0x02),
        FeeTier::Medium,
    );
    let mut pool = V3Pool::new(Address::repeat_byte(0xaa), config).unwrap();
    let mut host = MemoryHost::new(1_000);
    pool.initialize(Q96, host.block_timestamp).unwrap();

    let supply = U256::from(10u128.pow(36));
    for account in [LP, TRADER] {
        host.mint_tokens(pool.token0(), account, supply);
        host.mint_tokens(pool.token1(), account, supply);
    }
    let mut payer = PayingCallback::new(LP);
    for width in 1..=20 {
        let params = MintParams::new(LP, -600 * width, 600 * width, 10u128.pow(18));
        pool.mint(&mut host, params, &mut payer, &[]).unwrap();
    }
    (pool, host)
}

pub fn bench_pool_swap(c: &mut Criterion) {
    let (pool, host) = funded_pool();
    let small = SwapParams::new(
        TRADER,
        true,
        I256::from_raw(U256::from(10u128.pow(15))),
        tick_math::MIN_SQRT_RATIO + U256::ONE,
    );
    let crossing = SwapParams::new(
        TRADER,
        false,
        I256::from_raw(U256::from(10u128.pow(21))),
        tick_math::MAX_SQRT_RATIO - U256::ONE,
    );

    for (name, params) in [("pool/swap_in_range", small), ("pool/swap_crossing_ticks", crossing)] {
        c.bench_function(name, |b| {
            b.iter_batched(
                || (pool.clone(), host.clone()),
                |(mut pool, mut host)| {
                    black_box(
                        pool.swap(&mut host, params, &mut PayingCallback::new(TRADER), &[])
                            .unwrap(),
                    )
                },
                BatchSize::SmallInput,
            )
        });
    }
}

pub fn bench_pool_mint_burn(c: &mut Criterion) {
    let (pool, host) = funded_pool();
    c.bench_function("pool/mint_then_burn", |b| {
        b.iter_batched(
            || (pool.clone(), host.clone()),
            |(mut pool, mut host)| {
                let params = MintParams::new(LP, -1_200, 1_800, 10u128.pow(18));
                pool.mint(&mut host, params, &mut PayingCallback::new(LP), &[])
                    .unwrap();
                black_box(
                    pool.burn(&host, LP, -1_200, 1_800, 10u128.pow(18))
                        .unwrap(),
                )
            },
            BatchSize::SmallInput,
        )
    });
}
