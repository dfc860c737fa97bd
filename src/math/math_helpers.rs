use crate::error::MathError;
use alloy_primitives::U256;

const U256_TWO: U256 = U256::from_limbs([2, 0, 0, 0]);
const U256_THREE: U256 = U256::from_limbs([3, 0, 0, 0]);

#[cold]
#[inline(never)]
const fn cold_path() {}

/// Branch hint for error paths; stable replacement for `core::intrinsics::unlikely`.
#[inline(always)]
pub(crate) const fn unlikely(b: bool) -> bool {
    if b {
        cold_path();
    }
    b
}

/// Computes `⌊a * b / denominator⌋` with a full 512‑bit intermediate
/// product, so `a * b` may exceed 256 bits as long as the quotient fits.
///
/// Fails with `MathError::DivisionByZero` when `denominator == 0` and with
/// `MathError::Overflow` when the quotient does not fit in 256 bits.
#[inline]
pub fn mul_div(a: U256, b: U256, mut denominator: U256) -> Result<U256, MathError> {
    if unlikely(denominator.is_zero()) {
        return Err(MathError::DivisionByZero);
    }

    // 512-bit product [prod1 prod0] via the Chinese remainder theorem.
    let mm = a.mul_mod(b, U256::MAX);
    let mut prod0 = a.wrapping_mul(b);
    let (mut prod1, borrow) = mm.overflowing_sub(prod0);
    if borrow {
        prod1 = prod1.wrapping_sub(U256::ONE);
    }

    if prod1.is_zero() {
        return Ok(prod0.wrapping_div(denominator));
    }

    if unlikely(denominator <= prod1) {
        return Err(MathError::Overflow);
    }

    // make the division exact by subtracting the remainder from [prod1 prod0]
    let remainder = a.mul_mod(b, denominator);
    let (prod0_sub, borrow) = prod0.overflowing_sub(remainder);
    prod0 = prod0_sub;
    if borrow {
        prod1 = prod1.wrapping_sub(U256::ONE);
    }

    // factor powers of two out of the denominator
    let twos = denominator & denominator.wrapping_neg();
    denominator = denominator.wrapping_div(twos);
    prod0 = prod0.wrapping_div(twos);

    let flip = twos
        .wrapping_neg()
        .wrapping_div(twos)
        .wrapping_add(U256::ONE);
    prod0 |= prod1.wrapping_mul(flip);

    // modular inverse of the (now odd) denominator, correct to 4 bits,
    // then doubled in precision by each Newton-Raphson step up to 256 bits
    let mut inv = U256_THREE.wrapping_mul(denominator) ^ U256_TWO;
    for _ in 0..6 {
        inv = inv.wrapping_mul(U256_TWO.wrapping_sub(denominator.wrapping_mul(inv)));
    }

    Ok(prod0.wrapping_mul(inv))
}

/// Like [`mul_div`], but rounds the quotient up when the division leaves
/// a remainder. Rounding up past `U256::MAX` is reported as overflow.
#[inline]
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    let result = mul_div(a, b, denominator)?;

    if a.mul_mod(b, denominator).is_zero() {
        return Ok(result);
    }
    result.checked_add(U256::ONE).ok_or(MathError::Overflow)
}

/// Divides `a` by `b`, rounding up when there is a remainder.
///
/// Panics on `b == 0` like primitive division; callers guarantee a
/// non‑zero divisor.
#[inline]
pub fn div_rounding_up(a: U256, b: U256) -> U256 {
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::ONE
    }
}
