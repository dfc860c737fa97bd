use crate::FastMap;
use crate::U256_1;
use crate::error::{MathError, PoolError};
use crate::math::bit_math::{least_significant_bit, most_significant_bit};
use alloy_primitives::U256;
use std::ops::Shr;

/// Maps a compressed tick (`tick / tick_spacing`) to its `(word, bit)`
/// coordinates in the sparse bitmap. Negative ticks land in negative words.
pub fn position(tick: i32) -> (i16, u8) {
    (tick.shr(8) as i16, tick.rem_euclid(256) as u8)
}

/// Returns the bitmap word stored at `word`, or zero if absent.
pub fn get_word(bitmap: &FastMap<i16, U256>, word: i16) -> U256 {
    bitmap.get(&word).copied().unwrap_or(U256::ZERO)
}

/// Toggles the initialized flag of `tick`.
///
/// `tick` must be a multiple of `tick_spacing`. Words that become empty
/// are removed so the map only holds words with at least one set bit.
pub fn flip_tick(
    tick_bitmap: &mut FastMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
) -> Result<(), PoolError> {
    if tick % tick_spacing != 0 {
        return Err(PoolError::TickNotAligned);
    }

    let (word_pos, bit_pos) = position(tick / tick_spacing);
    let mask = U256_1 << bit_pos as usize;
    let word = get_word(tick_bitmap, word_pos) ^ mask;
    if word.is_zero() {
        tick_bitmap.remove(&word_pos);
    } else {
        tick_bitmap.insert(word_pos, word);
    }
    Ok(())
}

/// Whether the flag for `tick` is set. Unaligned ticks are never set.
pub fn is_initialized(tick_bitmap: &FastMap<i16, U256>, tick: i32, tick_spacing: i32) -> bool {
    if tick % tick_spacing != 0 {
        return false;
    }
    let (word_pos, bit_pos) = position(tick / tick_spacing);
    !(get_word(tick_bitmap, word_pos) & (U256_1 << bit_pos as usize)).is_zero()
}

/// Searches the word containing `tick` for the next initialized tick.
///
/// With `lte` the search covers `tick` itself and everything below it in
/// the same word; otherwise it covers strictly greater ticks. When nothing
/// is set, the word boundary is returned with `initialized = false`, so a
/// caller may step across at most one word per call.
pub fn next_initialized_tick_within_one_word(
    bitmap: &FastMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
    lte: bool,
) -> Result<(i32, bool), MathError> {
    // round towards negative infinity
    let compressed: i32 = tick.div_euclid(tick_spacing);

    if lte {
        let (word_pos, bit_pos) = position(compressed);

        // all bits at or to the right of bit_pos
        let mask: U256 = (U256_1 << bit_pos as usize) - U256_1 + (U256_1 << bit_pos as usize);
        let masked: U256 = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();

        let next: i32 = if initialized {
            (compressed - (bit_pos - most_significant_bit(masked)?) as i32) * tick_spacing
        } else {
            (compressed - bit_pos as i32) * tick_spacing
        };
        Ok((next, initialized))
    } else {
        let (word_pos, bit_pos) = position(compressed + 1);

        // all bits at or to the left of bit_pos
        let mask: U256 = ((U256_1 << bit_pos as usize) - U256_1) ^ U256::MAX;
        let masked: U256 = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();

        let next: i32 = if initialized {
            (compressed + 1 + (least_significant_bit(masked)? - bit_pos) as i32) * tick_spacing
        } else {
            (compressed + 1 + (255u8 - bit_pos) as i32) * tick_spacing
        };
        Ok((next, initialized))
    }
}
