// src/bitlength.rs
//! Self-describing variable bit-width integer codecs.
//!
//! `decode` (adaptive):
//!   per symbol: 0                 -> keep field width
//!               1 d r r .. !r     -> width += 2 per run bit (d = 1) or
//!                                    -= 2 (d = 0); the run ends at the
//!                                    first bit that differs from d
//!   then the symbol as a signed field of the current width (width 0 -> 0)
//!
//! `decode2` (block):
//!   0  minbits:6 maxbits:6 min:minbits max:maxbits  fields:width(max-min)
//!   1  mean:32 V:3 L:3 { delta:V .. (while saturated)  run:L  run x field }

use crate::bitreader::BitStream;
use crate::driver::CodecDriver;
use crate::error::{CodecError, Result};

const MAX_FIELD_WIDTH: i32 = 32;

/// Bits needed for `|symbol|`, capped at 31. Zero needs none, and so does
/// `i32::MIN`, whose magnitude has no i32 representation.
pub fn bit_field_width(symbol: i32) -> u32 {
    let Some(magnitude) = symbol.checked_abs() else {
        return 0;
    };
    if magnitude == 0 {
        return 0;
    }
    let magnitude = magnitude as u32;
    (32 - magnitude.leading_zeros()).min(31)
}

fn checked_width(width: i32) -> Result<i32> {
    if (0..=MAX_FIELD_WIDTH).contains(&width) {
        Ok(width)
    } else {
        Err(CodecError::corrupt(format!("bit field width {} outside 0..=32", width)))
    }
}

/// Adaptive unary-prefixed codec; decodes until the code text ends.
pub fn decode(driver: &CodecDriver<'_>) -> Result<Vec<i32>> {
    let mut stream = driver.bit_stream()?;
    let decoded = decode_adaptive(&mut stream)?;
    log::debug!("bitlength: {} values from {} bits", decoded.len(), stream.len_bits());
    Ok(decoded)
}

fn decode_adaptive(stream: &mut BitStream<'_>) -> Result<Vec<i32>> {
    let mut width = 0i32;
    let mut decoded = Vec::new();

    while !stream.is_at_end() {
        if stream.read_bit()? {
            let grow = stream.read_bit()?;
            let step = if grow { 2 } else { -2 };
            loop {
                width += step;
                if stream.read_bit()? != grow {
                    break;
                }
                checked_width(width)?;
            }
        }
        let width = checked_width(width)?;
        decoded.push(stream.read_signed(width)?);
    }
    Ok(decoded)
}

/// Block codec; must consume exactly the declared code text and produce
/// exactly the declared value count.
pub fn decode2(driver: &CodecDriver<'_>) -> Result<Vec<i32>> {
    let mut stream = driver.bit_stream()?;
    let expected = driver.value_element_count();

    let fixed = !stream.read_bit()?;
    let decoded = if fixed {
        decode_fixed(&mut stream, expected)?
    } else {
        decode_variable(&mut stream, expected)?
    };

    if stream.position() != stream.len_bits() || decoded.len() != expected {
        return Err(CodecError::malformed(format!(
            "bitlength block consumed {} of {} bits and produced {} of {} values",
            stream.position(),
            stream.len_bits(),
            decoded.len(),
            expected
        )));
    }
    log::debug!(
        "bitlength2 ({}): {} values from {} bits",
        if fixed { "fixed" } else { "variable" },
        decoded.len(),
        stream.len_bits()
    );
    Ok(decoded)
}

fn decode_fixed(stream: &mut BitStream<'_>, expected: usize) -> Result<Vec<i32>> {
    let min_bits = stream.read_unsigned(6)? as i32;
    let max_bits = stream.read_unsigned(6)? as i32;
    if min_bits > MAX_FIELD_WIDTH || max_bits > MAX_FIELD_WIDTH {
        return Err(CodecError::malformed(format!(
            "bound widths {}/{} exceed 32 bits",
            min_bits, max_bits
        )));
    }
    let min = stream.read_signed(min_bits)?;
    let max = stream.read_signed(max_bits)?;
    let width = bit_field_width(max.wrapping_sub(min)) as i32;
    log::trace!("bitlength2 fixed: min {} max {} width {}", min, max, width);

    let mut decoded = Vec::with_capacity(expected.min(stream.remaining() as usize + 1));
    for _ in 0..expected {
        decoded.push((stream.read_unsigned(width)? as i32).wrapping_add(min));
    }
    Ok(decoded)
}

fn decode_variable(stream: &mut BitStream<'_>, expected: usize) -> Result<Vec<i32>> {
    let mean = stream.read_signed(32)?;
    let value_bits = stream.read_unsigned(3)? as i32;
    let run_bits = stream.read_unsigned(3)? as i32;
    if value_bits == 0 {
        return Err(CodecError::malformed("variable-width block with zero-width deltas"));
    }
    let max_decrease = -(1i32 << (value_bits - 1));
    let max_increase = (1i32 << (value_bits - 1)) - 1;
    log::trace!("bitlength2 variable: mean {} delta bits {} run bits {}", mean, value_bits, run_bits);

    let mut width = 0i32;
    let mut decoded = Vec::with_capacity(expected.min(stream.remaining() as usize + 1));
    while decoded.len() < expected {
        loop {
            let delta = stream.read_signed(value_bits)?;
            width = width.saturating_add(delta);
            if delta != max_decrease && delta != max_increase {
                break;
            }
        }
        let width = checked_width(width)?;
        let run = stream.read_unsigned(run_bits)? as usize;
        if decoded.len() + run > expected {
            return Err(CodecError::malformed(format!(
                "run of {} overshoots {} expected values",
                run, expected
            )));
        }
        for _ in 0..run {
            decoded.push(stream.read_signed(width)?.wrapping_add(mean));
        }
    }
    Ok(decoded)
}
