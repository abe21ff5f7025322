// src/arithmetic.rs
//! 16-bit binary range decoder over probability contexts.
//!
//! State is `[low, high]` plus a 16-bit `code` window. Every symbol narrows
//! the interval to the decoded entry's share, then renormalises:
//!   - top bits of low/high agree          -> shift out
//!   - low = 01.., high = 10.. (straddle)  -> flip bit 14, shift out
//!   - otherwise                           -> done
//! Shifting pulls one code-text bit into `code`.

use crate::config::EscapeRule;
use crate::driver::{CodeTextSource, CodecDriver};
use crate::error::{CodecError, Result};
use crate::probability::{ProbabilityModel, SymbolRange};

const TOP_BIT:     u64 = 0x8000;
const SECOND_BIT:  u64 = 0x4000;
const LOW_MASK:    u64 = 0x3fff;
const WORD_MASK:   u64 = 0xffff;
const WINDOW_BITS: u32 = 16;

struct RangeDecoder<'s, S: CodeTextSource> {
    source:       &'s mut S,
    low:          u64,
    high:         u64,
    code:         u64,
    buffer:       u32,
    bits:         u32,
    padding_left: u32,
}

impl<'s, S: CodeTextSource> RangeDecoder<'s, S> {
    fn new(source: &'s mut S, padding_bits: u32) -> Result<Self> {
        let mut decoder = Self {
            source,
            low: 0,
            high: WORD_MASK,
            code: 0,
            buffer: 0,
            bits: 0,
            padding_left: padding_bits,
        };
        if decoder.refill()?.is_none() {
            return Err(CodecError::exhausted("code text", WINDOW_BITS as u64, 0));
        }
        for _ in 0..WINDOW_BITS {
            decoder.code = (decoder.code << 1) | decoder.next_bit()?;
        }
        Ok(decoder)
    }

    fn refill(&mut self) -> Result<Option<()>> {
        match self.source.next_code_text()? {
            Some((word, bits)) if bits > 0 => {
                self.buffer = word;
                self.bits = bits.min(32);
                Ok(Some(()))
            }
            _ => Ok(None),
        }
    }

    fn next_bit(&mut self) -> Result<u64> {
        if self.bits == 0 && self.refill()?.is_none() {
            if self.padding_left == 0 {
                return Err(CodecError::exhausted("code text", 1, 0));
            }
            self.padding_left -= 1;
            return Ok(0);
        }
        let bit = (self.buffer >> 31) & 1;
        self.buffer <<= 1;
        self.bits -= 1;
        Ok(bit as u64)
    }

    /// Position of `code` within the current interval, scaled to `total`.
    fn rescale(&self, total: u64) -> Result<u64> {
        if self.code < self.low || self.code > self.high {
            return Err(CodecError::corrupt(format!(
                "code {:#06x} outside interval [{:#06x}, {:#06x}]",
                self.code, self.low, self.high
            )));
        }
        let range = self.high - self.low + 1;
        Ok(((self.code - self.low + 1) * total - 1) / range)
    }

    fn narrow(&mut self, symbol: SymbolRange) -> Result<()> {
        let range = self.high - self.low + 1;
        self.high = self.low + range * symbol.high / symbol.total - 1;
        self.low += range * symbol.low / symbol.total;

        loop {
            if !(self.high ^ self.low) & TOP_BIT != 0 {
                // top bits agree
            } else if self.low & SECOND_BIT != 0 && self.high & SECOND_BIT == 0 {
                self.code ^= SECOND_BIT;
                self.low &= LOW_MASK;
                self.high |= SECOND_BIT;
            } else {
                break;
            }
            self.low = (self.low << 1) & WORD_MASK;
            self.high = ((self.high << 1) | 1) & WORD_MASK;
            self.code = ((self.code << 1) & WORD_MASK) | self.next_bit()?;
        }
        Ok(())
    }
}

fn context_index(next_context: i32, context_count: usize) -> Result<usize> {
    usize::try_from(next_context)
        .ok()
        .filter(|&c| c < context_count)
        .ok_or_else(|| {
            CodecError::malformed(format!(
                "next context {} out of range ({} contexts)",
                next_context, context_count
            ))
        })
}

/// Decode `driver.symbol_count()` values starting in context 0.
pub fn decode(driver: &CodecDriver<'_>) -> Result<Vec<i32>> {
    let mut source = driver.code_text()?;
    decode_from(driver, &mut source)
}

/// As `decode`, with code text from an arbitrary word source.
pub fn decode_from<S: CodeTextSource>(driver: &CodecDriver<'_>, source: &mut S) -> Result<Vec<i32>> {
    let symbol_count = driver.symbol_count();
    if symbol_count == 0 {
        return Ok(Vec::new());
    }

    let model = ProbabilityModel::new(driver.contexts());
    if model.context_count() == 0 {
        return Err(CodecError::malformed("arithmetic code text without probability contexts"));
    }
    let mut out_of_band = driver.out_of_band();
    let mut coder = RangeDecoder::new(source, driver.padding_bits())?;
    let mut decoded = Vec::with_capacity(symbol_count);
    let mut context = 0usize;

    for _ in 0..symbol_count {
        let total = model.total_symbol_count(context)?;
        if total == 0 {
            return Err(CodecError::malformed(format!(
                "context {} has no occurrence mass",
                context
            )));
        }
        let rescaled = coder.rescale(total)?;
        let (entry, range) = model.lookup(context, rescaled)?;
        coder.narrow(range)?;

        if entry.is_escape() {
            if context == 0 && driver.escape_rule() == EscapeRule::SecondaryContexts {
                return Err(CodecError::InvalidEscape { context: context as i32 });
            }
            decoded.push(out_of_band.pop()?);
        } else {
            decoded.push(entry.associated_value);
        }
        context = context_index(entry.next_context, model.context_count())?;
    }

    log::debug!(
        "arithmetic: {} symbols from {} contexts, {} out-of-band",
        decoded.len(),
        model.context_count(),
        out_of_band.consumed()
    );
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextEntry, ProbabilityContexts, ESCAPE_SYMBOL};
    use pretty_assertions::assert_eq;

    fn two_symbols(first: i32, second: i32, next: i32) -> Vec<ContextEntry> {
        vec![
            ContextEntry::new(0, 1, first, next),
            ContextEntry::new(1, 1, second, next),
        ]
    }

    #[test]
    fn interval_midpoints_select_each_symbol() {
        let contexts = ProbabilityContexts::single(two_symbols(10, 20, 0));

        let low_half = [0x40, 0x00];
        let driver = CodecDriver::new(&low_half, 16, 1).unwrap().with_contexts(contexts.clone());
        assert_eq!(decode(&driver).unwrap(), vec![10]);

        let high_half = [0xC0, 0x00];
        let driver = CodecDriver::new(&high_half, 16, 1).unwrap().with_contexts(contexts);
        assert_eq!(decode(&driver).unwrap(), vec![20]);
    }

    #[test]
    fn next_context_chain_drives_sequence() {
        let contexts = ProbabilityContexts::new(vec![
            two_symbols(100, 101, 1),
            two_symbols(200, 201, 2),
            two_symbols(300, 301, 0),
        ]);
        // equal halves: each code bit picks one symbol
        let code = [0b1010_0000, 0x00];
        let driver = CodecDriver::new(&code, 16, 3).unwrap()
            .with_symbol_count(3)
            .with_contexts(contexts);
        assert_eq!(decode(&driver).unwrap(), vec![101, 200, 301]);
    }

    #[test]
    fn straddling_interval_is_renormalised() {
        // thirds: the middle symbol leaves low = 0x5555, high = 0xaaaa
        let contexts = ProbabilityContexts::single(vec![
            ContextEntry::new(0, 1, 1, 0),
            ContextEntry::new(1, 1, 2, 0),
            ContextEntry::new(2, 1, 3, 0),
        ]);
        let code = [0x80, 0x00, 0x80, 0x00];
        let driver = CodecDriver::new(&code, 32, 2).unwrap().with_contexts(contexts);
        let decoded = decode(&driver).unwrap();
        assert_eq!(decoded[0], 2);
        assert_eq!(decoded.len(), 2);
    }

    fn escape_contexts() -> ProbabilityContexts {
        ProbabilityContexts::new(vec![
            two_symbols(7, 8, 1),
            vec![
                ContextEntry::new(ESCAPE_SYMBOL, 1, 0, 0),
                ContextEntry::new(0, 1, 9, 0),
            ],
        ])
    }

    #[test]
    fn escape_in_secondary_context_reads_out_of_band() {
        let code = [0x00, 0x00];
        let driver = CodecDriver::new(&code, 16, 2).unwrap()
            .with_contexts(escape_contexts())
            .with_symbol_count(2)
            .with_out_of_band(vec![42]);
        assert_eq!(decode(&driver).unwrap(), vec![7, 42]);
    }

    #[test]
    fn escape_with_empty_queue_is_exhausted() {
        let code = [0x00, 0x00];
        let driver = CodecDriver::new(&code, 16, 2).unwrap()
            .with_contexts(escape_contexts())
            .with_symbol_count(2);
        assert!(decode(&driver).unwrap_err().is_exhausted());
    }

    #[test]
    fn escape_in_primary_context_follows_rule() {
        let contexts = ProbabilityContexts::single(vec![
            ContextEntry::new(ESCAPE_SYMBOL, 1, 0, 0),
            ContextEntry::new(0, 1, 9, 0),
        ]);
        let code = [0x00, 0x00];
        let driver = CodecDriver::new(&code, 16, 1).unwrap()
            .with_contexts(contexts)
            .with_out_of_band(vec![-5]);
        assert_eq!(decode(&driver).unwrap_err(), CodecError::InvalidEscape { context: 0 });

        let driver = driver.with_escape_rule(EscapeRule::AnyContext);
        assert_eq!(decode(&driver).unwrap(), vec![-5]);
    }

    #[test]
    fn runs_out_once_padding_is_spent() {
        let contexts = ProbabilityContexts::single(two_symbols(0, 1, 0));
        // one bit per symbol after the 16-bit window: 16 code bits plus
        // 16 padding bits cover 32 symbols
        let code = [0u8; 4];
        let driver = CodecDriver::new(&code, 32, 32).unwrap().with_contexts(contexts.clone());
        assert_eq!(decode(&driver).unwrap(), vec![0; 32]);

        let driver = CodecDriver::new(&code, 32, 33).unwrap().with_contexts(contexts.clone());
        assert!(decode(&driver).unwrap_err().is_exhausted());

        let driver = CodecDriver::new(&code, 16, 1).unwrap()
            .with_contexts(contexts)
            .with_padding_bits(0);
        assert!(decode(&driver).unwrap_err().is_exhausted());
    }

    #[test]
    fn empty_code_text_with_symbols_is_exhausted() {
        let contexts = ProbabilityContexts::single(two_symbols(0, 1, 0));
        let driver = CodecDriver::new(&[], 0, 1).unwrap().with_contexts(contexts);
        assert!(decode(&driver).unwrap_err().is_exhausted());
    }

    #[test]
    fn zero_symbols_reads_nothing() {
        let driver = CodecDriver::new(&[], 0, 0).unwrap();
        assert_eq!(decode(&driver).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn massless_context_is_malformed() {
        let contexts = ProbabilityContexts::single(vec![ContextEntry::new(0, 0, 1, 0)]);
        let code = [0u8; 2];
        let driver = CodecDriver::new(&code, 16, 1).unwrap().with_contexts(contexts);
        assert!(matches!(decode(&driver), Err(CodecError::MalformedHeader(_))));
    }

    #[test]
    fn next_context_out_of_range_is_malformed() {
        let contexts = ProbabilityContexts::single(two_symbols(0, 1, 3));
        let code = [0u8; 2];
        let driver = CodecDriver::new(&code, 16, 1).unwrap().with_contexts(contexts);
        assert!(matches!(decode(&driver), Err(CodecError::MalformedHeader(_))));
    }

    #[test]
    fn custom_word_source() {
        struct Words(Vec<(u32, u32)>);
        impl CodeTextSource for Words {
            fn next_code_text(&mut self) -> Result<Option<(u32, u32)>> {
                Ok(if self.0.is_empty() { None } else { Some(self.0.remove(0)) })
            }
        }
        let contexts = ProbabilityContexts::single(two_symbols(0, 1, 0));
        let driver = CodecDriver::new(&[], 0, 4).unwrap().with_contexts(contexts);
        let mut words = Words(vec![(0xA000_0000, 4)]);
        assert_eq!(decode_from(&driver, &mut words).unwrap(), vec![1, 0, 1, 0]);
    }

    #[test]
    fn decoding_is_deterministic() {
        let contexts = ProbabilityContexts::single(vec![
            ContextEntry::new(0, 5, 1, 0),
            ContextEntry::new(1, 2, 2, 0),
            ContextEntry::new(2, 1, 3, 0),
        ]);
        let code = [0x5A, 0xC3, 0x0F, 0x99];
        let driver = CodecDriver::new(&code, 32, 10).unwrap().with_contexts(contexts);
        assert_eq!(decode(&driver), decode(&driver));
    }
}
