// src/driver.rs
//! Everything one codec invocation needs: code text, declared counts,
//! probability contexts and out-of-band values.

use crate::bitreader::{BitStream, ByteOrder};
use crate::config::EscapeRule;
use crate::context::ProbabilityContexts;
use crate::error::{CodecError, Result};

/// Supplies code text to the range decoder one word at a time.
pub trait CodeTextSource {
    /// Next word, left-aligned, with its count of valid bits; `None` once
    /// the code text is used up.
    fn next_code_text(&mut self) -> Result<Option<(u32, u32)>>;
}

/// Values for escape symbols, handed out strictly in order.
#[derive(Debug, Clone)]
pub struct OutOfBandQueue<'v> {
    values: &'v [i32],
    next:   usize,
}

impl<'v> OutOfBandQueue<'v> {
    pub fn new(values: &'v [i32]) -> Self {
        Self { values, next: 0 }
    }

    pub fn pop(&mut self) -> Result<i32> {
        let value = self.values.get(self.next).copied().ok_or_else(|| {
            CodecError::exhausted("out-of-band values", self.next as u64 + 1, self.values.len() as u64)
        })?;
        self.next += 1;
        Ok(value)
    }

    pub fn consumed(&self) -> usize {
        self.next
    }

    pub fn remaining(&self) -> usize {
        self.values.len() - self.next
    }
}

/// Code text viewed as successive 32-bit words.
#[derive(Debug)]
pub struct CodeText<'a> {
    stream: BitStream<'a>,
}

impl CodeTextSource for CodeText<'_> {
    fn next_code_text(&mut self) -> Result<Option<(u32, u32)>> {
        let bits = self.stream.remaining().min(32) as u32;
        if bits == 0 {
            return Ok(None);
        }
        let word = self.stream.read_unsigned(bits as i32)?;
        Ok(Some((word << (32 - bits), bits)))
    }
}

#[derive(Debug, Clone)]
pub struct CodecDriver<'a> {
    code_text:           &'a [u8],
    code_text_len_bits:  u64,
    value_element_count: usize,
    symbol_count:        Option<usize>,
    contexts:            ProbabilityContexts,
    out_of_band:         Vec<i32>,
    padding_bits:        u32,
    escape_rule:         EscapeRule,
}

impl<'a> CodecDriver<'a> {
    /// `code_text` holds the packed code words big-endian; only the first
    /// `code_text_len_bits` bits are meaningful.
    pub fn new(code_text: &'a [u8], code_text_len_bits: u64, value_element_count: usize) -> Result<Self> {
        let available = code_text.len() as u64 * 8;
        if code_text_len_bits > available {
            return Err(CodecError::malformed(format!(
                "code text length {} bits exceeds {} supplied bits",
                code_text_len_bits, available
            )));
        }
        Ok(Self {
            code_text,
            code_text_len_bits,
            value_element_count,
            symbol_count: None,
            contexts: ProbabilityContexts::default(),
            out_of_band: Vec::new(),
            padding_bits: 16,
            escape_rule: EscapeRule::default(),
        })
    }

    pub fn with_symbol_count(mut self, symbol_count: usize) -> Self {
        self.symbol_count = Some(symbol_count);
        self
    }

    pub fn with_contexts(mut self, contexts: ProbabilityContexts) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn with_out_of_band(mut self, values: Vec<i32>) -> Self {
        self.out_of_band = values;
        self
    }

    pub fn with_padding_bits(mut self, bits: u32) -> Self {
        self.padding_bits = bits;
        self
    }

    pub fn with_escape_rule(mut self, rule: EscapeRule) -> Self {
        self.escape_rule = rule;
        self
    }

    /// Symbols the entropy coders must produce. Only multi-context tables
    /// carry a count distinct from the value count.
    pub fn symbol_count(&self) -> usize {
        match self.symbol_count {
            Some(count) if self.contexts.len() > 1 => count,
            _ => self.value_element_count,
        }
    }

    pub fn value_element_count(&self) -> usize {
        self.value_element_count
    }

    pub fn code_text_len_bits(&self) -> u64 {
        self.code_text_len_bits
    }

    pub fn contexts(&self) -> &ProbabilityContexts {
        &self.contexts
    }

    pub fn out_of_band(&self) -> OutOfBandQueue<'_> {
        OutOfBandQueue::new(&self.out_of_band)
    }

    /// Zero bits the range decoder may shift in past the code text.
    pub fn padding_bits(&self) -> u32 {
        self.padding_bits
    }

    pub fn escape_rule(&self) -> EscapeRule {
        self.escape_rule
    }

    /// Big-endian cursor over the declared code text.
    pub fn bit_stream(&self) -> Result<BitStream<'a>> {
        BitStream::with_len(self.code_text, self.code_text_len_bits, ByteOrder::BigEndian)
    }

    pub fn code_text(&self) -> Result<CodeText<'a>> {
        Ok(CodeText { stream: self.bit_stream()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextEntry;

    #[test]
    fn symbol_count_falls_back_to_value_count() {
        let bytes = [0u8; 4];
        let driver = CodecDriver::new(&bytes, 32, 7).unwrap();
        assert_eq!(driver.symbol_count(), 7);

        let one = ProbabilityContexts::single(vec![ContextEntry::new(0, 1, 0, 0)]);
        let driver = CodecDriver::new(&bytes, 32, 7).unwrap()
            .with_symbol_count(9)
            .with_contexts(one);
        assert_eq!(driver.symbol_count(), 7);

        let two = ProbabilityContexts::new(vec![
            vec![ContextEntry::new(0, 1, 0, 1)],
            vec![ContextEntry::new(0, 1, 0, 0)],
        ]);
        let driver = CodecDriver::new(&bytes, 32, 7).unwrap()
            .with_symbol_count(9)
            .with_contexts(two);
        assert_eq!(driver.symbol_count(), 9);
    }

    #[test]
    fn code_text_words_are_left_aligned() {
        let bytes = [0xDE, 0xAD, 0xBE, 0xEF, 0xA5, 0x00];
        let driver = CodecDriver::new(&bytes, 40, 0).unwrap();
        let mut words = driver.code_text().unwrap();
        assert_eq!(words.next_code_text().unwrap(), Some((0xDEAD_BEEF, 32)));
        assert_eq!(words.next_code_text().unwrap(), Some((0xA500_0000, 8)));
        assert_eq!(words.next_code_text().unwrap(), None);
    }

    #[test]
    fn length_beyond_buffer_is_malformed() {
        let bytes = [0u8; 2];
        assert!(matches!(
            CodecDriver::new(&bytes, 17, 1),
            Err(CodecError::MalformedHeader(_))
        ));
    }

    #[test]
    fn out_of_band_queue_pops_in_order() {
        let values = [5, -6];
        let mut queue = OutOfBandQueue::new(&values);
        assert_eq!(queue.pop().unwrap(), 5);
        assert_eq!(queue.remaining(), 1);
        assert_eq!(queue.pop().unwrap(), -6);
        assert_eq!(queue.consumed(), 2);
        assert!(queue.pop().unwrap_err().is_exhausted());
    }
}
