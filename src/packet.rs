// src/packet.rs
//! Int32 compressed data packets: the header-tagged blocks that select a
//! codec, carry its probability contexts and out-of-band values, and wrap
//! the code text.
//!
//! v1 (file major < 9):
//!   u8 codec (0..=3)
//!   Huffman/Arithmetic: u8 table count, bit-packed v1 contexts,
//!                       i32 out-of-band count, [nested v1 packet]
//!   Null:     i32 n, n x i32
//!   others:   i32 code text bits, i32 value count, [i32 symbol count],
//!             i32 word count, words
//!
//! v2 (file major >= 9):
//!   i32 value count (<= 0 -> empty, nothing more follows)
//!   u8 codec (0, 1, 3 or 4)
//!   Chopper:  u8 chop bits; 0 -> nested packet, else i32 bias, u8 span
//!             bits, nested MSB packet, nested LSB packet
//!   Null:     i32 byte count, byte count / 4 x i32
//!   others:   i32 code text bits, ceil(bits / 32) words,
//!             Arithmetic: bit-packed v2 contexts, nested out-of-band packet
//!
//! Scalars follow the file's byte order. Code text words are converted to
//! big-endian bytes so the bit cursor reads them most-significant bit first.

use crate::bitreader::{BitStream, ByteOrder};
use crate::config::{DecodeConfig, EscapeRule, PacketVersion};
use crate::context::ProbabilityContexts;
use crate::driver::CodecDriver;
use crate::error::{CodecError, Result};
use crate::predictor::{unpack_residuals, PredictorType};
use crate::{arithmetic, bitlength, huffman};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    Null       = 0,
    Bitlength  = 1,
    Huffman    = 2,
    Arithmetic = 3,
    Chopper    = 4,
}

impl TryFrom<u8> for CodecType {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Self::Null,
            1 => Self::Bitlength,
            2 => Self::Huffman,
            3 => Self::Arithmetic,
            4 => Self::Chopper,
            other => return Err(CodecError::malformed(format!("unknown codec type {}", other))),
        })
    }
}

/// Cursor over a buffer of consecutive packets.
#[derive(Debug)]
pub struct PacketReader<'a> {
    data:   &'a [u8],
    pos:    usize,
    config: DecodeConfig,
    depth:  u32,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8], config: DecodeConfig) -> Self {
        Self { data, pos: 0, config, depth: 0 }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Byte offset of the next unread field.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(CodecError::exhausted("packet bytes", len as u64, self.remaining() as u64));
        }
        let data: &'a [u8] = self.data;
        let bytes = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take_array::<4>()?;
        Ok(match self.config.byte_order {
            ByteOrder::LittleEndian => i32::from_le_bytes(bytes),
            ByteOrder::BigEndian    => i32::from_be_bytes(bytes),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_i32()? as u32)
    }

    /// Non-negative i32 field.
    fn read_count(&mut self, what: &str) -> Result<usize> {
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| CodecError::malformed(format!("negative {}: {}", what, value)))
    }

    /// `count` i32 values, rejected up front if they cannot all be present.
    fn read_i32s(&mut self, count: usize) -> Result<Vec<i32>> {
        let needed = count.saturating_mul(4);
        if needed > self.remaining() {
            return Err(CodecError::exhausted("packet values", needed as u64, self.remaining() as u64));
        }
        (0..count).map(|_| self.read_i32()).collect()
    }

    /// `words` 32-bit code text words as big-endian bytes.
    fn read_code_text(&mut self, words: usize) -> Result<Vec<u8>> {
        let len = words.checked_mul(4).ok_or_else(|| {
            CodecError::malformed(format!("code text of {} words", words))
        })?;
        let raw = self.take(len)?;
        let mut code_text = raw.to_vec();
        if self.config.byte_order == ByteOrder::LittleEndian {
            for word in code_text.chunks_exact_mut(4) {
                word.reverse();
            }
        }
        Ok(code_text)
    }

    /// Run a bit-level reader from the current byte and resume after the
    /// byte it finished in.
    fn read_bit_packed<T>(&mut self, read: impl FnOnce(&mut BitStream<'a>) -> Result<T>) -> Result<T> {
        let data: &'a [u8] = self.data;
        let mut stream = BitStream::new(&data[self.pos..], ByteOrder::BigEndian);
        let value = read(&mut stream)?;
        self.pos += stream.bytes_consumed();
        Ok(value)
    }

    /// Escapes in a single-context table can only occur in context 0 and
    /// always draw from the out-of-band queue; multi-context tables follow
    /// the configured rule.
    fn driver<'t>(
        &self,
        code_text: &'t [u8],
        code_text_len_bits: u64,
        value_count: usize,
        contexts: Option<ProbabilityContexts>,
        out_of_band: Vec<i32>,
    ) -> Result<CodecDriver<'t>> {
        let mut driver = CodecDriver::new(code_text, code_text_len_bits, value_count)?
            .with_padding_bits(self.config.arithmetic_padding_bits)
            .with_out_of_band(out_of_band)
            .with_escape_rule(self.config.escape_rule);
        if let Some(contexts) = contexts {
            if contexts.len() <= 1 {
                driver = driver.with_escape_rule(EscapeRule::AnyContext);
            }
            driver = driver.with_contexts(contexts);
        }
        Ok(driver)
    }

    fn check_count(codec: CodecType, decoded: &[i32], expected: usize) -> Result<()> {
        if decoded.len() != expected {
            return Err(CodecError::malformed(format!(
                "{:?} codec produced {} values, header declares {}",
                codec,
                decoded.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Decode one packet in the configured layout.
    pub fn decode_packet(&mut self) -> Result<Vec<i32>> {
        if self.depth >= self.config.max_nesting_depth {
            return Err(CodecError::malformed(format!(
                "packets nested deeper than {}",
                self.config.max_nesting_depth
            )));
        }
        self.depth += 1;
        let result = match self.config.packet_version {
            PacketVersion::V1 => self.decode_v1(),
            PacketVersion::V2 => self.decode_v2(),
        };
        self.depth -= 1;
        result
    }

    fn decode_v1(&mut self) -> Result<Vec<i32>> {
        let codec = CodecType::try_from(self.read_u8()?)?;
        if codec == CodecType::Chopper {
            return Err(CodecError::malformed("chopper codec in a v1 packet"));
        }

        let mut contexts = None;
        let mut out_of_band = Vec::new();
        if matches!(codec, CodecType::Huffman | CodecType::Arithmetic) {
            let table_count = self.read_u8()?;
            contexts = Some(self.read_bit_packed(|s| ProbabilityContexts::read_v1(s, table_count))?);
            if self.read_i32()? > 0 {
                out_of_band = self.decode_packet()?;
            }
        }

        if codec == CodecType::Null {
            let count = self.read_count("value count")?;
            let values = self.read_i32s(count)?;
            log::debug!("packet v1: null codec, {} values", values.len());
            return Ok(values);
        }

        let code_text_len = self.read_count("code text length")? as u64;
        let value_count = self.read_count("value element count")?;
        let multi_context = contexts.as_ref().map_or(false, |c| c.len() > 1);
        let symbol_count = if multi_context {
            Some(self.read_count("symbol count")?)
        } else {
            None
        };
        let words = self.read_count("code text word count")?;
        let code_text = self.read_code_text(words)?;

        let mut driver = self.driver(&code_text, code_text_len, value_count, contexts, out_of_band)?;
        if let Some(symbol_count) = symbol_count {
            driver = driver.with_symbol_count(symbol_count);
        }

        let decoded = match codec {
            CodecType::Bitlength  => bitlength::decode(&driver)?,
            CodecType::Huffman    => huffman::decode(&driver)?,
            CodecType::Arithmetic => arithmetic::decode(&driver)?,
            CodecType::Null | CodecType::Chopper => {
                return Err(CodecError::malformed(format!("{:?} codec has no code text", codec)));
            }
        };
        Self::check_count(codec, &decoded, value_count)?;
        log::debug!(
            "packet v1: {:?} codec, {} values from {} bits",
            codec, value_count, code_text_len
        );
        Ok(decoded)
    }

    fn decode_v2(&mut self) -> Result<Vec<i32>> {
        let value_count = self.read_i32()?;
        if value_count <= 0 {
            return Ok(Vec::new());
        }
        let value_count = value_count as usize;

        let codec = CodecType::try_from(self.read_u8()?)?;
        match codec {
            CodecType::Huffman => Err(CodecError::malformed("Huffman codec in a v2 packet")),
            CodecType::Chopper => self.decode_chopper(value_count),
            CodecType::Null => {
                let count = self.read_count("null codec byte count")? / 4;
                let values = self.read_i32s(count)?;
                Self::check_count(codec, &values, value_count)?;
                log::debug!("packet v2: null codec, {} values", values.len());
                Ok(values)
            }
            CodecType::Bitlength | CodecType::Arithmetic => {
                let code_text_len = self.read_count("code text length")?;
                let code_text = self.read_code_text(code_text_len.div_ceil(32))?;

                let mut out_of_band = Vec::new();
                let mut contexts = None;
                if codec == CodecType::Arithmetic {
                    contexts = Some(self.read_bit_packed(ProbabilityContexts::read_v2)?);
                    out_of_band = self.decode_packet()?;
                    if code_text_len == 0 && out_of_band.len() == value_count {
                        log::debug!("packet v2: {} values entirely out-of-band", value_count);
                        return Ok(out_of_band);
                    }
                }

                let driver =
                    self.driver(&code_text, code_text_len as u64, value_count, contexts, out_of_band)?;
                let decoded = if codec == CodecType::Arithmetic {
                    arithmetic::decode(&driver)?
                } else {
                    bitlength::decode2(&driver)?
                };
                Self::check_count(codec, &decoded, value_count)?;
                log::debug!(
                    "packet v2: {:?} codec, {} values from {} bits",
                    codec, value_count, code_text_len
                );
                Ok(decoded)
            }
        }
    }

    fn decode_chopper(&mut self, value_count: usize) -> Result<Vec<i32>> {
        let chop_bits = self.read_u8()?;
        if chop_bits == 0 {
            let values = self.decode_packet()?;
            Self::check_count(CodecType::Chopper, &values, value_count)?;
            return Ok(values);
        }

        let bias = self.read_i32()?;
        let span_bits = self.read_u8()?;
        let shift = span_bits
            .checked_sub(chop_bits)
            .filter(|&s| s < 32)
            .ok_or_else(|| {
                CodecError::malformed(format!(
                    "chopper span {} bits with {} chopped bits",
                    span_bits, chop_bits
                ))
            })? as u32;

        let msb = self.decode_packet()?;
        let lsb = self.decode_packet()?;
        if msb.len() != value_count || lsb.len() != value_count {
            return Err(CodecError::malformed(format!(
                "chopper halves hold {} and {} values, header declares {}",
                msb.len(),
                lsb.len(),
                value_count
            )));
        }
        log::debug!(
            "packet v2: chopper, {} values, {} of {} bits chopped",
            value_count, chop_bits, span_bits
        );
        Ok(msb
            .iter()
            .zip(&lsb)
            .map(|(&high, &low)| (low | (high << shift)).wrapping_add(bias))
            .collect())
    }

    /// Decode a packet and undo `predictor`.
    pub fn read_vec_i32(&mut self, predictor: PredictorType) -> Result<Vec<i32>> {
        let residuals = self.decode_packet()?;
        Ok(unpack_residuals(&residuals, predictor))
    }

    /// As `read_vec_i32`, reinterpreting each value's bits as unsigned.
    pub fn read_vec_u32(&mut self, predictor: PredictorType) -> Result<Vec<u32>> {
        Ok(self
            .read_vec_i32(predictor)?
            .into_iter()
            .map(|v| v as u32)
            .collect())
    }
}
