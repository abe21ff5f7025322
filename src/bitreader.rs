// src/bitreader.rs
//! Bit-addressable cursor over a fully resident buffer.
//!
//! Wraps `bitstream_io::BitReader` and adds what the codecs need on top of it:
//! a declared bit length that may be shorter than the buffer, explicit
//! get/set of the cursor for lookahead, and a byte order that is chosen per
//! instance and can be switched mid-stream.

use std::fmt;
use std::io::Cursor;

use bitstream_io::{BigEndian, BitRead, BitReader, LittleEndian};

use crate::error::{CodecError, Result};

/// Which physical bit of a byte is read first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Most-significant bit first; the first bit read is the most
    /// significant bit of the result.
    #[default]
    BigEndian,
    /// Least-significant bit first; the first bit read is the least
    /// significant bit of the result.
    LittleEndian,
}

enum Reader<'a> {
    Big(BitReader<Cursor<&'a [u8]>, BigEndian>),
    Little(BitReader<Cursor<&'a [u8]>, LittleEndian>),
}

impl<'a> Reader<'a> {
    fn start(data: &'a [u8], order: ByteOrder) -> Self {
        match order {
            ByteOrder::BigEndian    => Reader::Big(BitReader::endian(Cursor::new(data), BigEndian)),
            ByteOrder::LittleEndian => Reader::Little(BitReader::endian(Cursor::new(data), LittleEndian)),
        }
    }

    /// Reader whose next bit is `bit_pos` bits into `data`.
    fn at(data: &'a [u8], bit_pos: u64, order: ByteOrder) -> Result<Self> {
        let byte = ((bit_pos / 8) as usize).min(data.len());
        let mut reader = Reader::start(&data[byte..], order);
        let skip = (bit_pos % 8) as u32;
        if skip > 0 {
            match &mut reader {
                Reader::Big(r)    => r.skip(skip)?,
                Reader::Little(r) => r.skip(skip)?,
            }
        }
        Ok(reader)
    }

    fn read(&mut self, bits: u32) -> std::io::Result<u32> {
        match self {
            Reader::Big(r)    => r.read::<u32>(bits),
            Reader::Little(r) => r.read::<u32>(bits),
        }
    }
}

/// Cursor over `len_bits` bits of a byte slice.
///
/// Invariant: `0 <= position <= len_bits`, and every successful read advances
/// the position by exactly the requested width.
pub struct BitStream<'a> {
    data:     &'a [u8],
    reader:   Reader<'a>,
    order:    ByteOrder,
    len_bits: u64,
    position: u64,
}

impl<'a> BitStream<'a> {
    /// Stream over every bit of `data`.
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            data,
            reader: Reader::start(data, order),
            order,
            len_bits: data.len() as u64 * 8,
            position: 0,
        }
    }

    /// Stream over the first `len_bits` bits of `data`.
    pub fn with_len(data: &'a [u8], len_bits: u64, order: ByteOrder) -> Result<Self> {
        let available = data.len() as u64 * 8;
        if len_bits > available {
            return Err(CodecError::malformed(format!(
                "declared bit length {} exceeds buffer of {} bits",
                len_bits, available
            )));
        }
        let mut stream = Self::new(data, order);
        stream.len_bits = len_bits;
        Ok(stream)
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Switch the bit order; takes effect at the current cursor.
    pub fn set_byte_order(&mut self, order: ByteOrder) -> Result<()> {
        if order != self.order {
            self.reader = Reader::at(self.data, self.position, order)?;
            self.order = order;
        }
        Ok(())
    }

    pub fn len_bits(&self) -> u64 {
        self.len_bits
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn remaining(&self) -> u64 {
        self.len_bits - self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.len_bits
    }

    /// Move the cursor; used by lookahead patterns that read and rewind.
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        if position > self.len_bits {
            return Err(CodecError::invalid_parameter(format!(
                "bit position {} beyond stream length {}",
                position, self.len_bits
            )));
        }
        self.reader = Reader::at(self.data, position, self.order)?;
        self.position = position;
        Ok(())
    }

    /// Next `bits` bits as an unsigned value. `bits <= 0` yields 0 and
    /// consumes nothing.
    pub fn read_unsigned(&mut self, bits: i32) -> Result<u32> {
        if bits <= 0 {
            return Ok(0);
        }
        if bits > 32 {
            return Err(CodecError::invalid_parameter(format!(
                "cannot read {} bits into a 32-bit value",
                bits
            )));
        }
        let width = bits as u64;
        if width > self.remaining() {
            return Err(CodecError::exhausted("bit stream", width, self.remaining()));
        }
        let value = self.reader.read(bits as u32)?;
        self.position += width;
        Ok(value)
    }

    /// Next `bits` bits, sign-extended from the top bit of the field.
    pub fn read_signed(&mut self, bits: i32) -> Result<i32> {
        let raw = self.read_unsigned(bits)?;
        if bits <= 0 {
            return Ok(0);
        }
        let shift = 32 - bits as u32;
        Ok(((raw << shift) as i32) >> shift)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_unsigned(1)? == 1)
    }

    /// Skip to the next byte boundary.
    pub fn align_to_byte(&mut self) -> Result<()> {
        let pad = ((8 - self.position % 8) % 8) as i32;
        self.read_unsigned(pad).map(|_| ())
    }

    /// Whole bytes spanned by the bits consumed so far.
    pub fn bytes_consumed(&self) -> usize {
        ((self.position + 7) / 8) as usize
    }
}

impl fmt::Debug for BitStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitStream")
            .field("order", &self.order)
            .field("len_bits", &self.len_bits)
            .field("position", &self.position)
            .finish()
    }
}
