// src/testutil.rs
//! Bit-packing helpers for building codec fixtures in unit tests.

use bitstream_io::{BigEndian, BitWrite, BitWriter};

/// Collects `(width, value)` fields and packs them MSB-first.
#[derive(Debug, Default, Clone)]
pub struct BitPacker {
    fields: Vec<(u32, u32)>,
}

impl BitPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `bits` bits of `value`. Zero-width fields are dropped.
    pub fn push(&mut self, bits: u32, value: u32) -> &mut Self {
        assert!(bits <= 32, "field wider than 32 bits");
        if bits > 0 {
            self.fields.push((bits, value & mask(bits)));
        }
        self
    }

    /// Two's-complement field.
    pub fn push_signed(&mut self, bits: u32, value: i32) -> &mut Self {
        self.push(bits, value as u32)
    }

    /// Append a prefix code of `len` bits held right-aligned in `code`.
    pub fn push_code(&mut self, code: u64, len: u32) -> &mut Self {
        for i in (0..len).rev() {
            self.push(1, ((code >> i) & 1) as u32);
        }
        self
    }

    pub fn push_bit(&mut self, bit: bool) -> &mut Self {
        self.push(1, bit as u32)
    }

    pub fn len_bits(&self) -> u64 {
        self.fields.iter().map(|&(bits, _)| bits as u64).sum()
    }

    /// Packed bytes, zero-padded to a byte boundary.
    pub fn finish(&self) -> Vec<u8> {
        let mut output = Vec::new();
        {
            let mut writer = BitWriter::endian(&mut output, BigEndian);
            for &(bits, value) in &self.fields {
                writer.write(bits, value).expect("write to Vec cannot fail");
            }
            writer.byte_align().expect("write to Vec cannot fail");
        }
        output
    }
}

fn mask(bits: u32) -> u32 {
    if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 }
}
