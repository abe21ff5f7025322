// src/context.rs
//! Probability context tables: the trimmed histograms that drive both the
//! arithmetic coder and the Huffman tree builder.
//!
//! Tables are bit-packed, big-endian, and always end on a byte boundary.
//!
//! v1 (file major < 9):
//!   u8   table count (1 or 2)            -- read by the packet reader
//!   per table:
//!     u32 entry count
//!     table 0:  6b symbol, 6b occurrence, 6b value, 6b next-context widths,
//!               32b minimum value
//!     table 1+: 6b symbol, 6b occurrence, 6b next-context widths
//!     entries:  symbol + 2, occurrence, value - minimum, next context
//!
//! v2 (file major >= 9):
//!   16b entry count, 6b symbol / occurrence / value widths, 32b minimum,
//!   entries without a next-context field.

use std::collections::HashMap;

use crate::bitreader::BitStream;
use crate::error::{CodecError, Result};

/// Symbol whose value lives in the out-of-band queue.
pub const ESCAPE_SYMBOL: i32 = -2;

/// Tables with more than one context carry an explicit symbol count.
pub const MAX_TABLE_COUNT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextEntry {
    pub symbol:           i32,
    pub occurrence_count: u32,
    pub associated_value: i32,
    pub next_context:     i32,
}

impl ContextEntry {
    pub fn new(symbol: i32, occurrence_count: u32, associated_value: i32, next_context: i32) -> Self {
        Self { symbol, occurrence_count, associated_value, next_context }
    }

    pub fn is_escape(&self) -> bool {
        self.symbol == ESCAPE_SYMBOL
    }
}

/// Field widths shared by every entry of one table.
#[derive(Debug, Clone, Copy)]
struct EntryLayout {
    symbol_bits:       i32,
    occurrence_bits:   i32,
    value_bits:        i32,
    next_context_bits: i32,
    minimum:           i32,
}

impl EntryLayout {
    fn width(&self) -> u64 {
        (self.symbol_bits + self.occurrence_bits + self.value_bits + self.next_context_bits) as u64
    }

    fn read_width(stream: &mut BitStream<'_>, field: &str) -> Result<i32> {
        let bits = stream.read_unsigned(6)? as i32;
        if bits > 32 {
            return Err(CodecError::malformed(format!(
                "{} width {} exceeds 32 bits",
                field, bits
            )));
        }
        Ok(bits)
    }

    /// Fails before allocating when the declared entries cannot be present.
    fn check_fits(&self, count: u64, stream: &BitStream<'_>) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let width = self.width();
        if width == 0 {
            return Err(CodecError::malformed(format!(
                "{} context entries declared with zero-width fields",
                count
            )));
        }
        let needed = count.saturating_mul(width);
        if needed > stream.remaining() {
            return Err(CodecError::exhausted("context table", needed, stream.remaining()));
        }
        Ok(())
    }

    fn read_entry(&self, stream: &mut BitStream<'_>) -> Result<ContextEntry> {
        let symbol           = (stream.read_unsigned(self.symbol_bits)? as i32).wrapping_sub(2);
        let occurrence_count = stream.read_unsigned(self.occurrence_bits)?;
        let associated_value = (stream.read_unsigned(self.value_bits)? as i32).wrapping_add(self.minimum);
        let next_context     = stream.read_unsigned(self.next_context_bits)? as i32;
        Ok(ContextEntry::new(symbol, occurrence_count, associated_value, next_context))
    }
}

/// Ordered list of context tables; context `i` is `tables[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProbabilityContexts {
    tables: Vec<Vec<ContextEntry>>,
}

impl ProbabilityContexts {
    pub fn new(tables: Vec<Vec<ContextEntry>>) -> Self {
        Self { tables }
    }

    /// A single context holding `entries`.
    pub fn single(entries: Vec<ContextEntry>) -> Self {
        Self { tables: vec![entries] }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn context(&self, index: usize) -> Option<&[ContextEntry]> {
        self.tables.get(index).map(Vec::as_slice)
    }

    pub fn tables(&self) -> &[Vec<ContextEntry>] {
        &self.tables
    }

    /// v1 layout. `table_count` is the byte the packet header carries in
    /// front of the bit-packed tables.
    pub fn read_v1(stream: &mut BitStream<'_>, table_count: u8) -> Result<Self> {
        if table_count == 0 || table_count > MAX_TABLE_COUNT {
            return Err(CodecError::malformed(format!(
                "invalid probability context table count {}",
                table_count
            )));
        }

        let mut tables = Vec::with_capacity(table_count as usize);
        let mut values_by_symbol: HashMap<i32, i32> = HashMap::new();
        let mut minimum = 0i32;

        for table_index in 0..table_count {
            let count = stream.read_unsigned(32)? as u64;
            let layout = if table_index == 0 {
                let symbol_bits       = EntryLayout::read_width(stream, "symbol")?;
                let occurrence_bits   = EntryLayout::read_width(stream, "occurrence count")?;
                let value_bits        = EntryLayout::read_width(stream, "associated value")?;
                let next_context_bits = EntryLayout::read_width(stream, "next context")?;
                minimum = stream.read_unsigned(32)? as i32;
                EntryLayout { symbol_bits, occurrence_bits, value_bits, next_context_bits, minimum }
            } else {
                let symbol_bits       = EntryLayout::read_width(stream, "symbol")?;
                let occurrence_bits   = EntryLayout::read_width(stream, "occurrence count")?;
                let next_context_bits = EntryLayout::read_width(stream, "next context")?;
                EntryLayout { symbol_bits, occurrence_bits, value_bits: 0, next_context_bits, minimum }
            };
            layout.check_fits(count, stream)?;

            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let mut entry = layout.read_entry(stream)?;
                if table_index == 0 {
                    values_by_symbol.insert(entry.symbol, entry.associated_value);
                } else {
                    match values_by_symbol.get(&entry.symbol) {
                        Some(&value) => entry.associated_value = value,
                        // escape values come from the out-of-band queue
                        None if entry.is_escape() => {}
                        None => {
                            return Err(CodecError::malformed(format!(
                                "symbol {} in context {} missing from context 0",
                                entry.symbol, table_index
                            )));
                        }
                    }
                }
                entries.push(entry);
            }
            log::trace!(
                "context {}: {} entries, widths {:?}",
                table_index, entries.len(), layout
            );
            tables.push(entries);
        }

        stream.align_to_byte()?;
        Ok(Self { tables })
    }

    /// v2 layout: always exactly one table.
    pub fn read_v2(stream: &mut BitStream<'_>) -> Result<Self> {
        let count = stream.read_unsigned(16)? as u64;
        let symbol_bits     = EntryLayout::read_width(stream, "symbol")?;
        let occurrence_bits = EntryLayout::read_width(stream, "occurrence count")?;
        let value_bits      = EntryLayout::read_width(stream, "associated value")?;
        let minimum         = stream.read_unsigned(32)? as i32;
        let layout = EntryLayout {
            symbol_bits,
            occurrence_bits,
            value_bits,
            next_context_bits: 0,
            minimum,
        };
        layout.check_fits(count, stream)?;

        let entries = (0..count)
            .map(|_| layout.read_entry(stream))
            .collect::<Result<Vec<_>>>()?;
        log::trace!("context 0: {} entries, widths {:?}", entries.len(), layout);

        stream.align_to_byte()?;
        Ok(Self::single(entries))
    }
}
