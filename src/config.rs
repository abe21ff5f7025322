// src/config.rs
//! Decode-time settings supplied by whoever parsed the enclosing file.

use crate::bitreader::ByteOrder;

/// Layout of Int32 compressed data packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketVersion {
    /// Files older than major version 9.
    #[default]
    V1,
    /// Major version 9 and later.
    V2,
}

/// Where an arithmetic-coded escape symbol may draw from the out-of-band
/// queue. `PacketReader` applies it to multi-context tables only; packets
/// with a single context always decode as `AnyContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeRule {
    /// Only contexts after the first; an escape in context 0 is
    /// `CodecError::InvalidEscape`.
    #[default]
    SecondaryContexts,
    /// Every context, including single-table streams whose only context is 0.
    AnyContext,
}

/// First file major version that writes `PacketVersion::V2` packets.
pub const V2_FIRST_MAJOR_VERSION: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Byte order of the scalar fields surrounding the code text.
    pub byte_order:              ByteOrder,
    pub packet_version:          PacketVersion,
    /// Zero bits the range decoder may shift in once the code text runs dry.
    /// The coder keeps a 16-bit window, so the encoder never flushes the tail.
    pub arithmetic_padding_bits: u32,
    /// Packets nest for out-of-band values and chopper halves; deeper than
    /// this is treated as a malformed header.
    pub max_nesting_depth:       u32,
    pub escape_rule:             EscapeRule,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            byte_order:              ByteOrder::LittleEndian,
            packet_version:          PacketVersion::V1,
            arithmetic_padding_bits: 16,
            max_nesting_depth:       8,
            escape_rule:             EscapeRule::default(),
        }
    }
}

impl DecodeConfig {
    pub fn for_file_version(major: u32) -> Self {
        let packet_version = if major >= V2_FIRST_MAJOR_VERSION {
            PacketVersion::V2
        } else {
            PacketVersion::V1
        };
        Self { packet_version, ..Self::default() }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_packet_version(mut self, packet_version: PacketVersion) -> Self {
        self.packet_version = packet_version;
        self
    }

    pub fn with_arithmetic_padding_bits(mut self, bits: u32) -> Self {
        self.arithmetic_padding_bits = bits;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: u32) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_escape_rule(mut self, rule: EscapeRule) -> Self {
        self.escape_rule = rule;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_version_selects_packet_layout() {
        assert_eq!(DecodeConfig::for_file_version(8).packet_version, PacketVersion::V1);
        assert_eq!(DecodeConfig::for_file_version(9).packet_version, PacketVersion::V2);
        assert_eq!(DecodeConfig::for_file_version(10).packet_version, PacketVersion::V2);
    }

    #[test]
    fn setters_override_defaults() {
        let cfg = DecodeConfig::default()
            .with_byte_order(ByteOrder::BigEndian)
            .with_arithmetic_padding_bits(0)
            .with_max_nesting_depth(2);
        assert_eq!(cfg.byte_order, ByteOrder::BigEndian);
        assert_eq!(cfg.arithmetic_padding_bits, 0);
        assert_eq!(cfg.max_nesting_depth, 2);
        assert_eq!(cfg.packet_version, PacketVersion::V1);
        assert_eq!(cfg.escape_rule, EscapeRule::SecondaryContexts);
        let cfg = cfg.with_escape_rule(EscapeRule::AnyContext);
        assert_eq!(cfg.escape_rule, EscapeRule::AnyContext);
    }
}
