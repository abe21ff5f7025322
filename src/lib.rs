// src/lib.rs
//! jtcodec: decoders for the integer and normal-vector codecs embedded in
//! JT CAD files.
//!
//! Bottom-up:
//!   bitreader    -> MSB-first bit cursor over a byte slice
//!   context      -> probability context tables (v1/v2 layouts)
//!   probability  -> cumulative lookup over a context table
//!   driver       -> code text, counts, contexts and out-of-band values
//!   arithmetic / huffman / bitlength -> the three integer codecs
//!   predictor    -> residual unpacking
//!   packet       -> Int32 packets that tag and wrap the codecs
//!   deering / normals -> unit normal reconstruction
pub mod error;
pub mod config;
pub mod bitreader;
pub mod context;
pub mod probability;
pub mod driver;
pub mod arithmetic;
pub mod huffman;
pub mod bitlength;
pub mod predictor;
pub mod packet;
pub mod deering;
pub mod normals;

#[cfg(test)]
mod testutil;

pub use bitreader::{BitStream, ByteOrder};
pub use config::{DecodeConfig, EscapeRule, PacketVersion};
pub use context::{ContextEntry, ProbabilityContexts, ESCAPE_SYMBOL};
pub use deering::{DeeringNormalCodec, Vector3};
pub use driver::{CodeTextSource, CodecDriver};
pub use error::{CodecError, Result};
pub use normals::{read_compressed_normals, read_quantized_normals, CompressedNormals};
pub use packet::{CodecType, PacketReader};
pub use predictor::{unpack_residuals, PredictorType};

/// Decode the single Int32 packet at the start of `data`.
pub fn decode_packet(data: &[u8], config: DecodeConfig) -> Result<Vec<i32>> {
    PacketReader::new(data, config).decode_packet()
}
