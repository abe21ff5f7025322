// src/normals.rs
//! Vertex normal arrays built on Int32 packets.
//!
//! Quantized (v1):   u8 angle bits, i32 count, sextant/octant/theta/psi
//!                   packets with the Lag1 predictor.
//! Compressed (v2):  i32 count, u8 components, u8 quantization bits,
//!                   then either exponent/mantissa packets per component
//!                   (0 bits) or four Deering code packets, then a u32 hash.

use crate::deering::{DeeringNormalCodec, Vector3};
use crate::error::{CodecError, Result};
use crate::packet::PacketReader;
use crate::predictor::PredictorType;

const FLOAT_MANTISSA_BITS: u32 = 23;

#[derive(Debug, Clone, PartialEq)]
pub struct CompressedNormals {
    pub normals: Vec<Vector3>,
    pub hash:    u32,
}

fn check_normal_count(declared: i32, normals: &[Vector3]) -> Result<()> {
    if usize::try_from(declared).map_or(true, |n| n != normals.len()) {
        return Err(CodecError::malformed(format!(
            "normal array declares {} normals, decoded {}",
            declared,
            normals.len()
        )));
    }
    Ok(())
}

pub fn read_quantized_normals(reader: &mut PacketReader<'_>) -> Result<Vec<Vector3>> {
    let bits = reader.read_u8()? as u32;
    let normal_count = reader.read_i32()?;
    let sextants = reader.read_vec_u32(PredictorType::Lag1)?;
    let octants  = reader.read_vec_u32(PredictorType::Lag1)?;
    let thetas   = reader.read_vec_u32(PredictorType::Lag1)?;
    let psis     = reader.read_vec_u32(PredictorType::Lag1)?;

    let normals = DeeringNormalCodec::new(bits)?.decode_normals(&sextants, &octants, &thetas, &psis)?;
    check_normal_count(normal_count, &normals)?;
    log::debug!("quantized normals: {} at {} bits", normals.len(), bits);
    Ok(normals)
}

pub fn read_compressed_normals(reader: &mut PacketReader<'_>) -> Result<CompressedNormals> {
    let normal_count = reader.read_i32()?;
    let components = reader.read_u8()? as usize;
    let quantization_bits = reader.read_u8()? as u32;

    let normals = if quantization_bits == 0 {
        read_float_components(reader, components)?
    } else {
        let mut codes = Vec::with_capacity(4);
        for _ in 0..4 {
            let code: Vec<u32> = reader
                .read_vec_i32(PredictorType::Null)?
                .into_iter()
                .map(|v| v as u32)
                .collect();
            codes.push(code);
        }
        DeeringNormalCodec::new(quantization_bits)?.decode_normals(&codes[0], &codes[1], &codes[2], &codes[3])?
    };
    let hash = reader.read_u32()?;

    check_normal_count(normal_count, &normals)?;
    log::debug!(
        "compressed normals: {} with {} quantization bits, hash {:#010x}",
        normals.len(), quantization_bits, hash
    );
    Ok(CompressedNormals { normals, hash })
}

/// Lossless path: each component is split into exponent and mantissa
/// packets that recombine into IEEE-754 single-precision bits.
fn read_float_components(reader: &mut PacketReader<'_>, components: usize) -> Result<Vec<Vector3>> {
    if components < 3 {
        return Err(CodecError::malformed(format!(
            "lossless normals need 3 components, header declares {}",
            components
        )));
    }

    let mut axes: Vec<Vec<f64>> = Vec::with_capacity(components);
    for component in 0..components {
        let exponents = reader.read_vec_i32(PredictorType::Null)?;
        let mantissae = reader.read_vec_i32(PredictorType::Null)?;
        if exponents.len() != mantissae.len() {
            return Err(CodecError::malformed(format!(
                "component {}: {} exponents but {} mantissae",
                component,
                exponents.len(),
                mantissae.len()
            )));
        }
        axes.push(
            exponents
                .iter()
                .zip(&mantissae)
                .map(|(&e, &m)| {
                    let bits = (e.wrapping_shl(FLOAT_MANTISSA_BITS) | m) as u32;
                    f32::from_bits(bits) as f64
                })
                .collect(),
        );
    }

    let (x, y, z) = (&axes[0], &axes[1], &axes[2]);
    if y.len() != x.len() || z.len() != x.len() {
        return Err(CodecError::malformed(format!(
            "normal components differ in length: {}/{}/{}",
            x.len(),
            y.len(),
            z.len()
        )));
    }
    Ok((0..x.len()).map(|i| Vector3::new(x[i], y[i], z[i])).collect())
}
