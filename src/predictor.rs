// src/predictor.rs
//! Residual predictors applied after entropy decoding.
//!
//! Encoders store `value - predicted` (or `value ^ predicted` for the XOR
//! predictors), with predictions taken from already-reconstructed values.
//! The first four values are stored verbatim.

use crate::error::{CodecError, Result};

const VERBATIM_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorType {
    Lag1       = 0,
    Lag2       = 1,
    Stride1    = 2,
    Stride2    = 3,
    StripIndex = 4,
    Ramp       = 5,
    Xor1       = 6,
    Xor2       = 7,
    Null       = 8,
}

impl TryFrom<u8> for PredictorType {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0 => Self::Lag1,
            1 => Self::Lag2,
            2 => Self::Stride1,
            3 => Self::Stride2,
            4 => Self::StripIndex,
            5 => Self::Ramp,
            6 => Self::Xor1,
            7 => Self::Xor2,
            8 => Self::Null,
            other => return Err(CodecError::malformed(format!("unknown predictor type {}", other))),
        })
    }
}

impl std::str::FromStr for PredictorType {
    type Err = CodecError;

    fn from_str(name: &str) -> Result<Self> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "lag1" => Self::Lag1,
            "lag2" => Self::Lag2,
            "stride1" => Self::Stride1,
            "stride2" => Self::Stride2,
            "stripindex" | "strip-index" => Self::StripIndex,
            "ramp" => Self::Ramp,
            "xor1" => Self::Xor1,
            "xor2" => Self::Xor2,
            "null" | "none" => Self::Null,
            _ => return Err(CodecError::invalid_parameter(format!("unknown predictor {:?}", name))),
        })
    }
}

impl PredictorType {
    fn is_xor(self) -> bool {
        matches!(self, Self::Xor1 | Self::Xor2)
    }

    /// Prediction for `values[index]`; requires `index >= 4`.
    fn predict(self, values: &[i32], index: usize) -> i32 {
        let v1 = values[index - 1];
        let v2 = values[index - 2];
        let v4 = values[index - 4];
        match self {
            Self::Lag1 | Self::Xor1 | Self::Null => v1,
            Self::Lag2 | Self::Xor2 => v2,
            Self::Stride1 => v1.wrapping_add(v1.wrapping_sub(v2)),
            Self::Stride2 => v2.wrapping_add(v2.wrapping_sub(v4)),
            Self::StripIndex => {
                let stride = v2.wrapping_sub(v4);
                if stride > -8 && stride < 8 {
                    v2.wrapping_add(stride)
                } else {
                    v2.wrapping_add(2)
                }
            }
            Self::Ramp => index as i32,
        }
    }
}

/// Reconstruct values from residuals.
pub fn unpack_residuals(residuals: &[i32], predictor: PredictorType) -> Vec<i32> {
    if predictor == PredictorType::Null {
        return residuals.to_vec();
    }
    let mut values = Vec::with_capacity(residuals.len());
    for (i, &residual) in residuals.iter().enumerate() {
        if i < VERBATIM_PREFIX {
            values.push(residual);
            continue;
        }
        let predicted = predictor.predict(&values, i);
        values.push(if predictor.is_xor() {
            residual ^ predicted
        } else {
            residual.wrapping_add(predicted)
        });
    }
    values
}
