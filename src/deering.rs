// src/deering.rs
//! Deering normal reconstruction.
//!
//! A unit normal is stored as a sextant (which of six triangular patches of
//! an octahedron face), an octant (sign of each axis) and two angles
//! quantised to at most 8 bits. The angles index a 257-entry table of
//! precomputed sines and cosines spanning `[0, PSI_MAX]`.

use std::sync::OnceLock;

use crate::error::{CodecError, Result};

/// Angular half-range covered by one sextant.
pub const PSI_MAX: f64 = 0.615479709;

/// Finest supported angle resolution.
pub const MAX_ANGLE_BITS: u32 = 8;

const TABLE_SIZE: usize = 1 << MAX_ANGLE_BITS;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupEntry {
    pub cos_theta: f64,
    pub sin_theta: f64,
    pub cos_psi:   f64,
    pub sin_psi:   f64,
}

/// Process-wide trigonometric table, built on first use.
#[derive(Debug)]
pub struct DeeringLookupTable {
    entries: Vec<LookupEntry>,
}

static LOOKUP_TABLE: OnceLock<DeeringLookupTable> = OnceLock::new();

impl DeeringLookupTable {
    pub fn get() -> &'static Self {
        LOOKUP_TABLE.get_or_init(Self::build)
    }

    fn build() -> Self {
        let size = TABLE_SIZE as f64;
        let entries = (0..=TABLE_SIZE)
            .map(|i| {
                let theta = (PSI_MAX * (TABLE_SIZE - i) as f64 / size).tan().asin();
                let psi = PSI_MAX * i as f64 / size;
                LookupEntry {
                    cos_theta: theta.cos(),
                    sin_theta: theta.sin(),
                    cos_psi:   psi.cos(),
                    sin_psi:   psi.sin(),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for angles quantised to `bits` bits.
    pub fn lookup(&self, theta: u32, psi: u32, bits: u32) -> Result<LookupEntry> {
        if bits > MAX_ANGLE_BITS {
            return Err(CodecError::invalid_parameter(format!(
                "angle resolution {} exceeds {} bits",
                bits, MAX_ANGLE_BITS
            )));
        }
        let shift = MAX_ANGLE_BITS - bits;
        let index = |angle: u32, name: &str| -> Result<usize> {
            let i = (angle as u64) << shift;
            if i > TABLE_SIZE as u64 {
                return Err(CodecError::invalid_parameter(format!(
                    "{} code {} out of range for {} bits",
                    name, angle, bits
                )));
            }
            Ok(i as usize)
        };
        let t = self.entries[index(theta, "theta")?];
        let p = self.entries[index(psi, "psi")?];
        Ok(LookupEntry {
            cos_theta: t.cos_theta,
            sin_theta: t.sin_theta,
            cos_psi:   p.cos_psi,
            sin_psi:   p.sin_psi,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Converts (sextant, octant, theta, psi) codes at a fixed angle resolution.
#[derive(Debug, Clone, Copy)]
pub struct DeeringNormalCodec {
    bits:  u32,
    table: &'static DeeringLookupTable,
}

impl DeeringNormalCodec {
    pub fn new(bits: u32) -> Result<Self> {
        if bits > MAX_ANGLE_BITS {
            return Err(CodecError::invalid_parameter(format!(
                "angle resolution {} exceeds {} bits",
                bits, MAX_ANGLE_BITS
            )));
        }
        Ok(Self { bits, table: DeeringLookupTable::get() })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn convert_code_to_vec(&self, sextant: u32, octant: u32, theta: u32, psi: u32) -> Result<Vector3> {
        if sextant > 5 {
            return Err(CodecError::invalid_parameter(format!("sextant {} outside 0..=5", sextant)));
        }
        let theta = theta.saturating_add(sextant & 1);
        let e = self.table.lookup(theta, psi, self.bits)?;

        let xx = e.cos_theta * e.cos_psi;
        let yy = e.sin_psi;
        let zz = e.sin_theta * e.cos_psi;
        let (mut x, mut y, mut z) = match sextant {
            0 => (xx, yy, zz),
            1 => (zz, yy, xx),
            2 => (yy, zz, xx),
            3 => (yy, xx, zz),
            4 => (zz, xx, yy),
            _ => (xx, zz, yy),
        };

        if octant & 0x4 == 0 {
            x = -x;
        }
        if octant & 0x2 == 0 {
            y = -y;
        }
        if octant & 0x1 == 0 {
            z = -z;
        }
        Ok(Vector3::new(x, y, z))
    }

    /// Convert four parallel code arrays.
    pub fn decode_normals(
        &self,
        sextants: &[u32],
        octants: &[u32],
        thetas: &[u32],
        psis: &[u32],
    ) -> Result<Vec<Vector3>> {
        let n = sextants.len();
        if octants.len() != n || thetas.len() != n || psis.len() != n {
            return Err(CodecError::malformed(format!(
                "normal code arrays differ in length: {}/{}/{}/{}",
                n,
                octants.len(),
                thetas.len(),
                psis.len()
            )));
        }
        sextants
            .iter()
            .zip(octants)
            .zip(thetas.iter().zip(psis))
            .map(|((&s, &o), (&t, &p))| self.convert_code_to_vec(s, o, t, p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn table_is_built_once_and_shared() {
        let a = DeeringLookupTable::get();
        let b = DeeringLookupTable::get();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.len(), TABLE_SIZE + 1);
    }

    #[test]
    fn table_spans_psi_range() {
        let table = DeeringLookupTable::get();
        let first = table.lookup(0, 0, 8).unwrap();
        let last = table.lookup(256, 256, 8).unwrap();
        assert!(first.sin_psi.abs() < EPS);
        assert!((last.sin_psi - PSI_MAX.sin()).abs() < EPS);
        // theta at index 0 is asin(tan(PSI_MAX)), i.e. 45 degrees
        assert!((first.sin_theta - std::f64::consts::FRAC_1_SQRT_2).abs() < EPS);
        assert!(last.sin_theta.abs() < EPS);
        // psi column is not collapsed to a single value
        let mid = table.lookup(128, 128, 8).unwrap();
        assert!(mid.sin_psi > first.sin_psi && mid.sin_psi < last.sin_psi);
    }

    #[test]
    fn origin_code_is_unit_length() {
        let codec = DeeringNormalCodec::new(8).unwrap();
        let v = codec.convert_code_to_vec(0, 0b111, 0, 0).unwrap();
        assert!((v.length() - 1.0).abs() < EPS);
        assert!(v.x > 0.0 && v.z > 0.0);
        assert!(v.y.abs() < EPS);
    }

    #[test]
    fn every_sextant_yields_unit_vectors() {
        let codec = DeeringNormalCodec::new(6).unwrap();
        for sextant in 0..6 {
            for (theta, psi) in [(0, 0), (10, 20), (63, 1), (31, 63)] {
                let v = codec.convert_code_to_vec(sextant, 0b101, theta, psi).unwrap();
                assert!((v.length() - 1.0).abs() < EPS, "{:?}", v);
            }
        }
    }

    #[test]
    fn octant_bits_flip_one_axis_each() {
        let codec = DeeringNormalCodec::new(8).unwrap();
        let base = codec.convert_code_to_vec(0, 0b111, 10, 20).unwrap();
        assert!(base.x != 0.0 && base.y != 0.0 && base.z != 0.0);

        let flip_x = codec.convert_code_to_vec(0, 0b011, 10, 20).unwrap();
        assert_eq!(flip_x, Vector3::new(-base.x, base.y, base.z));

        let flip_y = codec.convert_code_to_vec(0, 0b101, 10, 20).unwrap();
        assert_eq!(flip_y, Vector3::new(base.x, -base.y, base.z));

        let flip_z = codec.convert_code_to_vec(0, 0b110, 10, 20).unwrap();
        assert_eq!(flip_z, Vector3::new(base.x, base.y, -base.z));
    }

    #[test]
    fn sextants_permute_axes() {
        let codec = DeeringNormalCodec::new(8).unwrap();
        let s0 = codec.convert_code_to_vec(0, 0b111, 11, 20).unwrap();
        // odd sextants bump theta by one
        let s1 = codec.convert_code_to_vec(1, 0b111, 10, 20).unwrap();
        assert_eq!(s1, Vector3::new(s0.z, s0.y, s0.x));
        let s3 = codec.convert_code_to_vec(3, 0b111, 10, 20).unwrap();
        assert_eq!(s3, Vector3::new(s0.y, s0.x, s0.z));
        let s2 = codec.convert_code_to_vec(2, 0b111, 11, 20).unwrap();
        assert_eq!(s2, Vector3::new(s0.y, s0.z, s0.x));
    }

    #[test]
    fn coarse_resolution_scales_into_table() {
        let fine = DeeringNormalCodec::new(8).unwrap();
        let coarse = DeeringNormalCodec::new(4).unwrap();
        assert_eq!(
            coarse.convert_code_to_vec(0, 7, 3, 5).unwrap(),
            fine.convert_code_to_vec(0, 7, 3 << 4, 5 << 4).unwrap()
        );
    }

    #[test]
    fn rejects_out_of_range_codes() {
        assert!(matches!(DeeringNormalCodec::new(9), Err(CodecError::InvalidParameter(_))));
        let codec = DeeringNormalCodec::new(8).unwrap();
        assert!(matches!(codec.convert_code_to_vec(6, 0, 0, 0), Err(CodecError::InvalidParameter(_))));
        assert!(matches!(codec.convert_code_to_vec(0, 0, 257, 0), Err(CodecError::InvalidParameter(_))));
        assert!(matches!(codec.convert_code_to_vec(1, 0, 256, 0), Err(CodecError::InvalidParameter(_))));
        let coarse = DeeringNormalCodec::new(2).unwrap();
        assert!(matches!(coarse.convert_code_to_vec(0, 0, 0, 5), Err(CodecError::InvalidParameter(_))));
    }

    #[test]
    fn parallel_arrays_must_match() {
        let codec = DeeringNormalCodec::new(8).unwrap();
        let ok = codec.decode_normals(&[0, 1], &[7, 7], &[0, 5], &[0, 9]).unwrap();
        assert_eq!(ok.len(), 2);
        assert!(matches!(
            codec.decode_normals(&[0, 1], &[7], &[0, 5], &[0, 9]),
            Err(CodecError::MalformedHeader(_))
        ));
    }
}
