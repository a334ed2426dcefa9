//! World coordinate codec.
//!
//! The client stores coordinates in a four byte, float-like layout:
//!
//! ```text
//! byte 0: sign(1) scale(7)
//! byte 1: odd(1)  mantissa bits 22..16
//! byte 2: mantissa bits 15..8
//! byte 3: mantissa bits 7..0
//! ```
//!
//! The biased exponent is `scale * 2 + odd`. Zero is special-cased to scale 58
//! with an empty mantissa. The scheme is quantized and must match the client
//! bit for bit.

use crate::error::CodecError;

pub const REFERENCE_SCALE: u8 = 69;
pub const ZERO_SCALE: u8 = 58;
const REFERENCE_EXPONENT: i32 = 11;
const MANTISSA_BITS: u32 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedCoordinate {
    pub negative: bool,
    pub scale: u8,
    pub odd: bool,
    pub mantissa: u32,
}

impl EncodedCoordinate {
    pub fn to_bytes(self) -> [u8; 4] {
        [
            (u8::from(self.negative) << 7) | (self.scale & 0x7f),
            (u8::from(self.odd) << 7) | ((self.mantissa >> 16) & 0x7f) as u8,
            (self.mantissa >> 8) as u8,
            self.mantissa as u8,
        ]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            negative: bytes[0] & 0x80 != 0,
            scale: bytes[0] & 0x7f,
            odd: bytes[1] & 0x80 != 0,
            mantissa: (u32::from(bytes[1] & 0x7f) << 16)
                | (u32::from(bytes[2]) << 8)
                | u32::from(bytes[3]),
        }
    }
}

pub fn encode_coordinate(value: f64) -> Result<[u8; 4], CodecError> {
    Ok(encode_coordinate_parts(value)?.to_bytes())
}

pub fn encode_coordinate_parts(value: f64) -> Result<EncodedCoordinate, CodecError> {
    if !value.is_finite() {
        return Err(CodecError::CoordinateOutOfRange(value.to_string()));
    }
    if value == 0.0 {
        return Ok(EncodedCoordinate {
            negative: false,
            scale: ZERO_SCALE,
            odd: false,
            mantissa: 0,
        });
    }

    let negative = value < 0.0;
    let mut normalized = value.abs() / f64::from(1u32 << REFERENCE_EXPONENT);
    let mut exponent = i32::from(REFERENCE_SCALE) * 2;
    let mut steps = 0u32;
    while normalized >= 2.0 {
        normalized /= 2.0;
        exponent += 1;
        steps += 1;
        if exponent > 0xff {
            return Err(CodecError::CoordinateOutOfRange(value.to_string()));
        }
    }
    while normalized < 1.0 {
        normalized *= 2.0;
        exponent -= 1;
        steps += 1;
        if exponent < 1 {
            return Err(CodecError::CoordinateOutOfRange(value.to_string()));
        }
    }

    let mantissa = (normalized * f64::from(1u32 << MANTISSA_BITS)).floor() as u32;
    Ok(EncodedCoordinate {
        negative,
        scale: (exponent >> 1) as u8,
        odd: steps % 2 == 1,
        mantissa: mantissa & 0x7f_ffff,
    })
}

pub fn decode_coordinate(bytes: [u8; 4]) -> f64 {
    let parts = EncodedCoordinate::from_bytes(bytes);
    // 2^-11 encodes to the same bytes as zero and reads back as 0.0.
    if parts.scale == ZERO_SCALE && !parts.odd && parts.mantissa == 0 {
        return 0.0;
    }
    let exponent = i32::from(parts.scale) * 2 + i32::from(parts.odd) - 127;
    let fraction = 1.0 + f64::from(parts.mantissa) / f64::from(1u32 << MANTISSA_BITS);
    let magnitude = fraction * 2f64.powi(exponent);
    if parts.negative {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_uses_the_degraded_scale() {
        let bytes = encode_coordinate(0.0).expect("zero");
        assert_eq!(bytes, [ZERO_SCALE, 0, 0, 0]);
        assert_eq!(bytes[0] & 0x80, 0);
        assert_eq!(decode_coordinate(bytes), 0.0);
    }

    #[test]
    fn two_to_minus_eleven_shares_the_zero_encoding() {
        let bytes = encode_coordinate(2f64.powi(-11)).expect("2^-11");
        assert_eq!(bytes, [ZERO_SCALE, 0, 0, 0]);
        assert_eq!(decode_coordinate(bytes), 0.0);
    }

    #[test]
    fn reference_magnitude_needs_no_normalization() {
        let parts = encode_coordinate_parts(2048.0).expect("2048");
        assert_eq!(parts.scale, REFERENCE_SCALE);
        assert!(!parts.odd);
        assert_eq!(parts.mantissa, 0);
        assert_eq!(encode_coordinate(2048.0).expect("2048"), [0x45, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn odd_step_count_sets_the_flag() {
        let parts = encode_coordinate_parts(4096.0).expect("4096");
        assert_eq!(parts.scale, REFERENCE_SCALE);
        assert!(parts.odd);

        let parts = encode_coordinate_parts(1024.0).expect("1024");
        assert_eq!(parts.scale, REFERENCE_SCALE - 1);
        assert!(parts.odd);

        let parts = encode_coordinate_parts(8192.0).expect("8192");
        assert_eq!(parts.scale, REFERENCE_SCALE + 1);
        assert!(!parts.odd);
    }

    #[test]
    fn sign_is_carried_in_the_top_bit() {
        let negative = encode_coordinate(-1350.5).expect("negative");
        let positive = encode_coordinate(1350.5).expect("positive");
        assert_eq!(negative[0], positive[0] | 0x80);
        assert_eq!(&negative[1..], &positive[1..]);
    }

    #[test]
    fn nonzero_values_reconstruct_within_quantization() {
        for value in [
            0.001, 0.75, 1.0, 3.5, 153.25, 424.1, -1350.0, 2047.999, 32000.5, -98765.4321,
        ] {
            let decoded = decode_coordinate(encode_coordinate(value).expect("encode"));
            let tolerance = value.abs() / f64::from(1u32 << MANTISSA_BITS);
            assert!(
                (decoded - value).abs() <= tolerance,
                "{value} decoded as {decoded}"
            );
            assert!(decoded.abs() <= value.abs());
        }
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(encode_coordinate(f64::NAN).is_err());
        assert!(encode_coordinate(f64::INFINITY).is_err());
        assert!(encode_coordinate(1e300).is_err());
    }
}
