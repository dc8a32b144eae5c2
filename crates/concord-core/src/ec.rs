//! secp256k1 conversions between k256 types and big integers

use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use num_bigint::{BigInt, Sign};
use num_integer::Integer;

use crate::error::{Error, Result};

const CURVE_ORDER_BYTES: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Order of the secp256k1 group
pub fn curve_order() -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &CURVE_ORDER_BYTES)
}

fn to_field_bytes(x: &BigInt) -> Result<FieldBytes> {
    let (_, magnitude) = x.to_bytes_be();
    if magnitude.len() > 32 {
        return Err(Error::Crypto("integer does not fit in 32 bytes".to_string()));
    }
    let mut out = [0u8; 32];
    out[32 - magnitude.len()..].copy_from_slice(&magnitude);
    Ok(FieldBytes::from(out))
}

/// Reduce `x` modulo the group order into a scalar
pub fn scalar_from_bigint(x: &BigInt) -> Result<Scalar> {
    let reduced = x.mod_floor(&curve_order());
    let scalar: Option<Scalar> = Scalar::from_repr(to_field_bytes(&reduced)?).into();
    scalar.ok_or_else(|| Error::Crypto("scalar out of range".to_string()))
}

pub fn scalar_to_bigint(s: &Scalar) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &s.to_bytes())
}

/// Affine `(x, y)` of a non-identity point
pub fn point_coordinates(p: &ProjectivePoint) -> Result<(BigInt, BigInt)> {
    let encoded = p.to_affine().to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => Ok((
            BigInt::from_bytes_be(Sign::Plus, x),
            BigInt::from_bytes_be(Sign::Plus, y),
        )),
        _ => Err(Error::Crypto("point at infinity has no coordinates".to_string())),
    }
}

/// Point from affine coordinates, rejecting anything off the curve
pub fn point_from_coordinates(x: &BigInt, y: &BigInt) -> Result<ProjectivePoint> {
    let encoded = EncodedPoint::from_affine_coordinates(&to_field_bytes(x)?, &to_field_bytes(y)?, false);
    let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
    affine
        .map(ProjectivePoint::from)
        .ok_or_else(|| Error::Crypto("coordinates are not on secp256k1".to_string()))
}

/// `[x0, y0, x1, y1, ...]`
pub fn flatten_points(points: &[ProjectivePoint]) -> Result<Vec<BigInt>> {
    let mut flat = Vec::with_capacity(points.len() * 2);
    for p in points {
        let (x, y) = point_coordinates(p)?;
        flat.push(x);
        flat.push(y);
    }
    Ok(flat)
}

pub fn unflatten_points(flat: &[BigInt]) -> Result<Vec<ProjectivePoint>> {
    if flat.is_empty() || flat.len() % 2 != 0 {
        return Err(Error::Malformed(format!(
            "flattened point list has odd or zero length {}",
            flat.len()
        )));
    }
    flat.chunks(2)
        .map(|xy| point_from_coordinates(&xy[0], &xy[1]))
        .collect()
}

/// Compressed SEC1 encoding
pub fn point_to_bytes(p: &ProjectivePoint) -> Vec<u8> {
    p.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

pub fn point_from_bytes(bytes: &[u8]) -> Result<ProjectivePoint> {
    let encoded =
        EncodedPoint::from_bytes(bytes).map_err(|e| Error::Crypto(format!("bad point encoding: {}", e)))?;
    let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
    affine
        .map(ProjectivePoint::from)
        .ok_or_else(|| Error::Crypto("point is not on secp256k1".to_string()))
}
