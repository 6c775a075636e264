// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scalar leaf conversion between native and packed form.
//!
//! A number field is converted in fixed stages: encode (two's/ones'
//! complement, sign-magnitude, BCD, IEEE-754), bit inversion, bit-order
//! reversal, byte swap. Unpacking applies the same stages in reverse. The
//! stages operate on a u64 staging word regardless of the field width, so a
//! 3-bit flag and a 48-bit coarse timestamp take the same path.

use crate::codec::bits::{BitReader, BitWriter};
use crate::error::{Result, Status};
use crate::table::{BasicKind, ByteOrder, CompiledType, NumberDescriptor, NumberEncoding};
use crate::value::{read_native_uint, sign_extend, write_native_uint};

fn low_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn swap_field_bytes(value: u64, bits: u32) -> Result<u64> {
    if bits % 8 != 0 {
        // Little-endian packing is only meaningful for whole octets.
        return Err(Status::InvalidSizeOrType);
    }
    let mut out = 0u64;
    let mut v = value;
    for _ in 0..bits / 8 {
        out = (out << 8) | (v & 0xFF);
        v >>= 8;
    }
    Ok(out)
}

fn encode_bcd(value: u64, bits: u32) -> u64 {
    let digits = bits / 4;
    let mut out = 0u64;
    let mut v = value;
    for i in 0..digits {
        out |= (v % 10) << (4 * i);
        v /= 10;
    }
    out
}

fn decode_bcd(field: u64, bits: u32) -> Result<u64> {
    let digits = bits / 4;
    let mut out = 0u64;
    for i in (0..digits).rev() {
        let nibble = (field >> (4 * i)) & 0xF;
        if nibble > 9 {
            return Err(Status::InvalidSizeOrType);
        }
        out = out * 10 + nibble;
    }
    Ok(out)
}

fn float_bits_to_wire(raw: u64, native_bytes: u32, packed_bits: u32) -> Result<u64> {
    match (native_bytes, packed_bits) {
        (4, 32) | (8, 64) => Ok(raw),
        (8, 32) => Ok((f64::from_bits(raw) as f32).to_bits() as u64),
        (4, 64) => Ok((f32::from_bits(raw as u32) as f64).to_bits()),
        _ => Err(Status::InvalidSizeOrType),
    }
}

fn float_bits_to_native(wire: u64, native_bytes: u32, packed_bits: u32) -> Result<u64> {
    match (native_bytes, packed_bits) {
        (4, 32) | (8, 64) => Ok(wire),
        (8, 32) => Ok((f32::from_bits(wire as u32) as f64).to_bits()),
        (4, 64) => Ok(((f64::from_bits(wire) as f32).to_bits()) as u64),
        _ => Err(Status::InvalidSizeOrType),
    }
}

/// Transform a native logical value into its wire bit pattern.
///
/// `raw` holds the native representation: a zero-extended unsigned value, a
/// two's complement pattern for signed values, or IEEE-754 bits for floats.
pub(crate) fn native_to_wire(
    kind: BasicKind,
    desc: &NumberDescriptor,
    packed_bits: u32,
    native_bytes: u32,
    raw: u64,
) -> Result<u64> {
    if packed_bits == 0 || packed_bits > 64 {
        return Err(Status::InvalidSizeOrType);
    }
    let mask = low_mask(packed_bits);
    let mut field = match (kind, desc.encoding) {
        (BasicKind::UnsignedInt, NumberEncoding::TwosComplement) => raw & mask,
        (BasicKind::UnsignedInt, NumberEncoding::Bcd) => {
            encode_bcd(raw, packed_bits) & mask
        }
        (BasicKind::SignedInt, NumberEncoding::TwosComplement) => {
            (sign_extend(raw, native_bytes as usize) as u64) & mask
        }
        (BasicKind::SignedInt, NumberEncoding::OnesComplement) => {
            let value = sign_extend(raw, native_bytes as usize);
            if value >= 0 {
                (value as u64) & mask
            } else {
                !(value.unsigned_abs()) & mask
            }
        }
        (BasicKind::SignedInt, NumberEncoding::SignMagnitude) => {
            let value = sign_extend(raw, native_bytes as usize);
            let magnitude = value.unsigned_abs() & low_mask(packed_bits - 1);
            if value < 0 {
                magnitude | (1u64 << (packed_bits - 1))
            } else {
                magnitude
            }
        }
        (BasicKind::Float, NumberEncoding::Ieee754) => {
            float_bits_to_wire(raw, native_bytes, packed_bits)?
        }
        _ => return Err(Status::InvalidSizeOrType),
    };
    if desc.invert_bits {
        field ^= mask;
    }
    if desc.lsb_first {
        field = field.reverse_bits() >> (64 - packed_bits);
    }
    if desc.byte_order == ByteOrder::LittleEndian {
        field = swap_field_bytes(field, packed_bits)?;
    }
    Ok(field)
}

/// Inverse of [`native_to_wire`].
pub(crate) fn wire_to_native(
    kind: BasicKind,
    desc: &NumberDescriptor,
    packed_bits: u32,
    native_bytes: u32,
    wire: u64,
) -> Result<u64> {
    if packed_bits == 0 || packed_bits > 64 {
        return Err(Status::InvalidSizeOrType);
    }
    let mask = low_mask(packed_bits);
    let mut field = wire & mask;
    if desc.byte_order == ByteOrder::LittleEndian {
        field = swap_field_bytes(field, packed_bits)?;
    }
    if desc.lsb_first {
        field = field.reverse_bits() >> (64 - packed_bits);
    }
    if desc.invert_bits {
        field ^= mask;
    }
    match (kind, desc.encoding) {
        (BasicKind::UnsignedInt, NumberEncoding::TwosComplement) => Ok(field),
        (BasicKind::UnsignedInt, NumberEncoding::Bcd) => decode_bcd(field, packed_bits),
        (BasicKind::SignedInt, NumberEncoding::TwosComplement) => {
            let shift = 64 - packed_bits;
            Ok((((field << shift) as i64) >> shift) as u64)
        }
        (BasicKind::SignedInt, NumberEncoding::OnesComplement) => {
            if field >> (packed_bits - 1) != 0 {
                Ok((-((!field & mask) as i64)) as u64)
            } else {
                Ok(field)
            }
        }
        (BasicKind::SignedInt, NumberEncoding::SignMagnitude) => {
            let magnitude = (field & low_mask(packed_bits - 1)) as i64;
            if field >> (packed_bits - 1) != 0 {
                Ok((-magnitude) as u64)
            } else {
                Ok(magnitude as u64)
            }
        }
        (BasicKind::Float, NumberEncoding::Ieee754) => {
            float_bits_to_native(field, native_bytes, packed_bits)
        }
        _ => Err(Status::InvalidSizeOrType),
    }
}

/// Pack one scalar leaf from a native object into the wire image.
pub(crate) fn pack_scalar(
    ty: &CompiledType,
    native: &[u8],
    native_off: usize,
    writer: &mut BitWriter<'_>,
    bit_off: usize,
) -> Result<()> {
    match ty.kind {
        BasicKind::Blob => {
            let width = ty.native_bytes as usize;
            if native_off + width > native.len() {
                return Err(Status::BufferSizeError);
            }
            writer.write_blob(bit_off, ty.packed_bits, &native[native_off..native_off + width])
        }
        _ => {
            let desc = ty.number().ok_or(Status::InvalidSizeOrType)?;
            let raw = read_native_uint(native, native_off, ty.native_bytes as usize)?;
            let field = native_to_wire(ty.kind, desc, ty.packed_bits, ty.native_bytes, raw)?;
            writer.write_bits(bit_off, ty.packed_bits, field)
        }
    }
}

/// Unpack one scalar leaf from the wire image into a native object.
pub(crate) fn unpack_scalar(
    ty: &CompiledType,
    native: &mut [u8],
    native_off: usize,
    reader: &BitReader<'_>,
    bit_off: usize,
) -> Result<()> {
    match ty.kind {
        BasicKind::Blob => {
            let width = ty.native_bytes as usize;
            if native_off + width > native.len() {
                return Err(Status::BufferSizeError);
            }
            native[native_off..native_off + width].fill(0);
            reader.read_blob(bit_off, ty.packed_bits, &mut native[native_off..native_off + width])
        }
        _ => {
            let desc = ty.number().ok_or(Status::InvalidSizeOrType)?;
            let field = reader.read_bits(bit_off, ty.packed_bits)?;
            let raw = wire_to_native(ty.kind, desc, ty.packed_bits, ty.native_bytes, field)?;
            write_native_uint(native, native_off, ty.native_bytes as usize, raw)
        }
    }
}

/// Write a logical value straight into a packed number field.
///
/// Used by finalization, which computes field values (lengths, checksums)
/// without a native object in hand.
pub(crate) fn write_number(
    ty: &CompiledType,
    writer: &mut BitWriter<'_>,
    bit_off: usize,
    value: u64,
) -> Result<()> {
    let desc = ty.number().ok_or(Status::InvalidSizeOrType)?;
    let field = native_to_wire(ty.kind, desc, ty.packed_bits, 8, value)?;
    writer.write_bits(bit_off, ty.packed_bits, field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(order: ByteOrder, encoding: NumberEncoding) -> NumberDescriptor {
        NumberDescriptor {
            byte_order: order,
            encoding,
            invert_bits: false,
            lsb_first: false,
        }
    }

    fn round_trip(kind: BasicKind, d: &NumberDescriptor, bits: u32, native: u32, raw: u64) -> u64 {
        let wire = native_to_wire(kind, d, bits, native, raw).expect("to wire");
        wire_to_native(kind, d, bits, native, wire).expect("to native")
    }

    #[test]
    fn test_unsigned_big_endian_identity() {
        let d = desc(ByteOrder::BigEndian, NumberEncoding::TwosComplement);
        assert_eq!(
            native_to_wire(BasicKind::UnsignedInt, &d, 16, 2, 0x1234).expect("wire"),
            0x1234
        );
    }

    #[test]
    fn test_little_endian_swaps_bytes() {
        let d = desc(ByteOrder::LittleEndian, NumberEncoding::TwosComplement);
        assert_eq!(
            native_to_wire(BasicKind::UnsignedInt, &d, 16, 2, 0x1234).expect("wire"),
            0x3412
        );
        assert_eq!(
            round_trip(BasicKind::UnsignedInt, &d, 32, 4, 0xAABBCCDD),
            0xAABBCCDD
        );
    }

    #[test]
    fn test_little_endian_requires_whole_octets() {
        let d = desc(ByteOrder::LittleEndian, NumberEncoding::TwosComplement);
        assert_eq!(
            native_to_wire(BasicKind::UnsignedInt, &d, 12, 2, 1),
            Err(Status::InvalidSizeOrType)
        );
    }

    #[test]
    fn test_signed_twos_complement_narrow_field() {
        let d = desc(ByteOrder::BigEndian, NumberEncoding::TwosComplement);
        // -3 in a 5-bit field.
        let wire = native_to_wire(BasicKind::SignedInt, &d, 5, 2, (-3i64) as u64).expect("wire");
        assert_eq!(wire, 0b11101);
        let back = wire_to_native(BasicKind::SignedInt, &d, 5, 2, wire).expect("native");
        assert_eq!(back as i64, -3);
    }

    #[test]
    fn test_ones_complement() {
        let d = desc(ByteOrder::BigEndian, NumberEncoding::OnesComplement);
        let wire = native_to_wire(BasicKind::SignedInt, &d, 8, 1, (-1i64) as u64).expect("wire");
        assert_eq!(wire, 0xFE);
        assert_eq!(round_trip(BasicKind::SignedInt, &d, 8, 1, (-37i64) as u64) as i64, -37);
        assert_eq!(round_trip(BasicKind::SignedInt, &d, 8, 1, 37) as i64, 37);
    }

    #[test]
    fn test_sign_magnitude() {
        let d = desc(ByteOrder::BigEndian, NumberEncoding::SignMagnitude);
        let wire = native_to_wire(BasicKind::SignedInt, &d, 8, 1, (-5i64) as u64).expect("wire");
        assert_eq!(wire, 0x85);
        assert_eq!(round_trip(BasicKind::SignedInt, &d, 8, 1, (-5i64) as u64) as i64, -5);
    }

    #[test]
    fn test_bcd() {
        let d = desc(ByteOrder::BigEndian, NumberEncoding::Bcd);
        let wire = native_to_wire(BasicKind::UnsignedInt, &d, 16, 2, 1234).expect("wire");
        assert_eq!(wire, 0x1234);
        assert_eq!(round_trip(BasicKind::UnsignedInt, &d, 16, 2, 1234), 1234);
    }

    #[test]
    fn test_bcd_rejects_invalid_digit() {
        let d = desc(ByteOrder::BigEndian, NumberEncoding::Bcd);
        assert_eq!(
            wire_to_native(BasicKind::UnsignedInt, &d, 8, 1, 0x1A),
            Err(Status::InvalidSizeOrType)
        );
    }

    #[test]
    fn test_invert_bits() {
        let d = NumberDescriptor {
            invert_bits: true,
            ..desc(ByteOrder::BigEndian, NumberEncoding::TwosComplement)
        };
        let wire = native_to_wire(BasicKind::UnsignedInt, &d, 8, 1, 0x0F).expect("wire");
        assert_eq!(wire, 0xF0);
        assert_eq!(round_trip(BasicKind::UnsignedInt, &d, 8, 1, 0x0F), 0x0F);
    }

    #[test]
    fn test_lsb_first() {
        let d = NumberDescriptor {
            lsb_first: true,
            ..desc(ByteOrder::BigEndian, NumberEncoding::TwosComplement)
        };
        let wire = native_to_wire(BasicKind::UnsignedInt, &d, 8, 1, 0b1000_0001).expect("wire");
        assert_eq!(wire, 0b1000_0001);
        let wire = native_to_wire(BasicKind::UnsignedInt, &d, 4, 1, 0b0001).expect("wire");
        assert_eq!(wire, 0b1000);
        assert_eq!(round_trip(BasicKind::UnsignedInt, &d, 12, 2, 0x123), 0x123);
    }

    #[test]
    fn test_float_round_trip() {
        let d = desc(ByteOrder::BigEndian, NumberEncoding::Ieee754);
        let raw = std::f64::consts::PI.to_bits();
        assert_eq!(round_trip(BasicKind::Float, &d, 64, 8, raw), raw);

        let raw32 = 1.5f32.to_bits() as u64;
        assert_eq!(round_trip(BasicKind::Float, &d, 32, 4, raw32), raw32);
    }

    #[test]
    fn test_float_width_conversion() {
        let d = desc(ByteOrder::BigEndian, NumberEncoding::Ieee754);
        // Native f64, packed binary32: value survives when representable.
        let raw = 2.5f64.to_bits();
        let wire = native_to_wire(BasicKind::Float, &d, 32, 8, raw).expect("wire");
        assert_eq!(wire as u32, 2.5f32.to_bits());
        let back = wire_to_native(BasicKind::Float, &d, 32, 8, wire).expect("native");
        assert_eq!(f64::from_bits(back), 2.5);
    }

    #[test]
    fn test_unsigned_wider_than_64_rejected() {
        let d = desc(ByteOrder::BigEndian, NumberEncoding::TwosComplement);
        assert_eq!(
            native_to_wire(BasicKind::UnsignedInt, &d, 65, 8, 0),
            Err(Status::InvalidSizeOrType)
        );
    }
}
