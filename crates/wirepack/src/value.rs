// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generic scalar values and display conversion.
//!
//! [`GenericValue`] holds any scalar a compiled type can describe: signed and
//! unsigned integers up to 64 bits, floating point, or a short binary blob.
//! The registry-aware functions in this module load and store such values at
//! native byte offsets and render them to or from display strings using the
//! hint attached to the compiled type.

use crate::error::{Result, Status};
use crate::introspect::resolve;
use crate::registry::Registry;
use crate::table::{BasicKind, CompiledType, DisplayHint};
use crate::typeid::TypeId;
use std::cmp::Ordering;
use std::fmt;

/// Capacity of the inline blob payload.
pub const VALUE_BLOB_CAPACITY: usize = 16;

/// Short binary payload stored inline in a [`GenericValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueBlob {
    data: [u8; VALUE_BLOB_CAPACITY],
    len: u8,
}

impl ValueBlob {
    /// Copy up to [`VALUE_BLOB_CAPACITY`] bytes; longer input is rejected.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > VALUE_BLOB_CAPACITY {
            return Err(Status::InvalidSizeOrType);
        }
        let mut data = [0u8; VALUE_BLOB_CAPACITY];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            data,
            len: bytes.len() as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A scalar value tagged with its basic kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GenericValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Blob(ValueBlob),
}

impl GenericValue {
    /// Basic kind this value is tagged with.
    pub fn kind(&self) -> BasicKind {
        match self {
            GenericValue::Signed(_) => BasicKind::SignedInt,
            GenericValue::Unsigned(_) => BasicKind::UnsignedInt,
            GenericValue::Float(_) => BasicKind::Float,
            GenericValue::Blob(_) => BasicKind::Blob,
        }
    }

    pub fn as_signed(&self) -> Option<i64> {
        match self {
            GenericValue::Signed(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            GenericValue::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            GenericValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&ValueBlob> {
        match self {
            GenericValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Widen to i128 when the value is an integer of either signedness.
    fn as_i128(&self) -> Option<i128> {
        match self {
            GenericValue::Signed(v) => Some(*v as i128),
            GenericValue::Unsigned(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Numeric view as f64, for mixed-kind comparison.
    fn as_f64_lossy(&self) -> Option<f64> {
        match self {
            GenericValue::Signed(v) => Some(*v as f64),
            GenericValue::Unsigned(v) => Some(*v as f64),
            GenericValue::Float(v) => Some(*v),
            GenericValue::Blob(_) => None,
        }
    }

    /// Convert in place to the desired basic kind.
    ///
    /// Numeric conversions follow Rust `as`-cast semantics (float-to-int
    /// saturates); blobs only convert to blobs.
    pub fn convert(&mut self, desired: BasicKind) -> Result<()> {
        let converted = match (desired, *self) {
            (BasicKind::SignedInt, GenericValue::Signed(v)) => GenericValue::Signed(v),
            (BasicKind::SignedInt, GenericValue::Unsigned(v)) => GenericValue::Signed(v as i64),
            (BasicKind::SignedInt, GenericValue::Float(v)) => GenericValue::Signed(v as i64),
            (BasicKind::UnsignedInt, GenericValue::Signed(v)) => GenericValue::Unsigned(v as u64),
            (BasicKind::UnsignedInt, GenericValue::Unsigned(v)) => GenericValue::Unsigned(v),
            (BasicKind::UnsignedInt, GenericValue::Float(v)) => GenericValue::Unsigned(v as u64),
            (BasicKind::Float, GenericValue::Signed(v)) => GenericValue::Float(v as f64),
            (BasicKind::Float, GenericValue::Unsigned(v)) => GenericValue::Float(v as f64),
            (BasicKind::Float, GenericValue::Float(v)) => GenericValue::Float(v),
            (BasicKind::Blob, GenericValue::Blob(b)) => GenericValue::Blob(b),
            _ => return Err(Status::InvalidSizeOrType),
        };
        *self = converted;
        Ok(())
    }

    /// Kind-aware ordering; `None` when the kinds cannot be compared
    /// (blob against number, or NaN).
    pub fn compare(&self, other: &GenericValue) -> Option<Ordering> {
        match (self, other) {
            (GenericValue::Blob(a), GenericValue::Blob(b)) => {
                Some(a.as_bytes().cmp(b.as_bytes()))
            }
            (GenericValue::Float(_), _) | (_, GenericValue::Float(_)) => {
                self.as_f64_lossy()?.partial_cmp(&other.as_f64_lossy()?)
            }
            _ => Some(self.as_i128()?.cmp(&other.as_i128()?)),
        }
    }
}

impl fmt::Display for GenericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericValue::Signed(v) => write!(f, "{}", v),
            GenericValue::Unsigned(v) => write!(f, "{}", v),
            GenericValue::Float(v) => write!(f, "{}", v),
            GenericValue::Blob(b) => {
                f.write_str("0x")?;
                for byte in b.as_bytes() {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for GenericValue {
    fn from(v: i64) -> Self {
        GenericValue::Signed(v)
    }
}

impl From<u64> for GenericValue {
    fn from(v: u64) -> Self {
        GenericValue::Unsigned(v)
    }
}

impl From<u32> for GenericValue {
    fn from(v: u32) -> Self {
        GenericValue::Unsigned(v as u64)
    }
}

impl From<i32> for GenericValue {
    fn from(v: i32) -> Self {
        GenericValue::Signed(v as i64)
    }
}

impl From<f64> for GenericValue {
    fn from(v: f64) -> Self {
        GenericValue::Float(v)
    }
}

/// Read a `width`-byte native integer stored at `offset`.
pub(crate) fn read_native_uint(buf: &[u8], offset: usize, width: usize) -> Result<u64> {
    if width == 0 || width > 8 || offset.checked_add(width).map_or(true, |end| end > buf.len()) {
        return Err(Status::BufferSizeError);
    }
    let mut bytes = [0u8; 8];
    if cfg!(target_endian = "little") {
        bytes[..width].copy_from_slice(&buf[offset..offset + width]);
    } else {
        bytes[8 - width..].copy_from_slice(&buf[offset..offset + width]);
    }
    Ok(u64::from_ne_bytes(bytes))
}

/// Write a `width`-byte native integer at `offset`, truncating `value`.
pub(crate) fn write_native_uint(
    buf: &mut [u8],
    offset: usize,
    width: usize,
    value: u64,
) -> Result<()> {
    if width == 0 || width > 8 || offset.checked_add(width).map_or(true, |end| end > buf.len()) {
        return Err(Status::BufferSizeError);
    }
    let bytes = value.to_ne_bytes();
    if cfg!(target_endian = "little") {
        buf[offset..offset + width].copy_from_slice(&bytes[..width]);
    } else {
        buf[offset..offset + width].copy_from_slice(&bytes[8 - width..]);
    }
    Ok(())
}

/// Sign-extend a raw `width`-byte pattern into i64.
pub(crate) fn sign_extend(raw: u64, width: usize) -> i64 {
    let shift = 64 - width * 8;
    ((raw << shift) as i64) >> shift
}

/// Load a scalar leaf from a native object at `offset`.
///
/// Composite, array and interface identifiers have no scalar form and fail
/// with invalid-size-or-type. Component references resolve through to their
/// target type.
pub fn load_value(db: &Registry, id: TypeId, native: &[u8], offset: usize) -> Result<GenericValue> {
    let (_, ty) = resolve(db, id)?;
    let width = ty.native_bytes as usize;
    match ty.kind {
        BasicKind::UnsignedInt => Ok(GenericValue::Unsigned(read_native_uint(
            native, offset, width,
        )?)),
        BasicKind::SignedInt => {
            let raw = read_native_uint(native, offset, width)?;
            Ok(GenericValue::Signed(sign_extend(raw, width)))
        }
        BasicKind::Float => match width {
            4 => {
                let raw = read_native_uint(native, offset, 4)? as u32;
                Ok(GenericValue::Float(f32::from_bits(raw) as f64))
            }
            8 => {
                let raw = read_native_uint(native, offset, 8)?;
                Ok(GenericValue::Float(f64::from_bits(raw)))
            }
            _ => Err(Status::InvalidSizeOrType),
        },
        BasicKind::Blob => {
            if offset.checked_add(width).map_or(true, |end| end > native.len()) {
                return Err(Status::BufferSizeError);
            }
            Ok(GenericValue::Blob(ValueBlob::new(
                &native[offset..offset + width],
            )?))
        }
        BasicKind::Record | BasicKind::Array | BasicKind::Reference => {
            Err(Status::InvalidSizeOrType)
        }
    }
}

/// Store a scalar leaf into a native object at `offset`.
///
/// The value is first converted to the field's basic kind, then narrowed to
/// its declared native width.
pub fn store_value(
    db: &Registry,
    id: TypeId,
    native: &mut [u8],
    offset: usize,
    value: &GenericValue,
) -> Result<()> {
    let (_, ty) = resolve(db, id)?;
    let width = ty.native_bytes as usize;
    let mut value = *value;
    match ty.kind {
        BasicKind::UnsignedInt => {
            value.convert(BasicKind::UnsignedInt)?;
            write_native_uint(native, offset, width, value.as_unsigned().unwrap_or(0))
        }
        BasicKind::SignedInt => {
            value.convert(BasicKind::SignedInt)?;
            write_native_uint(native, offset, width, value.as_signed().unwrap_or(0) as u64)
        }
        BasicKind::Float => {
            value.convert(BasicKind::Float)?;
            let v = value.as_float().unwrap_or(0.0);
            match width {
                4 => write_native_uint(native, offset, 4, (v as f32).to_bits() as u64),
                8 => write_native_uint(native, offset, 8, v.to_bits()),
                _ => Err(Status::InvalidSizeOrType),
            }
        }
        BasicKind::Blob => {
            let blob = value.as_blob().ok_or(Status::InvalidSizeOrType)?;
            if blob.len() > width {
                return Err(Status::InvalidSizeOrType);
            }
            if offset.checked_add(width).map_or(true, |end| end > native.len()) {
                return Err(Status::BufferSizeError);
            }
            native[offset..offset + width].fill(0);
            native[offset..offset + blob.len()].copy_from_slice(blob.as_bytes());
            Ok(())
        }
        BasicKind::Record | BasicKind::Array | BasicKind::Reference => {
            Err(Status::InvalidSizeOrType)
        }
    }
}

fn fits_width(value: &GenericValue, ty: &CompiledType) -> bool {
    let bits = (ty.native_bytes as u32) * 8;
    match (ty.kind, value) {
        (BasicKind::UnsignedInt, GenericValue::Unsigned(v)) => {
            bits >= 64 || *v < (1u64 << bits)
        }
        (BasicKind::SignedInt, GenericValue::Signed(v)) => {
            if bits >= 64 {
                true
            } else {
                let max = (1i64 << (bits - 1)) - 1;
                let min = -(1i64 << (bits - 1));
                *v >= min && *v <= max
            }
        }
        _ => true,
    }
}

/// Render a scalar for display, honoring the type's display hint.
pub fn scalar_to_string(db: &Registry, id: TypeId, value: &GenericValue) -> Result<String> {
    let (_, ty) = resolve(db, id)?;
    match ty.kind {
        BasicKind::Record | BasicKind::Array | BasicKind::Reference => {
            return Err(Status::InvalidSizeOrType)
        }
        _ => {}
    }
    match &ty.display {
        DisplayHint::Decimal => Ok(value.to_string()),
        DisplayHint::Address => {
            let mut v = *value;
            v.convert(BasicKind::UnsignedInt)?;
            let digits = (ty.native_bytes as usize) * 2;
            Ok(format!(
                "0x{:0width$X}",
                v.as_unsigned().unwrap_or(0),
                width = digits
            ))
        }
        DisplayHint::Boolean => {
            let mut v = *value;
            v.convert(BasicKind::UnsignedInt)?;
            Ok(if v.as_unsigned() == Some(0) {
                "FALSE".to_string()
            } else {
                "TRUE".to_string()
            })
        }
        DisplayHint::Enumeration(labels) => {
            let mut v = *value;
            v.convert(BasicKind::SignedInt)?;
            let raw = v.as_signed().unwrap_or(0);
            match labels.iter().find(|l| l.value == raw) {
                Some(label) => Ok(label.name.clone()),
                None => Ok(raw.to_string()),
            }
        }
        DisplayHint::FixedName(name) => Ok(name.clone()),
        DisplayHint::Text => {
            let blob = value.as_blob().ok_or(Status::InvalidSizeOrType)?;
            let bytes = blob.as_bytes();
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            match std::str::from_utf8(&bytes[..end]) {
                Ok(s) => Ok(s.to_string()),
                Err(_) => Err(Status::InvalidSizeOrType),
            }
        }
    }
}

/// Parse a display string into a scalar of the identified type.
///
/// Accepts enumeration labels, TRUE/FALSE for booleans, `0x`-prefixed hex and
/// plain decimal. Numbers that do not fit the field's declared byte width are
/// rejected.
pub fn scalar_from_string(db: &Registry, id: TypeId, text: &str) -> Result<GenericValue> {
    let (_, ty) = resolve(db, id)?;
    match ty.kind {
        BasicKind::Record | BasicKind::Array | BasicKind::Reference => {
            return Err(Status::InvalidSizeOrType)
        }
        _ => {}
    }
    let text = text.trim();

    if let DisplayHint::Enumeration(labels) = &ty.display {
        if let Some(label) = labels.iter().find(|l| l.name == text) {
            let mut v = GenericValue::Signed(label.value);
            v.convert(ty.kind)?;
            return Ok(v);
        }
    }
    if let DisplayHint::FixedName(name) = &ty.display {
        if text == name.as_str() {
            return Ok(GenericValue::Unsigned(0));
        }
    }
    if matches!(ty.display, DisplayHint::Boolean) {
        if text.eq_ignore_ascii_case("true") {
            return Ok(GenericValue::Unsigned(1));
        }
        if text.eq_ignore_ascii_case("false") {
            return Ok(GenericValue::Unsigned(0));
        }
    }
    if matches!(ty.kind, BasicKind::Blob) {
        if matches!(ty.display, DisplayHint::Text) {
            return Ok(GenericValue::Blob(ValueBlob::new(text.as_bytes())?));
        }
        return Err(Status::InvalidSizeOrType);
    }

    let value = parse_number(ty, text)?;
    if !fits_width(&value, ty) {
        return Err(Status::InvalidSizeOrType);
    }
    Ok(value)
}

fn parse_number(ty: &CompiledType, text: &str) -> Result<GenericValue> {
    let bad = match &ty.display {
        DisplayHint::Enumeration(_) => Status::NameNotFound,
        _ => Status::BadArgument,
    };
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        let raw = u64::from_str_radix(hex, 16).map_err(|_| bad)?;
        return Ok(match ty.kind {
            BasicKind::SignedInt => {
                GenericValue::Signed(sign_extend(raw, ty.native_bytes as usize))
            }
            BasicKind::UnsignedInt => GenericValue::Unsigned(raw),
            _ => return Err(bad),
        });
    }
    match ty.kind {
        BasicKind::SignedInt => Ok(GenericValue::Signed(text.parse().map_err(|_| bad)?)),
        BasicKind::UnsignedInt => Ok(GenericValue::Unsigned(text.parse().map_err(|_| bad)?)),
        BasicKind::Float => Ok(GenericValue::Float(text.parse().map_err(|_| bad)?)),
        _ => Err(Status::InvalidSizeOrType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind_tags() {
        assert_eq!(GenericValue::Signed(-1).kind(), BasicKind::SignedInt);
        assert_eq!(GenericValue::Unsigned(1).kind(), BasicKind::UnsignedInt);
        assert_eq!(GenericValue::Float(0.5).kind(), BasicKind::Float);
        let blob = ValueBlob::new(&[1, 2, 3]).expect("blob");
        assert_eq!(GenericValue::Blob(blob).kind(), BasicKind::Blob);
    }

    #[test]
    fn test_convert_widening_and_narrowing() {
        let mut v = GenericValue::Unsigned(300);
        v.convert(BasicKind::SignedInt).expect("convert");
        assert_eq!(v.as_signed(), Some(300));

        let mut v = GenericValue::Float(-2.75);
        v.convert(BasicKind::SignedInt).expect("convert");
        assert_eq!(v.as_signed(), Some(-2));

        let mut v = GenericValue::Signed(-1);
        v.convert(BasicKind::UnsignedInt).expect("convert");
        assert_eq!(v.as_unsigned(), Some(u64::MAX));

        let mut v = GenericValue::Signed(7);
        assert_eq!(v.convert(BasicKind::Blob), Err(Status::InvalidSizeOrType));
    }

    #[test]
    fn test_compare_across_kinds() {
        let a = GenericValue::Signed(-5);
        let b = GenericValue::Unsigned(5);
        assert_eq!(a.compare(&b), Some(Ordering::Less));

        let f = GenericValue::Float(4.5);
        assert_eq!(b.compare(&f), Some(Ordering::Greater));

        let blob = GenericValue::Blob(ValueBlob::new(&[1]).expect("blob"));
        assert_eq!(blob.compare(&b), None);
    }

    #[test]
    fn test_native_uint_round_trip() {
        let mut buf = [0u8; 12];
        write_native_uint(&mut buf, 2, 4, 0xDEAD_BEEF).expect("write");
        assert_eq!(read_native_uint(&buf, 2, 4).expect("read"), 0xDEAD_BEEF);
        // Bytes outside the window stay untouched.
        assert_eq!(buf[0], 0);
        assert_eq!(buf[1], 0);
        assert_eq!(buf[6], 0);
    }

    #[test]
    fn test_native_uint_bounds() {
        let buf = [0u8; 4];
        assert_eq!(
            read_native_uint(&buf, 2, 4).unwrap_err(),
            Status::BufferSizeError
        );
        let mut buf = [0u8; 4];
        assert_eq!(
            write_native_uint(&mut buf, 4, 1, 0).unwrap_err(),
            Status::BufferSizeError
        );
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xFF, 1), -1);
        assert_eq!(sign_extend(0x7F, 1), 127);
        assert_eq!(sign_extend(0x8000, 2), i16::MIN as i64);
        assert_eq!(sign_extend(0xFFFF_FFFF, 4), -1);
    }

    #[test]
    fn test_blob_display_hex() {
        let blob = GenericValue::Blob(ValueBlob::new(&[0xAB, 0x01]).expect("blob"));
        assert_eq!(blob.to_string(), "0xAB01");
    }
}
