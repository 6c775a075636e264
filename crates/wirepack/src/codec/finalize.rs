// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Computed-field finalization and verification.
//!
//! Lengths, error-control words and fixed identification values depend on the
//! complete encoded image, so they are resolved after the content walk:
//! fixed/discriminator values first, then lengths, then error control (which
//! must see the final length). Error control is always computed with its own
//! field zeroed, which makes finalizing an already-finalized image a no-op.

use crate::codec::bits::BitWriter;
use crate::codec::scalar;
use crate::error::{Result, Status};
use crate::introspect::resolve;
use crate::registry::Registry;
use crate::table::{BasicKind, CompiledType, EntryKind, ErrorControl};
use crate::typeid::TypeId;
use crate::value::{load_value, GenericValue};
use std::ops::BitOr;

/// Selection mask over the classes of computed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputedFields(u8);

impl ComputedFields {
    pub const NONE: ComputedFields = ComputedFields(0);
    pub const LENGTH: ComputedFields = ComputedFields(0x01);
    pub const ERROR_CONTROL: ComputedFields = ComputedFields(0x02);
    pub const FIXED_VALUE: ComputedFields = ComputedFields(0x04);
    pub const ALL: ComputedFields = ComputedFields(0x07);

    pub fn contains(self, other: ComputedFields) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ComputedFields {
    type Output = ComputedFields;

    fn bitor(self, rhs: ComputedFields) -> ComputedFields {
        ComputedFields(self.0 | rhs.0)
    }
}

/// One computed field located in the concrete type's image.
struct ComputedField {
    type_id: TypeId,
    packed_offset_bits: usize,
    native_offset_bytes: usize,
    role: ComputedRole,
}

enum ComputedRole {
    Fixed(GenericValue),
    Length { bias: i32 },
    ErrorControl(ErrorControl),
}

/// Collect every computed field of `id`, depth first, at absolute offsets.
///
/// Fixed values include the discriminator constraints of the whole
/// derivation chain, so packing a derivative imprints the values that make
/// identification return it.
fn collect(db: &Registry, id: TypeId) -> Result<Vec<ComputedField>> {
    let mut fields = Vec::new();
    collect_record(db, id, 0, 0, &mut fields)?;
    collect_chain_constraints(db, id, &mut fields)?;
    Ok(fields)
}

fn collect_record(
    db: &Registry,
    id: TypeId,
    packed_base: usize,
    native_base: usize,
    out: &mut Vec<ComputedField>,
) -> Result<()> {
    let (_, ty) = resolve(db, id)?;
    let schema = match ty.schema() {
        Some(schema) => schema,
        None => return Ok(()),
    };
    for entry in &schema.entries {
        let abs_packed = packed_base + entry.packed_offset_bits as usize;
        let abs_native = native_base + entry.native_offset_bytes as usize;
        match &entry.kind {
            EntryKind::FixedValue { value } => out.push(ComputedField {
                type_id: entry.type_id,
                packed_offset_bits: abs_packed,
                native_offset_bytes: abs_native,
                role: ComputedRole::Fixed(*value),
            }),
            EntryKind::Length { bias } => out.push(ComputedField {
                type_id: entry.type_id,
                packed_offset_bits: abs_packed,
                native_offset_bytes: abs_native,
                role: ComputedRole::Length { bias: *bias },
            }),
            EntryKind::ErrorControl { algorithm } => out.push(ComputedField {
                type_id: entry.type_id,
                packed_offset_bits: abs_packed,
                native_offset_bytes: abs_native,
                role: ComputedRole::ErrorControl(*algorithm),
            }),
            EntryKind::Base | EntryKind::Field => {
                let (child_id, child) = resolve(db, entry.type_id)?;
                match child.kind {
                    BasicKind::Record => {
                        collect_record(db, child_id, abs_packed, abs_native, out)?;
                    }
                    BasicKind::Array => {
                        collect_array(db, child, abs_packed, abs_native, out)?;
                    }
                    _ => {}
                }
            }
            // Variable-length content carries no computed fields.
            EntryKind::List { .. } | EntryKind::Padding | EntryKind::Parameter => {}
        }
    }
    Ok(())
}

fn collect_array(
    db: &Registry,
    ty: &CompiledType,
    packed_base: usize,
    native_base: usize,
    out: &mut Vec<ComputedField>,
) -> Result<()> {
    let array = ty.array().ok_or(Status::InvalidSizeOrType)?;
    let (element_id, element) = resolve(db, array.element)?;
    if !matches!(element.kind, BasicKind::Record | BasicKind::Array) {
        return Ok(());
    }
    for i in 0..array.count as usize {
        let packed = packed_base + i * array.element_packed_bits as usize;
        let native = native_base + i * array.element_native_bytes as usize;
        match element.kind {
            BasicKind::Record => collect_record(db, element_id, packed, native, out)?,
            _ => collect_array(db, element, packed, native, out)?,
        }
    }
    Ok(())
}

fn collect_chain_constraints(
    db: &Registry,
    id: TypeId,
    out: &mut Vec<ComputedField>,
) -> Result<()> {
    let mut current = id;
    for _ in 0..crate::typeid::MAX_FORMAT_INDEX {
        let (rid, ty) = resolve(db, current)?;
        let schema = match ty.schema() {
            Some(schema) => schema,
            None => return Ok(()),
        };
        let parent = match schema.base {
            Some(parent) => parent,
            None => return Ok(()),
        };
        let parent_schema = resolve(db, parent)?.1.schema().ok_or(Status::WrongType)?;
        let derivative = parent_schema
            .derivatives
            .iter()
            .find(|d| d.type_id.is_similar(rid))
            .ok_or(Status::WrongType)?;
        for constraint in &derivative.constraints {
            out.push(ComputedField {
                type_id: constraint.entity.type_id,
                packed_offset_bits: constraint.entity.packed_offset_bits as usize,
                native_offset_bytes: constraint.entity.native_offset_bytes as usize,
                role: ComputedRole::Fixed(constraint.value),
            });
        }
        current = parent;
    }
    Ok(())
}

/// Logical raw pattern of a value for a given number field.
fn value_to_raw(db: &Registry, type_id: TypeId, value: &GenericValue) -> Result<u64> {
    let (_, ty) = resolve(db, type_id)?;
    let mut value = *value;
    match ty.kind {
        BasicKind::UnsignedInt => {
            value.convert(BasicKind::UnsignedInt)?;
            Ok(value.as_unsigned().unwrap_or(0))
        }
        BasicKind::SignedInt => {
            value.convert(BasicKind::SignedInt)?;
            Ok(value.as_signed().unwrap_or(0) as u64)
        }
        BasicKind::Float => {
            value.convert(BasicKind::Float)?;
            Ok(value.as_float().unwrap_or(0.0).to_bits())
        }
        _ => Err(Status::InvalidSizeOrType),
    }
}

/// Inverse of [`value_to_raw`]: rebuild a value of the field's kind.
fn raw_to_value(db: &Registry, type_id: TypeId, raw: u64) -> Result<GenericValue> {
    let (_, ty) = resolve(db, type_id)?;
    match ty.kind {
        BasicKind::UnsignedInt => Ok(GenericValue::Unsigned(raw)),
        BasicKind::SignedInt => Ok(GenericValue::Signed(raw as i64)),
        BasicKind::Float => Ok(GenericValue::Float(f64::from_bits(raw))),
        _ => Err(Status::InvalidSizeOrType),
    }
}

fn field_type<'a>(db: &'a Registry, id: TypeId) -> Result<&'a CompiledType> {
    Ok(resolve(db, id)?.1)
}

/// Resolve the computed fields of a freshly packed image, in place.
///
/// `total_bits` is the bit count the pack walk reported for the concrete
/// type `id`.
pub fn finalize(db: &Registry, id: TypeId, packed: &mut [u8], total_bits: usize) -> Result<()> {
    let fields = collect(db, id)?;
    let total_bytes = total_bits.div_ceil(8);
    if total_bytes > packed.len() {
        return Err(Status::BufferSizeError);
    }
    let mut writer = BitWriter::new(packed, total_bits)?;

    for field in &fields {
        if let ComputedRole::Fixed(value) = &field.role {
            let ty = field_type(db, field.type_id)?;
            let raw = value_to_raw(db, field.type_id, value)?;
            scalar::write_number(ty, &mut writer, field.packed_offset_bits, raw)?;
        }
    }
    for field in &fields {
        if let ComputedRole::Length { bias } = &field.role {
            let ty = field_type(db, field.type_id)?;
            let length = (total_bytes as i64 + *bias as i64).max(0) as u64;
            scalar::write_number(ty, &mut writer, field.packed_offset_bits, length)?;
        }
    }
    // Zero every check field first so the computation never sees a stale
    // word, then fill them in declaration order.
    for field in &fields {
        if let ComputedRole::ErrorControl(_) = &field.role {
            let ty = field_type(db, field.type_id)?;
            writer.zero_bits(field.packed_offset_bits, ty.packed_bits)?;
        }
    }
    for field in &fields {
        if let ComputedRole::ErrorControl(algorithm) = &field.role {
            let ty = field_type(db, field.type_id)?;
            let check = db.crc().compute(*algorithm, &packed[..total_bytes]);
            let mut writer = BitWriter::new(packed, total_bits)?;
            scalar::write_number(ty, &mut writer, field.packed_offset_bits, check)?;
        }
    }
    Ok(())
}

/// Recompute the computed fields of a decoded object and reconcile them.
///
/// Classes selected in `recompute` are overwritten in the native object with
/// the recomputed value; unselected classes must already match or the call
/// fails with `FieldMismatch` (length, fixed values) or
/// `ErrorControlMismatch`.
pub fn verify(
    db: &Registry,
    id: TypeId,
    native: &mut [u8],
    packed: &[u8],
    recompute: ComputedFields,
) -> Result<()> {
    let (_, ty) = resolve(db, id)?;
    let total_bits = ty.packed_bits as usize;
    let total_bytes = total_bits.div_ceil(8);
    if total_bytes > packed.len() {
        return Err(Status::BufferSizeError);
    }
    let fields = collect(db, id)?;

    // Error control is recomputed from the original packed bytes with every
    // check field zeroed, mirroring finalization.
    let mut scratch = packed[..total_bytes].to_vec();
    {
        let mut writer = BitWriter::new(&mut scratch, total_bits)?;
        for field in &fields {
            if let ComputedRole::ErrorControl(_) = &field.role {
                let ty = field_type(db, field.type_id)?;
                writer.zero_bits(field.packed_offset_bits, ty.packed_bits)?;
            }
        }
    }

    for field in &fields {
        let (selector, expected, mismatch) = match &field.role {
            ComputedRole::Fixed(value) => {
                let raw = value_to_raw(db, field.type_id, value)?;
                (ComputedFields::FIXED_VALUE, raw, Status::FieldMismatch)
            }
            ComputedRole::Length { bias } => {
                let length = (total_bytes as i64 + *bias as i64).max(0) as u64;
                (ComputedFields::LENGTH, length, Status::FieldMismatch)
            }
            ComputedRole::ErrorControl(algorithm) => {
                let check = db.crc().compute(*algorithm, &scratch);
                (
                    ComputedFields::ERROR_CONTROL,
                    check,
                    Status::ErrorControlMismatch,
                )
            }
        };
        let actual = load_value(db, field.type_id, native, field.native_offset_bytes)?;
        let actual_raw = value_to_raw(db, field.type_id, &actual)?;
        if actual_raw == expected {
            continue;
        }
        if recompute.contains(selector) {
            let replacement = raw_to_value(db, field.type_id, expected)?;
            crate::value::store_value(
                db,
                field.type_id,
                native,
                field.native_offset_bytes,
                &replacement,
            )?;
        } else {
            return Err(mismatch);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_operations() {
        let mask = ComputedFields::LENGTH | ComputedFields::ERROR_CONTROL;
        assert!(mask.contains(ComputedFields::LENGTH));
        assert!(mask.contains(ComputedFields::ERROR_CONTROL));
        assert!(!mask.contains(ComputedFields::FIXED_VALUE));
        assert!(ComputedFields::ALL.contains(mask));
        assert!(ComputedFields::NONE.contains(ComputedFields::NONE));
    }
}
