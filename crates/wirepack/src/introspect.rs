// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read-only queries over compiled type tables.

use crate::error::{Result, Status};
use crate::registry::Registry;
use crate::table::{BasicKind, CompiledType, EntityInfo, Schema, TypeDetail};
use crate::typeid::TypeId;

/// Summary of one compiled type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub kind: BasicKind,
    /// Children for records/arrays, 0 for scalar leaves.
    pub element_count: u32,
    pub packed_bits: u32,
    pub native_bytes: u32,
}

impl TypeInfo {
    /// Packed size rounded up to whole bytes.
    pub fn packed_bytes(&self) -> u32 {
        self.packed_bits.div_ceil(8)
    }
}

/// Enumeration summary of a record's derivative set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedInfo {
    pub derivative_count: u32,
    /// Distinct constrained field locations across all derivatives.
    pub constraint_entity_count: u32,
    /// Largest packed size over the record and all derivatives.
    pub max_packed_bits: u32,
    /// Largest native size over the record and all derivatives.
    pub max_native_bytes: u32,
}

/// Basic classification, size and child count of a type.
pub fn type_info(db: &Registry, id: TypeId) -> Result<TypeInfo> {
    let ty = db.lookup(id)?;
    Ok(TypeInfo {
        type_id: id,
        kind: ty.kind,
        element_count: ty.element_count,
        packed_bits: ty.packed_bits,
        native_bytes: ty.native_bytes,
    })
}

/// Follow component references to the underlying type.
pub(crate) fn resolve(db: &Registry, id: TypeId) -> Result<(TypeId, &CompiledType)> {
    let mut current = id;
    // Reference chains are acyclic in well-formed tables; bound the walk
    // anyway so corrupt input cannot loop.
    for _ in 0..16 {
        let ty = db.lookup(current)?;
        match ty.detail {
            TypeDetail::Reference(target) => current = target,
            _ => return Ok((current, ty)),
        }
    }
    Err(Status::InvalidSizeOrType)
}

/// Record schema behind `id`, following references.
pub(crate) fn record_schema(db: &Registry, id: TypeId) -> Result<&Schema> {
    let (_, ty) = resolve(db, id)?;
    ty.schema().ok_or(Status::WrongType)
}

fn entity_of(db: &Registry, type_id: TypeId, packed_off: u32, native_off: u32) -> Result<EntityInfo> {
    let ty = db.lookup(type_id)?;
    Ok(EntityInfo {
        type_id,
        packed_offset_bits: packed_off,
        native_offset_bytes: native_off,
        packed_bits: ty.packed_bits,
        native_bytes: ty.native_bytes,
    })
}

/// Immediate child of a record, array or reference by member index.
pub fn member_by_index(db: &Registry, id: TypeId, index: u32) -> Result<EntityInfo> {
    let ty = db.lookup(id)?;
    match &ty.detail {
        TypeDetail::Record(schema) => {
            let entry = schema
                .entries
                .get(index as usize)
                .ok_or(Status::InvalidIndex)?;
            entity_of(
                db,
                entry.type_id,
                entry.packed_offset_bits,
                entry.native_offset_bytes,
            )
        }
        TypeDetail::Array(array) => {
            if index >= array.count {
                return Err(Status::InvalidIndex);
            }
            entity_of(
                db,
                array.element,
                index * array.element_packed_bits,
                index * array.element_native_bytes,
            )
        }
        TypeDetail::Reference(target) => {
            if index != 0 {
                return Err(Status::InvalidIndex);
            }
            entity_of(db, *target, 0, 0)
        }
        _ => Err(Status::InvalidIndex),
    }
}

/// Declared name of a record member, for building name-based access layers.
pub fn member_name(db: &Registry, id: TypeId, index: u32) -> Result<&str> {
    let schema = record_schema(db, id)?;
    schema
        .entries
        .get(index as usize)
        .map(|entry| entry.name.as_str())
        .ok_or(Status::InvalidIndex)
}

/// The immediate child containing a native byte offset.
///
/// Only one level is descended; callers recurse for deep lookup.
pub fn member_by_native_offset(db: &Registry, id: TypeId, byte_offset: u32) -> Result<EntityInfo> {
    let ty = db.lookup(id)?;
    if byte_offset >= ty.native_bytes {
        return Err(Status::InvalidIndex);
    }
    match &ty.detail {
        TypeDetail::Record(schema) => {
            for entry in &schema.entries {
                let child = db.lookup(entry.type_id)?;
                if child.native_bytes == 0 {
                    continue;
                }
                let start = entry.native_offset_bytes;
                if byte_offset >= start && byte_offset < start + child.native_bytes {
                    return entity_of(db, entry.type_id, entry.packed_offset_bits, start);
                }
            }
            Err(Status::InvalidIndex)
        }
        TypeDetail::Array(array) => {
            if array.element_native_bytes == 0 {
                return Err(Status::InvalidIndex);
            }
            let index = byte_offset / array.element_native_bytes;
            if index >= array.count {
                return Err(Status::InvalidIndex);
            }
            entity_of(
                db,
                array.element,
                index * array.element_packed_bits,
                index * array.element_native_bytes,
            )
        }
        TypeDetail::Reference(target) => entity_of(db, *target, 0, 0),
        _ => Err(Status::InvalidIndex),
    }
}

/// Derivative-set summary of a record.
pub fn derived_info(db: &Registry, id: TypeId) -> Result<DerivedInfo> {
    let schema = record_schema(db, id)?;
    let mut entities: Vec<(u32, TypeId)> = Vec::new();
    for derivative in &schema.derivatives {
        for constraint in &derivative.constraints {
            let key = (
                constraint.entity.native_offset_bytes,
                constraint.entity.type_id,
            );
            if !entities.contains(&key) {
                entities.push(key);
            }
        }
    }
    Ok(DerivedInfo {
        derivative_count: schema.derivatives.len() as u32,
        constraint_entity_count: entities.len() as u32,
        max_packed_bits: schema.max_derivative_packed_bits,
        max_native_bytes: schema.max_derivative_native_bytes,
    })
}

/// TypeId of the `derivative_index`-th direct derivative of `base_id`.
pub fn derived_type_by_index(db: &Registry, base_id: TypeId, derivative_index: u32) -> Result<TypeId> {
    let schema = record_schema(db, base_id)?;
    schema
        .derivatives
        .get(derivative_index as usize)
        .map(|d| d.type_id)
        .ok_or(Status::InvalidIndex)
}

/// Succeeds iff `derived_id` is a direct or transitive derivative of
/// `base_id`.
pub fn base_check(db: &Registry, base_id: TypeId, derived_id: TypeId) -> Result<()> {
    if base_id.is_similar(derived_id) {
        return Ok(());
    }
    // Walk upward from the derivative; the chain length is bounded by the
    // format table size.
    let mut current = derived_id;
    for _ in 0..crate::typeid::MAX_FORMAT_INDEX {
        let schema = record_schema(db, current)?;
        match schema.base {
            Some(parent) if parent.is_similar(base_id) => return Ok(()),
            Some(parent) => current = parent,
            None => return Err(Status::WrongType),
        }
    }
    Err(Status::WrongType)
}
