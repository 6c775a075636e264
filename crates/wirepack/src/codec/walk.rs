// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive schema walkers converting between native and packed form.
//!
//! Both directions walk the entry list in declared order, recursing into
//! nested records and arrays with independent packed-bit and native-byte
//! cursors. After a record's own entries are exhausted, the identification
//! engine decides whether the content is really a derivative, and the walk
//! continues with that derivative's additional entries.
//!
//! Resumption: entries whose destination image lies entirely before the
//! resume cursor are skipped, never re-converted. The same mechanism skips a
//! derivative's base-inclusion entry, which the walk has just produced.

use crate::codec::bits::{BitReader, BitWriter};
use crate::codec::scalar;
use crate::error::{Result, Status};
use crate::identify::identify_step;
use crate::introspect::resolve;
use crate::registry::Registry;
use crate::table::{ArrayDescriptor, BasicKind, EntryKind, Schema};
use crate::typeid::TypeId;
use crate::value::load_value;

/// Live element count of a list entry, read from its sibling count field.
fn list_count(
    db: &Registry,
    schema: &Schema,
    count_entry: u16,
    array: &ArrayDescriptor,
    native: &[u8],
    native_base: usize,
) -> Result<u32> {
    let counter = schema
        .entries
        .get(count_entry as usize)
        .ok_or(Status::InvalidSizeOrType)?;
    let mut value = load_value(
        db,
        counter.type_id,
        native,
        native_base + counter.native_offset_bytes as usize,
    )?;
    value.convert(BasicKind::UnsignedInt)?;
    let count = value.as_unsigned().unwrap_or(0);
    if count > array.count as u64 {
        return Err(Status::InvalidSizeOrType);
    }
    Ok(count as u32)
}

pub(crate) struct PackWalk<'a> {
    pub db: &'a Registry,
    pub native: &'a [u8],
    /// Destination bits below this cursor were produced by an earlier call.
    pub resume_bits: usize,
}

impl<'a> PackWalk<'a> {
    /// Pack `id` at the given base offsets; returns the concrete type the
    /// content identified as.
    pub fn pack_type(
        &self,
        writer: &mut BitWriter<'_>,
        id: TypeId,
        packed_base: usize,
        native_base: usize,
        done_bits: usize,
    ) -> Result<TypeId> {
        let (rid, ty) = resolve(self.db, id)?;
        let threshold = self.resume_bits.max(done_bits);
        match ty.kind {
            BasicKind::SignedInt | BasicKind::UnsignedInt | BasicKind::Float | BasicKind::Blob => {
                if packed_base + ty.packed_bits as usize > threshold {
                    scalar::pack_scalar(ty, self.native, native_base, writer, packed_base)?;
                }
                Ok(rid)
            }
            BasicKind::Array => {
                let array = ty.array().ok_or(Status::InvalidSizeOrType)?;
                for i in 0..array.count as usize {
                    self.pack_type(
                        writer,
                        array.element,
                        packed_base + i * array.element_packed_bits as usize,
                        native_base + i * array.element_native_bytes as usize,
                        threshold,
                    )?;
                }
                Ok(rid)
            }
            BasicKind::Record => {
                let schema = ty.schema().ok_or(Status::InvalidSizeOrType)?;
                self.pack_record(writer, schema, packed_base, native_base, threshold)?;
                self.continue_derived(writer, rid, ty.packed_bits, packed_base, native_base, threshold)
            }
            BasicKind::Reference => Err(Status::InvalidSizeOrType),
        }
    }

    fn pack_record(
        &self,
        writer: &mut BitWriter<'_>,
        schema: &Schema,
        packed_base: usize,
        native_base: usize,
        threshold: usize,
    ) -> Result<()> {
        for entry in &schema.entries {
            let abs_packed = packed_base + entry.packed_offset_bits as usize;
            let abs_native = native_base + entry.native_offset_bytes as usize;
            match &entry.kind {
                // Base inclusion is structural: walk the content without
                // re-running identification, which would recurse forever.
                EntryKind::Base => {
                    let (_, child) = resolve(self.db, entry.type_id)?;
                    let base_schema = child.schema().ok_or(Status::InvalidSizeOrType)?;
                    self.pack_record(writer, base_schema, abs_packed, abs_native, threshold)?;
                }
                EntryKind::Padding => {
                    let child = self.db.lookup(entry.type_id)?;
                    if abs_packed + child.packed_bits as usize > threshold {
                        writer.zero_bits(abs_packed, child.packed_bits)?;
                    }
                }
                EntryKind::List { count_entry } => {
                    let (_, child) = resolve(self.db, entry.type_id)?;
                    let array = child.array().ok_or(Status::InvalidSizeOrType)?;
                    let count =
                        list_count(self.db, schema, *count_entry, array, self.native, native_base)?;
                    for i in 0..count as usize {
                        self.pack_type(
                            writer,
                            array.element,
                            abs_packed + i * array.element_packed_bits as usize,
                            abs_native + i * array.element_native_bytes as usize,
                            threshold,
                        )?;
                    }
                }
                _ => {
                    self.pack_type(writer, entry.type_id, abs_packed, abs_native, threshold)?;
                }
            }
        }
        Ok(())
    }

    fn continue_derived(
        &self,
        writer: &mut BitWriter<'_>,
        rid: TypeId,
        base_bits: u32,
        packed_base: usize,
        native_base: usize,
        threshold: usize,
    ) -> Result<TypeId> {
        match identify_step(self.db, rid, self.native, native_base) {
            Ok(Some(derived)) if !derived.is_similar(rid) => self.pack_type(
                writer,
                derived,
                packed_base,
                native_base,
                threshold.max(packed_base + base_bits as usize),
            ),
            Ok(_) => Ok(rid),
            // Content that stays at the base type is not a conversion error.
            Err(Status::NoMatchingValue) => Ok(rid),
            Err(status) => Err(status),
        }
    }
}

pub(crate) struct UnpackWalk<'a> {
    pub db: &'a Registry,
    /// Destination bytes below this cursor were produced by an earlier call.
    pub resume_bytes: usize,
}

impl<'a> UnpackWalk<'a> {
    /// Unpack `id` at the given base offsets; returns the concrete type the
    /// content identified as.
    pub fn unpack_type(
        &self,
        reader: &BitReader<'_>,
        native: &mut [u8],
        id: TypeId,
        packed_base: usize,
        native_base: usize,
        done_bytes: usize,
    ) -> Result<TypeId> {
        let (rid, ty) = resolve(self.db, id)?;
        let threshold = self.resume_bytes.max(done_bytes);
        match ty.kind {
            BasicKind::SignedInt | BasicKind::UnsignedInt | BasicKind::Float | BasicKind::Blob => {
                if native_base + ty.native_bytes as usize > threshold {
                    scalar::unpack_scalar(ty, native, native_base, reader, packed_base)?;
                }
                Ok(rid)
            }
            BasicKind::Array => {
                let array = ty.array().ok_or(Status::InvalidSizeOrType)?;
                for i in 0..array.count as usize {
                    self.unpack_type(
                        reader,
                        native,
                        array.element,
                        packed_base + i * array.element_packed_bits as usize,
                        native_base + i * array.element_native_bytes as usize,
                        threshold,
                    )?;
                }
                Ok(rid)
            }
            BasicKind::Record => {
                let schema = ty.schema().ok_or(Status::InvalidSizeOrType)?;
                self.unpack_record(reader, native, schema, packed_base, native_base, threshold)?;
                self.continue_derived(
                    reader,
                    native,
                    rid,
                    ty.native_bytes,
                    packed_base,
                    native_base,
                    threshold,
                )
            }
            BasicKind::Reference => Err(Status::InvalidSizeOrType),
        }
    }

    fn unpack_record(
        &self,
        reader: &BitReader<'_>,
        native: &mut [u8],
        schema: &Schema,
        packed_base: usize,
        native_base: usize,
        threshold: usize,
    ) -> Result<()> {
        for entry in &schema.entries {
            let abs_packed = packed_base + entry.packed_offset_bits as usize;
            let abs_native = native_base + entry.native_offset_bytes as usize;
            match &entry.kind {
                EntryKind::Base => {
                    let (_, child) = resolve(self.db, entry.type_id)?;
                    let base_schema = child.schema().ok_or(Status::InvalidSizeOrType)?;
                    self.unpack_record(reader, native, base_schema, abs_packed, abs_native, threshold)?;
                }
                EntryKind::Padding => {
                    let child = self.db.lookup(entry.type_id)?;
                    let width = child.native_bytes as usize;
                    if width > 0 && abs_native + width > threshold {
                        if abs_native + width > native.len() {
                            return Err(Status::BufferSizeError);
                        }
                        native[abs_native..abs_native + width].fill(0);
                    }
                }
                EntryKind::List { count_entry } => {
                    let (_, child) = resolve(self.db, entry.type_id)?;
                    let array = child.array().ok_or(Status::InvalidSizeOrType)?;
                    // The count field precedes the list in declared order, so
                    // it is already decoded.
                    let count =
                        list_count(self.db, schema, *count_entry, array, native, native_base)?;
                    for i in 0..count as usize {
                        self.unpack_type(
                            reader,
                            native,
                            array.element,
                            abs_packed + i * array.element_packed_bits as usize,
                            abs_native + i * array.element_native_bytes as usize,
                            threshold,
                        )?;
                    }
                }
                _ => {
                    self.unpack_type(reader, native, entry.type_id, abs_packed, abs_native, threshold)?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn continue_derived(
        &self,
        reader: &BitReader<'_>,
        native: &mut [u8],
        rid: TypeId,
        base_native_bytes: u32,
        packed_base: usize,
        native_base: usize,
        threshold: usize,
    ) -> Result<TypeId> {
        match identify_step(self.db, rid, native, native_base) {
            Ok(Some(derived)) if !derived.is_similar(rid) => self.unpack_type(
                reader,
                native,
                derived,
                packed_base,
                native_base,
                threshold.max(native_base + base_native_bytes as usize),
            ),
            Ok(_) => Ok(rid),
            Err(Status::NoMatchingValue) => Ok(rid),
            Err(status) => Err(status),
        }
    }
}
