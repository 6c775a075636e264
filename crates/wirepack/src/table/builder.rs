// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent construction of compiled modules.
//!
//! Generated code and tests materialize compiled tables through this
//! builder. It applies the same layout rules the schema toolchain uses:
//! packed members are laid out bit-sequentially with no alignment, native
//! members at their natural alignment, records padded to their widest
//! member. The builder is not a schema-document parser; it only assembles
//! tables.

use crate::error::{Result, Status};
use crate::identify::{IdentNode, NodeLink};
use crate::table::{
    ArrayDescriptor, BasicKind, BlobDescriptor, ByteOrder, CharEncoding, CompiledModule,
    CompiledType, Constraint, Derivative, DisplayHint, EntityInfo, Entry, EntryKind, EnumLabel,
    ErrorControl, ModuleHash, NumberDescriptor, NumberEncoding, Schema, TypeDetail, TypeFlags,
};
use crate::typeid::{TypeId, MAX_FORMAT_INDEX};
use crate::value::GenericValue;
use std::sync::Arc;

fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

fn native_width_for_bits(bits: u32) -> u32 {
    match bits {
        0..=8 => 1,
        9..=16 => 2,
        17..=32 => 4,
        _ => 8,
    }
}

/// Builder for one compiled schema module.
pub struct ModuleBuilder {
    name: String,
    module_index: u16,
    types: Vec<CompiledType>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>, module_index: u16) -> Self {
        Self {
            name: name.into(),
            module_index,
            types: Vec::new(),
        }
    }

    fn mint(&mut self, ty: CompiledType) -> TypeId {
        self.types.push(ty);
        TypeId::new(self.module_index, self.types.len() as u16)
    }

    fn local(&self, id: TypeId) -> Result<&CompiledType> {
        if id.module_index() != self.module_index || id.format_index() == 0 {
            return Err(Status::BadArgument);
        }
        self.types
            .get(id.format_index() as usize - 1)
            .ok_or(Status::BadArgument)
    }

    fn local_mut(&mut self, id: TypeId) -> Result<&mut CompiledType> {
        if id.module_index() != self.module_index || id.format_index() == 0 {
            return Err(Status::BadArgument);
        }
        self.types
            .get_mut(id.format_index() as usize - 1)
            .ok_or(Status::BadArgument)
    }

    fn alignment_of(&self, id: TypeId) -> Result<u32> {
        let ty = self.local(id)?;
        match &ty.detail {
            TypeDetail::Number(_) => Ok(ty.native_bytes.min(8)),
            TypeDetail::Blob(_) | TypeDetail::None => Ok(1),
            TypeDetail::Array(array) => self.alignment_of(array.element),
            TypeDetail::Record(schema) => {
                let mut alignment = 1;
                for entry in &schema.entries {
                    alignment = alignment.max(self.alignment_of(entry.type_id).unwrap_or(1));
                }
                Ok(alignment)
            }
            // Cross-module references carry explicit geometry; fall back to
            // the widest natural alignment their size allows.
            TypeDetail::Reference(_) => {
                Ok([8u32, 4, 2, 1]
                    .into_iter()
                    .find(|a| ty.native_bytes % a == 0)
                    .unwrap_or(1))
            }
        }
    }

    /// General number type with an explicit wire description.
    pub fn number(
        &mut self,
        name: impl Into<String>,
        kind: BasicKind,
        bits: u32,
        desc: NumberDescriptor,
    ) -> Result<TypeId> {
        if bits == 0 || bits > 64 {
            return Err(Status::BadArgument);
        }
        match (kind, desc.encoding) {
            (BasicKind::UnsignedInt, NumberEncoding::TwosComplement)
            | (BasicKind::UnsignedInt, NumberEncoding::Bcd)
            | (BasicKind::SignedInt, NumberEncoding::TwosComplement)
            | (BasicKind::SignedInt, NumberEncoding::OnesComplement)
            | (BasicKind::SignedInt, NumberEncoding::SignMagnitude) => {}
            (BasicKind::Float, NumberEncoding::Ieee754) => {
                if bits != 32 && bits != 64 {
                    return Err(Status::BadArgument);
                }
            }
            _ => return Err(Status::BadArgument),
        }
        if desc.byte_order == ByteOrder::LittleEndian && bits % 8 != 0 {
            return Err(Status::BadArgument);
        }
        let flags = match desc.byte_order {
            ByteOrder::LittleEndian => TypeFlags::empty().with_little_endian_content(),
            ByteOrder::BigEndian => TypeFlags::empty(),
        };
        Ok(self.mint(CompiledType {
            name: name.into(),
            kind,
            flags,
            element_count: 0,
            packed_bits: bits,
            native_bytes: native_width_for_bits(bits),
            display: DisplayHint::Decimal,
            detail: TypeDetail::Number(desc),
        }))
    }

    fn default_number(&mut self, name: String, kind: BasicKind, bits: u32) -> TypeId {
        let bits = bits.clamp(1, 64);
        self.mint(CompiledType {
            name,
            kind,
            flags: TypeFlags::empty(),
            element_count: 0,
            packed_bits: bits,
            native_bytes: native_width_for_bits(bits),
            display: DisplayHint::Decimal,
            detail: TypeDetail::Number(NumberDescriptor::default()),
        })
    }

    /// Big-endian unsigned integer of `bits` bits (clamped to 1..=64).
    pub fn unsigned(&mut self, name: impl Into<String>, bits: u32) -> TypeId {
        self.default_number(name.into(), BasicKind::UnsignedInt, bits)
    }

    /// Big-endian two's complement signed integer of `bits` bits
    /// (clamped to 1..=64).
    pub fn signed(&mut self, name: impl Into<String>, bits: u32) -> TypeId {
        self.default_number(name.into(), BasicKind::SignedInt, bits)
    }

    /// Big-endian IEEE-754 float, 32 or 64 bits.
    pub fn float(&mut self, name: impl Into<String>, bits: u32) -> Result<TypeId> {
        self.number(
            name,
            BasicKind::Float,
            bits,
            NumberDescriptor {
                encoding: NumberEncoding::Ieee754,
                ..NumberDescriptor::default()
            },
        )
    }

    /// Unsigned integer with an enumeration label table.
    pub fn enumeration(
        &mut self,
        name: impl Into<String>,
        bits: u32,
        labels: Vec<EnumLabel>,
    ) -> TypeId {
        let id = self.unsigned(name, bits);
        // Freshly minted local id; the lookup cannot fail.
        if let Ok(ty) = self.local_mut(id) {
            ty.display = DisplayHint::Enumeration(labels);
        }
        id
    }

    /// Raw octet blob of `bytes` bytes.
    pub fn blob(&mut self, name: impl Into<String>, bytes: u32) -> TypeId {
        self.mint(CompiledType {
            name: name.into(),
            kind: BasicKind::Blob,
            flags: TypeFlags::empty(),
            element_count: 0,
            packed_bits: bytes * 8,
            native_bytes: bytes,
            display: DisplayHint::Decimal,
            detail: TypeDetail::Blob(BlobDescriptor::default()),
        })
    }

    /// Character string of up to `bytes` bytes, zero padded.
    pub fn text(&mut self, name: impl Into<String>, bytes: u32) -> TypeId {
        self.mint(CompiledType {
            name: name.into(),
            kind: BasicKind::Blob,
            flags: TypeFlags::empty(),
            element_count: 0,
            packed_bits: bytes * 8,
            native_bytes: bytes,
            display: DisplayHint::Text,
            detail: TypeDetail::Blob(BlobDescriptor {
                char_encoding: CharEncoding::Ascii,
            }),
        })
    }

    /// Fixed-size array over a previously declared element type.
    pub fn array(&mut self, name: impl Into<String>, element: TypeId, count: u32) -> Result<TypeId> {
        let element_ty = self.local(element)?;
        let descriptor = ArrayDescriptor {
            element,
            count,
            element_packed_bits: element_ty.packed_bits,
            element_native_bytes: element_ty.native_bytes,
        };
        let packed_bits = element_ty.packed_bits * count;
        let native_bytes = element_ty.native_bytes * count;
        Ok(self.mint(CompiledType {
            name: name.into(),
            kind: BasicKind::Array,
            flags: TypeFlags::empty(),
            element_count: count,
            packed_bits,
            native_bytes,
            display: DisplayHint::Decimal,
            detail: TypeDetail::Array(descriptor),
        }))
    }

    /// Reference to a type in another module, with explicit geometry.
    pub fn extern_ref(
        &mut self,
        name: impl Into<String>,
        target: TypeId,
        packed_bits: u32,
        native_bytes: u32,
    ) -> TypeId {
        self.mint(CompiledType {
            name: name.into(),
            kind: BasicKind::Reference,
            flags: TypeFlags::empty(),
            element_count: 1,
            packed_bits,
            native_bytes,
            display: DisplayHint::Decimal,
            detail: TypeDetail::Reference(target),
        })
    }

    /// Attach a display hint to a previously declared scalar.
    pub fn set_display(&mut self, id: TypeId, hint: DisplayHint) -> Result<()> {
        self.local_mut(id)?.display = hint;
        Ok(())
    }

    /// Start a composite record.
    pub fn record(&mut self, name: impl Into<String>) -> RecordBuilder<'_> {
        RecordBuilder {
            module: self,
            name: name.into(),
            base: None,
            members: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Start a derivative extending `base`.
    pub fn derive(&mut self, name: impl Into<String>, base: TypeId) -> RecordBuilder<'_> {
        RecordBuilder {
            module: self,
            name: name.into(),
            base: Some(base),
            members: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Resolve a dotted member path to an entity, descending nested records.
    pub fn resolve_path(&self, record: TypeId, path: &str) -> Result<EntityInfo> {
        let mut current = record;
        let mut packed = 0u32;
        let mut native = 0u32;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let ty = self.local(current)?;
            let schema = ty.schema().ok_or(Status::WrongType)?;
            let entry = find_entry(self, schema, segment)?;
            packed += entry.packed_offset_bits;
            native += entry.native_offset_bytes;
            if segments.peek().is_some() {
                current = entry.type_id;
            } else {
                let leaf = self.local(entry.type_id)?;
                return Ok(EntityInfo {
                    type_id: entry.type_id,
                    packed_offset_bits: packed,
                    native_offset_bytes: native,
                    packed_bits: leaf.packed_bits,
                    native_bytes: leaf.native_bytes,
                });
            }
        }
        Err(Status::NameNotFound)
    }

    /// Finish the module, computing its fingerprint.
    pub fn build(self) -> Arc<CompiledModule> {
        let mut canonical = Vec::new();
        for ty in &self.types {
            canonical.extend_from_slice(&(ty.name.len() as u16).to_le_bytes());
            canonical.extend_from_slice(ty.name.as_bytes());
            canonical.push(ty.kind as u8);
            canonical.extend_from_slice(&ty.packed_bits.to_le_bytes());
            canonical.extend_from_slice(&ty.native_bytes.to_le_bytes());
            canonical.extend_from_slice(&ty.element_count.to_le_bytes());
        }
        Arc::new(CompiledModule {
            name: self.name,
            module_index: self.module_index,
            types: self.types,
            fingerprint: ModuleHash::compute(&canonical),
        })
    }
}

/// Search the record's own entries, then its base chain, for a member name.
///
/// Offsets in base schemas are already record-relative (the base content sits
/// at offset zero), so no adjustment is needed while descending.
fn find_entry<'a>(module: &'a ModuleBuilder, schema: &'a Schema, name: &str) -> Result<&'a Entry> {
    if let Some(entry) = schema.entries.iter().find(|e| e.name == name) {
        return Ok(entry);
    }
    for entry in &schema.entries {
        if matches!(entry.kind, EntryKind::Base) {
            let base_ty = module.local(entry.type_id)?;
            if let Some(base_schema) = base_ty.schema() {
                if let Ok(found) = find_entry(module, base_schema, name) {
                    return Ok(found);
                }
            }
        }
    }
    Err(Status::NameNotFound)
}

enum MemberSpec {
    Field { name: String, type_id: TypeId },
    Padding { bits: u32 },
    Fixed { name: String, type_id: TypeId, value: GenericValue },
    Length { name: String, type_id: TypeId, bias: i32 },
    ErrorControl { name: String, type_id: TypeId, algorithm: ErrorControl },
    List { name: String, type_id: TypeId, count_field: String },
    Parameter { name: String, type_id: TypeId },
}

/// Builder for one record or derivative.
pub struct RecordBuilder<'a> {
    module: &'a mut ModuleBuilder,
    name: String,
    base: Option<TypeId>,
    members: Vec<MemberSpec>,
    constraints: Vec<(String, GenericValue)>,
}

impl<'a> RecordBuilder<'a> {
    pub fn field(mut self, name: impl Into<String>, type_id: TypeId) -> Self {
        self.members.push(MemberSpec::Field {
            name: name.into(),
            type_id,
        });
        self
    }

    /// Reserved wire bits with no native counterpart.
    pub fn padding(mut self, bits: u32) -> Self {
        self.members.push(MemberSpec::Padding { bits });
        self
    }

    pub fn fixed(
        mut self,
        name: impl Into<String>,
        type_id: TypeId,
        value: impl Into<GenericValue>,
    ) -> Self {
        self.members.push(MemberSpec::Fixed {
            name: name.into(),
            type_id,
            value: value.into(),
        });
        self
    }

    /// Length field holding the total encoded byte count plus `bias`.
    pub fn length(mut self, name: impl Into<String>, type_id: TypeId, bias: i32) -> Self {
        self.members.push(MemberSpec::Length {
            name: name.into(),
            type_id,
            bias,
        });
        self
    }

    pub fn error_control(
        mut self,
        name: impl Into<String>,
        type_id: TypeId,
        algorithm: ErrorControl,
    ) -> Self {
        self.members.push(MemberSpec::ErrorControl {
            name: name.into(),
            type_id,
            algorithm,
        });
        self
    }

    /// Variable-length run of `array` elements counted by a preceding field.
    pub fn list(
        mut self,
        name: impl Into<String>,
        array: TypeId,
        count_field: impl Into<String>,
    ) -> Self {
        self.members.push(MemberSpec::List {
            name: name.into(),
            type_id: array,
            count_field: count_field.into(),
        });
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, type_id: TypeId) -> Self {
        self.members.push(MemberSpec::Parameter {
            name: name.into(),
            type_id,
        });
        self
    }

    /// Require a base field to hold `value` for this derivative (dotted
    /// paths descend nested records).
    pub fn constrain(mut self, field: impl Into<String>, value: impl Into<GenericValue>) -> Self {
        self.constraints.push((field.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<TypeId> {
        let RecordBuilder {
            module,
            name,
            base,
            members,
            constraints,
        } = self;
        if module.types.len() as u16 >= MAX_FORMAT_INDEX {
            return Err(Status::InsufficientMemory);
        }

        let mut entries: Vec<Entry> = Vec::new();
        let mut packed_cursor = 0u32;
        let mut native_cursor = 0u32;
        let mut alignment = 1u32;

        if let Some(base_id) = base {
            let base_ty = module.local(base_id)?;
            if base_ty.schema().is_none() {
                return Err(Status::WrongType);
            }
            let (bits, bytes) = (base_ty.packed_bits, base_ty.native_bytes);
            entries.push(Entry {
                name: base_ty.name.clone(),
                kind: EntryKind::Base,
                type_id: base_id,
                packed_offset_bits: 0,
                native_offset_bytes: 0,
            });
            packed_cursor = bits;
            native_cursor = bytes;
            alignment = module.alignment_of(base_id)?;
        }

        for member in &members {
            match member {
                MemberSpec::Padding { bits } => {
                    let pad_id = module.padding_type(*bits);
                    entries.push(Entry {
                        name: String::new(),
                        kind: EntryKind::Padding,
                        type_id: pad_id,
                        packed_offset_bits: packed_cursor,
                        native_offset_bytes: native_cursor,
                    });
                    packed_cursor += bits;
                }
                MemberSpec::Field { name, type_id }
                | MemberSpec::Parameter { name, type_id }
                | MemberSpec::Fixed { name, type_id, .. }
                | MemberSpec::Length { name, type_id, .. }
                | MemberSpec::ErrorControl { name, type_id, .. }
                | MemberSpec::List { name, type_id, .. } => {
                    let child = module.local(*type_id)?;
                    let child_align = module.alignment_of(*type_id)?;
                    let (bits, bytes) = (child.packed_bits, child.native_bytes);
                    native_cursor = align_up(native_cursor, child_align);
                    let kind = match member {
                        MemberSpec::Field { .. } => EntryKind::Field,
                        MemberSpec::Parameter { .. } => EntryKind::Parameter,
                        MemberSpec::Fixed { value, .. } => EntryKind::FixedValue { value: *value },
                        MemberSpec::Length { bias, .. } => EntryKind::Length { bias: *bias },
                        MemberSpec::ErrorControl { algorithm, .. } => EntryKind::ErrorControl {
                            algorithm: *algorithm,
                        },
                        MemberSpec::List { count_field, .. } => {
                            if child.array().is_none() {
                                return Err(Status::WrongType);
                            }
                            let index = entries
                                .iter()
                                .position(|e| e.name == *count_field)
                                .ok_or(Status::NameNotFound)?;
                            EntryKind::List {
                                count_entry: index as u16,
                            }
                        }
                        MemberSpec::Padding { .. } => unreachable!(),
                    };
                    entries.push(Entry {
                        name: name.clone(),
                        kind,
                        type_id: *type_id,
                        packed_offset_bits: packed_cursor,
                        native_offset_bytes: native_cursor,
                    });
                    packed_cursor += bits;
                    native_cursor += bytes;
                    alignment = alignment.max(child_align);
                }
            }
        }

        let native_bytes = align_up(native_cursor, alignment);
        let element_count = entries.len() as u32;
        let record_id = module.mint(CompiledType {
            name,
            kind: BasicKind::Record,
            flags: TypeFlags::empty(),
            element_count,
            packed_bits: packed_cursor,
            native_bytes,
            display: DisplayHint::Decimal,
            detail: TypeDetail::Record(Schema {
                base,
                entries,
                derivatives: Vec::new(),
                ident_seq: Vec::new(),
                max_derivative_packed_bits: packed_cursor,
                max_derivative_native_bytes: native_bytes,
            }),
        });

        if let Some(base_id) = base {
            let mut resolved = Vec::with_capacity(constraints.len());
            for (path, value) in &constraints {
                resolved.push(Constraint {
                    entity: module.resolve_path(base_id, path)?,
                    value: *value,
                });
            }
            module.register_derivative(base_id, record_id, resolved)?;
            module.propagate_max_sizes(base_id, packed_cursor, native_bytes)?;
        } else if !constraints.is_empty() {
            return Err(Status::WrongType);
        }

        Ok(record_id)
    }
}

impl ModuleBuilder {
    /// Anonymous padding type of `bits` bits (shared per width).
    fn padding_type(&mut self, bits: u32) -> TypeId {
        let name = format!("pad{}", bits);
        for (i, ty) in self.types.iter().enumerate() {
            if ty.name == name && ty.packed_bits == bits && ty.native_bytes == 0 {
                return TypeId::new(self.module_index, i as u16 + 1);
            }
        }
        self.mint(CompiledType {
            name,
            kind: BasicKind::Blob,
            flags: TypeFlags::empty(),
            element_count: 0,
            packed_bits: bits,
            native_bytes: 0,
            display: DisplayHint::Decimal,
            detail: TypeDetail::Blob(BlobDescriptor::default()),
        })
    }

    fn register_derivative(
        &mut self,
        base_id: TypeId,
        derived_id: TypeId,
        constraints: Vec<Constraint>,
    ) -> Result<()> {
        {
            let base_ty = self.local_mut(base_id)?;
            let schema = match &mut base_ty.detail {
                TypeDetail::Record(schema) => schema,
                _ => return Err(Status::WrongType),
            };
            schema.derivatives.push(Derivative {
                type_id: derived_id,
                constraints,
            });
        }
        let seq = {
            let base_ty = self.local(base_id)?;
            let schema = base_ty.schema().ok_or(Status::WrongType)?;
            build_ident_seq(&schema.derivatives)
        };
        let base_ty = self.local_mut(base_id)?;
        if let TypeDetail::Record(schema) = &mut base_ty.detail {
            schema.ident_seq = seq;
        }
        Ok(())
    }

    fn propagate_max_sizes(
        &mut self,
        base_id: TypeId,
        packed_bits: u32,
        native_bytes: u32,
    ) -> Result<()> {
        let mut current = Some(base_id);
        while let Some(id) = current {
            let ty = self.local_mut(id)?;
            let schema = match &mut ty.detail {
                TypeDetail::Record(schema) => schema,
                _ => return Err(Status::WrongType),
            };
            schema.max_derivative_packed_bits = schema.max_derivative_packed_bits.max(packed_bits);
            schema.max_derivative_native_bytes =
                schema.max_derivative_native_bytes.max(native_bytes);
            current = schema.base;
        }
        Ok(())
    }
}

/// Compile the derivative table into a first-match decision chain.
///
/// Each derivative contributes locate/condition pairs for its constraints
/// and a terminal result node; a miss at any condition jumps to the next
/// derivative's chain.
fn build_ident_seq(derivatives: &[Derivative]) -> Vec<IdentNode> {
    let mut starts = Vec::with_capacity(derivatives.len());
    let mut next_start = 0u16;
    for derivative in derivatives {
        starts.push(next_start);
        next_start += 2 * derivative.constraints.len() as u16 + 1;
    }

    let mut seq = Vec::with_capacity(next_start as usize);
    for (i, derivative) in derivatives.iter().enumerate() {
        let miss = match starts.get(i + 1) {
            Some(start) => NodeLink::Node(*start),
            None => NodeLink::NoMatch,
        };
        let mut cursor = starts[i];
        for constraint in &derivative.constraints {
            seq.push(IdentNode::Locate {
                entity: constraint.entity,
                next: NodeLink::Node(cursor + 1),
            });
            seq.push(IdentNode::ValueCondition {
                value: constraint.value,
                on_match: NodeLink::Node(cursor + 2),
                on_miss: miss,
            });
            cursor += 2;
        }
        seq.push(IdentNode::Result {
            type_id: derivative.type_id,
        });
    }
    seq
}
