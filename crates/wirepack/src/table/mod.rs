// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compiled type tables.
//!
//! These structures are the output format of the external schema toolchain:
//! immutable, read-only descriptions of every message type an application
//! exchanges. The runtime never mutates them; generated code (and tests)
//! materialize them through [`builder::ModuleBuilder`].
//!
//! A module is a table of [`CompiledType`] records indexed by format index.
//! Records describe scalars, blobs, composite records, arrays and references;
//! composite records carry a [`Schema`] with the ordered member list and the
//! side tables driving derived-type identification.

pub mod builder;
pub mod hash;

use crate::identify::IdentNode;
use crate::typeid::TypeId;
use crate::value::GenericValue;

pub use hash::ModuleHash;

/// Fundamental classification of a compiled type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BasicKind {
    SignedInt = 1,
    UnsignedInt,
    Float,
    Blob,
    Record,
    Array,
    Reference,
}

/// Byte ordering of a packed number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Wire encoding of a packed number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberEncoding {
    /// Two's complement (also the encoding of unsigned fields).
    #[default]
    TwosComplement,
    OnesComplement,
    SignMagnitude,
    /// Packed binary-coded decimal, unsigned, one digit per nibble.
    Bcd,
    /// IEEE-754 binary32/binary64.
    Ieee754,
}

/// Per-field number packing description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumberDescriptor {
    pub byte_order: ByteOrder,
    pub encoding: NumberEncoding,
    /// All payload bits are inverted on the wire.
    pub invert_bits: bool,
    /// Bit order within the field is reversed on the wire.
    pub lsb_first: bool,
}

/// Character interpretation of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharEncoding {
    /// Raw octets, no character semantics.
    #[default]
    None,
    Ascii,
    Utf8,
}

/// Blob packing description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlobDescriptor {
    pub char_encoding: CharEncoding,
}

/// Array detail: element type and repetition count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayDescriptor {
    pub element: TypeId,
    pub count: u32,
    /// Packed stride of one element, in bits.
    pub element_packed_bits: u32,
    /// Native stride of one element, in bytes.
    pub element_native_bytes: u32,
}

/// Error-control algorithm attached to a computed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorControl {
    /// Longitudinal XOR of all message octets.
    Xor8,
    Crc8,
    Crc16Ccitt,
    Crc32,
}

impl ErrorControl {
    /// Width of the check value, in bits.
    pub fn width_bits(self) -> u32 {
        match self {
            ErrorControl::Xor8 | ErrorControl::Crc8 => 8,
            ErrorControl::Crc16Ccitt => 16,
            ErrorControl::Crc32 => 32,
        }
    }
}

/// Display hint attached to a scalar type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisplayHint {
    #[default]
    Decimal,
    /// Hexadecimal address-style rendering.
    Address,
    /// Zero is FALSE, anything else TRUE.
    Boolean,
    /// Symbolic labels for enumerated values.
    Enumeration(Vec<EnumLabel>),
    /// The field always displays one fixed name.
    FixedName(String),
    /// Character string (blob types only).
    Text,
}

/// One symbolic label of an enumerated type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumLabel {
    pub name: String,
    pub value: i64,
}

impl EnumLabel {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Role of a schema member.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// Inclusion of the base type's content at the start of a derivative.
    Base,
    /// Plain data field.
    Field,
    /// Reserved bits, zero on the wire, ignored on decode.
    Padding,
    /// Variable-length run of array elements; the live element count is the
    /// native value of the sibling entry at `count_entry`.
    List { count_entry: u16 },
    /// Field that must always hold `value`.
    FixedValue { value: GenericValue },
    /// Total encoded size of the message in bytes, plus `bias`.
    Length { bias: i32 },
    /// Checksum/CRC over the encoded message.
    ErrorControl { algorithm: ErrorControl },
    /// Reference to an externally supplied parameter or interface object.
    Parameter,
}

/// One member of a composite record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
    pub type_id: TypeId,
    /// Absolute bit offset within the record's packed image.
    pub packed_offset_bits: u32,
    /// Absolute byte offset within the record's native image.
    pub native_offset_bytes: u32,
}

/// Location and size of a child entity, in both representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityInfo {
    pub type_id: TypeId,
    pub packed_offset_bits: u32,
    pub native_offset_bytes: u32,
    pub packed_bits: u32,
    pub native_bytes: u32,
}

/// A required discriminator value of one derivative.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub entity: EntityInfo,
    pub value: GenericValue,
}

/// A derived type of a record, with the constraints selecting it.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivative {
    pub type_id: TypeId,
    pub constraints: Vec<Constraint>,
}

/// Composite-record detail: members plus derivation side tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    /// The type this record extends, if it is itself a derivative.
    pub base: Option<TypeId>,
    /// Members ordered by offset.
    pub entries: Vec<Entry>,
    /// Direct derivatives of this record.
    pub derivatives: Vec<Derivative>,
    /// Decision structure resolving which derivative a buffer holds.
    pub ident_seq: Vec<IdentNode>,
    /// Largest packed size over this record and all its derivatives.
    pub max_derivative_packed_bits: u32,
    /// Largest native size over this record and all its derivatives.
    pub max_derivative_native_bytes: u32,
}

/// Kind-specific detail of a compiled type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypeDetail {
    #[default]
    None,
    Number(NumberDescriptor),
    Blob(BlobDescriptor),
    Record(Schema),
    Array(ArrayDescriptor),
    /// Indirection to another compiled type, possibly in another module.
    Reference(TypeId),
}

/// Packing hints that apply to the whole type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeFlags(u8);

impl TypeFlags {
    const LITTLE_ENDIAN_CONTENT: u8 = 0x01;

    pub const fn empty() -> Self {
        TypeFlags(0)
    }

    pub fn with_little_endian_content(mut self) -> Self {
        self.0 |= Self::LITTLE_ENDIAN_CONTENT;
        self
    }

    /// Content of this type prefers little-endian packing.
    pub fn little_endian_content(self) -> bool {
        self.0 & Self::LITTLE_ENDIAN_CONTENT != 0
    }
}

/// One immutable compiled type record.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledType {
    pub name: String,
    pub kind: BasicKind,
    pub flags: TypeFlags,
    /// Children for records/arrays; 0 for scalar leaves.
    pub element_count: u32,
    /// Size of the packed (wire) image, in bits.
    pub packed_bits: u32,
    /// Size of the native (host) image, in bytes.
    pub native_bytes: u32,
    pub display: DisplayHint,
    pub detail: TypeDetail,
}

impl CompiledType {
    /// Packed size rounded up to whole bytes.
    pub fn packed_bytes(&self) -> u32 {
        self.packed_bits.div_ceil(8)
    }

    pub fn schema(&self) -> Option<&Schema> {
        match &self.detail {
            TypeDetail::Record(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<&NumberDescriptor> {
        match &self.detail {
            TypeDetail::Number(desc) => Some(desc),
            _ => None,
        }
    }

    pub fn array(&self) -> Option<&ArrayDescriptor> {
        match &self.detail {
            TypeDetail::Array(desc) => Some(desc),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            BasicKind::SignedInt | BasicKind::UnsignedInt | BasicKind::Float | BasicKind::Blob
        )
    }
}

/// One compiled schema module: the unit of registration.
///
/// `module_index` is assigned by the toolchain; cross-module type identifiers
/// are baked into the tables, so the runtime never renumbers modules.
#[derive(Debug)]
pub struct CompiledModule {
    pub name: String,
    pub module_index: u16,
    /// Types indexed by format index minus one (format index 0 is reserved).
    pub types: Vec<CompiledType>,
    /// Compatibility fingerprint over a canonical encoding of the tables.
    ///
    /// Detects mismatched artifacts from separate toolchain runs; this is
    /// not a security mechanism.
    pub fingerprint: ModuleHash,
}

impl CompiledModule {
    /// Look up a type by format index (1-based).
    pub fn format(&self, format_index: u16) -> Option<&CompiledType> {
        if format_index == 0 {
            return None;
        }
        self.types.get(format_index as usize - 1)
    }

    /// TypeId of the format at `format_index` within this module.
    pub fn type_id(&self, format_index: u16) -> TypeId {
        TypeId::new(self.module_index, format_index)
    }
}
