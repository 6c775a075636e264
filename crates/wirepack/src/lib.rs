// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # wirepack - Schema-driven codec runtime for spacecraft messages
//!
//! A pure Rust runtime for converting command/telemetry packets between
//! their wire image (bit-addressed, per-field byte order and sign encoding)
//! and their host image (byte-aligned native structs), driven entirely by
//! compiled type tables. The schema toolchain that produces those tables is
//! a separate build-time concern; this crate only consumes them.
//!
//! ## Quick Start
//!
//! ```rust
//! use wirepack::{ModuleBuilder, Registry};
//!
//! fn main() -> wirepack::Result<()> {
//!     // Normally emitted by the schema toolchain.
//!     let mut schema = ModuleBuilder::new("demo", 1);
//!     let u16be = schema.unsigned("u16", 16);
//!     let point = schema
//!         .record("Point")
//!         .field("x", u16be)
//!         .field("y", u16be)
//!         .build()?;
//!
//!     let mut db = Registry::new();
//!     db.register(schema.build())?;
//!
//!     // Native object: two u16 values in host layout.
//!     let mut native = [0u8; 4];
//!     native[0..2].copy_from_slice(&0x1234u16.to_ne_bytes());
//!     native[2..4].copy_from_slice(&0x5678u16.to_ne_bytes());
//!
//!     let mut packed = [0u8; 4];
//!     let mut id = point;
//!     wirepack::pack_complete(&db, &mut id, &mut packed, &native, 32)?;
//!     assert_eq!(packed, [0x12, 0x34, 0x56, 0x78]);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                     Binding Surface                          |
//! |   Descriptor/Buffer viewports | Generic values | Introspect  |
//! +--------------------------------------------------------------+
//! |                     Codec Engine                             |
//! |   Recursive pack/unpack walk | Identification | Finalize     |
//! +--------------------------------------------------------------+
//! |                     Compiled Tables                          |
//! |   Registry slots -> CompiledModule -> CompiledType/Schema    |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TypeId`] | Packed 32-bit global type identifier |
//! | [`Registry`] | Slot table of registered compiled modules |
//! | [`Descriptor`] | Typed viewport into a shared message buffer |
//! | [`GenericValue`] | Tagged scalar for field-level access |
//! | [`ModuleBuilder`] | Programmatic construction of compiled tables |
//!
//! ## Modules Overview
//!
//! - [`codec`] - Bit-level pack/unpack engine (start here)
//! - [`table`] - Compiled type table data model and builder
//! - [`identify`] - Derived-type identification
//! - [`introspect`] - Read-only type queries
//! - [`buffer`] - Reference-counted buffers and viewports
//! - [`value`] - Generic scalar values and display conversion

/// Reference-counted buffers and descriptor viewports.
pub mod buffer;
/// Bit-level pack/unpack engine, finalization and verification.
pub mod codec;
/// Status taxonomy.
pub mod error;
/// Derived-type identification engine.
pub mod identify;
/// Read-only queries over compiled tables.
pub mod introspect;
/// Registry of compiled schema modules.
pub mod registry;
/// Compiled type table data model and builder.
pub mod table;
/// Global type identifier codec.
pub mod typeid;
/// Generic scalar values and display conversion.
pub mod value;

pub use buffer::{check_compatible, Buffer, Compatibility, Descriptor};
pub use codec::{
    finalize, pack_complete, pack_partial, unpack_complete, unpack_partial, verify, ComputedFields,
};
pub use error::{Result, Status};
pub use identify::{apply_constraints, constraints, identify, ConstraintEntry};
pub use introspect::{
    base_check, derived_info, derived_type_by_index, member_by_index, member_by_native_offset,
    member_name, type_info, DerivedInfo, TypeInfo,
};
pub use registry::Registry;
pub use table::builder::ModuleBuilder;
pub use table::{
    BasicKind, ByteOrder, CompiledModule, CompiledType, DisplayHint, EntityInfo, EnumLabel,
    ErrorControl, ModuleHash, NumberDescriptor, NumberEncoding,
};
pub use typeid::TypeId;
pub use value::{load_value, scalar_from_string, scalar_to_string, store_value, GenericValue};
