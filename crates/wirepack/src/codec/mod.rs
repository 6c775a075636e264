// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bit-level pack/unpack engine.
//!
//! Converts whole messages between their native (host, byte-aligned) and
//! packed (wire, bit-addressed) images, resolving derived types on the way.
//! The partial variants leave computed fields (lengths, error control, fixed
//! identification values) untouched so callers can interleave their own
//! derivation decisions with incremental conversion; the complete variants
//! finalize or verify those fields automatically.
//!
//! A failed conversion leaves the destination buffer in an undefined state.

pub mod bits;
pub mod crc;
mod finalize;
mod scalar;
mod walk;

pub use finalize::{finalize, verify, ComputedFields};

use crate::error::{Result, Status};
use crate::introspect::resolve;
use crate::registry::Registry;
use crate::typeid::TypeId;
use bits::{BitReader, BitWriter};
use walk::{PackWalk, UnpackWalk};

/// Pack a native object into wire bits, without finalization.
///
/// `id` names the type to pack and is refined in place to the concrete
/// derivative the content identifies as. `max_dest_bits` caps the writable
/// window of `dest`; `starting_bit` resumes a previous partial call, skipping
/// entries wholly before it. Returns the total packed size in bits of the
/// concrete type.
pub fn pack_partial(
    db: &Registry,
    id: &mut TypeId,
    dest: &mut [u8],
    src: &[u8],
    max_dest_bits: usize,
    starting_bit: usize,
) -> Result<usize> {
    let (rid, ty) = resolve(db, *id)?;
    if src.len() < ty.native_bytes as usize {
        return Err(Status::BufferSizeError);
    }
    if (ty.packed_bits as usize) > max_dest_bits {
        return Err(Status::BufferSizeError);
    }
    let mut writer = BitWriter::new(dest, max_dest_bits)?;
    let walk = PackWalk {
        db,
        native: src,
        resume_bits: starting_bit,
    };
    let concrete = walk.pack_type(&mut writer, rid, 0, 0, 0)?;
    let (_, concrete_ty) = resolve(db, concrete)?;
    if (concrete_ty.packed_bits as usize) > max_dest_bits {
        return Err(Status::BufferSizeError);
    }
    *id = concrete.with_cpu_number(id.cpu_number());
    Ok(concrete_ty.packed_bits as usize)
}

/// Pack a native object and finalize its computed fields.
pub fn pack_complete(
    db: &Registry,
    id: &mut TypeId,
    dest: &mut [u8],
    src: &[u8],
    max_dest_bits: usize,
) -> Result<usize> {
    let total_bits = pack_partial(db, id, dest, src, max_dest_bits, 0)?;
    finalize(db, *id, dest, total_bits)?;
    Ok(total_bits)
}

/// Unpack wire bits into a native object, without verification.
///
/// `id` is refined in place to the concrete derivative the decoded content
/// identifies as. `src_size_bits` declares how much of `src` is message
/// content; `starting_byte` resumes a previous partial call. Returns the
/// native size in bytes of the concrete type.
pub fn unpack_partial(
    db: &Registry,
    id: &mut TypeId,
    dest: &mut [u8],
    src: &[u8],
    src_size_bits: usize,
    starting_byte: usize,
) -> Result<usize> {
    let (rid, ty) = resolve(db, *id)?;
    if (ty.packed_bits as usize) > src_size_bits {
        return Err(Status::BufferSizeError);
    }
    if dest.len() < ty.native_bytes as usize {
        return Err(Status::BufferSizeError);
    }
    let reader = BitReader::new(src, src_size_bits)?;
    let walk = UnpackWalk {
        db,
        resume_bytes: starting_byte,
    };
    let concrete = walk.unpack_type(&reader, dest, rid, 0, 0, 0)?;
    let (_, concrete_ty) = resolve(db, concrete)?;
    *id = concrete.with_cpu_number(id.cpu_number());
    Ok(concrete_ty.native_bytes as usize)
}

/// Unpack wire bits and reconcile computed fields.
///
/// Classes selected in `recompute` are recomputed and overwritten in the
/// decoded object; the rest are recomputed and compared, failing on
/// mismatch.
pub fn unpack_complete(
    db: &Registry,
    id: &mut TypeId,
    dest: &mut [u8],
    src: &[u8],
    src_size_bits: usize,
    recompute: ComputedFields,
) -> Result<usize> {
    let native_bytes = unpack_partial(db, id, dest, src, src_size_bits, 0)?;
    verify(db, *id, dest, src, recompute)?;
    Ok(native_bytes)
}
