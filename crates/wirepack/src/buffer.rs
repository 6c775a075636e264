// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference-counted message buffers and descriptor viewports.
//!
//! A [`Buffer`] is a shared handle over one message's backing bytes. A
//! [`Descriptor`] binds a type identifier and an offset/length window to a
//! buffer; sub-descriptors share the parent's buffer and add their own
//! relative offset, so a field view costs no copy. Dropping a descriptor
//! releases its buffer reference; the backing storage goes away when the
//! last holder does.
//!
//! Counts are plain (non-atomic): buffers and descriptors belong to one
//! thread unless the caller synchronizes externally.

use crate::error::{Result, Status};
use crate::introspect::{base_check, derived_info, type_info, TypeInfo};
use crate::registry::Registry;
use crate::table::{BasicKind, EntityInfo};
use crate::typeid::TypeId;
use crate::value::{load_value, store_value, GenericValue};
use std::cell::RefCell;
use std::rc::Rc;

struct BufferInner {
    bytes: RefCell<Vec<u8>>,
    max_size: usize,
    managed: bool,
}

/// Shared handle over one message's backing storage.
#[derive(Clone)]
pub struct Buffer {
    inner: Rc<BufferInner>,
}

impl Buffer {
    /// Engine-owned, zero-initialized storage of `size` bytes.
    pub fn managed(size: usize) -> Self {
        Self {
            inner: Rc::new(BufferInner {
                bytes: RefCell::new(vec![0u8; size]),
                max_size: size,
                managed: true,
            }),
        }
    }

    /// Wrap caller-provided storage.
    ///
    /// The engine never discards unmanaged content; the last holder can
    /// reclaim it with [`Buffer::into_content`].
    pub fn unmanaged(content: Vec<u8>) -> Self {
        let max_size = content.len();
        Self {
            inner: Rc::new(BufferInner {
                bytes: RefCell::new(content),
                max_size,
                managed: false,
            }),
        }
    }

    /// Declared maximum content size in bytes.
    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    pub fn is_managed(&self) -> bool {
        self.inner.managed
    }

    /// Number of additional holders besides this handle.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner) - 1
    }

    /// Copy `out.len()` bytes starting at `offset`.
    pub fn read(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        let bytes = self.inner.bytes.borrow();
        let end = offset
            .checked_add(out.len())
            .ok_or(Status::BufferSizeError)?;
        if end > bytes.len() {
            return Err(Status::BufferSizeError);
        }
        out.copy_from_slice(&bytes[offset..end]);
        Ok(())
    }

    /// Overwrite `data.len()` bytes starting at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        let mut bytes = self.inner.bytes.borrow_mut();
        let end = offset
            .checked_add(data.len())
            .ok_or(Status::BufferSizeError)?;
        if end > bytes.len() {
            return Err(Status::BufferSizeError);
        }
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Run `f` over the full content.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.inner.bytes.borrow())
    }

    /// Run `f` over the full content, mutably.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.inner.bytes.borrow_mut())
    }

    /// Reclaim the content when this is the last handle.
    pub fn into_content(self) -> Option<Vec<u8>> {
        Rc::try_unwrap(self.inner)
            .ok()
            .map(|inner| inner.bytes.into_inner())
    }

    fn same_storage(&self, other: &Buffer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// How two descriptors' contents may be transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Field-by-field conversion is required.
    None,
    /// Source is a derivative of the destination's type; a raw copy is safe
    /// when the destination is sized for the largest derivative.
    BaseType,
    /// Same layout; a raw byte copy is safe.
    Exact,
}

/// A typed viewport into a buffer.
///
/// The descriptor does not own schema data (the registry does) and owns
/// buffer content only through the shared handle's count.
pub struct Descriptor {
    type_id: TypeId,
    info: TypeInfo,
    offset: usize,
    length: usize,
    buffer: Option<Buffer>,
}

impl Descriptor {
    /// Viewport for a whole object of type `id`, not yet bound to a buffer.
    pub fn new(db: &Registry, id: TypeId) -> Result<Self> {
        let info = type_info(db, id)?;
        Ok(Self {
            type_id: id,
            info,
            offset: 0,
            length: info.native_bytes as usize,
            buffer: None,
        })
    }

    /// Viewport sized for the largest derivative of `id`, so derived content
    /// can later be copied in whole.
    pub fn new_for_derivatives(db: &Registry, id: TypeId) -> Result<Self> {
        let mut descriptor = Self::new(db, id)?;
        if let Ok(derived) = derived_info(db, id) {
            descriptor.length = descriptor.length.max(derived.max_native_bytes as usize);
        }
        Ok(descriptor)
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn info(&self) -> &TypeInfo {
        &self.info
    }

    /// Byte offset of this view within its buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of this view in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    /// Attach a buffer, releasing any previously attached one.
    ///
    /// Reattaching the same buffer is a no-op.
    pub fn set_buffer(&mut self, buffer: &Buffer) {
        if let Some(current) = &self.buffer {
            if current.same_storage(buffer) {
                return;
            }
        }
        self.buffer = Some(buffer.clone());
    }

    /// Release the attached buffer, if any.
    pub fn clear_buffer(&mut self) {
        self.buffer = None;
    }

    /// Whole view window fits inside the attached buffer.
    pub fn is_valid(&self) -> bool {
        match &self.buffer {
            Some(buffer) => self
                .offset
                .checked_add(self.length)
                .is_some_and(|end| end <= buffer.max_size()),
            None => false,
        }
    }

    /// Child viewport over one member, sharing this descriptor's buffer.
    pub fn sub_object(&self, db: &Registry, entity: &EntityInfo) -> Result<Descriptor> {
        let info = type_info(db, entity.type_id)?;
        let mut child = Descriptor {
            type_id: entity.type_id,
            info,
            offset: self.offset + entity.native_offset_bytes as usize,
            length: entity.native_bytes as usize,
            buffer: None,
        };
        if let Some(buffer) = &self.buffer {
            child.set_buffer(buffer);
        }
        Ok(child)
    }

    fn bound_buffer(&self) -> Result<&Buffer> {
        let buffer = self.buffer.as_ref().ok_or(Status::BadArgument)?;
        if !self.is_valid() {
            return Err(Status::BufferSizeError);
        }
        Ok(buffer)
    }

    /// Copy this view's bytes out of the buffer.
    pub fn read_bytes(&self, out: &mut [u8]) -> Result<()> {
        if out.len() > self.length {
            return Err(Status::BufferSizeError);
        }
        self.bound_buffer()?.read(self.offset, out)
    }

    /// Overwrite this view's bytes in the buffer.
    pub fn write_bytes(&self, data: &[u8]) -> Result<()> {
        if data.len() > self.length {
            return Err(Status::BufferSizeError);
        }
        self.bound_buffer()?.write(self.offset, data)
    }

    /// Load this view's content as a scalar value.
    pub fn load_scalar(&self, db: &Registry) -> Result<GenericValue> {
        let buffer = self.bound_buffer()?;
        buffer.with_bytes(|bytes| load_value(db, self.type_id, bytes, self.offset))
    }

    /// Store a scalar value through this view.
    pub fn store_scalar(&self, db: &Registry, value: &GenericValue) -> Result<()> {
        let buffer = self.bound_buffer()?;
        buffer.with_bytes_mut(|bytes| store_value(db, self.type_id, bytes, self.offset, value))
    }
}

/// Decide whether `src` content can be transferred into `dest` by raw copy.
pub fn check_compatible(db: &Registry, dest: &Descriptor, src: &Descriptor) -> Compatibility {
    if dest.type_id.is_similar(src.type_id) {
        return Compatibility::Exact;
    }
    let flat_scalar = |d: &Descriptor| {
        matches!(
            d.info.kind,
            BasicKind::SignedInt | BasicKind::UnsignedInt | BasicKind::Float | BasicKind::Blob
        )
    };
    if flat_scalar(dest)
        && flat_scalar(src)
        && dest.info.kind == src.info.kind
        && dest.info.native_bytes == src.info.native_bytes
        && dest.info.packed_bits == src.info.packed_bits
    {
        return Compatibility::Exact;
    }
    if base_check(db, dest.type_id, src.type_id).is_ok() {
        if let Ok(derived) = derived_info(db, dest.type_id) {
            if dest.length >= derived.max_native_bytes as usize {
                return Compatibility::BaseType;
            }
        }
    }
    Compatibility::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_buffer_zeroed() {
        let buffer = Buffer::managed(8);
        let mut out = [0xFFu8; 8];
        buffer.read(0, &mut out).expect("read");
        assert_eq!(out, [0u8; 8]);
        assert!(buffer.is_managed());
        assert_eq!(buffer.max_size(), 8);
        assert_eq!(buffer.ref_count(), 0);
    }

    #[test]
    fn test_unmanaged_content_is_reclaimable() {
        let buffer = Buffer::unmanaged(vec![1, 2, 3, 4]);
        assert!(!buffer.is_managed());
        let clone = buffer.clone();
        assert_eq!(buffer.ref_count(), 1);
        // Not the last handle: reclaim fails, content stays shared.
        assert!(clone.into_content().is_none());
        assert_eq!(buffer.ref_count(), 0);
        assert_eq!(buffer.into_content(), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_buffer_write_bounds() {
        let buffer = Buffer::managed(4);
        assert_eq!(buffer.write(2, &[0, 0, 0]), Err(Status::BufferSizeError));
        buffer.write(2, &[7, 8]).expect("write");
        let mut out = [0u8; 4];
        buffer.read(0, &mut out).expect("read");
        assert_eq!(out, [0, 0, 7, 8]);
    }
}
