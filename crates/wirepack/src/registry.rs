// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime registry of compiled schema modules.
//!
//! The registry is the root handle every runtime operation takes: a slot
//! table mapping module index to a compiled module, plus the checksum lookup
//! tables the error-control algorithms need. Building the tables at
//! construction time keeps the registry self-contained, so independent
//! registries can coexist (one per test, one per simulated CPU).
//!
//! Mutation is not synchronized internally; callers that share a registry
//! across threads must serialize register/unregister against all other use.

use crate::codec::crc::CrcTables;
use crate::error::{Result, Status};
use crate::table::{CompiledModule, CompiledType};
use crate::typeid::{TypeId, MAX_MODULE_INDEX};
use std::sync::Arc;

/// Module slot table plus checksum context.
pub struct Registry {
    slots: Vec<Option<Arc<CompiledModule>>>,
    crc: CrcTables,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_MODULE_INDEX as usize + 1],
            crc: CrcTables::new(),
        }
    }

    /// Register a compiled module at its toolchain-assigned slot.
    ///
    /// Re-registering the same module handle is idempotent and returns the
    /// slot it already occupies. A different module at an occupied slot is
    /// rejected; identifiers embedded in compiled tables cannot be
    /// renumbered at runtime.
    pub fn register(&mut self, module: Arc<CompiledModule>) -> Result<u16> {
        let index = module.module_index;
        if index == 0 || index > MAX_MODULE_INDEX {
            return Err(Status::BadArgument);
        }
        match &self.slots[index as usize] {
            Some(existing) if Arc::ptr_eq(existing, &module) => Ok(index),
            Some(_) => Err(Status::BadArgument),
            None => {
                if self.slots.iter().flatten().count() >= MAX_MODULE_INDEX as usize {
                    return Err(Status::InsufficientMemory);
                }
                log::debug!(
                    "registering module '{}' at slot {} (fingerprint {})",
                    module.name,
                    index,
                    module.fingerprint
                );
                self.slots[index as usize] = Some(module);
                Ok(index)
            }
        }
    }

    /// Clear a module slot. Later lookups against this index fail with
    /// incomplete-database.
    pub fn unregister(&mut self, module_index: u16) -> Result<()> {
        if module_index == 0 || module_index > MAX_MODULE_INDEX {
            return Err(Status::BadArgument);
        }
        match self.slots[module_index as usize].take() {
            Some(module) => {
                log::debug!("unregistered module '{}' from slot {}", module.name, module_index);
                Ok(())
            }
            None => Err(Status::IncompleteDatabase),
        }
    }

    /// Slot index of a registered module handle.
    pub fn module_index_of(&self, module: &Arc<CompiledModule>) -> Result<u16> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|m| Arc::ptr_eq(m, module)))
            .map(|index| index as u16)
            .ok_or(Status::IncompleteDatabase)
    }

    /// Registered module at `module_index`.
    pub fn module(&self, module_index: u16) -> Result<&Arc<CompiledModule>> {
        if module_index == 0 || module_index > MAX_MODULE_INDEX {
            return Err(Status::BadArgument);
        }
        self.slots[module_index as usize]
            .as_ref()
            .ok_or(Status::IncompleteDatabase)
    }

    /// Compiled type record behind an identifier.
    pub(crate) fn lookup(&self, id: TypeId) -> Result<&CompiledType> {
        if !id.is_valid() {
            return Err(Status::InvalidSizeOrType);
        }
        let module = self
            .slots
            .get(id.module_index() as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(Status::IncompleteDatabase)?;
        module.format(id.format_index()).ok_or(Status::IncompleteDatabase)
    }

    pub(crate) fn crc(&self) -> &CrcTables {
        &self.crc
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::builder::ModuleBuilder;

    fn test_module(index: u16) -> Arc<CompiledModule> {
        let mut builder = ModuleBuilder::new("test", index);
        builder.unsigned("u8", 8);
        builder.build()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut db = Registry::new();
        let module = test_module(5);
        assert_eq!(db.register(module.clone()).expect("register"), 5);
        assert_eq!(db.module_index_of(&module).expect("index"), 5);
        assert!(db.lookup(TypeId::new(5, 1)).is_ok());
    }

    #[test]
    fn test_reregistration_is_idempotent() {
        let mut db = Registry::new();
        let module = test_module(5);
        assert_eq!(db.register(module.clone()).expect("register"), 5);
        assert_eq!(db.register(module.clone()).expect("register again"), 5);

        // A different module at the same slot is rejected.
        let other = test_module(5);
        assert_eq!(db.register(other), Err(Status::BadArgument));
    }

    #[test]
    fn test_unregistered_lookup_is_incomplete_database() {
        let mut db = Registry::new();
        let module = test_module(7);
        db.register(module).expect("register");
        db.unregister(7).expect("unregister");
        assert_eq!(db.lookup(TypeId::new(7, 1)), Err(Status::IncompleteDatabase));
        assert_eq!(db.unregister(7), Err(Status::IncompleteDatabase));
    }

    #[test]
    fn test_out_of_range_format_is_incomplete_database() {
        let mut db = Registry::new();
        db.register(test_module(3)).expect("register");
        assert_eq!(db.lookup(TypeId::new(3, 99)), Err(Status::IncompleteDatabase));
    }

    #[test]
    fn test_invalid_id_is_invalid_size_or_type() {
        let db = Registry::new();
        assert_eq!(db.lookup(TypeId::INVALID), Err(Status::InvalidSizeOrType));
    }

    #[test]
    fn test_slot_zero_rejected() {
        let mut db = Registry::new();
        assert_eq!(db.register(test_module(0)), Err(Status::BadArgument));
        assert_eq!(db.unregister(0), Err(Status::BadArgument));
    }
}
