// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Derived-type identification.
//!
//! A record with derivatives carries a compiled decision structure: a flat
//! arena of nodes addressed by index. Walking it against a decoded buffer
//! resolves which derivative the buffer actually holds; walking a
//! derivative's constraint list in the other direction imposes the
//! discriminator values a requested derivative needs.
//!
//! The arena layout is static and bounds-checked: any malformed link or
//! out-of-range index terminates the walk with `NoMatchingValue` instead of
//! panicking.

use crate::error::{Result, Status};
use crate::introspect::record_schema;
use crate::registry::Registry;
use crate::table::{Constraint, EntityInfo};
use crate::typeid::TypeId;
use crate::value::{load_value, store_value, GenericValue};
use std::cmp::Ordering;

/// Branch target inside the identification arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLink {
    Node(u16),
    /// Terminal: identification fails along this branch.
    NoMatch,
}

/// One node of the identification decision structure.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentNode {
    /// Select the entity later condition nodes evaluate.
    Locate { entity: EntityInfo, next: NodeLink },
    /// Branch on equality with a single discriminator value.
    ValueCondition {
        value: GenericValue,
        on_match: NodeLink,
        on_miss: NodeLink,
    },
    /// Branch on membership in an inclusive value range.
    RangeCondition {
        low: GenericValue,
        high: GenericValue,
        on_in: NodeLink,
        on_out: NodeLink,
    },
    /// Branch on the located entity's type identity.
    TypeCondition {
        type_id: TypeId,
        on_match: NodeLink,
        on_miss: NodeLink,
    },
    /// Terminal: the buffer conclusively holds this type.
    Result { type_id: TypeId },
}

/// Resolve one level of derivation for `id` against a decoded native buffer.
///
/// `native_base` is the byte offset of the record within `native`. Returns
/// `Ok(None)` when the record has no decision structure, `Err(NoMatchingValue)`
/// when it has one but no branch matches.
pub(crate) fn identify_step(
    db: &Registry,
    id: TypeId,
    native: &[u8],
    native_base: usize,
) -> Result<Option<TypeId>> {
    let schema = record_schema(db, id)?;
    if schema.ident_seq.is_empty() {
        return Ok(None);
    }

    let seq = &schema.ident_seq;
    let mut located: Option<EntityInfo> = None;
    let mut node = 0usize;
    // A well-formed decision structure visits each node at most once.
    for _ in 0..seq.len() {
        let next = match &seq[node] {
            IdentNode::Locate { entity, next } => {
                located = Some(*entity);
                *next
            }
            IdentNode::ValueCondition {
                value,
                on_match,
                on_miss,
            } => {
                let current = load_located(db, &located, native, native_base)?;
                if current.compare(value) == Some(Ordering::Equal) {
                    *on_match
                } else {
                    *on_miss
                }
            }
            IdentNode::RangeCondition {
                low,
                high,
                on_in,
                on_out,
            } => {
                let current = load_located(db, &located, native, native_base)?;
                let above = matches!(
                    current.compare(low),
                    Some(Ordering::Greater) | Some(Ordering::Equal)
                );
                let below = matches!(
                    current.compare(high),
                    Some(Ordering::Less) | Some(Ordering::Equal)
                );
                if above && below {
                    *on_in
                } else {
                    *on_out
                }
            }
            IdentNode::TypeCondition {
                type_id,
                on_match,
                on_miss,
            } => {
                let entity = located.ok_or(Status::NoMatchingValue)?;
                if entity.type_id.is_similar(*type_id) {
                    *on_match
                } else {
                    *on_miss
                }
            }
            IdentNode::Result { type_id } => return Ok(Some(*type_id)),
        };
        match next {
            NodeLink::Node(index) if (index as usize) < seq.len() => node = index as usize,
            _ => {
                log::debug!("identification of {} ended without a match", id);
                return Err(Status::NoMatchingValue);
            }
        }
    }
    log::debug!("identification of {} exceeded the node budget", id);
    Err(Status::NoMatchingValue)
}

fn load_located(
    db: &Registry,
    located: &Option<EntityInfo>,
    native: &[u8],
    native_base: usize,
) -> Result<GenericValue> {
    let entity = located.ok_or(Status::NoMatchingValue)?;
    load_value(
        db,
        entity.type_id,
        native,
        native_base + entity.native_offset_bytes as usize,
    )
}

/// Resolve the concrete type a decoded base buffer represents.
///
/// Repeats single-level identification until the deepest derivative is
/// reached. A record whose decision structure resolves no branch reports
/// `NoMatchingValue`; the pack/unpack walkers instead continue with the
/// base type when that happens.
pub fn identify(db: &Registry, base_id: TypeId, native: &[u8]) -> Result<TypeId> {
    let mut current = base_id;
    // Derivation chains are bounded by the module's format count.
    for _ in 0..crate::typeid::MAX_FORMAT_INDEX {
        match identify_step(db, current, native, 0)? {
            Some(next) if !next.is_similar(current) => current = next,
            _ => return Ok(current),
        }
    }
    Ok(current)
}

/// One field location and the value a derivative requires there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintEntry {
    pub entity: EntityInfo,
    pub value: GenericValue,
}

/// Lazy walk over every constraint a derivative imposes relative to a base.
///
/// Entries are yielded level by level from the derivative up through its
/// ancestors; a broken ancestry chain is only discovered when the walk
/// reaches it, so entries may be yielded before the final item reports the
/// failure. Callers that applied earlier entries must treat their effects as
/// void when an `Err` item appears.
pub struct ConstraintIter<'a> {
    db: &'a Registry,
    base: TypeId,
    cursor: TypeId,
    pending: std::vec::IntoIter<Constraint>,
    done: bool,
}

impl<'a> ConstraintIter<'a> {
    fn advance_level(&mut self) -> Option<Result<ConstraintEntry>> {
        loop {
            if let Some(constraint) = self.pending.next() {
                return Some(Ok(ConstraintEntry {
                    entity: constraint.entity,
                    value: constraint.value,
                }));
            }
            if self.done || self.cursor.is_similar(self.base) {
                self.done = true;
                return None;
            }
            let schema = match record_schema(self.db, self.cursor) {
                Ok(schema) => schema,
                Err(status) => {
                    self.done = true;
                    return Some(Err(status));
                }
            };
            let parent = match schema.base {
                Some(parent) => parent,
                None => {
                    self.done = true;
                    return Some(Err(Status::WrongType));
                }
            };
            let parent_schema = match record_schema(self.db, parent) {
                Ok(schema) => schema,
                Err(status) => {
                    self.done = true;
                    return Some(Err(status));
                }
            };
            let derivative = parent_schema
                .derivatives
                .iter()
                .find(|d| d.type_id.is_similar(self.cursor));
            match derivative {
                Some(derivative) => {
                    self.pending = derivative.constraints.clone().into_iter();
                    self.cursor = parent;
                }
                None => {
                    self.done = true;
                    return Some(Err(Status::WrongType));
                }
            }
        }
    }
}

impl<'a> Iterator for ConstraintIter<'a> {
    type Item = Result<ConstraintEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done && self.pending.as_slice().is_empty() {
            return None;
        }
        self.advance_level()
    }
}

/// Iterate the constraints that make `derived_id` out of `base_id`.
pub fn constraints<'a>(
    db: &'a Registry,
    base_id: TypeId,
    derived_id: TypeId,
) -> ConstraintIter<'a> {
    ConstraintIter {
        db,
        base: base_id,
        cursor: derived_id,
        pending: Vec::new().into_iter(),
        done: false,
    }
}

/// Write every discriminator value `derived_id` requires into a native
/// object of the base type.
///
/// On failure the native buffer may hold a partial subset of the values.
pub fn apply_constraints(
    db: &Registry,
    base_id: TypeId,
    derived_id: TypeId,
    native: &mut [u8],
) -> Result<()> {
    for entry in constraints(db, base_id, derived_id) {
        let entry = entry?;
        store_value(
            db,
            entry.entity.type_id,
            native,
            entry.entity.native_offset_bytes as usize,
            &entry.value,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_link_is_compact() {
        // The arena addresses nodes by u16; keep the link type small.
        assert!(std::mem::size_of::<NodeLink>() <= 4);
    }
}
