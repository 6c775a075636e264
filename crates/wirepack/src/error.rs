// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Status taxonomy shared by every runtime operation.
//!
//! The set is closed on purpose: callers match on the variant they care about
//! and treat everything else as a generic failure. Future releases may add
//! positive (non-error) conditions, which is why success is modeled as the
//! `Ok` side of [`Result`] rather than as an enum variant callers would have
//! to enumerate.

use std::fmt;

/// Failure codes returned by the codec runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// A handle or argument was null, out of range, or otherwise unusable.
    BadArgument,
    /// A structural precondition failed (e.g. a record was expected).
    WrongType,
    /// The operation is documented but not provided by this build.
    ///
    /// Not a real failure path; callers probing optional functionality must
    /// treat this distinctly from the error variants.
    NotImplemented,
    /// The identifier does not resolve to a usable size or type.
    InvalidSizeOrType,
    /// A symbolic name (enumeration label) was not found.
    NameNotFound,
    /// The referenced schema module is not registered.
    IncompleteDatabase,
    /// The destination is too small for the declared content.
    BufferSizeError,
    /// A member or derivative index is outside the valid range.
    InvalidIndex,
    /// Derived-type identification found no matching constraint value.
    NoMatchingValue,
    /// A recomputed error-control field did not match the stored one.
    ErrorControlMismatch,
    /// A recomputed length or fixed-value field did not match the stored one.
    FieldMismatch,
    /// A table or allocation limit was exhausted.
    InsufficientMemory,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::BadArgument => "bad argument",
            Status::WrongType => "wrong type",
            Status::NotImplemented => "not implemented",
            Status::InvalidSizeOrType => "invalid size or type",
            Status::NameNotFound => "name not found",
            Status::IncompleteDatabase => "incomplete database",
            Status::BufferSizeError => "buffer size error",
            Status::InvalidIndex => "invalid index",
            Status::NoMatchingValue => "no matching value",
            Status::ErrorControlMismatch => "error control mismatch",
            Status::FieldMismatch => "field mismatch",
            Status::InsufficientMemory => "insufficient memory",
        };
        f.write_str(text)
    }
}

impl std::error::Error for Status {}

pub type Result<T> = core::result::Result<T, Status>;
