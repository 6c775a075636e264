// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Module compatibility fingerprint.

use md5::{Digest, Md5};
use std::fmt;

/// 16-byte MD5 fingerprint of a compiled module.
///
/// Two artifacts produced from the same schema source hash identically, so a
/// ground system and a flight image can cheaply check they were built against
/// the same type tables. MD5 is used as a fingerprint only; this is not a
/// security mechanism and makes no tamper-resistance claim.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHash([u8; 16]);

impl ModuleHash {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// All-zero placeholder, for hand-built test tables.
    pub const fn zero() -> Self {
        Self([0u8; 16])
    }

    /// Hash a canonical encoding of the compiled tables.
    pub fn compute(canonical: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(canonical);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

impl fmt::Debug for ModuleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ModuleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_is_deterministic() {
        let a = ModuleHash::compute(b"canonical table bytes");
        let b = ModuleHash::compute(b"canonical table bytes");
        assert_eq!(a, b);
        assert_ne!(a, ModuleHash::compute(b"different bytes"));
        assert_ne!(a, ModuleHash::zero());
    }

    #[test]
    fn test_hex_rendering() {
        let hash = ModuleHash::from_bytes([0xAB; 16]);
        assert_eq!(hash.to_string(), "ab".repeat(16));
    }
}
