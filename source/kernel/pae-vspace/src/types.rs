// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Newtypes for physical/virtual addresses and capability slots
//! OWNERS: @kernel-team
//! PUBLIC API: Word, PAddr, VirtAddr, CapSlot
//! INVARIANTS: Addresses are 32-bit machine words; physical and virtual never mix implicitly

use core::fmt;

/// Native machine word of the 32-bit target.
pub type Word = u32;

/// Physical address as seen by the page-table hardware.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct PAddr(u32);

impl PAddr {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns true if the low `bits` bits are clear.
    #[inline]
    pub const fn is_aligned(self, bits: u32) -> bool {
        self.0 & ((1u32 << bits) - 1) == 0
    }
}

impl fmt::Debug for PAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PAddr({:#010x})", self.0)
    }
}

impl fmt::Display for PAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Virtual address inside a 32-bit address space.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct VirtAddr(u32);

impl VirtAddr {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Clears the low `bits` bits.
    #[inline]
    pub const fn align_down(self, bits: u32) -> Self {
        Self(self.0 & !((1u32 << bits) - 1))
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Capability slot (CTE) identifier.
///
/// **Invariant**: a slot names exactly one entry in the derivation tree; its depth lives with
/// the entry, not in the identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct CapSlot(u32);

impl CapSlot {
    /// Creates a capability slot from a raw value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw slot index.
    #[inline]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CapSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

impl From<u32> for CapSlot {
    #[inline]
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
