// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Paging-object capabilities and the derivation-tree contract used by the vspace code
//! OWNERS: @kernel-cap-team
//! PUBLIC API: Capability, CapType, MappedAt, Cte, DerivationTree, CapError, tree::CapTree
//! DEPENDS_ON: types::{PAddr, CapSlot}, layout
//! INVARIANTS: A table capability's mapping record is the single source of truth for where the
//!             table is plugged in; it is only ever changed through DerivationTree::update

pub mod tree;

#[cfg(test)]
mod tests_prop;

use core::fmt;

use crate::layout::{PDPT_SIZE_BITS, PD_SIZE_BITS, PT_SIZE_BITS};
use crate::types::{CapSlot, PAddr};

/// Where a table is currently plugged in: parent table base and slot within it.
///
/// Non-owning: neither side keeps the other alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedAt {
    pub parent: PAddr,
    pub index: usize,
}

/// Capability type tags relevant to address-space management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapType {
    Null,
    PageTable,
    PageDirectory,
    Pdpt,
}

impl CapType {
    /// log2 of the object size the capability denotes.
    pub const fn size_bits(self) -> u32 {
        match self {
            CapType::Null => 0,
            CapType::PageTable => PT_SIZE_BITS,
            CapType::PageDirectory => PD_SIZE_BITS,
            CapType::Pdpt => PDPT_SIZE_BITS,
        }
    }
}

/// Capability value as stored in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capability {
    #[default]
    Null,
    /// Third-level table.
    PageTable { base: PAddr, mapped: Option<MappedAt> },
    /// Second-level table (page directory).
    PageDirectory { base: PAddr, mapped: Option<MappedAt> },
    /// Address-space root.
    Pdpt { base: PAddr },
}

impl Capability {
    pub const fn cap_type(&self) -> CapType {
        match self {
            Capability::Null => CapType::Null,
            Capability::PageTable { .. } => CapType::PageTable,
            Capability::PageDirectory { .. } => CapType::PageDirectory,
            Capability::Pdpt { .. } => CapType::Pdpt,
        }
    }

    /// Physical base of the denoted object, if any.
    pub const fn object(&self) -> Option<PAddr> {
        match *self {
            Capability::Null => None,
            Capability::PageTable { base, .. }
            | Capability::PageDirectory { base, .. }
            | Capability::Pdpt { base } => Some(base),
        }
    }

    pub const fn mapping(&self) -> Option<MappedAt> {
        match *self {
            Capability::PageTable { mapped, .. } | Capability::PageDirectory { mapped, .. } => {
                mapped
            }
            _ => None,
        }
    }

    /// Returns a copy with the mapping record replaced. Types without a record are unchanged.
    #[must_use]
    pub const fn with_mapping(self, mapped: Option<MappedAt>) -> Self {
        match self {
            Capability::PageTable { base, .. } => Capability::PageTable { base, mapped },
            Capability::PageDirectory { base, .. } => Capability::PageDirectory { base, mapped },
            other => other,
        }
    }

    pub const fn is_vtable_root(&self) -> bool {
        matches!(self, Capability::Pdpt { .. })
    }

    /// Roots have no further validity conditions on this architecture.
    pub const fn is_valid_vtable_root(&self) -> bool {
        self.is_vtable_root()
    }

    /// Returns the top-level table base if this capability is a usable address-space root.
    pub const fn vspace_root(&self) -> Option<PAddr> {
        match *self {
            Capability::Pdpt { base } => Some(base),
            _ => None,
        }
    }
}

/// Capability table entry: the capability plus its depth in the derivation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cte {
    pub cap: Capability,
    pub depth: u8,
}

/// Errors produced by derivation-tree updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapError {
    /// Provided slot is invalid.
    InvalidSlot,
    /// Depth does not fit the hardware spare field.
    DepthOverflow,
}

impl fmt::Display for CapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapError::InvalidSlot => f.write_str("invalid capability slot"),
            CapError::DepthOverflow => f.write_str("derivation depth exceeds spare field"),
        }
    }
}

/// Query and update contract of the capability derivation tree.
pub trait DerivationTree {
    /// Returns the entry stored at `slot`.
    fn lookup(&self, slot: CapSlot) -> Option<Cte>;

    /// Reverse lookup by object address and the depth recorded in a hardware entry.
    fn find_at_depth(&self, object: PAddr, size_bits: u32, depth: u8) -> Option<CapSlot>;

    /// Finds the capability of type `cap_type` for `object` that carries a mapping record.
    fn find_with_mapping(&self, object: PAddr, size_bits: u32, cap_type: CapType)
        -> Option<CapSlot>;

    /// Replaces the capability stored at `slot`, keeping its depth.
    fn update(&mut self, slot: CapSlot, cap: Capability) -> Result<(), CapError>;
}
