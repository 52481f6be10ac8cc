// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Translation walker.
//!
//! Read-only: locates the slot at a given level that would translate a virtual address, or
//! reports the level at which the hierarchy stops.

use core::fmt;

use super::{PageDirectory, PdeKind, PhysMem};
use crate::layout::{pd_index, pdpt_index, pt_index, LARGE_PAGE_BITS, PDPT_REGION_BITS};
use crate::types::{PAddr, VirtAddr};

/// Lookup failure surfaced to the fault-reporting layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFault {
    /// An intermediate level is absent; `bits_left` is the width still unresolved.
    MissingCapability { bits_left: u32 },
}

impl fmt::Display for LookupFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupFault::MissingCapability { bits_left } => {
                write!(f, "missing capability ({bits_left} bits left)")
            }
        }
    }
}

/// A slot in a top-level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdptSlot {
    pub pdpt: PAddr,
    pub index: usize,
}

/// A slot in a page directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdSlot {
    pub pd: PAddr,
    pub index: usize,
}

impl PdSlot {
    pub fn table<'m>(&self, mem: &'m dyn PhysMem) -> &'m PageDirectory {
        mem.page_directory(self.pd)
    }
}

/// A slot in a third-level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtSlot {
    pub pt: PAddr,
    pub index: usize,
}

/// Computes the top-level slot for `vaddr`. Never fails.
#[inline]
pub const fn lookup_pdpt_slot(root: PAddr, vaddr: VirtAddr) -> PdptSlot {
    PdptSlot { pdpt: root, index: pdpt_index(vaddr) }
}

/// Locates the directory slot for `vaddr`.
///
/// The directory slot itself may be absent; only the top-level entry has to be present.
pub fn lookup_pd_slot(
    mem: &dyn PhysMem,
    root: PAddr,
    vaddr: VirtAddr,
) -> Result<PdSlot, LookupFault> {
    let slot = lookup_pdpt_slot(root, vaddr);
    let entry = mem.pdpt(slot.pdpt).entry(slot.index);
    if !entry.present() {
        return Err(LookupFault::MissingCapability { bits_left: PDPT_REGION_BITS });
    }
    Ok(PdSlot { pd: entry.pd_base_address(), index: pd_index(vaddr) })
}

/// Locates the third-level slot for `vaddr`.
///
/// Fails at the directory level when that slot is absent or is a large-page leaf.
pub fn lookup_pt_slot(
    mem: &dyn PhysMem,
    root: PAddr,
    vaddr: VirtAddr,
) -> Result<PtSlot, LookupFault> {
    let pd_slot = lookup_pd_slot(mem, root, vaddr)?;
    match pd_slot.table(mem).entry(pd_slot.index).kind() {
        PdeKind::PageTable(table) => Ok(PtSlot { pt: table.pt_base_address, index: pt_index(vaddr) }),
        PdeKind::Absent | PdeKind::LargePage(_) => {
            Err(LookupFault::MissingCapability { bits_left: LARGE_PAGE_BITS })
        }
    }
}
