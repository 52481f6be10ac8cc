// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: PAE address-space management (codec, walker, mapping engine, TLB consistency)
//! OWNERS: @kernel-mm-team
//! PUBLIC API: PhysMem, Context, page_table::*, walk::*, address_space::*, flush::*, boot::*
//! DEPENDS_ON: cap::DerivationTree, task::CurrentThread, hal::Tlb
//! INVARIANTS: Every structural change to the active hierarchy is followed by the matching
//!             invalidation; inactive hierarchies are never flushed

#[cfg(feature = "failpoints")]
use core::sync::atomic::{AtomicBool, Ordering};

pub mod address_space;
pub mod arena;
pub mod boot;
pub mod flush;
pub mod page_table;
pub mod walk;
pub mod window;

pub use address_space::{
    copy_global_mappings, map_page_directory, unmap_all_page_directories, unmap_page_directory,
    verify_mapping, verify_root, ConsistencyError, MapError,
};
pub use page_table::{LargePage, PageDirectory, PageTableRef, Pde, PdeKind, Pdpt, Pdpte, VmAttributes};
pub use walk::{lookup_pd_slot, lookup_pdpt_slot, lookup_pt_slot, LookupFault, PdSlot, PdptSlot, PtSlot};

use crate::cap::DerivationTree;
use crate::hal::Tlb;
use crate::task::CurrentThread;
use crate::types::PAddr;

/// Physical-address-keyed access to paging structures.
///
/// The hardware implementation goes through the kernel window; the host implementation keeps
/// frames in an ordered map.
pub trait PhysMem {
    fn pdpt(&self, base: PAddr) -> &Pdpt;
    fn pdpt_mut(&mut self, base: PAddr) -> &mut Pdpt;
    fn page_directory(&self, base: PAddr) -> &PageDirectory;
    fn page_directory_mut(&mut self, base: PAddr) -> &mut PageDirectory;
}

/// Collaborators consulted by one kernel entry.
pub struct Context<'a> {
    pub mem: &'a mut dyn PhysMem,
    pub cdt: &'a mut dyn DerivationTree,
    pub thread: &'a mut dyn CurrentThread,
    pub tlb: &'a dyn Tlb,
}

impl<'a> Context<'a> {
    pub fn new(
        mem: &'a mut dyn PhysMem,
        cdt: &'a mut dyn DerivationTree,
        thread: &'a mut dyn CurrentThread,
        tlb: &'a dyn Tlb,
    ) -> Self {
        Self { mem, cdt, thread, tlb }
    }

    /// Top-level table currently loaded into the translation-root register, if the running
    /// thread has a valid root.
    pub fn active_root(&self) -> Option<PAddr> {
        self.thread.vtable_root().vspace_root()
    }

    #[inline]
    pub fn is_active(&self, root: PAddr) -> bool {
        self.active_root() == Some(root)
    }
}

#[cfg(feature = "failpoints")]
static DENY_NEXT_MAP: AtomicBool = AtomicBool::new(false);

#[cfg(feature = "failpoints")]
pub(crate) fn take_map_failpoint() -> bool {
    DENY_NEXT_MAP.swap(false, Ordering::SeqCst)
}

#[cfg(not(feature = "failpoints"))]
#[inline(always)]
pub(crate) fn take_map_failpoint() -> bool {
    false
}

#[cfg(feature = "failpoints")]
pub mod failpoints {
    use super::DENY_NEXT_MAP;
    use core::sync::atomic::Ordering;

    /// Forces the next directory map to fail validation as if its slot were occupied.
    pub fn deny_next_map() {
        DENY_NEXT_MAP.store(true, Ordering::SeqCst);
    }
}


#[cfg(test)]
mod tests_prop;
