// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: TLB and paging-structure-cache consistency after structural changes
//! OWNERS: @kernel-mm-team
//! PUBLIC API: flush_page_small, flush_page_large, flush_all_page_tables,
//!             flush_all_page_directories, flush_page_directory
//! INVARIANTS: Only the hierarchy reachable from the active root is ever invalidated;
//!             leaf changes use single-entry invalidation, non-leaf changes also drop the
//!             paging-structure cache
//!
//! Parent linkage is recovered from the capability mapping records, never from the hardware
//! tables. A table without a mapped capability is unreachable and needs no flush.

use super::Context;
use crate::cap::{CapType, DerivationTree, MappedAt};
use crate::layout::vaddr_of;
use crate::types::PAddr;

fn mapped_at(cdt: &dyn DerivationTree, object: PAddr, cap_type: CapType) -> Option<MappedAt> {
    let slot = cdt.find_with_mapping(object, cap_type.size_bits(), cap_type)?;
    cdt.lookup(slot)?.cap.mapping()
}

/// Flushes one 4 KiB translation after its entry in table `pt` at `index` changed.
pub fn flush_page_small(ctx: &Context<'_>, pt: PAddr, index: usize) {
    let Some(pt_at) = mapped_at(&*ctx.cdt, pt, CapType::PageTable) else {
        return;
    };
    let Some(pd_at) = mapped_at(&*ctx.cdt, pt_at.parent, CapType::PageDirectory) else {
        return;
    };
    if ctx.is_active(pd_at.parent) {
        let vaddr = vaddr_of(pd_at.index, pt_at.index, index);
        log_trace!(target: "mm", "flush small {}", vaddr);
        ctx.tlb.invalidate_entry(vaddr);
    }
}

/// Flushes one 2 MiB translation after its entry in directory `pd` at `index` changed.
pub fn flush_page_large(ctx: &Context<'_>, pd: PAddr, index: usize) {
    let Some(pd_at) = mapped_at(&*ctx.cdt, pd, CapType::PageDirectory) else {
        return;
    };
    if ctx.is_active(pd_at.parent) {
        let vaddr = vaddr_of(pd_at.index, index, 0);
        log_trace!(target: "mm", "flush large {}", vaddr);
        ctx.tlb.invalidate_entry(vaddr);
    }
}

/// Flushes everything below directory `pd` after a table pointer in it changed.
pub fn flush_all_page_tables(ctx: &Context<'_>, pd: PAddr) {
    let Some(pd_at) = mapped_at(&*ctx.cdt, pd, CapType::PageDirectory) else {
        return;
    };
    if ctx.is_active(pd_at.parent) {
        log_trace!(target: "mm", "flush tables under {}", pd);
        ctx.tlb.flush_all();
        ctx.tlb.invalidate_paging_structures();
    }
}

/// Flushes everything below top-level table `pdpt` after one of its slots changed.
pub fn flush_all_page_directories(ctx: &Context<'_>, pdpt: PAddr) {
    if ctx.is_active(pdpt) {
        log_trace!(target: "mm", "flush directories under {}", pdpt);
        ctx.tlb.flush_all();
        ctx.tlb.invalidate_paging_structures();
    }
}

/// Flushes after directory `pd` was removed from `pdpt` at `index`.
///
/// A whole 1 GiB region is gone, so this is a full flush of the owning hierarchy.
pub fn flush_page_directory(ctx: &Context<'_>, pdpt: PAddr, _index: usize, _pd: PAddr) {
    flush_all_page_directories(ctx, pdpt);
}
