// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Installing and removing page directories in top-level tables
//! OWNERS: @kernel-mm-team
//! PUBLIC API: map_page_directory, unmap_page_directory, unmap_all_page_directories,
//!             copy_global_mappings, verify_mapping, verify_root, MapError, ConsistencyError
//! DEPENDS_ON: mm::{page_table, flush, walk}, cap::DerivationTree, hal::Tlb
//! INVARIANTS: All validation precedes the first write; after a successful map the capability
//!             record and the hardware slot name each other; global slots are never written
//!             except by copy_global_mappings

use core::fmt;

use super::flush::flush_page_directory;
use super::walk::lookup_pdpt_slot;
use super::{Context, PdeKind, Pdpte, PhysMem, VmAttributes};
use crate::cap::{CapError, CapType, Capability, MappedAt};
use crate::layout::{
    KERNEL_PDPT_FIRST_SLOT, PDPT_ENTRIES, PDPT_REGION_BITS, PD_SIZE_BITS, PPTR_USER_TOP,
    USER_PDPT_SLOTS,
};
use crate::types::{CapSlot, PAddr, VirtAddr};

/// Reasons a directory map is refused. Nothing has been written when one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// The directory is already plugged into some top-level slot.
    AlreadyMapped,
    /// The supplied root is not a top-level table capability.
    InvalidRoot,
    /// The target address is at or above the user ceiling.
    AddressTooHigh,
    /// The target top-level slot is already present or holds the global kernel entry.
    SlotOccupied,
    /// The invoking slot does not hold a page-directory capability.
    UnknownSlot,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MapError::AlreadyMapped => "page directory is already mapped to a pdpt",
            MapError::InvalidRoot => "root is not a valid vspace root",
            MapError::AddressTooHigh => "mapping address too high",
            MapError::SlotOccupied => "pdpt slot already present",
            MapError::UnknownSlot => "slot holds no page directory",
        };
        f.write_str(msg)
    }
}

impl From<CapError> for MapError {
    fn from(_: CapError) -> Self {
        MapError::UnknownSlot
    }
}

/// Disagreement between a capability mapping record and the hardware tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyError {
    /// The slot holds no capability.
    MissingCapability(CapSlot),
    /// The record names a parent slot that is absent.
    EntryAbsent { parent: PAddr, index: usize },
    /// The record names a parent slot pointing somewhere else.
    EntryMismatch { parent: PAddr, index: usize, expected: PAddr, found: PAddr },
    /// A present user slot has no capability claiming it.
    Unowned { parent: PAddr, index: usize },
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyError::MissingCapability(slot) => write!(f, "no capability in slot {slot}"),
            ConsistencyError::EntryAbsent { parent, index } => {
                write!(f, "{parent}[{index}] absent but recorded as mapped")
            }
            ConsistencyError::EntryMismatch { parent, index, expected, found } => {
                write!(f, "{parent}[{index}] points at {found}, expected {expected}")
            }
            ConsistencyError::Unowned { parent, index } => {
                write!(f, "{parent}[{index}] present without an owner")
            }
        }
    }
}

fn directory_base(cap: &Capability) -> Result<PAddr, MapError> {
    match *cap {
        Capability::PageDirectory { base, .. } => Ok(base),
        _ => Err(MapError::UnknownSlot),
    }
}

/// Plugs the directory held in `slot` into `root_cap`'s top-level table at `vaddr`.
///
/// `vaddr` must lie below the user ceiling and is truncated to its 1 GiB region, which must be a
/// free user slot. The hardware entry records the derivation depth of `slot`, the capability that
/// is being updated, so the owner can later be found from the entry alone.
pub fn map_page_directory(
    ctx: &mut Context<'_>,
    slot: CapSlot,
    root_cap: &Capability,
    vaddr: VirtAddr,
    attr: VmAttributes,
) -> Result<(), MapError> {
    let cte = ctx.cdt.lookup(slot).ok_or(MapError::UnknownSlot)?;
    let pd = directory_base(&cte.cap)?;

    if ctx.cdt.find_with_mapping(pd, PD_SIZE_BITS, CapType::PageDirectory).is_some() {
        return Err(MapError::AlreadyMapped);
    }
    let root = root_cap.vspace_root().ok_or(MapError::InvalidRoot)?;
    if vaddr.raw() >= PPTR_USER_TOP {
        return Err(MapError::AddressTooHigh);
    }
    let target = lookup_pdpt_slot(root, vaddr.align_down(PDPT_REGION_BITS));
    // The region below PPTR_USER_TOP in the last slot belongs to the global kernel entry.
    if target.index >= USER_PDPT_SLOTS
        || ctx.mem.pdpt(target.pdpt).entry(target.index).present()
    {
        return Err(MapError::SlotOccupied);
    }
    if super::take_map_failpoint() {
        return Err(MapError::SlotOccupied);
    }

    let entry = Pdpte::new(
        pd,
        u32::from(cte.depth),
        attr.contains(VmAttributes::CACHE_DISABLED),
        attr.contains(VmAttributes::WRITE_THROUGH),
        true,
    );
    let mapped = MappedAt { parent: target.pdpt, index: target.index };
    ctx.cdt.update(slot, cte.cap.with_mapping(Some(mapped)))?;
    ctx.mem.pdpt_mut(target.pdpt).set(target.index, entry);
    log_debug!(target: "mm", "map pd {} at {}[{}] depth={}", pd, root, target.index, cte.depth);

    if ctx.is_active(root) {
        ctx.tlb.reload_root();
        ctx.tlb.invalidate_paging_structures();
    }
    verify_after(ctx, slot);
    Ok(())
}

/// Removes the directory held in `slot` from wherever it is plugged in.
///
/// A directory that is not mapped is left alone. On removal the directory's contents are zeroed
/// so the frame cannot be misread as live entries later.
pub fn unmap_page_directory(ctx: &mut Context<'_>, slot: CapSlot) -> Result<(), MapError> {
    let cte = ctx.cdt.lookup(slot).ok_or(MapError::UnknownSlot)?;
    let pd = directory_base(&cte.cap)?;
    let Some(at) = cte.cap.mapping() else {
        return Ok(());
    };

    clear_pdpt_slot(ctx, at.parent, at.index);
    flush_page_directory(ctx, at.parent, at.index, pd);
    ctx.mem.page_directory_mut(pd).clear();
    ctx.cdt.update(slot, cte.cap.with_mapping(None))?;
    log_debug!(target: "mm", "unmap pd {} from {}[{}]", pd, at.parent, at.index);
    verify_after(ctx, slot);
    Ok(())
}

/// Marks `pdpt[index]` absent, reloading the root when `pdpt` is active.
fn clear_pdpt_slot(ctx: &mut Context<'_>, pdpt: PAddr, index: usize) {
    ctx.mem.pdpt_mut(pdpt).set(index, Pdpte::invalid());
    if ctx.is_active(pdpt) {
        ctx.tlb.reload_root();
    }
}

/// Disowns every directory plugged into the user slots of `root`.
///
/// Only the capability records change, and only records naming a slot of `root` are cleared.
/// Hardware entries stay as they are: callers pair this with tearing the table down, and must
/// not reuse or activate `root` before it is zeroed.
pub fn unmap_all_page_directories(ctx: &mut Context<'_>, root: PAddr) {
    for index in 0..USER_PDPT_SLOTS {
        let entry = ctx.mem.pdpt(root).entry(index);
        if !entry.present() {
            continue;
        }
        let pd = entry.pd_base_address();
        let Some(owner) = ctx.cdt.find_at_depth(pd, PD_SIZE_BITS, entry.avl_cte_depth()) else {
            log_error!(target: "mm", "{}[{}] -> {} has no owner", root, index, pd);
            continue;
        };
        let Some(cte) = ctx.cdt.lookup(owner) else {
            log_error!(target: "mm", "{}[{}] owner {} vanished", root, index, owner);
            continue;
        };
        let here = MappedAt { parent: root, index };
        if cte.cap.mapping() != Some(here) {
            log_error!(target: "mm", "{}[{}] owner {} is recorded elsewhere", root, index, owner);
            continue;
        }
        if let Err(err) = ctx.cdt.update(owner, cte.cap.with_mapping(None)) {
            log_error!(target: "mm", "disown {} failed: {}", owner, err);
        }
    }
    log_debug!(target: "mm", "disowned user directories of {}", root);
}

/// Copies the global kernel slots of `kernel_root` into `new_root`.
///
/// Must run before `new_root` is first activated. User slots of `new_root` are left untouched.
pub fn copy_global_mappings(mem: &mut dyn PhysMem, kernel_root: PAddr, new_root: PAddr) {
    let kernel = mem.pdpt(kernel_root).clone();
    let target = mem.pdpt_mut(new_root);
    for index in KERNEL_PDPT_FIRST_SLOT..PDPT_ENTRIES {
        target.set(index, kernel.entry(index));
    }
}

/// Checks that the mapping record of the table capability in `slot` matches the hardware.
pub fn verify_mapping(ctx: &Context<'_>, slot: CapSlot) -> Result<(), ConsistencyError> {
    let cte = ctx.cdt.lookup(slot).ok_or(ConsistencyError::MissingCapability(slot))?;
    let (Some(expected), Some(at)) = (cte.cap.object(), cte.cap.mapping()) else {
        return Ok(());
    };
    let found = match cte.cap.cap_type() {
        CapType::PageDirectory => {
            let entry = ctx.mem.pdpt(at.parent).entry(at.index);
            entry.present().then_some(entry.pd_base_address())
        }
        CapType::PageTable => match ctx.mem.page_directory(at.parent).entry(at.index).kind() {
            PdeKind::PageTable(table) => Some(table.pt_base_address),
            PdeKind::Absent | PdeKind::LargePage(_) => None,
        },
        CapType::Null | CapType::Pdpt => return Ok(()),
    };
    match found {
        None => Err(ConsistencyError::EntryAbsent { parent: at.parent, index: at.index }),
        Some(found) if found != expected => Err(ConsistencyError::EntryMismatch {
            parent: at.parent,
            index: at.index,
            expected,
            found,
        }),
        Some(_) => Ok(()),
    }
}

/// Checks that every present user slot of `root` is claimed by exactly the capability the
/// entry's recorded depth leads to.
pub fn verify_root(ctx: &Context<'_>, root: PAddr) -> Result<(), ConsistencyError> {
    for index in 0..USER_PDPT_SLOTS {
        let entry = ctx.mem.pdpt(root).entry(index);
        if !entry.present() {
            continue;
        }
        let pd = entry.pd_base_address();
        let owner = ctx
            .cdt
            .find_at_depth(pd, PD_SIZE_BITS, entry.avl_cte_depth())
            .and_then(|slot| ctx.cdt.lookup(slot));
        match owner.and_then(|cte| cte.cap.mapping()) {
            Some(at) if at == (MappedAt { parent: root, index }) => {}
            _ => return Err(ConsistencyError::Unowned { parent: root, index }),
        }
    }
    Ok(())
}

#[cfg(feature = "debug_pt_verify")]
fn verify_after(ctx: &Context<'_>, slot: CapSlot) {
    if let Err(err) = verify_mapping(ctx, slot) {
        log_error!(target: "pt", "PT-VERIFY: {}", err);
    }
}

#[cfg(not(feature = "debug_pt_verify"))]
#[inline(always)]
fn verify_after(_ctx: &Context<'_>, _slot: CapSlot) {}
