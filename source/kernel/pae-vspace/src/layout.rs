// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Fixed IA-32 PAE address-space layout
//! OWNERS: @kernel-mm-team
//! PUBLIC API: *_BITS shifts, PPTR_BASE, PADDR_BASE, PPTR_USER_TOP, slot ranges, window helpers
//! INVARIANTS: User top-level slots never overlap the global kernel slots
//!
//! ```text
//!   0x0000_0000 ..  PPTR_USER_TOP      user region (top-level slots 0..USER_PDPT_SLOTS)
//!   PPTR_BASE   ..  0xffff_ffff        kernel window onto PADDR_BASE (global slots)
//! ```

use static_assertions::const_assert;

use crate::types::{PAddr, VirtAddr};

/// log2 of the 4 KiB base page.
pub const PAGE_BITS: u32 = 12;
/// log2 of the number of entries in a third-level table.
pub const PT_BITS: u32 = 9;
/// log2 of the number of entries in a page directory.
pub const PD_BITS: u32 = 9;
/// log2 of the number of entries in the top-level table.
pub const PDPT_BITS: u32 = 2;

/// Region covered by one directory entry (2 MiB).
pub const LARGE_PAGE_BITS: u32 = PAGE_BITS + PT_BITS;
/// Region covered by one top-level entry (1 GiB).
pub const PDPT_REGION_BITS: u32 = PAGE_BITS + PT_BITS + PD_BITS;

/// Width of one hardware entry in bytes.
pub const ENTRY_SIZE_BITS: u32 = 3;
/// Object size of a page directory.
pub const PD_SIZE_BITS: u32 = PD_BITS + ENTRY_SIZE_BITS;
/// Object size of a third-level table.
pub const PT_SIZE_BITS: u32 = PT_BITS + ENTRY_SIZE_BITS;
/// Object size of the top-level table.
pub const PDPT_SIZE_BITS: u32 = PDPT_BITS + ENTRY_SIZE_BITS;

/// Entries per top-level table.
pub const PDPT_ENTRIES: usize = 1 << PDPT_BITS;
/// Entries per page directory.
pub const PD_ENTRIES: usize = 1 << PD_BITS;

/// First virtual address of the kernel window.
pub const PPTR_BASE: u32 = 0xe000_0000;
/// Physical address the kernel window starts at.
pub const PADDR_BASE: u32 = 0x0000_0000;
/// Exclusive ceiling for user mappings.
pub const PPTR_USER_TOP: u32 = 0xe000_0000;

/// Number of top-level slots that user invocations may touch.
pub const USER_PDPT_SLOTS: usize = (PPTR_USER_TOP >> PDPT_REGION_BITS) as usize;
/// First top-level slot belonging to the shared kernel window.
pub const KERNEL_PDPT_FIRST_SLOT: usize = (PPTR_BASE >> PDPT_REGION_BITS) as usize;

/// Width of the spare hardware field that stores the capability depth.
pub const CTE_DEPTH_BITS: u32 = 3;
/// Deepest derivation depth that still fits the spare field.
pub const MAX_CTE_DEPTH: u8 = (1 << CTE_DEPTH_BITS) - 1;

const_assert!(USER_PDPT_SLOTS <= KERNEL_PDPT_FIRST_SLOT);
const_assert!(KERNEL_PDPT_FIRST_SLOT < PDPT_ENTRIES);
const_assert!(PPTR_BASE >= PADDR_BASE);
const_assert!(PPTR_BASE % (1 << LARGE_PAGE_BITS) == 0);
const_assert!(PDPT_REGION_BITS + PDPT_BITS == 32);

/// Returns the top-level slot index covering `vaddr`.
#[inline]
pub const fn pdpt_index(vaddr: VirtAddr) -> usize {
    (vaddr.raw() >> PDPT_REGION_BITS) as usize
}

/// Returns the directory slot index covering `vaddr`.
#[inline]
pub const fn pd_index(vaddr: VirtAddr) -> usize {
    ((vaddr.raw() >> LARGE_PAGE_BITS) & ((1 << PD_BITS) - 1)) as usize
}

/// Returns the third-level slot index covering `vaddr`.
#[inline]
pub const fn pt_index(vaddr: VirtAddr) -> usize {
    ((vaddr.raw() >> PAGE_BITS) & ((1 << PT_BITS) - 1)) as usize
}

/// Rebuilds the virtual address selected by a slot at each level.
#[inline]
pub const fn vaddr_of(pdpt_index: usize, pd_index: usize, pt_index: usize) -> VirtAddr {
    VirtAddr::new(
        ((pdpt_index as u32) << PDPT_REGION_BITS)
            | ((pd_index as u32) << LARGE_PAGE_BITS)
            | ((pt_index as u32) << PAGE_BITS),
    )
}

/// Translates a physical address into its kernel-window pointer value.
#[inline]
pub const fn paddr_to_pptr(paddr: PAddr) -> usize {
    paddr.raw().wrapping_add(PPTR_BASE - PADDR_BASE) as usize
}

/// Translates a kernel-window pointer value back into its physical address.
#[inline]
pub const fn pptr_to_paddr(pptr: usize) -> PAddr {
    PAddr::new((pptr as u32).wrapping_sub(PPTR_BASE - PADDR_BASE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_ranges_split_at_kernel_window() {
        assert_eq!(USER_PDPT_SLOTS, 3);
        assert_eq!(KERNEL_PDPT_FIRST_SLOT, 3);
        assert_eq!(pdpt_index(VirtAddr::new(PPTR_BASE)), KERNEL_PDPT_FIRST_SLOT);
    }

    #[test]
    fn vaddr_of_inverts_indices() {
        let va = VirtAddr::new(0x4123_4000);
        assert_eq!(vaddr_of(pdpt_index(va), pd_index(va), pt_index(va)), va);
    }

    #[test]
    fn window_translation_is_an_offset() {
        let pa = PAddr::new(0x0010_0000);
        assert_eq!(paddr_to_pptr(pa), 0xe010_0000);
        assert_eq!(pptr_to_paddr(paddr_to_pptr(pa)), pa);
    }
}
