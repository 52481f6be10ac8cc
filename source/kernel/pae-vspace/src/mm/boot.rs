// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Boot-time page tables built before paging is enabled
//! OWNERS: @kernel-mm-team
//! PUBLIC API: BootTables (init, boot_pde, pdpt), map_it_pd_cap, BootMapError
//! INVARIANTS: Runs with physical addressing only; no capability metadata exists yet.
//!             After init, every 2 MiB region is mapped global/large/rw: identity below
//!             PPTR_BASE, and PPTR_BASE.. onto PADDR_BASE
//!
//! The four directories are laid out back to back, so entry `i` of the flat view lives in
//! directory `i / 512`. The top-level table points at each of them in order.

use core::fmt;

use super::{LargePage, PageDirectory, Pde, Pdpt, Pdpte, PhysMem};
use crate::cap::Capability;
use crate::hal::Tlb;
use crate::layout::{LARGE_PAGE_BITS, PADDR_BASE, PAGE_BITS, PD_ENTRIES, PDPT_ENTRIES, PPTR_BASE};
use crate::types::PAddr;

const EMPTY_DIRECTORY: PageDirectory = PageDirectory::new();

/// Statically sized boot hierarchy: one top-level table plus a directory for every slot.
#[derive(Debug)]
#[repr(C, align(4096))]
pub struct BootTables {
    pds: [PageDirectory; PDPT_ENTRIES],
    pdpt: Pdpt,
}

impl BootTables {
    pub const fn new() -> Self {
        Self { pds: [EMPTY_DIRECTORY; PDPT_ENTRIES], pdpt: Pdpt::new() }
    }

    /// Builds the boot hierarchy. `pds_base` is the physical address of the first directory.
    pub fn init(&mut self, pds_base: PAddr) {
        for i in 0..PDPT_ENTRIES {
            let pd = PAddr::new(pds_base.raw() + ((i as u32) << PAGE_BITS));
            self.pdpt.set(i, Pdpte::new(pd, 0, false, false, true));
        }

        let mut i: u32 = 0;
        while (i << LARGE_PAGE_BITS) < PPTR_BASE {
            self.set_boot_pde(i as usize, boot_large_page(i << LARGE_PAGE_BITS));
            i += 1;
        }

        let window_entries = PPTR_BASE.wrapping_neg() >> LARGE_PAGE_BITS;
        let first = (PPTR_BASE >> LARGE_PAGE_BITS) as usize;
        for i in 0..window_entries {
            let paddr = PADDR_BASE + (i << LARGE_PAGE_BITS);
            self.set_boot_pde(first + i as usize, boot_large_page(paddr));
        }
    }

    /// Entry `i` of the flat view over all boot directories.
    pub fn boot_pde(&self, i: usize) -> Pde {
        self.pds[i / PD_ENTRIES].entry(i % PD_ENTRIES)
    }

    fn set_boot_pde(&mut self, i: usize, entry: Pde) {
        self.pds[i / PD_ENTRIES].set(i % PD_ENTRIES, entry);
    }

    pub fn pdpt(&self) -> &Pdpt {
        &self.pdpt
    }

    pub fn page_directory(&self, index: usize) -> &PageDirectory {
        &self.pds[index]
    }
}

impl Default for BootTables {
    fn default() -> Self {
        Self::new()
    }
}

const fn boot_large_page(paddr: u32) -> Pde {
    Pde::new_large(LargePage {
        page_base_address: PAddr::new(paddr),
        pat: false,
        avl: 0,
        global: true,
        dirty: false,
        accessed: false,
        cache_disabled: false,
        write_through: false,
        super_user: false,
        read_write: true,
        present: true,
    })
}

/// Boot-time installation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMapError {
    /// The capability is not a page directory with a mapping record.
    NotAMappedDirectory,
}

impl fmt::Display for BootMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("capability is not a mapped page directory")
    }
}

/// Writes the initial thread's directory into its top-level table from the capability's
/// mapping record. The record is trusted: boot code created both objects.
pub fn map_it_pd_cap(
    mem: &mut dyn PhysMem,
    tlb: &dyn Tlb,
    pd_cap: &Capability,
) -> Result<(), BootMapError> {
    let Capability::PageDirectory { base, mapped: Some(at) } = *pd_cap else {
        return Err(BootMapError::NotAMappedDirectory);
    };
    mem.pdpt_mut(at.parent).set(at.index, Pdpte::new(base, 0, false, false, true));
    tlb.invalidate_paging_structures();
    log_debug!(target: "boot", "initial pd {} at {}[{}]", base, at.parent, at.index);
    Ok(())
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod image {
    use core::ptr::addr_of_mut;

    use super::BootTables;
    use crate::types::PAddr;

    static mut BOOT_TABLES: BootTables = BootTables::new();

    /// Builds the boot tables in place. Called from the assembly entry before CR0.PG is set.
    ///
    /// # Safety
    ///
    /// Must run exactly once, single-threaded, with physical addressing.
    #[no_mangle]
    pub unsafe extern "C" fn init_boot_pd() {
        let tables = &mut *addr_of_mut!(BOOT_TABLES);
        let pds_base = PAddr::new(addr_of_mut!(tables.pds) as u32);
        tables.init(pds_base);
    }

    /// Physical address of the boot top-level table, the template for global slots.
    pub fn kernel_pdpt_paddr() -> PAddr {
        // SAFETY: only the address is taken; the image is linked at its physical address.
        PAddr::new(unsafe { addr_of_mut!(BOOT_TABLES.pdpt) } as u32)
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use image::{init_boot_pd, kernel_pdpt_paddr};

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;

    use super::*;
    use crate::cap::MappedAt;
    use crate::hal::sim::{RecordingTlb, TlbOp};
    use crate::mm::arena::FrameArena;
    use crate::mm::PdeKind;

    const PDS_BASE: PAddr = PAddr::new(0x0010_0000);

    fn built() -> Box<BootTables> {
        let mut tables = Box::new(BootTables::new());
        tables.init(PDS_BASE);
        tables
    }

    fn large(entry: Pde) -> LargePage {
        match entry.kind() {
            PdeKind::LargePage(page) => page,
            other => panic!("expected large page, got {other:?}"),
        }
    }

    #[test]
    fn top_level_points_at_contiguous_directories() {
        let tables = built();
        for i in 0..PDPT_ENTRIES {
            let entry = tables.pdpt().entry(i);
            assert!(entry.present());
            assert_eq!(entry.pd_base_address().raw(), PDS_BASE.raw() + (i as u32) * 4096);
        }
    }

    #[test]
    fn low_memory_is_identity_mapped() {
        let tables = built();
        for i in [0usize, 1, 511, 512, 1791] {
            let page = large(tables.boot_pde(i));
            assert_eq!(page.page_base_address.raw(), (i as u32) << LARGE_PAGE_BITS);
            assert!(page.global && page.read_write && !page.super_user);
        }
    }

    #[test]
    fn high_window_maps_onto_physical_base() {
        let tables = built();
        let first = (PPTR_BASE >> LARGE_PAGE_BITS) as usize;
        for offset in [0usize, 1, 255] {
            let page = large(tables.boot_pde(first + offset));
            assert_eq!(page.page_base_address.raw(), PADDR_BASE + ((offset as u32) << LARGE_PAGE_BITS));
        }
    }

    #[test]
    fn every_boot_entry_is_present() {
        let tables = built();
        assert!((0..PDPT_ENTRIES * PD_ENTRIES).all(|i| tables.boot_pde(i).present()));
    }

    #[test]
    fn initial_directory_installed_from_record() {
        let root = PAddr::new(0x0800_0000);
        let pd = PAddr::new(0x0800_1000);
        let mut mem = FrameArena::new();
        mem.add_pdpt(root);
        let tlb = RecordingTlb::new();
        let cap = Capability::PageDirectory { base: pd, mapped: Some(MappedAt { parent: root, index: 0 }) };

        map_it_pd_cap(&mut mem, &tlb, &cap).unwrap();

        let entry = mem.pdpt(root).entry(0);
        assert!(entry.present());
        assert_eq!(entry.pd_base_address(), pd);
        assert_eq!(tlb.take(), [TlbOp::InvalidatePagingStructures]);
    }

    #[test]
    fn unmapped_directory_is_refused() {
        let mut mem = FrameArena::new();
        let tlb = RecordingTlb::new();
        let cap = Capability::PageDirectory { base: PAddr::new(0x1000), mapped: None };
        assert_eq!(map_it_pd_cap(&mut mem, &tlb, &cap), Err(BootMapError::NotAMappedDirectory));
        assert!(tlb.is_empty());
    }
}
