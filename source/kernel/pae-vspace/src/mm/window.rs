// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Paging structures reached through the kernel's high virtual window.

use super::{PageDirectory, Pdpt, PhysMem};
use crate::layout::paddr_to_pptr;
use crate::types::PAddr;

/// [`PhysMem`] backed by the live kernel window (`PPTR_BASE` onto `PADDR_BASE`).
#[derive(Debug)]
pub struct KernelWindow {
    _private: (),
}

impl KernelWindow {
    /// # Safety
    ///
    /// Paging must be active with the kernel window mapped, and every address later handed to
    /// this accessor must name a live, correctly typed paging structure that no other reference
    /// aliases for the duration of the borrow.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PhysMem for KernelWindow {
    fn pdpt(&self, base: PAddr) -> &Pdpt {
        // SAFETY: upheld by the contract of `KernelWindow::new`.
        unsafe { &*(paddr_to_pptr(base) as *const Pdpt) }
    }

    fn pdpt_mut(&mut self, base: PAddr) -> &mut Pdpt {
        // SAFETY: upheld by the contract of `KernelWindow::new`.
        unsafe { &mut *(paddr_to_pptr(base) as *mut Pdpt) }
    }

    fn page_directory(&self, base: PAddr) -> &PageDirectory {
        // SAFETY: upheld by the contract of `KernelWindow::new`.
        unsafe { &*(paddr_to_pptr(base) as *const PageDirectory) }
    }

    fn page_directory_mut(&mut self, base: PAddr) -> &mut PageDirectory {
        // SAFETY: upheld by the contract of `KernelWindow::new`.
        unsafe { &mut *(paddr_to_pptr(base) as *mut PageDirectory) }
    }
}
