// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! IA-32 TLB helper issuing `invlpg` and CR3 writes when compiled for the bare-metal target.
//!
//! On any other target every operation is a no-op so the type can still be named by host code.

use super::Tlb;
use crate::types::VirtAddr;

/// TLB helper for the running processor.
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Tlb;

impl X86Tlb {
    pub const fn new() -> Self {
        Self
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use core::arch::asm;

    #[inline(always)]
    pub unsafe fn invlpg(vaddr: u32) {
        asm!("invlpg [{}]", in(reg) vaddr, options(nostack, preserves_flags));
    }

    #[inline(always)]
    pub unsafe fn reload_cr3() {
        asm!(
            "mov {tmp}, cr3",
            "mov cr3, {tmp}",
            tmp = out(reg) _,
            options(nostack, preserves_flags),
        );
    }
}

impl Tlb for X86Tlb {
    fn invalidate_entry(&self, vaddr: VirtAddr) {
        #[cfg(all(target_arch = "x86", target_os = "none"))]
        // SAFETY: invlpg only drops cached state; it never changes memory contents.
        unsafe {
            imp::invlpg(vaddr.raw());
        }
        #[cfg(not(all(target_arch = "x86", target_os = "none")))]
        let _ = vaddr;
    }

    fn flush_all(&self) {
        #[cfg(all(target_arch = "x86", target_os = "none"))]
        // SAFETY: writing CR3 back with its own value keeps the active hierarchy.
        unsafe {
            imp::reload_cr3();
        }
    }

    fn invalidate_paging_structures(&self) {
        // invlpg of any address drops every paging-structure cache entry.
        #[cfg(all(target_arch = "x86", target_os = "none"))]
        // SAFETY: see invalidate_entry.
        unsafe {
            imp::invlpg(0);
        }
    }

    fn reload_root(&self) {
        #[cfg(all(target_arch = "x86", target_os = "none"))]
        // SAFETY: see flush_all.
        unsafe {
            imp::reload_cr3();
        }
    }
}
