// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared host kernel for the integration tests: frame arena, reference derivation tree,
//! recording TLB and one running thread.

#![allow(dead_code)]

use pae_vspace::cap::tree::CapTree;
use pae_vspace::cap::{Capability, DerivationTree, MappedAt};
use pae_vspace::hal::sim::RecordingTlb;
use pae_vspace::layout::PDPT_ENTRIES;
use pae_vspace::mm::arena::FrameArena;
use pae_vspace::mm::boot::BootTables;
use pae_vspace::mm::{copy_global_mappings, Context, Pdpte, PhysMem};
use pae_vspace::syscall::{
    decode_page_directory_invocation, SysResult, LABEL_PAGE_DIRECTORY_MAP,
    LABEL_PAGE_DIRECTORY_UNMAP,
};
use pae_vspace::task::Thread;
use pae_vspace::types::{CapSlot, PAddr, Word};

pub const BOOT_PDS: PAddr = PAddr::new(0x0010_0000);
pub const KERNEL_ROOT: PAddr = PAddr::new(0x0020_0000);
/// Active address space.
pub const ROOT_R: PAddr = PAddr::new(0x0030_0000);
/// Inactive address space.
pub const ROOT_S: PAddr = PAddr::new(0x0030_1000);
pub const PD_T: PAddr = PAddr::new(0x0040_0000);
pub const PD_U: PAddr = PAddr::new(0x0040_1000);

pub const SLOT_R: CapSlot = CapSlot::from_raw(1);
pub const SLOT_S: CapSlot = CapSlot::from_raw(2);
pub const SLOT_T: CapSlot = CapSlot::from_raw(10);
pub const SLOT_U: CapSlot = CapSlot::from_raw(11);
/// Derived copy of the capability in `SLOT_T`.
pub const SLOT_T_CHILD: CapSlot = CapSlot::from_raw(12);

pub const ROOT_R_CAP: Capability = Capability::Pdpt { base: ROOT_R };
pub const ROOT_S_CAP: Capability = Capability::Pdpt { base: ROOT_S };

pub struct Kernel {
    pub mem: FrameArena,
    pub cdt: CapTree,
    pub thread: Thread,
    pub tlb: RecordingTlb,
}

impl Kernel {
    pub fn new() -> Self {
        let mut mem = FrameArena::new();
        let mut boot = Box::new(BootTables::new());
        boot.init(BOOT_PDS);
        mem.add_pdpt(KERNEL_ROOT);
        for index in 0..PDPT_ENTRIES {
            mem.pdpt_mut(KERNEL_ROOT).set(index, boot.pdpt().entry(index));
        }

        let mut cdt = CapTree::new();
        for (slot, root) in [(SLOT_R, ROOT_R), (SLOT_S, ROOT_S)] {
            mem.add_pdpt(root);
            copy_global_mappings(&mut mem, KERNEL_ROOT, root);
            cdt.insert(slot, Capability::Pdpt { base: root }, 0).unwrap();
        }
        for (slot, pd, depth) in [(SLOT_T, PD_T, 1), (SLOT_U, PD_U, 1), (SLOT_T_CHILD, PD_T, 2)] {
            if !mem.contains(pd) {
                mem.add_page_directory(pd);
            }
            cdt.insert(slot, Capability::PageDirectory { base: pd, mapped: None }, depth).unwrap();
        }
        Self { mem, cdt, thread: Thread::new(ROOT_R_CAP), tlb: RecordingTlb::new() }
    }

    pub fn invoke(
        &mut self,
        label: Word,
        slot: CapSlot,
        extra_caps: &[Capability],
        buffer: &[Word],
    ) -> SysResult<()> {
        let mut ctx = Context::new(&mut self.mem, &mut self.cdt, &mut self.thread, &self.tlb);
        decode_page_directory_invocation(&mut ctx, label, buffer.len(), slot, extra_caps, buffer)
    }

    pub fn map(&mut self, slot: CapSlot, root: Capability, vaddr: Word) -> SysResult<()> {
        self.invoke(LABEL_PAGE_DIRECTORY_MAP, slot, &[root], &[vaddr, 0])
    }

    pub fn unmap(&mut self, slot: CapSlot) -> SysResult<()> {
        self.invoke(LABEL_PAGE_DIRECTORY_UNMAP, slot, &[], &[])
    }

    pub fn ctx(&mut self) -> Context<'_> {
        Context::new(&mut self.mem, &mut self.cdt, &mut self.thread, &self.tlb)
    }

    pub fn mapping(&self, slot: CapSlot) -> Option<MappedAt> {
        self.cdt.lookup(slot).and_then(|cte| cte.cap.mapping())
    }

    pub fn entry(&self, root: PAddr, index: usize) -> Pdpte {
        self.mem.pdpt(root).entry(index)
    }
}
