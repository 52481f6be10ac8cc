// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host-side TLB that records every maintenance operation instead of performing it.

use alloc::vec::Vec;
use core::cell::RefCell;

use super::Tlb;
use crate::types::VirtAddr;

/// A single recorded maintenance operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbOp {
    InvalidateEntry(VirtAddr),
    FlushAll,
    InvalidatePagingStructures,
    ReloadRoot,
}

/// Recording TLB used by tests and simulations.
#[derive(Debug, Default)]
pub struct RecordingTlb {
    ops: RefCell<Vec<TlbOp>>,
}

impl RecordingTlb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns and clears the recorded operations.
    pub fn take(&self) -> Vec<TlbOp> {
        core::mem::take(&mut *self.ops.borrow_mut())
    }

    pub fn ops(&self) -> Vec<TlbOp> {
        self.ops.borrow().clone()
    }

    pub fn contains(&self, op: TlbOp) -> bool {
        self.ops.borrow().contains(&op)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.borrow().is_empty()
    }

    fn record(&self, op: TlbOp) {
        self.ops.borrow_mut().push(op);
    }
}

impl Tlb for RecordingTlb {
    fn invalidate_entry(&self, vaddr: VirtAddr) {
        self.record(TlbOp::InvalidateEntry(vaddr));
    }

    fn flush_all(&self) {
        self.record(TlbOp::FlushAll);
    }

    fn invalidate_paging_structures(&self) {
        self.record(TlbOp::InvalidatePagingStructures);
    }

    fn reload_root(&self) {
        self.record(TlbOp::ReloadRoot);
    }
}
