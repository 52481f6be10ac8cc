// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hardware abstraction layer traits.

pub mod sim;
pub mod x86;

use crate::types::VirtAddr;

/// Translation-cache maintenance primitives.
pub trait Tlb {
    /// Drops the cached translation for a single virtual address.
    fn invalidate_entry(&self, vaddr: VirtAddr);
    /// Flushes the entire translation cache.
    fn flush_all(&self);
    /// Drops cached intermediate (non-leaf) paging-structure entries.
    fn invalidate_paging_structures(&self);
    /// Re-writes the translation-root register with its current value.
    fn reload_root(&self);
}
