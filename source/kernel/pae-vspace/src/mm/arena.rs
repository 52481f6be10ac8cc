// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host-side physical memory: typed frames keyed by physical address.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;

use super::{PageDirectory, Pdpt, PhysMem};
use crate::types::PAddr;

#[derive(Debug)]
enum Frame {
    Pdpt(Box<Pdpt>),
    Directory(Box<PageDirectory>),
}

/// [`PhysMem`] for simulations and tests.
///
/// # Panics
///
/// Accessors panic when the address was never registered or holds the other table type; on
/// hardware the same mistake would silently corrupt memory.
#[derive(Debug, Default)]
pub struct FrameArena {
    frames: BTreeMap<PAddr, Frame>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty top-level table at `base`. Returns false if the frame is taken.
    pub fn add_pdpt(&mut self, base: PAddr) -> bool {
        self.add(base, Frame::Pdpt(Box::new(Pdpt::new())))
    }

    /// Registers a zeroed page directory at `base`. Returns false if the frame is taken.
    pub fn add_page_directory(&mut self, base: PAddr) -> bool {
        self.add(base, Frame::Directory(Box::new(PageDirectory::new())))
    }

    pub fn contains(&self, base: PAddr) -> bool {
        self.frames.contains_key(&base)
    }

    fn add(&mut self, base: PAddr, frame: Frame) -> bool {
        if self.frames.contains_key(&base) {
            return false;
        }
        self.frames.insert(base, frame);
        true
    }
}

impl PhysMem for FrameArena {
    fn pdpt(&self, base: PAddr) -> &Pdpt {
        match self.frames.get(&base) {
            Some(Frame::Pdpt(table)) => &**table,
            _ => panic!("no top-level table at {base}"),
        }
    }

    fn pdpt_mut(&mut self, base: PAddr) -> &mut Pdpt {
        match self.frames.get_mut(&base) {
            Some(Frame::Pdpt(table)) => &mut **table,
            _ => panic!("no top-level table at {base}"),
        }
    }

    fn page_directory(&self, base: PAddr) -> &PageDirectory {
        match self.frames.get(&base) {
            Some(Frame::Directory(pd)) => &**pd,
            _ => panic!("no page directory at {base}"),
        }
    }

    fn page_directory_mut(&mut self, base: PAddr) -> &mut PageDirectory {
        match self.frames.get_mut(&base) {
            Some(Frame::Directory(pd)) => &mut **pd,
            _ => panic!("no page directory at {base}"),
        }
    }
}
