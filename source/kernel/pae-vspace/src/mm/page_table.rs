// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! PAE table-entry codec and the two table shapes managed here.
//!
//! Every entry is two 32-bit words. Only the low word carries fields on this kernel; the high
//! word (physical address bits above 4 GiB, XD) is always written as zero. All constructors are
//! `const fn` and touch nothing but their arguments, so boot code can run them before paging is
//! enabled. No range checking happens here: out-of-width values are masked.

use bitflags::bitflags;
use static_assertions::{assert_eq_size, const_assert_eq};

use crate::layout::{PDPT_ENTRIES, PD_ENTRIES};
use crate::types::{PAddr, Word};

const PRESENT_SHIFT: u32 = 0;
const READ_WRITE_SHIFT: u32 = 1;
const SUPER_USER_SHIFT: u32 = 2;
const WRITE_THROUGH_SHIFT: u32 = 3;
const CACHE_DISABLED_SHIFT: u32 = 4;
const ACCESSED_SHIFT: u32 = 5;
const DIRTY_SHIFT: u32 = 6;
const PAGE_SIZE_SHIFT: u32 = 7;
const GLOBAL_SHIFT: u32 = 8;
const AVL_SHIFT: u32 = 9;
const AVL_MASK: u32 = 0x7;
const LARGE_PAT_SHIFT: u32 = 12;

const TABLE_BASE_MASK: u32 = 0xffff_f000;
const LARGE_BASE_MASK: u32 = 0xffe0_0000;

#[inline(always)]
const fn bit(value: bool, shift: u32) -> u32 {
    (value as u32) << shift
}

#[inline(always)]
const fn test(word: u32, shift: u32) -> bool {
    (word >> shift) & 1 != 0
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Caching attributes requested by a map invocation.
    pub struct VmAttributes: Word {
        const WRITE_THROUGH = 1 << 0;
        const CACHE_DISABLED = 1 << 1;
        const PAT = 1 << 2;
    }
}

impl VmAttributes {
    /// Decodes the attributes message word, ignoring unknown bits.
    #[inline]
    pub const fn from_word(word: Word) -> Self {
        Self::from_bits_truncate(word)
    }
}

/// Top-level (page-directory-pointer) table entry.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Pdpte {
    words: [u32; 2],
}

impl Pdpte {
    /// The absent entry: every field zero, including the present bit.
    pub const fn invalid() -> Self {
        Self { words: [0, 0] }
    }

    /// Packs a top-level entry pointing at a page directory.
    pub const fn new(
        pd_base_address: PAddr,
        avl_cte_depth: u32,
        cache_disabled: bool,
        write_through: bool,
        present: bool,
    ) -> Self {
        let word = (pd_base_address.raw() & TABLE_BASE_MASK)
            | ((avl_cte_depth & AVL_MASK) << AVL_SHIFT)
            | bit(cache_disabled, CACHE_DISABLED_SHIFT)
            | bit(write_through, WRITE_THROUGH_SHIFT)
            | bit(present, PRESENT_SHIFT);
        Self { words: [word, 0] }
    }

    pub const fn from_words(words: [u32; 2]) -> Self {
        Self { words }
    }

    pub const fn words(self) -> [u32; 2] {
        self.words
    }

    pub const fn present(self) -> bool {
        test(self.words[0], PRESENT_SHIFT)
    }

    pub const fn pd_base_address(self) -> PAddr {
        PAddr::new(self.words[0] & TABLE_BASE_MASK)
    }

    /// Capability depth stored in the spare (AVL) field.
    pub const fn avl_cte_depth(self) -> u8 {
        ((self.words[0] >> AVL_SHIFT) & AVL_MASK) as u8
    }

    pub const fn cache_disabled(self) -> bool {
        test(self.words[0], CACHE_DISABLED_SHIFT)
    }

    pub const fn write_through(self) -> bool {
        test(self.words[0], WRITE_THROUGH_SHIFT)
    }
}

impl core::fmt::Debug for Pdpte {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Pdpte({:#010x}:{:#010x})", self.words[1], self.words[0])
    }
}

/// Fields of a directory entry that maps a 2 MiB page directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LargePage {
    pub page_base_address: PAddr,
    pub pat: bool,
    pub avl: u32,
    pub global: bool,
    pub dirty: bool,
    pub accessed: bool,
    pub cache_disabled: bool,
    pub write_through: bool,
    pub super_user: bool,
    pub read_write: bool,
    pub present: bool,
}

/// Fields of a directory entry that points at a third-level table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PageTableRef {
    pub pt_base_address: PAddr,
    pub avl: u32,
    pub accessed: bool,
    pub cache_disabled: bool,
    pub write_through: bool,
    pub super_user: bool,
    pub read_write: bool,
    pub present: bool,
}

/// Decoded view of a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PdeKind {
    Absent,
    LargePage(LargePage),
    PageTable(PageTableRef),
}

/// Page-directory entry.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Pde {
    words: [u32; 2],
}

impl Pde {
    pub const fn invalid() -> Self {
        Self { words: [0, 0] }
    }

    /// Packs a 2 MiB leaf. The page-size discriminator is always set.
    pub const fn new_large(page: LargePage) -> Self {
        let word = (page.page_base_address.raw() & LARGE_BASE_MASK)
            | bit(page.pat, LARGE_PAT_SHIFT)
            | ((page.avl & AVL_MASK) << AVL_SHIFT)
            | bit(page.global, GLOBAL_SHIFT)
            | bit(true, PAGE_SIZE_SHIFT)
            | bit(page.dirty, DIRTY_SHIFT)
            | bit(page.accessed, ACCESSED_SHIFT)
            | bit(page.cache_disabled, CACHE_DISABLED_SHIFT)
            | bit(page.write_through, WRITE_THROUGH_SHIFT)
            | bit(page.super_user, SUPER_USER_SHIFT)
            | bit(page.read_write, READ_WRITE_SHIFT)
            | bit(page.present, PRESENT_SHIFT);
        Self { words: [word, 0] }
    }

    /// Packs a pointer to a third-level table. The page-size discriminator is always clear.
    pub const fn new_page_table(table: PageTableRef) -> Self {
        let word = (table.pt_base_address.raw() & TABLE_BASE_MASK)
            | ((table.avl & AVL_MASK) << AVL_SHIFT)
            | bit(table.accessed, ACCESSED_SHIFT)
            | bit(table.cache_disabled, CACHE_DISABLED_SHIFT)
            | bit(table.write_through, WRITE_THROUGH_SHIFT)
            | bit(table.super_user, SUPER_USER_SHIFT)
            | bit(table.read_write, READ_WRITE_SHIFT)
            | bit(table.present, PRESENT_SHIFT);
        Self { words: [word, 0] }
    }

    pub const fn from_words(words: [u32; 2]) -> Self {
        Self { words }
    }

    pub const fn words(self) -> [u32; 2] {
        self.words
    }

    pub const fn present(self) -> bool {
        test(self.words[0], PRESENT_SHIFT)
    }

    pub const fn is_large(self) -> bool {
        test(self.words[0], PAGE_SIZE_SHIFT)
    }

    /// Unpacks the entry according to its discriminator.
    pub const fn kind(self) -> PdeKind {
        let w = self.words[0];
        if !self.present() {
            return PdeKind::Absent;
        }
        if self.is_large() {
            PdeKind::LargePage(LargePage {
                page_base_address: PAddr::new(w & LARGE_BASE_MASK),
                pat: test(w, LARGE_PAT_SHIFT),
                avl: (w >> AVL_SHIFT) & AVL_MASK,
                global: test(w, GLOBAL_SHIFT),
                dirty: test(w, DIRTY_SHIFT),
                accessed: test(w, ACCESSED_SHIFT),
                cache_disabled: test(w, CACHE_DISABLED_SHIFT),
                write_through: test(w, WRITE_THROUGH_SHIFT),
                super_user: test(w, SUPER_USER_SHIFT),
                read_write: test(w, READ_WRITE_SHIFT),
                present: true,
            })
        } else {
            PdeKind::PageTable(PageTableRef {
                pt_base_address: PAddr::new(w & TABLE_BASE_MASK),
                avl: (w >> AVL_SHIFT) & AVL_MASK,
                accessed: test(w, ACCESSED_SHIFT),
                cache_disabled: test(w, CACHE_DISABLED_SHIFT),
                write_through: test(w, WRITE_THROUGH_SHIFT),
                super_user: test(w, SUPER_USER_SHIFT),
                read_write: test(w, READ_WRITE_SHIFT),
                present: true,
            })
        }
    }
}

impl core::fmt::Debug for Pde {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Pde({:#010x}:{:#010x})", self.words[1], self.words[0])
    }
}

/// Top-level table: one entry per 1 GiB.
#[derive(Clone, Debug, PartialEq, Eq)]
#[repr(C, align(32))]
pub struct Pdpt {
    entries: [Pdpte; PDPT_ENTRIES],
}

impl Pdpt {
    pub const fn new() -> Self {
        Self { entries: [Pdpte::invalid(); PDPT_ENTRIES] }
    }

    #[inline]
    pub fn entry(&self, index: usize) -> Pdpte {
        self.entries[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, entry: Pdpte) {
        self.entries[index] = entry;
    }

    pub fn entries(&self) -> &[Pdpte; PDPT_ENTRIES] {
        &self.entries
    }
}

impl Default for Pdpt {
    fn default() -> Self {
        Self::new()
    }
}

/// Second-level table: one entry per 2 MiB.
#[derive(Clone, Debug, PartialEq, Eq)]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [Pde; PD_ENTRIES],
}

impl PageDirectory {
    pub const fn new() -> Self {
        Self { entries: [Pde::invalid(); PD_ENTRIES] }
    }

    #[inline]
    pub fn entry(&self, index: usize) -> Pde {
        self.entries[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, entry: Pde) {
        self.entries[index] = entry;
    }

    /// Zeroes every entry so the frame cannot be misread as live mappings.
    pub fn clear(&mut self) {
        self.entries = [Pde::invalid(); PD_ENTRIES];
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|entry| entry.words() == [0, 0])
    }
}

impl Default for PageDirectory {
    fn default() -> Self {
        Self::new()
    }
}

assert_eq_size!(Pdpte, u64);
assert_eq_size!(Pde, u64);
assert_eq_size!(Pdpt, [u64; PDPT_ENTRIES]);
assert_eq_size!(PageDirectory, [u8; 4096]);
const_assert_eq!(core::mem::align_of::<PageDirectory>(), 4096);
