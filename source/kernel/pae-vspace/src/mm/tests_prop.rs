// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for the PAE codec and directory mapping engine
//! OWNERS: @kernel-mm-team
//! NOTE: Tests only; no kernel logic. Random operation sequences against the host collaborators.
//!
//! TEST_SCOPE:
//!   - Codec fields never bleed into each other
//!   - Mutual exclusion and record/hardware agreement under map/unmap/unmap-all sequences
//!   - Global slots survive every operation
//!   - Flush decisions follow the active root
//!
//! TEST_SCENARIOS:
//!   - pdpte_fields_are_independent(): packing then reading returns each masked field
//!   - large_pde_fields_are_independent(): same for 2 MiB leaves, discriminator always set
//!   - random_sequences_keep_invariants(): after every step each directory is mapped at most
//!     once, records match hardware, and kernel slots equal the template
//!   - flushes_follow_active_root(): a successful map flushes iff its root is active

use alloc::vec::Vec;

use proptest::prelude::*;

use super::address_space::{unmap_all_page_directories, verify_mapping, verify_root, MapError};
use super::tests::{pd_base, pd_slot, root_cap, World, KERNEL_ROOT, PD_COUNT, ROOTS};
use super::{LargePage, Pde, PdeKind, Pdpte, PhysMem, VmAttributes};
use crate::hal::sim::TlbOp;
use crate::layout::{KERNEL_PDPT_FIRST_SLOT, PDPT_ENTRIES, USER_PDPT_SLOTS};
use crate::types::PAddr;

#[derive(Debug, Clone, Copy)]
enum Op {
    Map { pd: usize, root: usize, vaddr: u32, attr: u32 },
    Unmap { pd: usize },
    UnmapAllAndTeardown { root: usize },
    Switch { root: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..PD_COUNT, 0..ROOTS.len(), any::<u32>(), 0u32..8)
            .prop_map(|(pd, root, vaddr, attr)| Op::Map { pd, root, vaddr, attr }),
        3 => (0..PD_COUNT).prop_map(|pd| Op::Unmap { pd }),
        1 => (0..ROOTS.len()).prop_map(|root| Op::UnmapAllAndTeardown { root }),
        1 => (0..ROOTS.len()).prop_map(|root| Op::Switch { root }),
    ]
}

fn apply(w: &mut World, op: Op) {
    match op {
        Op::Map { pd, root, vaddr, attr } => {
            let _ = w.map_with(pd, &root_cap(root), vaddr, VmAttributes::from_word(attr));
        }
        Op::Unmap { pd } => w.unmap(pd).unwrap(),
        Op::UnmapAllAndTeardown { root } => {
            unmap_all_page_directories(&mut w.ctx(), ROOTS[root]);
            for index in 0..USER_PDPT_SLOTS {
                w.mem.pdpt_mut(ROOTS[root]).set(index, Pdpte::invalid());
            }
        }
        Op::Switch { root } => w.thread.switch_vtable_root(root_cap(root)),
    }
}

fn check_invariants(w: &mut World) -> Result<(), TestCaseError> {
    let kernel = w.mem.pdpt(KERNEL_ROOT).clone();
    let mut claims: Vec<PAddr> = Vec::new();
    for (r, root) in ROOTS.iter().enumerate() {
        for index in KERNEL_PDPT_FIRST_SLOT..PDPT_ENTRIES {
            prop_assert_eq!(w.entry(r, index), kernel.entry(index));
        }
        for index in 0..USER_PDPT_SLOTS {
            let entry = w.mem.pdpt(*root).entry(index);
            if entry.present() {
                claims.push(entry.pd_base_address());
            }
        }
        prop_assert_eq!(verify_root(&w.ctx(), *root), Ok(()));
    }
    for pd in 0..PD_COUNT {
        let hits = claims.iter().filter(|base| **base == pd_base(pd)).count();
        prop_assert!(hits <= 1);
        prop_assert_eq!(hits == 1, w.mapping(pd).is_some());
        prop_assert_eq!(verify_mapping(&w.ctx(), pd_slot(pd)), Ok(()));
    }
    Ok(())
}

proptest! {
    #[test]
    fn pdpte_fields_are_independent(
        base in any::<u32>(),
        depth in any::<u32>(),
        cd in any::<bool>(),
        wt in any::<bool>(),
        present in any::<bool>(),
    ) {
        let e = Pdpte::new(PAddr::new(base), depth, cd, wt, present);
        prop_assert_eq!(e.pd_base_address().raw(), base & 0xffff_f000);
        prop_assert_eq!(u32::from(e.avl_cte_depth()), depth & 0x7);
        prop_assert_eq!(e.cache_disabled(), cd);
        prop_assert_eq!(e.write_through(), wt);
        prop_assert_eq!(e.present(), present);
        prop_assert_eq!(e.words()[1], 0);
    }

    #[test]
    fn large_pde_fields_are_independent(
        base in any::<u32>(),
        avl in 0u32..8,
        flags in any::<[bool; 8]>(),
    ) {
        let page = LargePage {
            page_base_address: PAddr::new(base & 0xffe0_0000),
            pat: flags[0],
            avl,
            global: flags[1],
            dirty: flags[2],
            accessed: flags[3],
            cache_disabled: flags[4],
            write_through: flags[5],
            super_user: flags[6],
            read_write: flags[7],
            present: true,
        };
        let e = Pde::new_large(page);
        prop_assert!(e.is_large());
        prop_assert_eq!(e.kind(), PdeKind::LargePage(page));
    }

    #[test]
    fn random_sequences_keep_invariants(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut w = World::new();
        for op in ops {
            apply(&mut w, op);
            check_invariants(&mut w)?;
        }
    }

    #[test]
    fn flushes_follow_active_root(
        pd in 0..PD_COUNT,
        root in 0..ROOTS.len(),
        active in 0..ROOTS.len(),
        vaddr in 0u32..0xc000_0000,
    ) {
        let mut w = World::new();
        w.thread.switch_vtable_root(root_cap(active));
        prop_assert_eq!(w.map(pd, root, vaddr), Ok(()));
        let ops = w.tlb.take();
        if root == active {
            prop_assert!(ops.contains(&TlbOp::InvalidatePagingStructures));
            prop_assert!(ops.contains(&TlbOp::ReloadRoot));
        } else {
            prop_assert!(ops.is_empty());
        }
        prop_assert_eq!(w.map(pd, root, vaddr), Err(MapError::AlreadyMapped));
    }
}
