// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for the reference derivation tree
//! OWNERS: @kernel-cap-team
//! NOTE: Tests only; no kernel logic. Ensures the reverse index never drifts from slot contents.
//!
//! TEST_SCOPE:
//!   - Reverse lookup by (object, depth) after arbitrary inserts
//!   - Mapping-record lookup after arbitrary updates
//!   - Depth is preserved across updates
//!
//! TEST_SCENARIOS:
//!   - find_at_depth_agrees_with_slots(): every hit names a slot holding that object at that depth
//!   - find_with_mapping_only_returns_mapped(): hits always carry a mapping record of the right type
//!   - update_keeps_depth(): replacing a capability leaves the derivation depth untouched

use super::tree::CapTree;
use super::{CapType, Capability, DerivationTree, MappedAt};
use crate::layout::{MAX_CTE_DEPTH, PD_SIZE_BITS, PT_SIZE_BITS};
use crate::types::{CapSlot, PAddr};
use proptest::prelude::*;

fn arb_base() -> impl Strategy<Value = PAddr> {
    (0u32..8).prop_map(|frame| PAddr::new(0x0010_0000 + frame * 0x1000))
}

fn arb_mapping() -> impl Strategy<Value = Option<MappedAt>> {
    prop_oneof![
        Just(None),
        (0u32..4, 0usize..4).prop_map(|(parent, index)| Some(MappedAt {
            parent: PAddr::new(0x0080_0000 + parent * 0x1000),
            index,
        })),
    ]
}

fn arb_table_cap() -> impl Strategy<Value = Capability> {
    prop_oneof![
        (arb_base(), arb_mapping())
            .prop_map(|(base, mapped)| Capability::PageDirectory { base, mapped }),
        (arb_base(), arb_mapping()).prop_map(|(base, mapped)| Capability::PageTable { base, mapped }),
    ]
}

fn build(entries: &[(Capability, u8)]) -> CapTree {
    let mut tree = CapTree::new();
    for (i, (cap, depth)) in entries.iter().enumerate() {
        tree.insert(CapSlot::from_raw(i as u32), *cap, *depth).unwrap();
    }
    tree
}

proptest! {
    #[test]
    fn find_at_depth_agrees_with_slots(
        entries in prop::collection::vec((arb_table_cap(), 0u8..=MAX_CTE_DEPTH), 0..24),
        base in arb_base(),
        depth in 0u8..=MAX_CTE_DEPTH,
    ) {
        let tree = build(&entries);
        let expected = entries
            .iter()
            .position(|(cap, d)| *d == depth && cap.object() == Some(base));
        let found = tree.find_at_depth(base, PD_SIZE_BITS, depth);
        prop_assert_eq!(found.is_some(), expected.is_some());
        if let Some(slot) = found {
            let cte = tree.lookup(slot).unwrap();
            prop_assert_eq!(cte.depth, depth);
            prop_assert_eq!(cte.cap.object(), Some(base));
        }
    }

    #[test]
    fn find_with_mapping_only_returns_mapped(
        entries in prop::collection::vec((arb_table_cap(), 0u8..=MAX_CTE_DEPTH), 0..24),
        base in arb_base(),
    ) {
        let tree = build(&entries);
        let any_mapped = entries.iter().any(|(cap, _)| {
            cap.cap_type() == CapType::PageTable && cap.object() == Some(base) && cap.mapping().is_some()
        });
        match tree.find_with_mapping(base, PT_SIZE_BITS, CapType::PageTable) {
            Some(slot) => {
                let cap = tree.lookup(slot).unwrap().cap;
                prop_assert_eq!(cap.cap_type(), CapType::PageTable);
                prop_assert!(cap.mapping().is_some());
            }
            None => prop_assert!(!any_mapped),
        }
    }

    #[test]
    fn update_keeps_depth(
        cap in arb_table_cap(),
        depth in 0u8..=MAX_CTE_DEPTH,
        mapped in arb_mapping(),
    ) {
        let mut tree = CapTree::new();
        let slot = CapSlot::from_raw(7);
        tree.insert(slot, cap, depth).unwrap();
        tree.update(slot, cap.with_mapping(mapped)).unwrap();
        let cte = tree.lookup(slot).unwrap();
        prop_assert_eq!(cte.depth, depth);
        prop_assert_eq!(cte.cap.mapping(), mapped);
    }
}
