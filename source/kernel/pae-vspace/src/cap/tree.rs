// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Reference derivation tree.
//!
//! Slots live in an ordered map; a secondary `(object, size_bits, depth, slot)` index answers both
//! reverse lookups in O(log n) without consulting the hardware tables.

use alloc::collections::{BTreeMap, BTreeSet};

use super::{CapError, CapType, Capability, Cte, DerivationTree};
use crate::layout::MAX_CTE_DEPTH;
use crate::types::{CapSlot, PAddr};

type IndexKey = (PAddr, u32, u8, CapSlot);

const SLOT_MIN: CapSlot = CapSlot::from_raw(0);
const SLOT_MAX: CapSlot = CapSlot::from_raw(u32::MAX);

/// Ordered capability store implementing [`DerivationTree`].
#[derive(Debug, Default)]
pub struct CapTree {
    slots: BTreeMap<CapSlot, Cte>,
    index: BTreeSet<IndexKey>,
}

impl CapTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `cap` into a free slot at the given derivation depth.
    pub fn insert(&mut self, slot: CapSlot, cap: Capability, depth: u8) -> Result<(), CapError> {
        if depth > MAX_CTE_DEPTH {
            return Err(CapError::DepthOverflow);
        }
        if self.slots.contains_key(&slot) {
            return Err(CapError::InvalidSlot);
        }
        let cte = Cte { cap, depth };
        if let Some(key) = index_key(slot, &cte) {
            self.index.insert(key);
        }
        self.slots.insert(slot, cte);
        Ok(())
    }

    /// Deletes the entry at `slot`, returning it.
    pub fn remove(&mut self, slot: CapSlot) -> Option<Cte> {
        let cte = self.slots.remove(&slot)?;
        if let Some(key) = index_key(slot, &cte) {
            self.index.remove(&key);
        }
        Some(cte)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CapSlot, &Cte)> {
        self.slots.iter().map(|(slot, cte)| (*slot, cte))
    }
}

fn index_key(slot: CapSlot, cte: &Cte) -> Option<IndexKey> {
    let object = cte.cap.object()?;
    Some((object, cte.cap.cap_type().size_bits(), cte.depth, slot))
}

impl DerivationTree for CapTree {
    fn lookup(&self, slot: CapSlot) -> Option<Cte> {
        self.slots.get(&slot).copied()
    }

    /// Prefers a sibling that carries a mapping record; copies at the same depth share a key.
    fn find_at_depth(&self, object: PAddr, size_bits: u32, depth: u8) -> Option<CapSlot> {
        let mut first = None;
        for &(_, _, _, slot) in
            self.index.range((object, size_bits, depth, SLOT_MIN)..=(object, size_bits, depth, SLOT_MAX))
        {
            if self.slots.get(&slot).is_some_and(|cte| cte.cap.mapping().is_some()) {
                return Some(slot);
            }
            first.get_or_insert(slot);
        }
        first
    }

    fn find_with_mapping(
        &self,
        object: PAddr,
        size_bits: u32,
        cap_type: CapType,
    ) -> Option<CapSlot> {
        self.index
            .range((object, size_bits, 0, SLOT_MIN)..=(object, size_bits, MAX_CTE_DEPTH, SLOT_MAX))
            .map(|&(_, _, _, slot)| slot)
            .find(|slot| {
                self.slots.get(slot).is_some_and(|cte| {
                    cte.cap.cap_type() == cap_type && cte.cap.mapping().is_some()
                })
            })
    }

    fn update(&mut self, slot: CapSlot, cap: Capability) -> Result<(), CapError> {
        let cte = self.slots.get_mut(&slot).ok_or(CapError::InvalidSlot)?;
        if let Some(key) = index_key(slot, cte) {
            self.index.remove(&key);
        }
        cte.cap = cap;
        if let Some(key) = index_key(slot, cte) {
            self.index.insert(key);
        }
        Ok(())
    }
}
