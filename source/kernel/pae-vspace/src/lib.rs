// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: IA-32 PAE virtual address-space management for the capability kernel
//! OWNERS: @kernel-mm-team
//! PUBLIC API: mm (codec, walker, mapping engine, flush), cap, syscall, hal::Tlb, task
//! DEPENDS_ON: bitflags, spin (serial sink), static_assertions
//! INVARIANTS: Hardware slots and capability mapping records never disagree after an invocation;
//!             the global kernel window is identical in every top-level table

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), forbid(clippy::unwrap_used))]

extern crate alloc;

#[macro_use]
pub mod diag;

pub mod cap;
pub mod hal;
pub mod layout;
pub mod mm;
pub mod syscall;
pub mod task;
pub mod types;

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod uart;
