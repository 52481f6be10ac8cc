// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: The slice of current-thread state the vspace code reads and writes
//! OWNERS: @kernel-sched-team
//! PUBLIC API: CurrentThread, ThreadState, Thread
//! DEPENDS_ON: cap::Capability
//! INVARIANTS: The address-space root is read-only here; it changes only at context switch

use crate::cap::Capability;

/// Scheduler-visible state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadState {
    #[default]
    Running,
    /// Resume at the instruction after the invocation once the kernel returns.
    Restart,
    Inactive,
}

/// Interface to the thread executing the current kernel entry.
pub trait CurrentThread {
    /// Capability installed as the thread's address-space root.
    fn vtable_root(&self) -> Capability;
    /// Marks the thread restartable at the end of a successful invocation.
    fn set_restart(&mut self);
}

/// Minimal thread control block.
#[derive(Debug, Clone, Copy, Default)]
pub struct Thread {
    vtable_root: Capability,
    state: ThreadState,
}

impl Thread {
    pub const fn new(vtable_root: Capability) -> Self {
        Self { vtable_root, state: ThreadState::Running }
    }

    pub const fn state(&self) -> ThreadState {
        self.state
    }

    pub fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    /// Installs a new address-space root, as a context switch would.
    pub fn switch_vtable_root(&mut self, root: Capability) {
        self.vtable_root = root;
    }
}

impl CurrentThread for Thread {
    fn vtable_root(&self) -> Capability {
        self.vtable_root
    }

    fn set_restart(&mut self) {
        self.state = ThreadState::Restart;
    }
}
