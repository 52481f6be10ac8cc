// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page-directory invocations: `Map` and `Unmap`.
//!
//! Decode, then check, then execute. Every rejection is reported before the mapping engine writes
//! anything; on success the invoking thread is marked restartable.

use super::{get_syscall_arg, InvocationLabel, SysResult, SyscallError};
use crate::cap::Capability;
use crate::mm::{map_page_directory, unmap_page_directory, Context, VmAttributes};
use crate::types::{CapSlot, VirtAddr, Word};

#[derive(Copy, Clone)]
struct MapArgsTyped {
    vaddr: VirtAddr,
    attr: VmAttributes,
    root: Capability,
}

impl MapArgsTyped {
    #[inline]
    fn decode(length: usize, extra_caps: &[Capability], buffer: &[Word]) -> SysResult<Self> {
        let Some(root) = extra_caps.first().copied() else {
            return Err(SyscallError::TruncatedMessage);
        };
        if length < 2 {
            return Err(SyscallError::TruncatedMessage);
        }
        Ok(Self {
            vaddr: VirtAddr::new(get_syscall_arg(0, buffer)?),
            attr: VmAttributes::from_word(get_syscall_arg(1, buffer)?),
            root,
        })
    }
}

/// Entry point for invocations on a page-directory capability held in `slot`.
///
/// `length` is the message length in words, `buffer` the message words and `extra_caps` the
/// additional capability arguments (the address-space root for `Map`).
pub fn decode_page_directory_invocation(
    ctx: &mut Context<'_>,
    label: Word,
    length: usize,
    slot: CapSlot,
    extra_caps: &[Capability],
    buffer: &[Word],
) -> SysResult<()> {
    let res = match InvocationLabel::from_word(label) {
        InvocationLabel::PageDirectoryUnmap => {
            unmap_page_directory(ctx, slot).map_err(SyscallError::from)
        }
        InvocationLabel::PageDirectoryMap => {
            MapArgsTyped::decode(length, extra_caps, buffer).and_then(|args| {
                map_page_directory(ctx, slot, &args.root, args.vaddr, args.attr)
                    .map_err(|err| {
                        log_warn!(target: "syscall", "page directory map: {}", err);
                        SyscallError::from(err)
                    })
            })
        }
        InvocationLabel::Unknown(other) => {
            log_warn!(target: "syscall", "page directory: illegal operation {:#x}", other);
            Err(SyscallError::IllegalOperation)
        }
    };
    match res {
        Ok(()) => {
            ctx.thread.set_restart();
            Ok(())
        }
        Err(SyscallError::TruncatedMessage) => {
            log_warn!(target: "syscall", "page directory: truncated message");
            Err(SyscallError::TruncatedMessage)
        }
        Err(err) => Err(err),
    }
}
