// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Invocation errors, labels and message access for address-space invocations
//! OWNERS: @kernel-team
//! PUBLIC API: SyscallError (code), SysResult, InvocationLabel, get_syscall_arg,
//!             page_directory::decode_page_directory_invocation
//! DEPENDS_ON: mm::MapError
//! INVARIANTS: Stable error numbering; every failure is reported before any state changes

pub mod page_directory;

use core::fmt;

use crate::mm::MapError;
use crate::types::Word;

pub use page_directory::decode_page_directory_invocation;

/// Result type used by invocation decoders.
pub type SysResult<T> = Result<T, SyscallError>;

/// Error reported to the invoking thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// Message argument `index` is out of range.
    InvalidArgument { index: usize },
    /// Capability argument `index` has the wrong type or state.
    InvalidCapability { index: usize },
    /// The label names no operation on this object.
    IllegalOperation,
    /// Fewer message words or capabilities than the operation needs.
    TruncatedMessage,
    /// The target slot must be emptied first.
    DeleteFirst,
}

impl SyscallError {
    /// Numeric code as seen by user level.
    pub const fn code(self) -> Word {
        match self {
            SyscallError::InvalidArgument { .. } => 1,
            SyscallError::InvalidCapability { .. } => 2,
            SyscallError::IllegalOperation => 3,
            SyscallError::TruncatedMessage => 7,
            SyscallError::DeleteFirst => 8,
        }
    }
}

impl From<MapError> for SyscallError {
    fn from(value: MapError) -> Self {
        match value {
            MapError::AlreadyMapped | MapError::UnknownSlot => {
                SyscallError::InvalidCapability { index: 0 }
            }
            MapError::InvalidRoot => SyscallError::InvalidCapability { index: 1 },
            MapError::AddressTooHigh => SyscallError::InvalidArgument { index: 0 },
            MapError::SlotOccupied => SyscallError::DeleteFirst,
        }
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Public invocation labels.
pub const LABEL_PAGE_DIRECTORY_MAP: Word = 1;
pub const LABEL_PAGE_DIRECTORY_UNMAP: Word = 2;

/// Decoded invocation label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationLabel {
    PageDirectoryMap,
    PageDirectoryUnmap,
    Unknown(Word),
}

impl InvocationLabel {
    pub const fn from_word(label: Word) -> Self {
        match label {
            LABEL_PAGE_DIRECTORY_MAP => InvocationLabel::PageDirectoryMap,
            LABEL_PAGE_DIRECTORY_UNMAP => InvocationLabel::PageDirectoryUnmap,
            other => InvocationLabel::Unknown(other),
        }
    }
}

/// Returns message word `index`, or `TruncatedMessage` if the buffer is shorter.
#[inline]
pub fn get_syscall_arg(index: usize, buffer: &[Word]) -> SysResult<Word> {
    buffer.get(index).copied().ok_or(SyscallError::TruncatedMessage)
}
