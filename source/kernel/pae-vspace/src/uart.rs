// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Minimal 16550 UART (COM1) support for kernel diagnostics.

use core::arch::asm;
use core::fmt::{self, Write};
use spin::Mutex;

/// I/O port base of COM1.
const COM1_BASE: u16 = 0x3f8;
const UART_TX: u16 = 0x0;
const UART_LSR: u16 = 0x5;
const LSR_TX_IDLE: u8 = 1 << 5;

/// Global UART writer used for kernel logs.
static COM1: Mutex<KernelUart> = Mutex::new(KernelUart::new(COM1_BASE));

/// UART implementation capable of formatted writes.
#[derive(Clone, Copy)]
pub struct KernelUart {
    base: u16,
}

impl KernelUart {
    /// Creates a UART abstraction rooted at the I/O port `base`.
    pub const fn new(base: u16) -> Self {
        Self { base }
    }

    /// Returns a guard for the COM1 singleton.
    pub fn lock() -> spin::MutexGuard<'static, KernelUart> {
        COM1.lock()
    }

    fn write_raw(&self, offset: u16, value: u8) {
        // SAFETY: COM1 is owned by the kernel; port reads and writes have no memory effects.
        unsafe {
            while inb(self.base + UART_LSR) & LSR_TX_IDLE == 0 {}
            outb(self.base + offset, value);
        }
    }
}

impl Write for KernelUart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            if byte == b'\n' {
                self.write_raw(UART_TX, b'\r');
            }
            self.write_raw(UART_TX, byte);
        }
        Ok(())
    }
}

#[inline]
unsafe fn inb(port: u16) -> u8 {
    let value: u8;
    asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags));
    value
}

#[inline]
unsafe fn outb(port: u16, value: u8) {
    asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
}
