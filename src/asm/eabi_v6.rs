//! Armv6-M EABI code

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::arm::RegisterFile;

/// Save the callee-saved registers, SP and LR, for Armv6-M or Armv8-M
/// Baseline EABI
///
/// Returns 0. When [`reenter`] is later given the same register file, this
/// returns again, with 1. It uses only the Armv6-M subset instructions, so
/// the high registers go via r1 - r3.
///
/// It is a naked function because the compiler must not push anything, or
/// move SP, before we have recorded the caller's registers.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn capture(_registers: *mut RegisterFile) -> u32 {
    core::arch::naked_asm!(r#"
    // r4 - r7
    stmia   r0!, {{ r4 - r7 }}

    // r8 - r10
    mov     r1, r8
    mov     r2, r9
    mov     r3, r10
    stmia   r0!, {{ r1 - r3 }}

    // r11, then SP, and LR as the return site
    mov     r1, r11
    mov     r2, sp
    mov     r3, lr
    stmia   r0!, {{ r1 - r3 }}

    // this is the first return
    movs    r0, #0
    bx      lr
    "#);
}

/// Load a register file written by [`capture`] and return from that
/// `capture` a second time
///
/// The stack must already be as it was when the registers were captured.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn reenter(_registers: *const RegisterFile) -> ! {
    core::arch::naked_asm!(r#"
    // r8 - r11 first, using r4 - r7 as scratch
    adds    r0, #16
    ldmia   r0!, {{ r4 - r7 }}
    mov     r8, r4
    mov     r9, r5
    mov     r10, r6
    mov     r11, r7

    // r1 = SP, r2 = LR
    ldmia   r0!, {{ r1, r2 }}
    mov     sp, r1
    mov     lr, r2

    // now the real r4 - r7
    subs    r0, #40
    ldmia   r0!, {{ r4 - r7 }}

    // this is the second return
    movs    r0, #1
    bx      lr
    "#);
}

// End of File
