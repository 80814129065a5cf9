//! Armv7-M EABIHF code

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::arm::RegisterFile;

/// Save the callee-saved registers, SP, LR and the callee-saved FPU
/// registers, for Armv7-M or Armv8-M Mainline EABIHF
///
/// Returns 0. When [`reenter`] is later given the same register file, this
/// returns again, with 1.
///
/// It is a naked function because the compiler must not push anything, or
/// move SP, before we have recorded the caller's registers.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn capture(_registers: *mut RegisterFile) -> u32 {
    core::arch::naked_asm!(r#"
    // Workaround https://github.com/rust-lang/rust/issues/127269
    .fpu vfpv3

    // r4 - r11 go in the first eight words
    stmia   r0!, {{ r4 - r11 }}

    // then SP, and LR as the return site
    mov     r1, sp
    stmia   r0!, {{ r1, lr }}

    // then s16 - s31
    vstmia  r0!, {{ s16 - s31 }}

    // this is the first return
    movs    r0, #0
    bx      lr
    "#);
}

/// Load a register file written by [`capture`] and return from that
/// `capture` a second time
///
/// The stack must already be as it was when the registers were captured, and
/// the FPU must be enabled.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn reenter(_registers: *const RegisterFile) -> ! {
    core::arch::naked_asm!(r#"
    // Workaround https://github.com/rust-lang/rust/issues/127269
    .fpu vfpv3

    ldmia   r0!, {{ r4 - r11 }}

    // r1 = SP, r2 = LR
    ldmia   r0!, {{ r1, r2 }}

    vldmia  r0!, {{ s16 - s31 }}

    mov     sp, r1
    mov     lr, r2

    // this is the second return
    movs    r0, #1
    bx      lr
    "#);
}

// End of File
