//! Appropriate assembly language routines for the architecture

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(all(
    arm_abi = "eabi",
    any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")
))]
mod eabi_v6;

#[cfg(all(
    arm_abi = "eabi",
    any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")
))]
pub(crate) use eabi_v6::{capture, reenter};

#[cfg(all(
    arm_abi = "eabi",
    not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))
))]
mod eabi;

#[cfg(all(
    arm_abi = "eabi",
    not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))
))]
pub(crate) use eabi::{capture, reenter};

#[cfg(arm_abi = "eabihf")]
mod eabihf;

#[cfg(arm_abi = "eabihf")]
pub(crate) use eabihf::{capture, reenter};

/// Set SP to `top`, then call `f(arg)`
///
/// The same on every Arm M-profile architecture. `f` must not return.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_stack(
    _top: *mut u32,
    _f: unsafe extern "C-unwind" fn(*mut ()) -> !,
    _arg: *mut (),
) -> ! {
    core::arch::naked_asm!(r#"
    mov     sp, r0
    mov     r0, r2
    blx     r1

    // f does not return
    udf     #0
    "#);
}

// End of File
