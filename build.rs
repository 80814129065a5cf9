//! Build script for lazarus
//!
//! Emits the `arm_abi` and `arm_architecture` cfgs that select the register
//! capture routines in `src/asm`.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Entry point to the build script
fn main() {
    arm_targets::process();
}

// End of File
