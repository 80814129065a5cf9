//! The boot arbiter, which decides between a cold start and a resume
//!
//! Call [`arbitrate`] from the very start of the reset handler, before
//! `.data` and `.bss` are initialised. On the Cortex-M runtime that means a
//! `__pre_init` function:
//!
//! ```rust,ignore
//! #[unsafe(no_mangle)]
//! pub unsafe extern "C" fn __pre_init() {
//!     let snapshot = unsafe { SNAPSHOT.claim() };
//!     if let Ok(engine) = Checkpointer::new(snapshot, CortexM::new(..), StackCapture::Live) {
//!         let _cold = unsafe { lazarus::boot::arbitrate(engine) };
//!     }
//! }
//! ```
//!
//! Nothing in here logs, because the logger lives in RAM we have not set up
//! yet.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{Checkpointer, Platform, Snapshot};

/// Resume from the snapshot if there is one, otherwise hand the engine back
///
/// If this returns, this is a cold start: carry on with the normal start-up
/// code. If it does not, control comes back out of the checkpoint that took
/// the snapshot, and the start-up code never runs (so nor does the
/// initialisation of `.data` and `.bss`).
///
/// # Safety
///
/// Everything in `.data`, `.bss` and on the main stack may be overwritten, so
/// the caller must not be relying on any of it. Any snapshot must have been
/// taken by this same firmware image.
pub unsafe fn arbitrate<'s, P: Platform, const STACK: usize, const DATA: usize, const BSS: usize>(
    engine: Checkpointer<'s, P, STACK, DATA, BSS>,
) -> Checkpointer<'s, P, STACK, DATA, BSS> {
    if engine.has_snapshot() {
        // SAFETY: passed up to our caller
        unsafe { engine.resume() }
    }
    engine
}

/// Should the start-up code initialise `.data` and `.bss`?
///
/// Only if there is no snapshot to resume from. This is for runtimes that ask
/// a pre-init hook, rather than letting it jump away.
pub fn static_init_required<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize>(
    snapshot: &Snapshot<P, STACK, DATA, BSS>,
) -> bool {
    !snapshot.is_valid()
}


// End of File
