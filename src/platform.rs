//! The seam between the portable checkpoint engine and the hardware

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::MemoryMap;

/// What the caller of a checkpoint should do next
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Continuation {
    /// A snapshot was just written. We are still on the same power cycle and
    /// should probably ask to be switched off.
    Fresh,
    /// The snapshot was restored after a power cycle, and we have come back
    /// out of the checkpoint call that took it. Carry on.
    Resumed,
}

/// A set of peripheral registers that is cheap to save and matters across a
/// power cycle
///
/// Anything not in here must be set up again by the start-up code on every
/// boot.
pub trait PeripheralSet {
    /// The saved register values
    type State: Copy;

    /// Read the registers
    fn save(&mut self) -> Self::State;

    /// Write the registers back
    ///
    /// Bits that drive safety-critical outputs must be forced to a safe
    /// default rather than copied, so that restoring them cannot glitch the
    /// outside world.
    fn restore(&mut self, state: &Self::State);
}

/// The architecture-specific half of checkpoint and resume
///
/// # Safety
///
/// Implementations must provide a working continuation:
///
/// * [`Platform::capture`] must store every register the calling convention
///   preserves, including the stack pointer and the return address, and
///   return [`Continuation::Fresh`]. It must be inlined into its caller so
///   that the stack pointer it records belongs to the caller's frame.
/// * [`Platform::reenter`] must load a register file stored by `capture` and
///   make that `capture` call return a second time, with
///   [`Continuation::Resumed`].
/// * [`Platform::resume_stack`] must be the top of a stack that is disjoint
///   from [`MemoryMap::stack`]. It may be in `.bss`, as it is only used after
///   `.bss` has been restored.
/// * [`Platform::memory_map`] must describe every byte of RAM whose value
///   matters across a power cycle.
pub unsafe trait Platform {
    /// The saved register file
    type Registers: Copy;

    /// The peripheral registers we carry across a power cycle
    type Peripherals: Copy;

    /// Describe the RAM to snapshot
    fn memory_map(&self) -> MemoryMap;

    /// Get the stack pointer out of a saved register file
    fn stack_pointer(registers: &Self::Registers) -> *mut u8;

    /// Save the callee-saved registers, stack pointer and return address
    ///
    /// Returns once with [`Continuation::Fresh`], and again with
    /// [`Continuation::Resumed`] for every [`Platform::reenter`] on the
    /// same register file.
    ///
    /// # Safety
    ///
    /// `registers` must be valid for writes. Locals of the calling function
    /// that change between the two returns have indeterminate values after
    /// the second one.
    unsafe fn capture(&mut self, registers: *mut Self::Registers) -> Continuation;

    /// Load a saved register file and return from its `capture` again
    ///
    /// # Safety
    ///
    /// The stack that `registers` refers to must already hold exactly what
    /// it held when they were captured.
    unsafe fn reenter(&mut self, registers: &Self::Registers) -> !;

    /// Get the top of the stack used while the main stack is restored
    fn resume_stack(&self) -> *mut u32;

    /// Move to the stack at `top` and call `f(arg)`
    ///
    /// Interrupts are masked first, and stay masked until the resumed code
    /// leaves its critical section.
    ///
    /// # Safety
    ///
    /// `top` must be the aligned top of an otherwise unused stack, big
    /// enough for `f`.
    unsafe fn switch_stack(
        top: *mut u32,
        f: unsafe extern "C-unwind" fn(*mut ()) -> !,
        arg: *mut (),
    ) -> !;

    /// Read the peripheral registers we carry across a power cycle
    fn save_peripherals(&mut self) -> Self::Peripherals;

    /// Put the peripheral registers back, with safety-critical bits forced
    /// to their safe defaults
    fn restore_peripherals(&mut self, saved: &Self::Peripherals);
}

// End of File
