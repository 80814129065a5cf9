//! Holds the [`ScratchStack`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::cell::UnsafeCell;

/// Somewhere to stand while the main stack is rewritten
///
/// A resume copies the saved stack back over the main stack, so it cannot be
/// running on the main stack at the time. It moves to one of these first,
/// with interrupts off, and never comes back to it.
///
/// `LEN` is in bytes. It must be a multiple of 8 and at least
/// [`ScratchStack::MIN_LEN`], both checked at compile time when the stack is a
/// `static`. The restore routines and the peripheral restore run here, and a
/// few hundred bytes covers them.
///
/// Nothing on it outlives the resume, so it can go in `.bss`.
#[repr(align(8))]
pub struct ScratchStack<const LEN: usize> {
    /// Only ever touched through [`ScratchStack::top`]
    contents: UnsafeCell<[u8; LEN]>,
}

impl<const LEN: usize> ScratchStack<LEN> {
    /// The smallest scratch stack we accept
    pub const MIN_LEN: usize = 64;

    /// Reserve a scratch stack
    pub const fn new() -> Self {
        assert!(LEN.is_multiple_of(8), "scratch stack must be 8-byte sized");
        assert!(LEN >= Self::MIN_LEN, "scratch stack too small");
        Self {
            contents: UnsafeCell::new([0u8; LEN]),
        }
    }

    /// The initial stack pointer: one past the highest byte, 8-byte aligned
    pub const fn top(&self) -> *mut u32 {
        // SAFETY: one past the end of the same allocation. The stack is full
        // descending, so nothing is ever stored at `top` itself.
        unsafe { self.contents.get().add(1) as *mut u32 }
    }
}

/// SAFETY: only a raw pointer ever escapes, and only a resume writes
/// through it, with interrupts off.
unsafe impl<const LEN: usize> Sync for ScratchStack<LEN> {}

impl<const LEN: usize> Default for ScratchStack<LEN> {
    fn default() -> Self {
        ScratchStack::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_is_one_past_the_end_and_aligned() {
        let stack = ScratchStack::<64>::new();
        let base = stack.contents.get() as usize;
        assert_eq!(stack.top() as usize, base + 64);
        assert_eq!(stack.top() as usize % 8, 0);
    }

    #[test]
    fn static_scratch_stack_is_aligned() {
        static STACK: ScratchStack<128> = ScratchStack::new();
        assert_eq!(STACK.top() as usize % 8, 0);
        assert_eq!(core::mem::size_of_val(&STACK), 128);
    }

    #[test]
    #[should_panic(expected = "scratch stack too small")]
    fn tiny_scratch_stack_is_refused() {
        let _stack = ScratchStack::<8>::new();
    }
}

// End of File
