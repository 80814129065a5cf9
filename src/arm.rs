//! Contains the [`CortexM`] platform, for Arm M-profile microcontrollers
//!
//! The memory map comes from the linker. `cortex-m-rt` provides `__sdata`,
//! `__edata`, `__sbss`, `__ebss` and `_stack_start`; your `memory.x` must
//! also provide `_stack_limit`, the lowest address the main stack may use:
//!
//! ```text
//! _stack_limit = ORIGIN(RAM) + LENGTH(RAM) - 0x1000;
//! ```

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{
    Continuation, MemoryMap, PeripheralSet, Platform, Region, ScratchStack, StackBounds, asm,
};

unsafe extern "C" {
    static mut __sdata: u32;
    static mut __edata: u32;
    static mut __sbss: u32;
    static mut __ebss: u32;
    static mut _stack_start: u32;
    static mut _stack_limit: u32;
}

/// The registers the AAPCS says a function must preserve
///
/// The layout is shared with the assembly code in `asm`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct RegisterFile {
    /// R4 to R11
    pub callee_saved: [u32; 8],
    /// The stack pointer in the capturing function
    pub sp: u32,
    /// Where the capturing function continues
    pub lr: u32,
    /// S16 to S31
    #[cfg(arm_abi = "eabihf")]
    pub fpu: [u32; 16],
}

impl RegisterFile {
    /// The offset, in bytes, to the `sp` field
    pub(crate) const SP_OFFSET: usize = core::mem::offset_of!(RegisterFile, sp);

    /// The offset, in bytes, to the `lr` field
    pub(crate) const LR_OFFSET: usize = core::mem::offset_of!(RegisterFile, lr);
}

// The assembly stores r4-r11, then SP, then LR
const _: () = assert!(RegisterFile::SP_OFFSET == 32 && RegisterFile::LR_OFFSET == 36);

/// A [`Platform`] for Armv6-M, Armv7-M and Armv8-M
pub struct CortexM<S: PeripheralSet> {
    /// The top of the stack we restore the main stack from
    resume_stack: *mut u32,
    /// The peripherals we carry over a power cycle
    peripherals: S,
}

impl<S: PeripheralSet> CortexM<S> {
    /// Create the platform
    pub fn new<const LEN: usize>(resume_stack: &'static ScratchStack<LEN>, peripherals: S) -> Self {
        CortexM {
            resume_stack: resume_stack.top(),
            peripherals,
        }
    }
}

// SAFETY: the assembly saves and restores everything AAPCS says a callee
// preserves, `capture` is inlined into its caller, and the scratch stack is a
// separate static.
unsafe impl<S: PeripheralSet> Platform for CortexM<S> {
    type Registers = RegisterFile;
    type Peripherals = S::State;

    fn memory_map(&self) -> MemoryMap {
        MemoryMap {
            data: Region::from_bounds(
                (&raw mut __sdata).cast::<u8>(),
                (&raw mut __edata).cast::<u8>(),
            ),
            bss: Region::from_bounds((&raw mut __sbss).cast::<u8>(), (&raw mut __ebss).cast::<u8>()),
            stack: StackBounds::new(
                (&raw mut _stack_limit).cast::<u8>(),
                (&raw mut _stack_start).cast::<u8>(),
            ),
        }
    }

    fn stack_pointer(registers: &RegisterFile) -> *mut u8 {
        registers.sp as usize as *mut u8
    }

    #[inline(always)]
    unsafe fn capture(&mut self, registers: *mut RegisterFile) -> Continuation {
        // SAFETY: the caller promises the register file is writable
        match unsafe { asm::capture(registers) } {
            0 => Continuation::Fresh,
            _ => Continuation::Resumed,
        }
    }

    unsafe fn reenter(&mut self, registers: &RegisterFile) -> ! {
        // We are still in the reset handler, which has not turned the FPU on
        // yet. Give ourselves full access to CP10 and CP11.
        #[cfg(arm_abi = "eabihf")]
        {
            // SAFETY: we are the only code running
            let scb = unsafe { &*cortex_m::peripheral::SCB::PTR };
            unsafe { scb.cpacr.modify(|value| value | (0b1111 << 20)) };
            cortex_m::asm::dsb();
            cortex_m::asm::isb();
        }
        // SAFETY: the caller promises the stack is back as it was
        unsafe { asm::reenter(registers) }
    }

    fn resume_stack(&self) -> *mut u32 {
        self.resume_stack
    }

    unsafe fn switch_stack(
        top: *mut u32,
        f: unsafe extern "C-unwind" fn(*mut ()) -> !,
        arg: *mut (),
    ) -> ! {
        // The checkpoint re-enables interrupts when it leaves its critical
        // section
        cortex_m::interrupt::disable();
        // SAFETY: the caller promises `top` is a good stack
        unsafe { asm::switch_stack(top, f, arg) }
    }

    fn save_peripherals(&mut self) -> S::State {
        self.peripherals.save()
    }

    fn restore_peripherals(&mut self, saved: &S::State) {
        self.peripherals.restore(saved);
    }
}

// End of File
