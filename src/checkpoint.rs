//! Contains the [`Checkpointer`] type, which takes and restores snapshots

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::mem::ManuallyDrop;

use crate::{
    Continuation, Error, MemoryMap, Platform, Snapshot,
    log::{debug, info, trace},
    region,
};

/// Anything that can take a checkpoint
///
/// The scheduler only needs this much of the [`Checkpointer`], which keeps it
/// portable.
pub trait Checkpoint {
    /// Save the whole execution context
    ///
    /// Returns [`Continuation::Fresh`] straight away, and may return again
    /// with [`Continuation::Resumed`] after any number of power cycles.
    fn checkpoint(&mut self) -> Continuation;
}

/// How much of the stack a checkpoint saves
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackCapture {
    /// From the stack pointer up to the top of the stack
    #[default]
    Live,
    /// The whole stack region, including the unused part
    ///
    /// Slower, but handy if you want to look at a stack in the snapshot with
    /// a debugger.
    Whole,
}

/// Takes checkpoints, and resumes from them
///
/// The snapshot capacities are:
///
/// * `STACK`: bytes of stack, at least the size of the whole stack
/// * `DATA`: bytes of `.data`
/// * `BSS`: bytes of `.bss`
pub struct Checkpointer<'s, P: Platform, const STACK: usize, const DATA: usize, const BSS: usize>
{
    /// Where snapshots go
    snapshot: &'s mut Snapshot<P, STACK, DATA, BSS>,
    /// The hardware
    platform: P,
    /// The RAM we save, from the platform
    map: MemoryMap,
    /// How much stack we save
    stack_capture: StackCapture,
}

impl<'s, P: Platform, const STACK: usize, const DATA: usize, const BSS: usize>
    Checkpointer<'s, P, STACK, DATA, BSS>
{
    /// Build a checkpoint engine
    ///
    /// Fails if the platform's memory map does not fit in the snapshot.
    pub fn new(
        snapshot: &'s mut Snapshot<P, STACK, DATA, BSS>,
        platform: P,
        stack_capture: StackCapture,
    ) -> Result<Self, Error> {
        let map = platform.memory_map();
        snapshot.check_capacity(&map)?;
        Ok(Checkpointer {
            snapshot,
            platform,
            map,
            stack_capture,
        })
    }

    /// Look at the snapshot
    pub fn snapshot(&self) -> &Snapshot<P, STACK, DATA, BSS> {
        self.snapshot
    }

    /// Is there a snapshot we could resume from?
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_valid()
    }

    /// The RAM that each checkpoint saves
    pub fn memory_map(&self) -> &MemoryMap {
        &self.map
    }

    /// The part of the stack to copy, given the saved stack pointer
    fn stack_span(
        map: &MemoryMap,
        stack_capture: StackCapture,
        registers: &P::Registers,
    ) -> region::Span {
        match stack_capture {
            StackCapture::Live => map.stack.live(P::stack_pointer(registers)),
            StackCapture::Whole => map.stack.whole(),
        }
    }

    /// Restore the snapshot and carry on from the checkpoint that took it
    ///
    /// Control reappears in the last call to [`Checkpoint::checkpoint`],
    /// which returns [`Continuation::Resumed`]. This never returns to its
    /// caller.
    ///
    /// Runs before RAM is initialised, so it does not log.
    ///
    /// # Safety
    ///
    /// There must be a valid snapshot, taken by this same firmware image.
    /// Everything in `.data`, `.bss` and on the main stack will be
    /// overwritten, so the caller must not be relying on any of it.
    pub unsafe fn resume(self) -> ! {
        let Checkpointer {
            snapshot,
            platform,
            map,
            stack_capture,
        } = self;

        snapshot.set_just_checkpointed(false);

        // SAFETY: the caller promises nothing needs the current contents, and
        // the snapshot is not in either region
        unsafe {
            region::restore(map.data, &snapshot.data);
            region::restore(map.bss, &snapshot.bss);
        }

        // We are about to overwrite the stack we are standing on, so the
        // rest happens on the resume stack. The job is moved off this stack
        // before anything is overwritten.
        let top = platform.resume_stack();
        let mut job = ManuallyDrop::new(ResumeJob {
            snapshot: snapshot as *mut Snapshot<P, STACK, DATA, BSS>,
            platform,
            map,
            stack_capture,
        });
        let job_ptr = &raw mut *job as *mut ();
        // SAFETY: the platform promises its resume stack is disjoint from
        // everything we restore
        unsafe { P::switch_stack(top, finish_resume::<P, STACK, DATA, BSS>, job_ptr) }
    }
}

impl<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize> Checkpoint
    for Checkpointer<'_, P, STACK, DATA, BSS>
{
    /// Save the registers, static data, live stack and peripherals into the
    /// snapshot
    ///
    /// Interrupts are masked until the snapshot is complete.
    #[inline(never)]
    fn checkpoint(&mut self) -> Continuation {
        let continuation = critical_section::with(|_cs| {
            self.snapshot.invalidate();

            // SAFETY: the register file is ours to write. Everything we do
            // after this returns `Fresh` is either copying or writing into the
            // snapshot, so nothing the second return relies upon changes.
            let captured = unsafe { self.platform.capture(self.snapshot.registers.as_mut_ptr()) };
            if captured == Continuation::Resumed {
                // resume() has already done the rest. The snapshot we came
                // back from stays on record.
                self.snapshot.validate();
                return Continuation::Resumed;
            }

            // SAFETY: capture() just initialised it
            let registers = unsafe { self.snapshot.registers.assume_init_ref() };
            let span = Self::stack_span(&self.map, self.stack_capture, registers);

            // SAFETY: the regions come from the platform, the snapshot is in
            // none of them, and everything we call from here runs below the
            // captured stack pointer
            unsafe {
                region::save(self.map.data, &mut self.snapshot.data);
                region::save(self.map.bss, &mut self.snapshot.bss);
                region::save_stack(self.map.stack, span, &mut self.snapshot.stack);
            }
            self.snapshot
                .peripherals
                .write(self.platform.save_peripherals());

            self.snapshot.validate();
            self.snapshot.set_just_checkpointed(true);
            trace!("saved {=usize} bytes of stack", span.len);
            Continuation::Fresh
        });

        match continuation {
            Continuation::Fresh => debug!("checkpoint taken"),
            Continuation::Resumed => info!("resumed from checkpoint"),
        }
        debug_assert_eq!(
            continuation == Continuation::Fresh,
            self.snapshot.just_checkpointed()
        );
        continuation
    }
}

/// Everything the second half of [`Checkpointer::resume`] needs, so it can be
/// moved onto the resume stack
struct ResumeJob<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize> {
    snapshot: *mut Snapshot<P, STACK, DATA, BSS>,
    platform: P,
    map: MemoryMap,
    stack_capture: StackCapture,
}

/// Restore the stack, peripherals and registers, and jump back into the
/// checkpoint
///
/// Runs on the resume stack.
///
/// # Safety
///
/// `job` must point to a [`ResumeJob`] which is not used again by anyone
/// else, and whose snapshot is valid.
unsafe extern "C-unwind" fn finish_resume<
    P: Platform,
    const STACK: usize,
    const DATA: usize,
    const BSS: usize,
>(
    job: *mut (),
) -> ! {
    // SAFETY: the caller promises this is a `ResumeJob` we now own. Reading
    // it copies it off the main stack before we overwrite that stack.
    let ResumeJob {
        snapshot,
        mut platform,
        map,
        stack_capture,
    } = unsafe { core::ptr::read(job as *mut ResumeJob<P, STACK, DATA, BSS>) };
    // SAFETY: the snapshot lives in non-volatile memory, not on any stack
    let snapshot = unsafe { &*snapshot };
    // SAFETY: the snapshot is valid, so capture() wrote the registers
    let registers = unsafe { snapshot.registers.assume_init_ref() };

    let span = Checkpointer::<P, STACK, DATA, BSS>::stack_span(&map, stack_capture, registers);
    // SAFETY: we are on the resume stack, not the one being restored
    unsafe {
        region::restore_stack(map.stack, span, &snapshot.stack);
    }

    // SAFETY: written together with the registers
    platform.restore_peripherals(unsafe { snapshot.peripherals.assume_init_ref() });

    // SAFETY: the stack is exactly as it was when the registers were captured
    unsafe { platform.reenter(registers) }
}


// End of File
