//! Holds the [`Snapshot`] type, which lives in non-volatile memory

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::{Error, MemoryMap, Platform, error::RegionKind};

/// The value of [`Snapshot::valid`] when a snapshot is complete
///
/// Anything else means "no snapshot". Using a magic word rather than a flag
/// means that non-volatile memory which has never been written reads as
/// invalid.
const VALID_MAGIC: u32 = 0x1A2A_2055;

/// The value of [`Snapshot::just_checkpointed`] between a fresh checkpoint
/// and the power going off
const CHECKPOINTED_MAGIC: u32 = 0xC4EC_4B01;

/// One complete copy of the execution context
///
/// The buffer sizes are build-time capacities:
///
/// * `STACK` must be at least the size of the whole stack
/// * `DATA` must be at least the size of `.data`
/// * `BSS` must be at least the size of `.bss`
///
/// [`Checkpointer::new`](crate::Checkpointer::new) refuses to use a snapshot
/// that is too small.
///
/// This must be placed in memory that survives power loss, and must not be
/// part of `.data` or `.bss`. Wrap it in a [`SnapshotStore`] to put it in a
/// `static`.
#[repr(C)]
pub struct Snapshot<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize> {
    /// Equal to [`VALID_MAGIC`] iff everything below was fully written
    valid: AtomicU32,
    /// Equal to [`CHECKPOINTED_MAGIC`] from a fresh checkpoint until a resume
    just_checkpointed: AtomicU32,
    /// The register file, including the stack pointer and return site
    pub(crate) registers: MaybeUninit<P::Registers>,
    /// The peripheral registers
    pub(crate) peripherals: MaybeUninit<P::Peripherals>,
    /// A copy of `.data`
    pub(crate) data: [u8; DATA],
    /// A copy of `.bss`
    pub(crate) bss: [u8; BSS],
    /// The live part of the stack, at its offset from the bottom of the stack
    pub(crate) stack: [u8; STACK],
}

impl<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize>
    Snapshot<P, STACK, DATA, BSS>
{
    /// Make an empty, invalid snapshot
    pub const fn new() -> Self {
        Self {
            valid: AtomicU32::new(0),
            just_checkpointed: AtomicU32::new(0),
            registers: MaybeUninit::uninit(),
            peripherals: MaybeUninit::uninit(),
            data: [0; DATA],
            bss: [0; BSS],
            stack: [0; STACK],
        }
    }

    /// Does this hold a complete snapshot?
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire) == VALID_MAGIC
    }

    /// Was a checkpoint taken on this power cycle, with no resume since?
    ///
    /// This reads `true` right after [`checkpoint`](crate::Checkpoint::checkpoint)
    /// returns normally, and `false` right after it returns through a resume.
    pub fn just_checkpointed(&self) -> bool {
        self.just_checkpointed.load(Ordering::Acquire) == CHECKPOINTED_MAGIC
    }

    /// Check that a memory map fits in our buffers
    pub fn check_capacity(&self, map: &MemoryMap) -> Result<(), Error> {
        let checks = [
            (RegionKind::Data, map.data.len(), DATA),
            (RegionKind::Bss, map.bss.len(), BSS),
            (RegionKind::Stack, map.stack.len(), STACK),
        ];
        for (region, needed, capacity) in checks {
            if needed > capacity {
                return Err(Error::SnapshotTooSmall {
                    region,
                    needed,
                    capacity,
                });
            }
        }
        Ok(())
    }

    /// Mark the snapshot as incomplete, before anything in it is changed
    pub(crate) fn invalidate(&self) {
        self.valid.store(0, Ordering::Release);
        // keep the compiler from moving snapshot writes above the store
        core::sync::atomic::compiler_fence(Ordering::SeqCst);
    }

    /// Mark the snapshot as complete, after everything in it is written
    pub(crate) fn validate(&self) {
        core::sync::atomic::compiler_fence(Ordering::SeqCst);
        self.valid.store(VALID_MAGIC, Ordering::Release);
    }

    /// Set or clear the "just checkpointed" flag
    pub(crate) fn set_just_checkpointed(&self, value: bool) {
        let word = if value { CHECKPOINTED_MAGIC } else { 0 };
        self.just_checkpointed.store(word, Ordering::Release);
    }
}

impl<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize> Default
    for Snapshot<P, STACK, DATA, BSS>
{
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Snapshot`] that can live in a `static`
///
/// ```rust,ignore
/// #[unsafe(link_section = ".snapshot")]
/// static SNAPSHOT: SnapshotStore<MyPlatform, 2048, 1024, 1024> = SnapshotStore::new();
/// ```
///
/// The section must be in non-volatile memory, and should not be zeroed or
/// loaded at start-up.
pub struct SnapshotStore<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize> {
    /// The memory reserved for the snapshot
    contents: UnsafeCell<Snapshot<P, STACK, DATA, BSS>>,
}

impl<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize>
    SnapshotStore<P, STACK, DATA, BSS>
{
    /// Create a new store
    pub const fn new() -> Self {
        Self {
            contents: UnsafeCell::new(Snapshot::new()),
        }
    }

    /// Get the snapshot out of the store
    ///
    /// # Safety
    ///
    /// Only one reference returned by this function may be in use at any
    /// time. In practice: claim it once in the boot arbiter (which either
    /// never returns, or drops it) and once in `main`.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn claim(&'static self) -> &'static mut Snapshot<P, STACK, DATA, BSS> {
        // SAFETY: the caller promises there are no other live references
        unsafe { &mut *self.contents.get() }
    }
}

impl<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize> Default
    for SnapshotStore<P, STACK, DATA, BSS>
{
    fn default() -> Self {
        SnapshotStore::new()
    }
}

/// SAFETY: Our store only hands out its contents through the unsafe
/// [`SnapshotStore::claim`], whose caller promises to keep it unique.
unsafe impl<P: Platform, const STACK: usize, const DATA: usize, const BSS: usize> Sync
    for SnapshotStore<P, STACK, DATA, BSS>
{
}


// End of File
