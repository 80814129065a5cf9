//! Descriptors for the RAM we snapshot, and the routines that copy it

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Stacks are saved and restored in whole words
const WORD: usize = core::mem::size_of::<u32>();

/// A contiguous block of RAM
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    base: *mut u8,
    len: usize,
}

impl Region {
    /// Describe `len` bytes starting at `base`
    pub const fn new(base: *mut u8, len: usize) -> Region {
        Region { base, len }
    }

    /// Describe the bytes from `low` up to (but not including) `high`
    ///
    /// This is how linker symbols usually describe a section. If `high` is
    /// below `low` the region is empty.
    pub fn from_bounds(low: *mut u8, high: *mut u8) -> Region {
        Region {
            base: low,
            len: (high as usize).saturating_sub(low as usize),
        }
    }

    /// The first byte of the region
    pub const fn base(&self) -> *mut u8 {
        self.base
    }

    /// The size of the region, in bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Is the region zero bytes long?
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The bounds of a full-descending stack
///
/// The stack pointer starts at `high` and moves towards `low`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StackBounds {
    low: *mut u8,
    high: *mut u8,
}

impl StackBounds {
    /// Describe a stack occupying `low..high`
    pub const fn new(low: *mut u8, high: *mut u8) -> StackBounds {
        StackBounds { low, high }
    }

    /// The lowest address the stack may grow down to
    pub const fn low(&self) -> *mut u8 {
        self.low
    }

    /// The initial stack pointer
    pub const fn high(&self) -> *mut u8 {
        self.high
    }

    /// The size of the whole stack, in bytes
    pub fn len(&self) -> usize {
        (self.high as usize).saturating_sub(self.low as usize)
    }

    /// Is the stack zero bytes long?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The part of the stack in use when the stack pointer is `sp`
    ///
    /// The span runs from `sp` (rounded down to a word, and clamped to the
    /// stack) up to the top of the stack. Its offset is measured from the
    /// bottom of the stack, so it can be stored at the same offset in a
    /// stack-sized buffer and put back at the same absolute address.
    pub fn live(&self, sp: *mut u8) -> Span {
        let low = self.low as usize;
        let high = self.high as usize;
        let sp = (sp as usize).clamp(low, high);
        let offset = (sp - low) & !(WORD - 1);
        Span {
            offset,
            len: self.len() - offset,
        }
    }

    /// The whole stack, used or not
    pub fn whole(&self) -> Span {
        Span {
            offset: 0,
            len: self.len(),
        }
    }
}

/// A slice of a [`StackBounds`], as an offset from its lowest address
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Span {
    /// Bytes from the bottom of the stack to the start of the span
    pub offset: usize,
    /// Bytes in the span
    pub len: usize,
}

/// Everything in RAM that a snapshot covers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryMap {
    /// Initialised static data (`.data`)
    pub data: Region,
    /// Zero-initialised static data (`.bss`)
    pub bss: Region,
    /// The stack that the scheduler runs on
    pub stack: StackBounds,
}

/// Copy a region into the front of a snapshot buffer
///
/// # Safety
///
/// The region must be valid for reads, and must not overlap `buffer`.
///
/// # Panics
///
/// If the buffer is smaller than the region. The checkpoint engine checks
/// this once when it is built, so it cannot happen there.
pub(crate) unsafe fn save(region: Region, buffer: &mut [u8]) {
    let dest = &mut buffer[..region.len];
    // SAFETY: the caller promises the source is readable and disjoint from
    // the destination, which we have bounds-checked.
    unsafe {
        core::ptr::copy_nonoverlapping(region.base, dest.as_mut_ptr(), region.len);
    }
}

/// Copy the front of a snapshot buffer back over a region
///
/// # Safety
///
/// The region must be valid for writes, must not overlap `buffer`, and
/// nothing may be relying on its current contents.
///
/// # Panics
///
/// If the buffer is smaller than the region.
pub(crate) unsafe fn restore(region: Region, buffer: &[u8]) {
    let src = &buffer[..region.len];
    // SAFETY: the caller promises the destination is writable, unused and
    // disjoint from the source, which we have bounds-checked.
    unsafe {
        core::ptr::copy_nonoverlapping(src.as_ptr(), region.base, region.len);
    }
}

/// Copy part of a stack into the same offset of a snapshot buffer
///
/// # Safety
///
/// The stack must be valid for reads and must not overlap `buffer`. The
/// caller must be running below `span`, or on another stack entirely.
pub(crate) unsafe fn save_stack(stack: StackBounds, span: Span, buffer: &mut [u8]) {
    let dest = &mut buffer[span.offset..span.offset + span.len];
    // SAFETY: the caller's promises, plus `span` being inside `stack`
    // (see `StackBounds::live`).
    unsafe {
        let src = stack.low.add(span.offset);
        core::ptr::copy_nonoverlapping(src, dest.as_mut_ptr(), span.len);
    }
}

/// Copy part of a snapshot buffer back onto the stack it came from
///
/// # Safety
///
/// The stack must be valid for writes and must not overlap `buffer`. The
/// caller must not be running on the stack being overwritten.
pub(crate) unsafe fn restore_stack(stack: StackBounds, span: Span, buffer: &[u8]) {
    let src = &buffer[span.offset..span.offset + span.len];
    // SAFETY: the caller's promises, plus `span` being inside `stack`.
    unsafe {
        let dest = stack.low.add(span.offset);
        core::ptr::copy_nonoverlapping(src.as_ptr(), dest, span.len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sixty-four word-aligned bytes of pretend stack
    struct FakeStack {
        _words: Box<[u32; 16]>,
        base: *mut u8,
    }

    impl FakeStack {
        fn new() -> FakeStack {
            let mut words = Box::new([0u32; 16]);
            let base = words.as_mut_ptr() as *mut u8;
            FakeStack {
                _words: words,
                base,
            }
        }

        fn bounds(&self) -> StackBounds {
            StackBounds::new(self.base, unsafe { self.base.add(64) })
        }

        fn bytes(&mut self) -> &mut [u8] {
            unsafe { core::slice::from_raw_parts_mut(self.base, 64) }
        }
    }

    #[test]
    fn region_from_bounds() {
        let mut memory = [0u8; 32];
        let range = memory.as_mut_ptr_range();
        let region = Region::from_bounds(range.start, range.end);
        assert_eq!(region.len(), 32);
        assert_eq!(region.base(), range.start);

        let backwards = Region::from_bounds(range.end, range.start);
        assert!(backwards.is_empty());
    }

    #[test]
    fn live_span_is_word_aligned() {
        let fake = FakeStack::new();
        let stack = fake.bounds();
        assert_eq!(stack.len(), 64);
        // 9 bytes in rounds down to 8
        let span = stack.live(unsafe { stack.low().add(9) });
        assert_eq!(span, Span { offset: 8, len: 56 });
        // an empty stack has nothing live
        assert_eq!(stack.live(stack.high()).len, 0);
        // a wild stack pointer is clamped
        assert_eq!(stack.live(core::ptr::null_mut()), stack.whole());
    }

    #[test]
    fn region_round_trip() {
        let mut live = [0u8; 24];
        for (idx, byte) in live.iter_mut().enumerate() {
            *byte = idx as u8 ^ 0x5A;
        }
        let expected = live;
        let base = live.as_mut_ptr();
        let region = Region::new(base, 24);
        let mut buffer = [0u8; 32];

        unsafe { save(region, &mut buffer) };
        unsafe { base.write_bytes(0xEE, 24) };
        unsafe { restore(region, &buffer) };

        assert_eq!(live, expected);
        // the tail of the buffer is untouched
        assert!(buffer[24..].iter().all(|b| *b == 0));
    }

    #[test]
    fn region_exactly_at_capacity() {
        let mut live = [0xA5u8; 16];
        live[15] = 0x3C;
        let expected = live;
        let base = live.as_mut_ptr();
        let region = Region::new(base, 16);
        let mut buffer = [0u8; 16];

        unsafe { save(region, &mut buffer) };
        unsafe { base.write_bytes(0, 16) };
        unsafe { restore(region, &buffer) };

        assert_eq!(live, expected);
    }

    #[test]
    fn stack_round_trip_keeps_offsets() {
        let mut fake = FakeStack::new();
        let stack = fake.bounds();
        for (offset, byte) in fake.bytes().iter_mut().enumerate().skip(40) {
            *byte = offset as u8;
        }
        let span = stack.live(unsafe { stack.low().add(40) });
        let mut buffer = [0u8; 64];

        unsafe { save_stack(stack, span, &mut buffer) };
        assert_eq!(buffer[40], 40);
        assert_eq!(buffer[63], 63);
        assert!(buffer[..40].iter().all(|b| *b == 0));

        fake.bytes().fill(0xFF);
        unsafe { restore_stack(stack, span, &buffer) };

        let memory = fake.bytes();
        // below the live span is left alone
        assert!(memory[..40].iter().all(|b| *b == 0xFF));
        for (offset, byte) in memory.iter().enumerate().skip(40) {
            assert_eq!(*byte, offset as u8);
        }
    }
}

// End of File
