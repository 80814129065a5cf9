//! A pretend machine, for the unit tests
//!
//! The [`World`] holds some synthetic RAM, a register file and an I/O port.
//! [`SimPlatform`] snapshots them and [`SimSupervisor`] plays the part of the
//! power supervisor, writing down everything that happens in a trace.
//!
//! Resuming never returns, so [`SimPlatform::reenter`] unwinds back out to
//! [`power_cycle`] instead. The test then calls back into the code that took
//! the checkpoint, and the world replays: the next capture returns
//! [`Continuation::Resumed`] as it would have on real hardware.
//!
//! Only the world's RAM is wrecked and restored. Anything else the test holds
//! survives a power cycle untouched, so state that must come back through
//! the snapshot goes in with [`World::place_in_data`].

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{cell::RefCell, collections::VecDeque, panic::AssertUnwindSafe, rc::Rc};

use crate::{
    Checkpointer, Continuation, EnergyLevel, MemoryMap, PeripheralSet, Platform, PowerSupervisor,
    Region, StackBounds, TaskId,
};

/// Bytes of synthetic `.data`
pub const DATA_LEN: usize = 48;
/// Bytes of synthetic `.bss`
pub const BSS_LEN: usize = 32;
/// Bytes of synthetic stack
pub const STACK_LEN: usize = 128;

/// What a power cut leaves behind in RAM
const SCRIBBLE: u8 = 0xDB;

/// A world, shared between the platform, the supervisor and the test
pub type Shared = Rc<RefCell<World>>;

/// The pretend register file
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SimRegisters {
    pub general: [u32; 8],
    pub sp: usize,
    pub return_site: usize,
}

/// The pretend I/O port
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Port {
    pub out: u8,
    pub dir: u8,
    pub pull: u8,
}

impl Port {
    /// Output bits that must come back low after a power cycle
    pub const SAFETY_BITS: u8 = 0b0000_0011;
}

impl PeripheralSet for Port {
    type State = Port;

    fn save(&mut self) -> Port {
        *self
    }

    fn restore(&mut self, state: &Port) {
        *self = Port {
            out: state.out & !Self::SAFETY_BITS,
            ..*state
        };
    }
}

/// Something that happened, as seen from the outside
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// An energy request for this tier
    Request(u8),
    /// The supervisor said yes
    Granted,
    /// The supervisor said no
    Denied,
    /// End-of-work went high
    Done,
    /// We went to sleep waiting for the power to go
    Halt,
    /// This task ran
    Ran(usize),
}

/// A snapshot of the whole world, for comparing before and after
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub registers: SimRegisters,
    pub data: Vec<u8>,
    pub bss: Vec<u8>,
    pub stack: Vec<u8>,
}

/// Everything the pretend machine has
pub struct World {
    /// The current register values
    pub registers: SimRegisters,
    /// The current port values
    pub port: Port,
    /// What the shift register last latched
    pub shift_register: u8,
    /// The end-of-work line
    pub eot: bool,
    /// Answers to give, in order. When we run out, the answer is yes.
    pub permits: VecDeque<bool>,
    /// Everything that has happened so far
    pub trace: Vec<Event>,
    /// Set by a resume, until the checkpoint has returned again
    replaying: bool,
    data: *mut u8,
    bss: *mut u8,
    stack: *mut u32,
}

impl World {
    /// Make a new world with zeroed RAM, and an empty stack
    pub fn shared() -> Shared {
        // These are leaked, so they never move and our pointers stay valid
        // `.data` is word-aligned, so `place_in_data` can put structs there
        let data = Box::leak(vec![0u64; DATA_LEN / 8].into_boxed_slice()).as_mut_ptr() as *mut u8;
        let bss = Box::leak(vec![0u8; BSS_LEN].into_boxed_slice()).as_mut_ptr();
        let stack = Box::leak(vec![0u32; STACK_LEN / 4].into_boxed_slice()).as_mut_ptr();
        let mut world = World {
            registers: SimRegisters::default(),
            port: Port::default(),
            shift_register: 0,
            eot: false,
            permits: VecDeque::new(),
            trace: Vec::new(),
            replaying: false,
            data,
            bss,
            stack,
        };
        world.set_stack_depth(0);
        Rc::new(RefCell::new(world))
    }

    /// Where everything is
    fn memory_map(&self) -> MemoryMap {
        let low = self.stack as *mut u8;
        MemoryMap {
            data: Region::new(self.data, DATA_LEN),
            bss: Region::new(self.bss, BSS_LEN),
            stack: StackBounds::new(low, low.wrapping_add(STACK_LEN)),
        }
    }

    /// Fill the registers and all of RAM with a pattern based on `seed`
    pub fn fill_pattern(&mut self, seed: u8) {
        for (idx, reg) in self.registers.general.iter_mut().enumerate() {
            *reg = u32::from(seed).wrapping_mul(0x0101_0101) ^ idx as u32;
        }
        self.registers.return_site = 0x0800_0000 + usize::from(seed);
        for (idx, byte) in self.data_mut().iter_mut().enumerate() {
            *byte = seed.wrapping_add(idx as u8);
        }
        for (idx, byte) in self.bss_mut().iter_mut().enumerate() {
            *byte = seed ^ idx as u8;
        }
        for (idx, byte) in self.stack_mut().iter_mut().enumerate() {
            *byte = seed.wrapping_mul(3).wrapping_add(idx as u8);
        }
    }

    /// Put the stack pointer `depth` bytes below the top of the stack
    pub fn set_stack_depth(&mut self, depth: usize) {
        self.registers.sp = self.stack as usize + STACK_LEN - depth;
    }

    /// Copy out everything a checkpoint should preserve
    pub fn image(&self) -> Image {
        Image {
            registers: self.registers,
            data: self.data().to_vec(),
            bss: self.bss().to_vec(),
            stack: self.stack().to_vec(),
        }
    }

    /// Has a resume happened, that the checkpoint has not yet come back from?
    pub fn replaying(&self) -> bool {
        self.replaying
    }

    /// Write down an event, unless we are replaying what already happened
    pub fn record(&mut self, event: Event) {
        if !self.replaying {
            self.trace.push(event);
        }
    }

    /// Wreck everything the way a power cut does
    pub fn lose_power(&mut self) {
        self.data_mut().fill(SCRIBBLE);
        self.bss_mut().fill(SCRIBBLE);
        self.stack_mut().fill(SCRIBBLE);
        self.registers = SimRegisters::default();
        self.port = Port::default();
        self.shift_register = 0;
        self.eot = false;
    }

    fn data(&self) -> &[u8] {
        // SAFETY: leaked in `shared`, and only touched through the world
        unsafe { core::slice::from_raw_parts(self.data, DATA_LEN) }
    }

    /// Get at the synthetic `.data`
    pub fn data_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above
        unsafe { core::slice::from_raw_parts_mut(self.data, DATA_LEN) }
    }

    /// Move `value` into the synthetic `.data` at `offset`
    ///
    /// Checkpoints then carry it across power cycles, and a power cut wrecks
    /// it, as for any other static. Only go through the returned pointer,
    /// and never while the power is off.
    pub fn place_in_data<T>(&mut self, offset: usize, value: T) -> *mut T {
        assert!(offset + core::mem::size_of::<T>() <= DATA_LEN, "does not fit");
        let ptr = self.data.wrapping_add(offset) as *mut T;
        assert!(ptr.is_aligned(), "misaligned");
        // SAFETY: in bounds and aligned, checked above
        unsafe { ptr.write(value) };
        ptr
    }

    fn bss(&self) -> &[u8] {
        // SAFETY: as above
        unsafe { core::slice::from_raw_parts(self.bss, BSS_LEN) }
    }

    fn bss_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above
        unsafe { core::slice::from_raw_parts_mut(self.bss, BSS_LEN) }
    }

    fn stack(&self) -> &[u8] {
        // SAFETY: as above
        unsafe { core::slice::from_raw_parts(self.stack as *const u8, STACK_LEN) }
    }

    fn stack_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above
        unsafe { core::slice::from_raw_parts_mut(self.stack as *mut u8, STACK_LEN) }
    }
}

/// The unwind payload that stands in for "we jumped back into the checkpoint"
pub struct Reentered;

/// A [`Platform`] over a [`World`]
pub struct SimPlatform {
    world: Shared,
}

impl SimPlatform {
    pub fn new(world: &Shared) -> SimPlatform {
        SimPlatform {
            world: world.clone(),
        }
    }
}

// SAFETY: the world's RAM is leaked and never overlaps the snapshot, and
// re-entry is modelled by replay.
unsafe impl Platform for SimPlatform {
    type Registers = SimRegisters;
    type Peripherals = Port;

    fn memory_map(&self) -> MemoryMap {
        self.world.borrow().memory_map()
    }

    fn stack_pointer(registers: &SimRegisters) -> *mut u8 {
        registers.sp as *mut u8
    }

    unsafe fn capture(&mut self, registers: *mut SimRegisters) -> Continuation {
        let mut world = self.world.borrow_mut();
        if world.replaying {
            world.replaying = false;
            return Continuation::Resumed;
        }
        // SAFETY: the caller promises it is writable
        unsafe { registers.write(world.registers) };
        Continuation::Fresh
    }

    unsafe fn reenter(&mut self, registers: &SimRegisters) -> ! {
        {
            let mut world = self.world.borrow_mut();
            world.registers = *registers;
            world.replaying = true;
        }
        std::panic::resume_unwind(Box::new(Reentered))
    }

    fn resume_stack(&self) -> *mut u32 {
        // we never really switch stacks
        core::ptr::null_mut()
    }

    unsafe fn switch_stack(
        _top: *mut u32,
        f: unsafe extern "C-unwind" fn(*mut ()) -> !,
        arg: *mut (),
    ) -> ! {
        // SAFETY: passed straight through
        unsafe { f(arg) }
    }

    fn save_peripherals(&mut self) -> Port {
        self.world.borrow_mut().port.save()
    }

    fn restore_peripherals(&mut self, saved: &Port) {
        self.world.borrow_mut().port.restore(saved);
    }
}

/// Cut the power, and boot back up
///
/// Panics unless the engine finds a snapshot and resumes from it.
pub fn power_cycle<const STACK: usize, const DATA: usize, const BSS: usize>(
    world: &Shared,
    engine: Checkpointer<'static, SimPlatform, STACK, DATA, BSS>,
) {
    world.borrow_mut().lose_power();
    // SAFETY: the world's RAM has just been wiped, so nobody relies on it
    let outcome =
        std::panic::catch_unwind(AssertUnwindSafe(|| unsafe { crate::boot::arbitrate(engine) }));
    match outcome {
        Ok(_) => panic!("cold boot, but we expected a resume"),
        Err(payload) => assert!(payload.is::<Reentered>(), "resume panicked"),
    }
}

/// A [`PowerSupervisor`] over a [`World`]
pub struct SimSupervisor {
    world: Shared,
}

impl SimSupervisor {
    pub fn new(world: &Shared) -> SimSupervisor {
        SimSupervisor {
            world: world.clone(),
        }
    }
}

impl PowerSupervisor for SimSupervisor {
    fn request(&mut self, level: EnergyLevel) {
        let mut world = self.world.borrow_mut();
        world.shift_register = level.thermometer();
        world.record(Event::Request(level.get()));
    }

    fn energy_available(&mut self) -> bool {
        let mut world = self.world.borrow_mut();
        if world.replaying {
            // the answer we got before the power went
            return false;
        }
        let granted = world.permits.pop_front().unwrap_or(true);
        world.record(if granted {
            Event::Granted
        } else {
            Event::Denied
        });
        granted
    }

    fn signal_done(&mut self) {
        let mut world = self.world.borrow_mut();
        world.eot = true;
        world.record(Event::Done);
    }

    fn release(&mut self) {
        let mut world = self.world.borrow_mut();
        world.shift_register = 0;
        world.eot = false;
    }

    fn halt(&mut self) {
        self.world.borrow_mut().record(Event::Halt);
    }
}

/// What a probe task needs
pub struct Probe {
    pub world: Shared,
    pub id: TaskId,
}

impl Probe {
    /// The argument to give [`probe_task`]
    pub fn as_arg(&self) -> *mut () {
        self as *const Probe as *mut ()
    }
}

/// A task that notes it ran, and counts its runs in `.data`
pub fn probe_task(arg: *mut ()) {
    // SAFETY: tests only pass `Probe::as_arg` here
    let probe = unsafe { &*(arg as *const Probe) };
    let mut world = probe.world.borrow_mut();
    world.record(Event::Ran(probe.id.index()));
    world.data_mut()[probe.id.index()] += 1;
}

// End of File
