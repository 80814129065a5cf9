//! A sensor node with four tasks, which survives losing power
//!
//! Each task needs a different amount of energy: sampling is cheap and
//! transmitting is expensive. When the supervisor has not banked enough for
//! the next task, we checkpoint into FRAM and ask it to turn us off. When it
//! turns us back on, we carry on from exactly where we were.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::{
    cell::RefCell,
    sync::atomic::{AtomicU32, Ordering},
};

use critical_section::Mutex;
use embedded_hal::digital::OutputPin;
use lazarus::{
    Checkpointer, CortexM, ScratchStack, Scheduler, ShiftRegisterLink, SnapshotStore,
    StackCapture, Task, TaskEntryFn,
};
use lazarus_demos::board::{self, PortA, Power};

type Platform = CortexM<PortA>;

/// Must hold the whole 8 KiB main stack from `memory.x`
const STACK_CAPACITY: usize = 8 * 1024;
const DATA_CAPACITY: usize = 1024;
const BSS_CAPACITY: usize = 4 * 1024;

type Engine = Checkpointer<'static, Platform, STACK_CAPACITY, DATA_CAPACITY, BSS_CAPACITY>;

#[unsafe(link_section = ".snapshot")]
static SNAPSHOT: SnapshotStore<Platform, STACK_CAPACITY, DATA_CAPACITY, BSS_CAPACITY> =
    SnapshotStore::new();

static RESUME_STACK: ScratchStack<512> = ScratchStack::new();

static TASK_LIST: [Task; 4] = [
    task(sample, 2),
    task(average, 3),
    task(pack, 4),
    task(transmit, 5),
];

/// How many readings we average over
const WINDOW: usize = 8;

/// Recent readings
static READINGS: Mutex<RefCell<heapless::Deque<u16, WINDOW>>> =
    Mutex::new(RefCell::new(heapless::Deque::new()));

/// Pretend ADC state. Non-zero, so it lives in `.data`.
static NOISE: AtomicU32 = AtomicU32::new(0x1234_5678);

/// The latest average reading
static AVERAGE: AtomicU32 = AtomicU32::new(0);

/// The packet waiting to go out: sequence number in the top half, average in
/// the bottom half
static PACKET: AtomicU32 = AtomicU32::new(0);

/// How many packets we have sent
static SENT: AtomicU32 = AtomicU32::new(0);

/// Build a task table entry, at compile time
const fn task(entry_fn: TaskEntryFn, energy_level: u8) -> Task {
    match Task::new(entry_fn, core::ptr::null_mut(), energy_level) {
        Ok(task) => task,
        Err(_) => panic!("energy levels are 1 to 8"),
    }
}

/// Build the checkpoint engine
fn engine() -> Result<Engine, lazarus::Error> {
    // SAFETY: `__pre_init` and `main` each claim it once, and the first is
    // finished with it before the second starts
    let snapshot = unsafe { SNAPSHOT.claim() };
    Checkpointer::new(
        snapshot,
        CortexM::new(&RESUME_STACK, PortA::take()),
        StackCapture::Live,
    )
}

/// The boot arbiter
///
/// Runs before `.data` and `.bss` are initialised. If there is a snapshot
/// this never returns, and we come back out of the checkpoint in `main`
/// instead.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __pre_init() {
    board::enable_nvram();
    if let Ok(engine) = engine() {
        // SAFETY: RAM is not initialised yet, so nothing relies on it
        let _cold_start = unsafe { lazarus::boot::arbitrate(engine) };
    }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    defmt::info!("Cold start");
    let mut pins = board::init();
    let _ = pins.led.set_high();

    let mut engine = match engine() {
        Ok(engine) => engine,
        Err(e) => defmt::panic!("Engine: {}", e),
    };
    let link = ShiftRegisterLink::with_low_power(
        pins.data,
        pins.clock,
        pins.latch,
        pins.wake,
        pins.eot,
        Power::take(),
    );
    let mut scheduler = match Scheduler::round_robin(&TASK_LIST, link) {
        Ok(scheduler) => scheduler,
        Err(e) => defmt::panic!("Scheduler: {}", e),
    };
    scheduler.run(&mut engine)
}

/// Take a reading
fn sample(_arg: *mut ()) {
    // xorshift32
    let mut x = NOISE.load(Ordering::Relaxed);
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    NOISE.store(x, Ordering::Relaxed);
    let reading = (x & 0x0FFF) as u16;

    critical_section::with(|cs| {
        let mut readings = READINGS.borrow_ref_mut(cs);
        if readings.is_full() {
            readings.pop_front();
        }
        let _ = readings.push_back(reading);
    });
    defmt::debug!("sample {=u16}", reading);
}

/// Average the readings we have
fn average(_arg: *mut ()) {
    let average = critical_section::with(|cs| {
        let readings = READINGS.borrow_ref(cs);
        let count = readings.len() as u32;
        let total: u32 = readings.iter().map(|r| u32::from(*r)).sum();
        total.checked_div(count).unwrap_or(0)
    });
    AVERAGE.store(average, Ordering::Relaxed);
    defmt::debug!("average {=u32}", average);
}

/// Put the average in a packet
fn pack(_arg: *mut ()) {
    let sequence = SENT.load(Ordering::Relaxed) & 0xFFFF;
    let packet = (sequence << 16) | (AVERAGE.load(Ordering::Relaxed) & 0xFFFF);
    PACKET.store(packet, Ordering::Relaxed);
}

/// Send the packet
fn transmit(_arg: *mut ()) {
    let packet = PACKET.load(Ordering::Relaxed);
    defmt::info!("TX #{=u32} avg={=u32}", packet >> 16, packet & 0xFFFF);
    SENT.fetch_add(1, Ordering::Relaxed);
}

// End of File
