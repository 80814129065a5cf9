//! The link to the external power supervisor
//!
//! The supervisor banks harvested energy and decides when we get to run. We
//! tell it how much energy the next task needs by shifting a thermometer code
//! into its shift register, and it answers on a single "enough energy" line.
//! When we have checkpointed and want the power cut, we raise the
//! end-of-work line.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::convert::Infallible;

use embedded_hal::digital::{InputPin, OutputPin};

use crate::EnergyLevel;

/// The scheduler's view of the power supervisor
pub trait PowerSupervisor {
    /// Tell the supervisor how much energy the next task needs
    fn request(&mut self, level: EnergyLevel);

    /// Ask whether there is enough energy banked for the last request
    ///
    /// This is sampled once, straight after [`PowerSupervisor::request`].
    fn energy_available(&mut self) -> bool;

    /// Tell the supervisor we have checkpointed, and it may cut the power
    fn signal_done(&mut self);

    /// Put the link lines back to idle, ready to run a task
    fn release(&mut self);

    /// Wait, in the lowest power state we have, for the power to go away
    ///
    /// May return if something other than a power cut wakes us up.
    fn halt(&mut self);
}

/// How the link waits for the power to go, and saves power in between
pub trait LowPower {
    /// Enter the lowest power state there is, until the power goes
    ///
    /// May return early if something other than the supervisor wakes us.
    fn sleep(&mut self);

    /// Disconnect (`true`) or reconnect (`false`) the wake line's input
    ///
    /// The link parks the line whenever it is not sampling it. The default
    /// does nothing.
    fn park_wake_line(&mut self, _parked: bool) {}
}

/// SCB.SCR bit that makes `wfi` enter deep sleep
#[cfg(target_arch = "arm")]
const SCR_SLEEPDEEP: u32 = 1 << 2;

/// Deep sleep, in whichever mode the chip is set up to use for it
///
/// On Cortex-M this sets `SLEEPDEEP` around a `wfi`. Which deep-sleep mode
/// that means (Stop, Standby, LPMx) is up to the chip's power controller.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DeepSleep;

impl LowPower for DeepSleep {
    fn sleep(&mut self) {
        #[cfg(target_arch = "arm")]
        {
            // SAFETY: SCR only says how the core sleeps
            let scb = unsafe { &*cortex_m::peripheral::SCB::PTR };
            unsafe { scb.scr.modify(|value| value | SCR_SLEEPDEEP) };
            cortex_m::asm::dsb();
            cortex_m::asm::wfi();
            // still powered, so go back to ordinary sleep
            unsafe { scb.scr.modify(|value| value & !SCR_SLEEPDEEP) };
        }
        #[cfg(not(target_arch = "arm"))]
        core::hint::spin_loop();
    }
}

/// A [`PowerSupervisor`] wired up with GPIO pins
///
/// The energy request goes out MSB first on `data`, clocked on the rising
/// edge of `clock`, and is latched by the rising edge of `latch`.
pub struct ShiftRegisterLink<D, C, L, W, E, P = DeepSleep> {
    /// Shift register serial data
    data: D,
    /// Shift register serial clock
    clock: C,
    /// Shift register output latch
    latch: L,
    /// High when there is enough energy for the requested level
    wake: W,
    /// End-of-work: ask the supervisor to cut the power
    eot: E,
    /// Sleeping, and parking the wake line
    power: P,
}

impl<D, C, L, W, E> ShiftRegisterLink<D, C, L, W, E, DeepSleep>
where
    D: OutputPin<Error = Infallible>,
    C: OutputPin<Error = Infallible>,
    L: OutputPin<Error = Infallible>,
    W: InputPin<Error = Infallible>,
    E: OutputPin<Error = Infallible>,
{
    /// Take the pins, and drive all the outputs low
    ///
    /// Halting uses [`DeepSleep`]. See [`ShiftRegisterLink::with_low_power`]
    /// for anything else.
    pub fn new(data: D, clock: C, latch: L, wake: W, eot: E) -> Self {
        ShiftRegisterLink::with_low_power(data, clock, latch, wake, eot, DeepSleep)
    }
}

impl<D, C, L, W, E, P> ShiftRegisterLink<D, C, L, W, E, P>
where
    D: OutputPin<Error = Infallible>,
    C: OutputPin<Error = Infallible>,
    L: OutputPin<Error = Infallible>,
    W: InputPin<Error = Infallible>,
    E: OutputPin<Error = Infallible>,
    P: LowPower,
{
    /// Take the pins and a board-specific way to save power, drive all the
    /// outputs low, and park the wake line
    pub fn with_low_power(data: D, clock: C, latch: L, wake: W, eot: E, power: P) -> Self {
        let mut link = ShiftRegisterLink {
            data,
            clock,
            latch,
            wake,
            eot,
            power,
        };
        link.release();
        link.power.park_wake_line(true);
        link
    }

    /// Give the pins back
    pub fn into_pins(self) -> (D, C, L, W, E) {
        (self.data, self.clock, self.latch, self.wake, self.eot)
    }

    /// Clock a byte into the supervisor's shift register, MSB first
    fn shift_out(&mut self, value: u8) {
        let Ok(()) = self.latch.set_low();
        for bit in (0..8).rev() {
            let Ok(()) = self.clock.set_low();
            let Ok(()) = self.data.set_state(((value >> bit) & 1 == 1).into());
            let Ok(()) = self.clock.set_high();
        }
        let Ok(()) = self.latch.set_high();
    }
}

impl<D, C, L, W, E, P> PowerSupervisor for ShiftRegisterLink<D, C, L, W, E, P>
where
    D: OutputPin<Error = Infallible>,
    C: OutputPin<Error = Infallible>,
    L: OutputPin<Error = Infallible>,
    W: InputPin<Error = Infallible>,
    E: OutputPin<Error = Infallible>,
    P: LowPower,
{
    fn request(&mut self, level: EnergyLevel) {
        self.shift_out(level.thermometer());
    }

    fn energy_available(&mut self) -> bool {
        self.power.park_wake_line(false);
        let Ok(available) = self.wake.is_high();
        self.power.park_wake_line(true);
        available
    }

    fn signal_done(&mut self) {
        let Ok(()) = self.eot.set_high();
    }

    fn release(&mut self) {
        let Ok(()) = self.data.set_low();
        let Ok(()) = self.clock.set_low();
        let Ok(()) = self.latch.set_low();
        let Ok(()) = self.eot.set_low();
    }

    fn halt(&mut self) {
        self.power.sleep();
    }
}


// End of File
