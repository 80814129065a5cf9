//! Board support for the sensor node
//!
//! An STM32L476, wired to the power supervisor on port A:
//!
//! | Pin | Direction | Use                                |
//! |-----|-----------|------------------------------------|
//! | PA0 | out       | shift register data                |
//! | PA1 | out       | shift register clock               |
//! | PA2 | out       | shift register latch               |
//! | PA3 | out       | end-of-work                        |
//! | PA4 | in        | energy available, analog when idle |
//! | PA5 | out       | LED                                |
//!
//! The snapshot lives in a parallel FRAM on FMC bank 1.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::convert::Infallible;

use lazarus::{DeepSleep, LowPower, PeripheralSet};

/// Register addresses, from the STM32L4x6 reference manual
mod reg {
    pub const RCC_AHB2ENR: usize = 0x4002_104C;
    pub const RCC_AHB3ENR: usize = 0x4002_1050;
    pub const RCC_APB1ENR1: usize = 0x4002_1058;
    pub const PWR_CR1: usize = 0x4000_7000;
    pub const PWR_CR2: usize = 0x4000_7004;

    pub const GPIOA: usize = 0x4800_0000;
    pub const GPIOD: usize = 0x4800_0C00;
    pub const GPIOE: usize = 0x4800_1000;
    pub const GPIOF: usize = 0x4800_1400;
    pub const GPIOG: usize = 0x4800_1800;

    pub const MODER: usize = 0x00;
    pub const OSPEEDR: usize = 0x08;
    pub const PUPDR: usize = 0x0C;
    pub const IDR: usize = 0x10;
    pub const ODR: usize = 0x14;
    pub const BSRR: usize = 0x18;
    pub const AFRL: usize = 0x20;

    pub const FMC_BCR1: usize = 0xA000_0000;
    pub const FMC_BTR1: usize = 0xA000_0004;
}

/// RCC_AHB2ENR bit for port A
const GPIOAEN: u32 = 1 << 0;

/// PWR_CR1 low-power mode selection: Stop 2
const LPMS_STOP2: u32 = 0b010;

/// The FMC is alternate function 12 on every pin it uses
const AF_FMC: u32 = 12;

/// The pins the FRAM is wired to, as (port, pin mask)
const FMC_PINS: [(usize, u16); 4] = [
    // D0, D1, NOE, NWE, NE1, D2, D3
    (reg::GPIOD, 0b1100_0000_1011_0011),
    // D4 - D7
    (reg::GPIOE, 0b0000_0111_1000_0000),
    // A0 - A5, A6 - A9
    (reg::GPIOF, 0b1111_0000_0011_1111),
    // A10 - A14
    (reg::GPIOG, 0b0000_0000_0001_1111),
];

/// # Safety
///
/// Must be a readable peripheral register
unsafe fn read(addr: usize) -> u32 {
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

/// # Safety
///
/// Must be a writable peripheral register, and the write must not break
/// anything
unsafe fn write(addr: usize, value: u32) {
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

/// # Safety
///
/// As [`read`] and [`write`]
unsafe fn modify(addr: usize, f: impl FnOnce(u32) -> u32) {
    unsafe { write(addr, f(read(addr))) }
}

/// Make the FRAM on FMC bank 1 readable and writable
///
/// Must run before anything touches the snapshot, which means first thing in
/// `__pre_init`. Touches only peripherals, never RAM.
pub fn enable_nvram() {
    // SAFETY: we only set up clocks, pins and the FMC, none of which the
    // application uses for anything else
    unsafe {
        // Port G runs from VDDIO2, which is off at reset
        modify(reg::RCC_APB1ENR1, |v| v | (1 << 28));
        modify(reg::PWR_CR2, |v| v | (1 << 9));
        // Ports D to G, then the FMC
        modify(reg::RCC_AHB2ENR, |v| v | 0b0111_1000);
        modify(reg::RCC_AHB3ENR, |v| v | 1);

        for (port, pins) in FMC_PINS {
            for pin in (0..16).filter(|pin| pins & (1 << pin) != 0) {
                let shift2 = pin * 2;
                modify(port + reg::MODER, |v| (v & !(0b11 << shift2)) | (0b10 << shift2));
                modify(port + reg::OSPEEDR, |v| v | (0b11 << shift2));
                let afr = port + reg::AFRL + (pin / 8) * 4;
                let shift4 = (pin % 8) * 4;
                modify(afr, |v| (v & !(0xF << shift4)) | (AF_FMC << shift4));
            }
        }

        // ADDSET = 2, DATAST = 6, BUSTURN = 1
        write(reg::FMC_BTR1, 0x0001_0602);
        // 8-bit SRAM, writes enabled, bank enabled
        write(reg::FMC_BCR1, (1 << 12) | (1 << 7) | 1);
    }
}

/// Turn on port A and set up the pins
///
/// Call once, from `main`, on a cold start. After a resume the pins come back
/// through the snapshot.
pub fn init() -> Pins {
    // SAFETY: port A is ours
    unsafe {
        modify(reg::RCC_AHB2ENR, |v| v | GPIOAEN);
        // all the outputs are low before they become outputs
        write(reg::GPIOA + reg::BSRR, 0b10_1111 << 16);
        // PA0 - PA3 and PA5 are outputs, PA4 an input
        modify(reg::GPIOA + reg::MODER, |v| (v & !0xFFF) | 0b01_00_01_01_01_01);
        // with a pull-down on PA4
        modify(reg::GPIOA + reg::PUPDR, |v| (v & !(0b11 << 8)) | (0b10 << 8));
    }
    Pins {
        data: Output { _private: () },
        clock: Output { _private: () },
        latch: Output { _private: () },
        eot: Output { _private: () },
        wake: Input { _private: () },
        led: Output { _private: () },
    }
}

/// All the pins we use
pub struct Pins {
    pub data: Output<0>,
    pub clock: Output<1>,
    pub latch: Output<2>,
    pub eot: Output<3>,
    pub wake: Input<4>,
    pub led: Output<5>,
}

/// Port A pin `N`, as an output
pub struct Output<const N: u8> {
    _private: (),
}

impl<const N: u8> embedded_hal::digital::ErrorType for Output<N> {
    type Error = Infallible;
}

impl<const N: u8> embedded_hal::digital::OutputPin for Output<N> {
    fn set_low(&mut self) -> Result<(), Infallible> {
        // SAFETY: BSRR writes are atomic, and only touch our pin
        unsafe { write(reg::GPIOA + reg::BSRR, 1 << (N + 16)) };
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        // SAFETY: as above
        unsafe { write(reg::GPIOA + reg::BSRR, 1 << N) };
        Ok(())
    }
}

/// Port A pin `N`, as an input
pub struct Input<const N: u8> {
    _private: (),
}

impl<const N: u8> embedded_hal::digital::ErrorType for Input<N> {
    type Error = Infallible;
}

impl<const N: u8> embedded_hal::digital::InputPin for Input<N> {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        // SAFETY: reading IDR has no side effects
        Ok(unsafe { read(reg::GPIOA + reg::IDR) } & (1 << N) != 0)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

/// How the supervisor link saves power
///
/// Deep sleep is Stop 2. Between samples, PA4 sits in analog mode so its
/// input buffer draws nothing while the supervisor's line floats.
pub struct Power {
    _private: (),
}

impl Power {
    /// Get the power controls
    ///
    /// Only the supervisor link should use this.
    pub fn take() -> Power {
        Power { _private: () }
    }
}

impl LowPower for Power {
    fn sleep(&mut self) {
        // SAFETY: only picks what deep sleep means
        unsafe { modify(reg::PWR_CR1, |v| (v & !0b111) | LPMS_STOP2) };
        DeepSleep.sleep();
    }

    fn park_wake_line(&mut self, parked: bool) {
        let mode = if parked { 0b11 } else { 0b00 };
        // SAFETY: PA4 is ours, and only the link touches its mode
        unsafe { modify(reg::GPIOA + reg::MODER, |v| (v & !(0b11 << 8)) | (mode << 8)) };
    }
}

/// The port A registers that the snapshot carries across a power cycle
pub struct PortA {
    _private: (),
}

/// What [`PortA`] saves
#[derive(Copy, Clone, Debug, defmt::Format)]
pub struct PortAState {
    clock: u32,
    moder: u32,
    pupdr: u32,
    odr: u32,
}

impl PortA {
    /// Outputs that always come back low: the supervisor link. A stale
    /// end-of-work would have the supervisor cut the power straight away.
    pub const SAFE_LOW: u32 = 0b1111;

    /// Get the port
    ///
    /// Only the checkpoint engine should use this, and it only reads and
    /// writes whole registers while interrupts are off.
    pub fn take() -> PortA {
        PortA { _private: () }
    }
}

impl PeripheralSet for PortA {
    type State = PortAState;

    fn save(&mut self) -> PortAState {
        // SAFETY: reads have no side effects
        unsafe {
            PortAState {
                clock: read(reg::RCC_AHB2ENR) & GPIOAEN,
                moder: read(reg::GPIOA + reg::MODER),
                pupdr: read(reg::GPIOA + reg::PUPDR),
                odr: read(reg::GPIOA + reg::ODR),
            }
        }
    }

    fn restore(&mut self, state: &PortAState) {
        // SAFETY: we are resuming, and nothing else is using the port
        unsafe {
            // the port ignores writes while its clock is off
            modify(reg::RCC_AHB2ENR, |v| v | state.clock);
            // levels before directions, so nothing glitches
            write(reg::GPIOA + reg::ODR, state.odr & !Self::SAFE_LOW);
            write(reg::GPIOA + reg::PUPDR, state.pupdr);
            write(reg::GPIOA + reg::MODER, state.moder);
        }
    }
}

// End of File
