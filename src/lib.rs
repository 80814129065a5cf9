//! # Lazarus
//!
//! An intermittent-computing runtime for Arm Cortex-M microcontrollers that
//! run from harvested energy and lose power all the time.
//!
//! * The [`Checkpointer`] saves the whole execution context (registers,
//!   `.data`, `.bss`, the live stack and a few peripheral registers) into a
//!   [`Snapshot`] in non-volatile memory, and resumes from it.
//! * The [`boot::arbitrate`] function runs at power-up, before RAM is
//!   initialised, and picks between a cold start and a resume.
//! * The [`Scheduler`] runs tasks to completion, but only once the power
//!   supervisor says there is enough energy banked to finish them. When there
//!   is not, it checkpoints and asks to be switched off.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![cfg_attr(not(test), no_std)]

#[cfg(any(arm_abi = "eabi", arm_abi = "eabihf"))]
mod arm;
#[cfg(any(arm_abi = "eabi", arm_abi = "eabihf"))]
mod asm;
pub mod boot;
mod checkpoint;
mod energy;
mod error;
mod log;
mod platform;
mod region;
mod scheduler;
#[cfg(test)]
mod sim;
mod snapshot;
mod stack;
mod supervisor;
mod task;

#[cfg(any(arm_abi = "eabi", arm_abi = "eabihf"))]
pub use arm::{CortexM, RegisterFile};
pub use checkpoint::{Checkpoint, Checkpointer, StackCapture};
pub use energy::EnergyLevel;
pub use error::{Error, RegionKind};
pub use platform::{Continuation, PeripheralSet, Platform};
pub use region::{MemoryMap, Region, Span, StackBounds};
pub use scheduler::{Cycle, RoundRobin, Scheduler, SelectNext, TaskId};
pub use snapshot::{Snapshot, SnapshotStore};
pub use stack::ScratchStack;
pub use supervisor::{DeepSleep, LowPower, PowerSupervisor, ShiftRegisterLink};
pub use task::{Task, TaskEntryFn};

// End of File
