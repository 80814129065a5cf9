//! Holds the [`Task`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{EnergyLevel, Error};

/// The body of a task
///
/// It is given the argument pointer from its [`Task`] and must run to
/// completion. Power may fail at any point inside it; that is fine, as
/// long as it does not touch memory the snapshot does not cover.
pub type TaskEntryFn = fn(*mut ());

/// Represents a task that the scheduler is managing
#[derive(Copy, Clone, Debug)]
pub struct Task {
    entry_fn: TaskEntryFn,
    arg: *mut (),
    energy_level: EnergyLevel,
}

impl Task {
    /// Create a new [`Task`] object
    ///
    /// The `energy_level` is how much banked energy the task needs to run to
    /// completion, from 1 to 8. Anything else is rejected.
    ///
    /// The `arg` is passed to `entry_fn` every time it runs, and may be null.
    pub const fn new(entry_fn: TaskEntryFn, arg: *mut (), energy_level: u8) -> Result<Task, Error> {
        match EnergyLevel::new(energy_level) {
            Ok(energy_level) => Ok(Task {
                entry_fn,
                arg,
                energy_level,
            }),
            Err(e) => Err(e),
        }
    }

    /// Get the entry function for this task
    pub const fn entry_fn(&self) -> TaskEntryFn {
        self.entry_fn
    }

    /// Get the argument pointer for this task
    pub const fn arg(&self) -> *mut () {
        self.arg
    }

    /// Get the energy this task needs
    pub const fn energy_level(&self) -> EnergyLevel {
        self.energy_level
    }

    /// Run the task to completion
    pub fn run(&self) {
        (self.entry_fn)(self.arg)
    }
}

/// SAFETY: A task is immutable once built. Whatever `arg` points to is only
/// ever handed to the task's own entry function, from the one foreground
/// loop.
unsafe impl Sync for Task {}


// End of File
