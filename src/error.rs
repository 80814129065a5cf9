//! Contains the [`Error`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Which RAM region a snapshot buffer is meant to hold
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionKind {
    /// Initialised static data (`.data`)
    Data,
    /// Zero-initialised static data (`.bss`)
    Bss,
    /// The main stack
    Stack,
}

/// The things that can go wrong while setting up the system
///
/// Everything here is a configuration mistake found at start-up. Once the
/// scheduler is running nothing can fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An energy level must be in `1..=8`
    EnergyLevelOutOfRange(u8),
    /// A scheduler needs at least one task
    NoTasks,
    /// A task ID did not refer to an entry in the task table
    TaskIdOutOfRange {
        /// The ID we were given
        id: usize,
        /// How many tasks there are
        count: usize,
    },
    /// A snapshot buffer is smaller than the region it must hold
    SnapshotTooSmall {
        /// The region that does not fit
        region: RegionKind,
        /// How many bytes the region occupies
        needed: usize,
        /// How many bytes the snapshot can hold
        capacity: usize,
    },
}

impl Error {
    /// A non-zero status code for this error
    ///
    /// Handy for reporting over a pin, a register or an exit code.
    pub const fn code(&self) -> u8 {
        match self {
            Error::EnergyLevelOutOfRange(_) => 4,
            Error::NoTasks => 5,
            Error::TaskIdOutOfRange { .. } => 6,
            Error::SnapshotTooSmall { .. } => 7,
        }
    }
}

impl core::fmt::Display for RegionKind {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RegionKind::Data => write!(fmt, ".data"),
            RegionKind::Bss => write!(fmt, ".bss"),
            RegionKind::Stack => write!(fmt, "stack"),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::EnergyLevelOutOfRange(level) => {
                write!(fmt, "energy level {level} is outside 1..=8")
            }
            Error::NoTasks => write!(fmt, "task table is empty"),
            Error::TaskIdOutOfRange { id, count } => {
                write!(fmt, "task ID {id} is out of range for {count} tasks")
            }
            Error::SnapshotTooSmall {
                region,
                needed,
                capacity,
            } => write!(
                fmt,
                "{region} needs {needed} bytes but the snapshot holds {capacity}"
            ),
        }
    }
}


// End of File
