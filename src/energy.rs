//! Holds the [`EnergyLevel`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Error;

/// A coarse measure of how much banked energy a task needs to run to
/// completion
///
/// Levels run from 1 (a little) to 8 (a full capacitor).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct EnergyLevel(u8);

impl EnergyLevel {
    /// The smallest level a task may ask for
    pub const MIN: EnergyLevel = EnergyLevel(1);

    /// The largest level a task may ask for
    pub const MAX: EnergyLevel = EnergyLevel(8);

    /// Make an energy level, checking it is in `1..=8`
    pub const fn new(level: u8) -> Result<EnergyLevel, Error> {
        if level < Self::MIN.0 || level > Self::MAX.0 {
            Err(Error::EnergyLevelOutOfRange(level))
        } else {
            Ok(EnergyLevel(level))
        }
    }

    /// Get the level as a number
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Encode the level as a thermometer code for the power supervisor
    ///
    /// Level `e` sets the `e` most-significant bits, so level 1 is
    /// `0b1000_0000` and level 8 is `0b1111_1111`.
    pub const fn thermometer(self) -> u8 {
        // Shift in a u16 so that level 8 does not overflow the shift
        (0xFF00u16 >> self.0) as u8
    }
}

impl TryFrom<u8> for EnergyLevel {
    type Error = Error;

    fn try_from(level: u8) -> Result<EnergyLevel, Error> {
        EnergyLevel::new(level)
    }
}

impl core::fmt::Display for EnergyLevel {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "E{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EnergyLevel {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "E{=u8}", self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thermometer_ends() {
        assert_eq!(EnergyLevel::MIN.thermometer(), 0x80);
        assert_eq!(EnergyLevel::MAX.thermometer(), 0xFF);
        assert_eq!(EnergyLevel::new(4).unwrap().thermometer(), 0b1111_0000);
    }

    #[test]
    fn thermometer_bits_are_contiguous_from_msb() {
        for level in 1..=8 {
            let code = EnergyLevel::new(level).unwrap().thermometer();
            assert_eq!(code.count_ones(), u32::from(level));
            assert_eq!(code.leading_ones(), u32::from(level));
        }
    }

    #[test]
    fn out_of_range_is_rejected() {
        for level in [0, 9, 200, 255] {
            let err = EnergyLevel::new(level).unwrap_err();
            assert_eq!(err, Error::EnergyLevelOutOfRange(level));
            assert_ne!(err.code(), 0);
        }
        assert!(EnergyLevel::try_from(3).is_ok());
    }
}

// End of File
