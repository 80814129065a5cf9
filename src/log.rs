//! Logging macros
//!
//! These forward to [`defmt`](https://docs.rs/defmt) when the `defmt` feature
//! is enabled, and expand to nothing otherwise. Firmware that wants to see
//! what the scheduler and checkpoint engine are doing should enable the
//! feature and link a defmt global logger; host builds (and the unit tests)
//! leave it off.
//!
//! Format strings use defmt syntax (`{=u8}`, `{=usize:08x}` and so on), so
//! they must also be valid when the feature is disabled - we never feed them
//! to `core::fmt`.
//!
//! Nothing that runs before RAM has been restored (the boot arbiter and the
//! tail of `resume`) may use these macros, because the global logger keeps
//! its state in `.bss`.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

macro_rules! trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::trace!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = ($(&$arg,)*);
    }};
}

macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::debug!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = ($(&$arg,)*);
    }};
}

macro_rules! info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::info!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = ($(&$arg,)*);
    }};
}

macro_rules! warning {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::warn!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = ($(&$arg,)*);
    }};
}

pub(crate) use {debug, info, trace, warning};

#[cfg(test)]
mod tests {
    #[test]
    fn every_level_accepts_defmt_syntax() {
        let level = 4u8;
        let bytes = 512usize;
        trace!("trace {=u8}", level);
        debug!("debug {=usize:08x}", bytes);
        info!("info {=u8} {=usize}", level, bytes,);
        warning!("warning");
    }
}

// End of File
