#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! ## Feature flags
#![doc = document_features::document_features!(feature_label = r#"<span class="stab portability"><code>{feature}</code></span>"#)]

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("You may not enable both `defmt` and `log` features.");

#[cfg(not(any(feature = "lpc4337", feature = "lpc4357")))]
compile_error!(
    "No chip feature activated. You must activate exactly one of the following features:
    lpc4337,
    lpc4357,
    "
);

// This mod MUST go first, so that the others see its macros.
#[macro_use]
pub(crate) mod fmt;

pub mod clocks;
pub mod nvic;
pub mod reset;
pub mod ringbuffer;
pub mod scu;
pub mod sgpio;
pub mod timer;

#[cfg(feature = "unstable-pac")]
pub mod pac;
#[cfg(not(feature = "unstable-pac"))]
pub(crate) mod pac;

// This mod MUST go last, so that it sees all the `impl_foo!' macros
mod chip;

// Reexports
pub use chip::{interrupt, peripherals, Peripherals};
pub use embassy_hal_internal::{into_ref, Peripheral, PeripheralRef};

/// HAL configuration for the LPC43xx application core.
pub mod config {
    use crate::clocks::ClockConfig;

    /// HAL configuration passed when initializing.
    #[non_exhaustive]
    pub struct Config {
        /// Clock-tree configuration.
        pub clocks: ClockConfig,
    }

    impl Default for Config {
        fn default() -> Self {
            Self {
                clocks: ClockConfig::crystal(12_000_000),
            }
        }
    }

    impl Config {
        /// Create a new configuration with the provided clock config.
        pub fn new(clocks: ClockConfig) -> Self {
            Self { clocks }
        }
    }
}

/// Initialize the `lpc43xx-hal` HAL with the provided configuration.
///
/// This brings up the clock tree (crystal, main PLL, CPU soft-start as
/// needed) and returns the peripheral singletons that can be used for
/// creating drivers.
///
/// This should only be called once at startup, otherwise it panics.
pub fn init(config: config::Config) -> Peripherals {
    // Do this first, so that it panics if user is calling `init` a second time
    // before doing anything important.
    let peripherals = Peripherals::take();

    unsafe {
        // Snapshot the previous boot's reset reason before anything else
        // touches the persistent word.
        reset::init();

        // The clock tree's own bring-up (crystal startup delay, PLL lock
        // waits, CPU soft-start hold) busy-waits on the microsecond timer,
        // so it must be running first. It starts against the internal
        // oscillator's nominal frequency, which is always ready.
        let irc_hz = clocks::registry::entry(clocks::ClockSource::InternalOscillator).measured_frequency_hz;
        timer::init_platform_timer(irc_hz);

        clocks::init(config.clocks);
    }

    peripherals
}
