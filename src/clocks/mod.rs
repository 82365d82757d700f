//! Clock-tree manager: dependency-solving bring-up of the LPC43xx's
//! oscillators, PLLs, integer dividers, base clocks, and branch clocks.
//!
//! See the [module overview](crate) for how this fits into the rest of
//! the HAL; [`init`] is the only entry point most firmware needs.

mod branch;
mod monitor;
mod pll;
pub mod registry;
mod solver;

pub use branch::{disable_branch_clock, enable_branch_clock, register_frequency_change_consumer, FrequencyChangeConsumer};
pub use pll::PllError;
pub use registry::ClockSource;
pub use solver::ClockError;

use crate::fmt::*;

/// Clock-tree configuration passed to [`crate::init`].
#[non_exhaustive]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub struct ClockConfig {
    /// Frequency of the external crystal, in Hz.
    pub crystal_hz: u32,
    /// Target frequency for the main PLL (and, after soft-start if needed,
    /// the CPU base clock), in Hz.
    pub cpu_target_hz: u32,
    /// Whether to bring up the USB PLL at 480 MHz during init.
    pub bring_up_usb_pll: bool,
}

impl ClockConfig {
    /// A configuration driven from an external crystal of `crystal_hz`,
    /// targeting the original's common 204 MHz CPU frequency.
    pub fn crystal(crystal_hz: u32) -> Self {
        Self {
            crystal_hz,
            cpu_target_hz: 204_000_000,
            bring_up_usb_pll: false,
        }
    }

    /// Overrides the CPU target frequency.
    pub fn with_cpu_target_hz(mut self, cpu_target_hz: u32) -> Self {
        self.cpu_target_hz = cpu_target_hz;
        self
    }

    /// Requests the USB PLL be brought up during init.
    pub fn with_usb_pll(mut self) -> Self {
        self.bring_up_usb_pll = true;
        self
    }
}

/// Downstream firmware may override this to choose the primary clock input
/// (default: the external crystal). Weak in spirit -- called once, early,
/// by [`init`]; call [`registry::set_primary_input`] directly to override.
pub fn determine_primary_clock_input() -> ClockSource {
    registry::resolve(ClockSource::PrimaryInput)
}

/// Downstream firmware may override this to choose the primary clock
/// source (default: the main PLL). See [`determine_primary_clock_input`].
pub fn determine_primary_clock_source() -> ClockSource {
    registry::resolve(ClockSource::Primary)
}

/// Brings up the clock tree per `config`: the crystal, the main PLL (with
/// CPU soft-start if the target exceeds 110 MHz), and optionally the USB PLL.
///
/// # Safety
/// Must be called exactly once, before any other access to the CGU/CCU
/// register blocks.
pub unsafe fn init(config: ClockConfig) {
    registry::with_entry_mut(ClockSource::XtalOscillator, |entry| {
        entry.configured_frequency_hz = config.crystal_hz;
    });
    registry::with_entry_mut(ClockSource::MainPll, |entry| {
        entry.configured_frequency_hz = config.cpu_target_hz;
    });

    if solver::ensure_up(ClockSource::XtalOscillator, true).is_err() {
        error!("failed to bring up external crystal during early init");
    }

    if let Err(err) = branch::soft_start_cpu_clock(config.cpu_target_hz) {
        error!("failed to bring up main PLL / CPU base clock: {:?}", err);
    }

    if config.bring_up_usb_pll {
        if let Err(err) = solver::ensure_up(ClockSource::UsbPll, true) {
            warn!("failed to bring up USB PLL: {:?}", err);
        }
    }
}
