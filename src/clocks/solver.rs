//! Dependency solver: brings up a requested clock source by recursively
//! satisfying its prerequisites, falling back to the internal oscillator
//! on failure unless the caller opts out.
//!
//! Grounded in `platform_clock.c`'s `platform_handle_dependencies_for_clock_source`.

use super::pll;
use super::registry::{self, ClockSource};
use crate::fmt::*;

/// Errors the solver can return.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockError {
    /// The source's failure counter exceeded the retry threshold.
    Timeout,
    /// Pin-routed external clocks are not yet implemented.
    NotImplemented,
    /// The requested PLL configuration could not be synthesized.
    Pll(pll::PllError),
}

const CRYSTAL_STARTUP_DELAY_US: u32 = 250;

/// Ensures `source` is electrically up and measured, recursing into its
/// dependencies as needed. On failure, falls back to the internal
/// oscillator unless `no_fallback` is set, in which case the error propagates.
pub fn ensure_up(source: ClockSource, no_fallback: bool) -> Result<ClockSource, ClockError> {
    let physical = registry::resolve(source);

    if registry::entry(physical).ready {
        return Ok(physical);
    }

    if registry::record_failure(physical) {
        return Err(ClockError::Timeout);
    }

    let result = bring_up(physical);

    match result {
        Ok(()) => Ok(physical),
        Err(err) => {
            if no_fallback {
                Err(err)
            } else {
                warn!("clock bring-up failed, falling back to internal oscillator");
                Ok(ClockSource::InternalOscillator)
            }
        }
    }
}

fn bring_up(source: ClockSource) -> Result<(), ClockError> {
    match source {
        ClockSource::InternalOscillator => Ok(()),

        ClockSource::XtalOscillator => ensure_crystal(),

        ClockSource::EnetRxClock | ClockSource::EnetTxClock | ClockSource::GpClockInput => {
            Err(ClockError::NotImplemented)
        }

        ClockSource::MainPll => {
            let input = ensure_up(ClockSource::PrimaryInput, false)?;
            let input_hz = registry::entry(input).measured_frequency_hz;
            let target_hz = registry::entry(ClockSource::MainPll).configured_frequency_hz;
            pll::bring_up_main_pll(input_hz, target_hz).map(|_| ()).map_err(ClockError::Pll)
        }

        ClockSource::UsbPll => {
            let input = ensure_up(ClockSource::PrimaryInput, false)?;
            let input_hz = registry::entry(input).measured_frequency_hz;
            pll::bring_up_usb_pll(input_hz).map(|_| ()).map_err(ClockError::Pll)
        }

        ClockSource::AudioPll => Err(ClockError::NotImplemented),

        ClockSource::DividerAOut
        | ClockSource::DividerBOut
        | ClockSource::DividerCOut
        | ClockSource::DividerDOut
        | ClockSource::DividerEOut => bring_up_divider(source),

        ClockSource::Oscillator32k => {
            // Always-on 32 kHz oscillator; trusted as present on this family.
            registry::mark_ready(source, 32_000);
            Ok(())
        }

        ClockSource::Primary | ClockSource::PrimaryInput => unreachable!("resolved before bring_up"),
    }
}

fn ensure_crystal() -> Result<(), ClockError> {
    let cgu = unsafe { crate::pac::cgu::RegisterBlock::steal() };
    cgu.xtal_control.clear_bypass();
    cgu.xtal_control.enable();
    // The crystal-enable-after-bypass-clear sequence requires a full memory
    // barrier before the startup delay.
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    crate::timer::delay_us(CRYSTAL_STARTUP_DELAY_US);

    let measured = super::monitor::measure(ClockSource::XtalOscillator);
    if measured == 0 {
        return Err(ClockError::Timeout);
    }
    registry::mark_ready(ClockSource::XtalOscillator, measured);
    Ok(())
}

fn bring_up_divider(source: ClockSource) -> Result<(), ClockError> {
    let parent_source = registry::entry(source)
        .parent
        .unwrap_or(ClockSource::PrimaryInput);
    let parent = ensure_up(parent_source, false)?;

    let divider = divider_register(source);
    let configured_divisor = registry::entry(source).configured_frequency_hz;
    let parent_hz = registry::entry(parent).measured_frequency_hz;
    let divisor = if configured_divisor == 0 || parent_hz == 0 {
        1
    } else {
        (parent_hz / configured_divisor).max(1).min(256) as u8
    };

    // A single write combines source, divisor, and powered-on state.
    divider.write(
        divider
            .read()
            .with_power_down(false)
            .with_source(parent as u8)
            .with_divisor(divisor.saturating_sub(1)),
    );

    let measured = super::monitor::measure(source);
    registry::mark_ready(source, measured);
    Ok(())
}

pub(crate) fn divider_register(source: ClockSource) -> &'static crate::pac::cgu::BaseClockReg {
    let cgu = unsafe { crate::pac::cgu::RegisterBlock::steal() };
    match source {
        ClockSource::DividerAOut => &cgu.idiva,
        ClockSource::DividerBOut => &cgu.idivb,
        ClockSource::DividerCOut => &cgu.idivc,
        ClockSource::DividerDOut => &cgu.idivd,
        ClockSource::DividerEOut => &cgu.idive,
        _ => unreachable!("divider_register called with a non-divider source"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_oscillator_is_trivially_up() {
        assert_eq!(ensure_up(ClockSource::InternalOscillator, true), Ok(ClockSource::InternalOscillator));
    }
}
