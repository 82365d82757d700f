//! Hardware-assisted frequency measurement.
//!
//! Grounded in `platform_clock.c`'s `platform_measure_clock_source` and
//! `platform_measure_clock_source_with_divider`; uses the CGU frequency
//! monitor register at offset 0x14, described by [`crate::pac::cgu`].

use super::registry::ClockSource;
use crate::fmt::*;
use crate::pac;

const MAX_REFERENCE_WINDOW: u16 = 0x1FF;
const MAX_OBSERVED_TICKS: u16 = 0x3FFF;

/// Threshold above which direct measurement is unreliable and the
/// divider-assisted path is used instead.
const DIVIDER_ASSISTED_THRESHOLD_HZ: u32 = 240_000_000;

/// Frequency-monitor source selector values, matching the CGU's 5-bit
/// `source` field in the frequency-monitor register -- the same encoding
/// used by base-clock source-select fields.
fn monitor_source_select(source: ClockSource) -> u8 {
    source as u8
}

/// Busy-waits for the frequency monitor to complete, bounded by `timeout_loops`
/// spin iterations (there is no dedicated hardware timeout for this register).
fn wait_for_measurement(cgu: &pac::cgu::RegisterBlock, timeout_loops: u32) -> bool {
    for _ in 0..timeout_loops {
        if !cgu.frequency_monitor.read().measurement_active() {
            return true;
        }
    }
    false
}

const LIVENESS_TIMEOUT_LOOPS: u32 = 100_000;

/// Measures `source` directly against `reference_frequency_hz`, returning the
/// measured frequency in Hz, or `0` if the source is too slow to measure or
/// never completed a liveness probe.
fn measure_direct(source: ClockSource, reference_frequency_hz: u32) -> u32 {
    let cgu = unsafe { pac::cgu::RegisterBlock::steal() };
    let select = monitor_source_select(source);

    // Liveness probe: a single-tick window with a bounded timeout.
    cgu.frequency_monitor.start_measurement(select, 1);
    if !wait_for_measurement(cgu, LIVENESS_TIMEOUT_LOOPS) {
        warn!("clock monitor: liveness probe timed out, declaring 0 Hz");
        return 0;
    }

    let mut window = MAX_REFERENCE_WINDOW;
    cgu.frequency_monitor.start_measurement(select, window);
    wait_for_measurement(cgu, LIVENESS_TIMEOUT_LOOPS);
    let mut result = cgu.frequency_monitor.read();
    let mut observed = result.observed_clock_ticks();

    if observed == 0 {
        return 0;
    }

    if observed >= MAX_OBSERVED_TICKS {
        // The observed counter saturated before the window elapsed; the
        // in-progress period needs to be accounted for.
        observed += 1;
    } else {
        // The window elapsed fully; shrink it to eliminate a fractional
        // trailing edge, stopping one tick before the observed count changes.
        while window > 1 {
            let next_window = window - 1;
            cgu.frequency_monitor.start_measurement(select, next_window);
            wait_for_measurement(cgu, LIVENESS_TIMEOUT_LOOPS);
            let next = cgu.frequency_monitor.read();
            if next.observed_clock_ticks() != observed {
                break;
            }
            window = next_window;
            result = next;
        }
        observed = result.observed_clock_ticks();
    }

    ((observed as u64 * reference_frequency_hz as u64) / window as u64) as u32
}

/// Measures the internal oscillator against the external crystal, producing
/// a calibrated reference frequency for subsequent direct measurements.
fn calibrate_internal_oscillator() -> u32 {
    let cgu = unsafe { pac::cgu::RegisterBlock::steal() };
    let xtal_hz = super::registry::entry(ClockSource::XtalOscillator).measured_frequency_hz;

    let mut window = MAX_REFERENCE_WINDOW;
    cgu.frequency_monitor
        .start_measurement(monitor_source_select(ClockSource::InternalOscillator), window);
    wait_for_measurement(cgu, LIVENESS_TIMEOUT_LOOPS);
    let mut result = cgu.frequency_monitor.read();
    let mut observed = result.observed_clock_ticks();

    if observed < MAX_OBSERVED_TICKS {
        while window > 1 {
            let next_window = window - 1;
            cgu.frequency_monitor
                .start_measurement(monitor_source_select(ClockSource::InternalOscillator), next_window);
            wait_for_measurement(cgu, LIVENESS_TIMEOUT_LOOPS);
            let next = cgu.frequency_monitor.read();
            if next.observed_clock_ticks() != observed {
                break;
            }
            window = next_window;
            result = next;
        }
        observed = result.observed_clock_ticks();
    }

    // Measuring the IRC against the crystal inverts the usual formula: the
    // crystal is the down-counting window, the IRC is the up-counter.
    ((window as u64 * xtal_hz as u64) / observed.max(1) as u64) as u32
}

/// Measures a divider output by commandeering integer divider A, dividing
/// `source` by 4, and multiplying the result back. Used above
/// [`DIVIDER_ASSISTED_THRESHOLD_HZ`].
fn measure_via_divider(source: ClockSource, reference_frequency_hz: u32) -> u32 {
    let cgu = unsafe { pac::cgu::RegisterBlock::steal() };
    let saved = cgu.idiva.read();

    if !saved.power_down() && saved.source() == monitor_source_select(source) {
        // Divider A is already dividing this exact source; just measure it
        // and multiply back by its configured divisor.
        let divisor = saved.divisor() as u32 + 1;
        let measured = measure_direct(ClockSource::DividerAOut, reference_frequency_hz);
        return measured.saturating_mul(divisor);
    }

    cgu.idiva.write(
        saved
            .with_power_down(false)
            .with_source(monitor_source_select(source))
            .with_divisor(3), // divisor field is value-1; 3 encodes /4
    );

    let measured = measure_direct(ClockSource::DividerAOut, reference_frequency_hz);
    cgu.idiva.write(saved);

    measured.saturating_mul(4)
}

/// Measures `source`'s frequency in Hz, choosing the direct or
/// divider-assisted algorithm as appropriate, calibrating the internal
/// oscillator against the crystal first when it is not the source itself.
pub fn measure(source: ClockSource) -> u32 {
    let reference_frequency_hz = if source == ClockSource::InternalOscillator {
        super::registry::entry(ClockSource::XtalOscillator).measured_frequency_hz
    } else {
        calibrate_internal_oscillator()
    };

    // A rough estimate drives the direct-vs-divider-assisted choice; the
    // registry's previously configured frequency is used as that estimate.
    let estimate = super::registry::entry(source).configured_frequency_hz;
    if estimate > DIVIDER_ASSISTED_THRESHOLD_HZ {
        measure_via_divider(source, reference_frequency_hz)
    } else {
        measure_direct(source, reference_frequency_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_source_select_matches_enum_discriminant() {
        assert_eq!(monitor_source_select(ClockSource::XtalOscillator), 0x06);
        assert_eq!(monitor_source_select(ClockSource::MainPll), 0x09);
    }
}
