//! Main PLL (M/N/P parameter search) and USB PLL (table-driven) configurators.
//!
//! Grounded in `platform_clock.c`'s `platform_bring_up_main_pll` and
//! `platform_bring_up_usb_pll`.

use super::registry::ClockSource;
use crate::fmt::*;
use crate::pac;
use crate::pac::cgu::MainPllParams;

/// Errors a PLL configurator can return.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PllError {
    /// Target frequency outside the main PLL's synthesizable range.
    OutOfRange,
    /// Input frequency could not be pre-divided into the PLL's valid input range.
    InputOutOfRange,
    /// The PLL did not lock within the timeout.
    LockTimeout,
    /// The USB PLL's lookup table has no entry for the given input frequency.
    UnsupportedInput,
}

const MAIN_PLL_MIN_HZ: u32 = 9_750_000;
const MAIN_PLL_MAX_HZ: u32 = 320_000_000;
const MAIN_PLL_CCO_LOW_BOUND_HZ: u32 = 156_000_000;
const MAIN_PLL_MAX_INPUT_HZ: u32 = 25_000_000;
const MAIN_PLL_MIN_INPUT_HZ: u32 = 10_000_000;
const MAIN_PLL_MAX_INPUT_DIVISOR: u8 = 4;
const LOCK_TIMEOUT_LOOPS: u32 = 1_000_000;

/// Parameters the search settled on for the main PLL, before programming.
struct MainPllSolution {
    input_divisor_n: u8,
    feedback_divisor_m: u16,
    output_divisor_p_log2: u8,
    bypass_output_divider: bool,
}

/// Searches for M/N/P parameters that produce `target_hz` from `input_hz`.
fn solve_main_pll(input_hz: u32, target_hz: u32) -> Result<MainPllSolution, PllError> {
    if !(MAIN_PLL_MIN_HZ..=MAIN_PLL_MAX_HZ).contains(&target_hz) {
        return Err(PllError::OutOfRange);
    }

    let mut input_divisor_n: u8 = 1;
    let mut effective_input_hz = input_hz;
    while effective_input_hz > MAIN_PLL_MAX_INPUT_HZ {
        if input_divisor_n >= MAIN_PLL_MAX_INPUT_DIVISOR {
            return Err(PllError::InputOutOfRange);
        }
        input_divisor_n += 1;
        effective_input_hz = input_hz / input_divisor_n as u32;
    }
    if effective_input_hz < MAIN_PLL_MIN_INPUT_HZ {
        return Err(PllError::InputOutOfRange);
    }

    // Double the target until it clears the CCO low bound, compensating with
    // the post-divider so the actual output frequency stays at `target_hz`.
    let mut cco_target = target_hz;
    let mut output_divisor_p_log2: u8 = 0;
    let mut bypass_output_divider = true;
    while cco_target < MAIN_PLL_CCO_LOW_BOUND_HZ {
        cco_target *= 2;
        output_divisor_p_log2 += 1;
        bypass_output_divider = false;
    }

    let feedback_divisor_m = ((cco_target as u64 + effective_input_hz as u64 / 2) / effective_input_hz as u64) as u16;

    Ok(MainPllSolution {
        input_divisor_n,
        feedback_divisor_m,
        output_divisor_p_log2,
        bypass_output_divider,
    })
}

/// Brings up the main PLL (PLL1) to `target_hz`, using `input_hz` as the
/// currently-selected input frequency. Updates the registry on success.
pub fn bring_up_main_pll(input_hz: u32, target_hz: u32) -> Result<u32, PllError> {
    let solution = solve_main_pll(input_hz, target_hz)?;
    let cgu = unsafe { pac::cgu::RegisterBlock::steal() };

    cgu.pll1.program(MainPllParams {
        input_divisor_n: solution.input_divisor_n,
        feedback_divisor_m: solution.feedback_divisor_m,
        // The PSEL field is encoded as (real divisor / 2) - 1, i.e. PSEL=0
        // already yields divide-by-2; `output_divisor_p_log2` counts CCO
        // compensation doublings (0 when bypassed), so it needs a -1 here.
        output_divisor_p: solution.output_divisor_p_log2.saturating_sub(1),
        bypass_output_divider: solution.bypass_output_divider,
        // Non-integer feedback trades jitter for finer frequency-selection
        // granularity; kept as the original's default choice.
        use_non_integer_feedback: true,
        source: super::registry::resolve(ClockSource::PrimaryInput) as u8,
    });
    cgu.pll1.power_up();

    for _ in 0..LOCK_TIMEOUT_LOOPS {
        if cgu.pll1.locked() {
            let measured = super::monitor::measure(ClockSource::MainPll);
            super::registry::mark_ready(ClockSource::MainPll, measured);
            return Ok(measured);
        }
    }

    warn!("main PLL failed to lock within timeout");
    Err(PllError::LockTimeout)
}

/// USB PLL M-divider/NP-divider table entries, indexed by input frequency in MHz.
/// Grounded in the original's `usb_pll_table`; only the 480 MHz target is supported.
struct UsbPllTableEntry {
    input_mhz: u32,
    m_divider_encoded: u32,
}

const USB_PLL_NP_DIVIDER_ENCODED: u32 = 0x0002_0003;

const USB_PLL_TABLE: &[UsbPllTableEntry] = &[
    UsbPllTableEntry { input_mhz: 12, m_divider_encoded: 0x0006_0073 },
    UsbPllTableEntry { input_mhz: 16, m_divider_encoded: 0x0006_0077 },
    UsbPllTableEntry { input_mhz: 24, m_divider_encoded: 0x0006_007B },
];

/// The USB PLL's only supported output frequency.
const USB_PLL_TARGET_HZ: u32 = 480_000_000;

/// Brings up the USB PLL to 480 MHz from `input_hz`.
pub fn bring_up_usb_pll(input_hz: u32) -> Result<u32, PllError> {
    let input_mhz = input_hz / 1_000_000;
    let entry = USB_PLL_TABLE
        .iter()
        .find(|e| e.input_mhz == input_mhz)
        .ok_or(PllError::UnsupportedInput)?;

    // The monitor's direct-vs-divider-assisted dispatch estimates a source's
    // frequency from its registry `configured_frequency_hz`; the USB PLL's
    // is never otherwise set, so without this its 480 MHz output would be
    // measured directly and saturate the tick counter before the reference
    // window elapses.
    super::registry::with_entry_mut(ClockSource::UsbPll, |e| {
        e.configured_frequency_hz = USB_PLL_TARGET_HZ;
    });

    let cgu = unsafe { pac::cgu::RegisterBlock::steal() };
    cgu.pll_usb.power_down();
    cgu.pll_usb
        .set_control(true, true, false, false, super::registry::resolve(ClockSource::PrimaryInput) as u8);
    cgu.pll_usb.write_m_divider_encoded(entry.m_divider_encoded);
    cgu.pll_usb.write_np_divider_encoded(USB_PLL_NP_DIVIDER_ENCODED);
    cgu.pll_usb
        .set_control(false, true, true, true, super::registry::resolve(ClockSource::PrimaryInput) as u8);

    for _ in 0..LOCK_TIMEOUT_LOOPS {
        if cgu.pll_usb.locked() {
            cgu.pll_usb
                .set_control(false, false, true, true, super::registry::resolve(ClockSource::PrimaryInput) as u8);
            let measured = super::monitor::measure(ClockSource::UsbPll);
            super::registry::mark_ready(ClockSource::UsbPll, measured);
            return Ok(measured);
        }
    }

    warn!("USB PLL failed to lock within timeout");
    Err(PllError::LockTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_1_204mhz_from_12mhz_crystal() {
        let solution = solve_main_pll(12_000_000, 204_000_000).unwrap();
        assert_eq!(solution.input_divisor_n, 1);
        assert_eq!(solution.feedback_divisor_m, 17);
        assert!(solution.bypass_output_divider);
    }

    #[test]
    fn cco_low_bound_doubles_and_compensates() {
        // 20 MHz target is below the 156 MHz CCO bound; expect one doubling.
        let solution = solve_main_pll(12_000_000, 20_000_000).unwrap();
        assert_eq!(solution.output_divisor_p_log2, 3);
        assert!(!solution.bypass_output_divider);
    }

    #[test]
    fn rejects_out_of_range_target() {
        assert_eq!(solve_main_pll(12_000_000, 500_000_000), Err(PllError::OutOfRange));
    }

    #[test]
    fn usb_pll_table_has_no_entry_for_unsupported_input() {
        let result = USB_PLL_TABLE.iter().find(|e| e.input_mhz == 20);
        assert!(result.is_none());
    }
}
