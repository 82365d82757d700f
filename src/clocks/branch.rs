//! Branch/base clock control: enable/disable, in-use detection, automatic
//! teardown of unused base clocks, and CPU base-clock soft-start.
//!
//! Grounded in `platform_clock.c`'s `platform_enable_branch_clock` /
//! `platform_disable_branch_clock` / `platform_soft_start_cpu_clock`.

use core::cell::Cell;
use critical_section::Mutex;

use super::registry::{self, ClockSource};
use super::solver::{self, ClockError};
use crate::fmt::*;
use crate::pac;
use crate::pac::ccu::BranchClockReg;

/// Threshold above which the CPU base clock requires soft-start sequencing.
const SOFT_START_THRESHOLD_HZ: u32 = 110_000_000;
const SOFT_START_HOLD_US: u32 = 50;

/// Caps recursive propagation depth as a defense against a hardware
/// dependency cycle the solver otherwise assumes can't exist (spec §9
/// Design Notes, "Cyclic clock-dependency resolution").
const MAX_PROPAGATION_DEPTH: u8 = 8;

/// A downstream consumer informed when propagation reaches a branch/base
/// clock rooted at some source, as `(source, new_frequency_hz)`.
pub type FrequencyChangeConsumer = fn(ClockSource, u32);

const MAX_FREQUENCY_CHANGE_CONSUMERS: usize = 4;

static CONSUMERS: Mutex<Cell<[Option<FrequencyChangeConsumer>; MAX_FREQUENCY_CHANGE_CONSUMERS]>> =
    Mutex::new(Cell::new([None; MAX_FREQUENCY_CHANGE_CONSUMERS]));

/// Guards propagation against reentrant invocation (spec §5: "must not be
/// invoked from within a change handler").
static PROPAGATING: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

/// Registers `consumer` to be called whenever frequency-change propagation
/// reaches a base clock sourced from some clock source, with that source and
/// its newly measured frequency. Expected to be called during init, before
/// any clock bring-up that could trigger propagation.
pub fn register_frequency_change_consumer(consumer: FrequencyChangeConsumer) {
    critical_section::with(|cs| {
        let mut consumers = CONSUMERS.borrow(cs).get();
        match consumers.iter_mut().find(|c| c.is_none()) {
            Some(slot) => *slot = Some(consumer),
            None => warn!("frequency-change consumer table full; dropping registration"),
        }
        CONSUMERS.borrow(cs).set(consumers);
    });
}

fn inform_consumers(source: ClockSource, frequency_hz: u32) {
    critical_section::with(|cs| {
        for consumer in CONSUMERS.borrow(cs).get().into_iter().flatten() {
            consumer(source, frequency_hz);
        }
    });
}

/// Branch clocks that must never be disabled (CPU bus, CPU core).
fn is_protected(is_bus: bool, is_core: bool) -> bool {
    is_bus || is_core
}

/// Enables a base clock, resolving its configured source and writing
/// source/divisor/power in a single register write.
pub fn enable_base_clock(base: &pac::cgu::BaseClockReg, source: ClockSource, divisor: Option<u8>, no_fallback: bool) -> Result<(), ClockError> {
    let current = base.read();
    if !current.power_down() {
        // Idempotence: an already-powered base clock is left untouched.
        return Ok(());
    }

    let resolved = solver::ensure_up(source, no_fallback)?;
    let mut next = current.with_power_down(false).with_source(resolved as u8);
    if let Some(divisor) = divisor {
        next = next.with_divisor(divisor);
    }
    base.write(next);
    Ok(())
}

/// Powers a base clock down iff nothing currently depends on it.
pub fn disable_base_clock_if_unused(base: &pac::cgu::BaseClockReg, base_source_id: u8, hardware_needed: bool) {
    if hardware_needed || is_base_clock_in_use(base_source_id) {
        return;
    }
    base.modify(|bits| bits.with_power_down(true));
}

/// Every base-clock register in the CGU block, used both for unused-base
/// teardown and frequency-change propagation.
fn base_clock_registers(cgu: &pac::cgu::RegisterBlock) -> [&pac::cgu::BaseClockReg; 28] {
    [
        &cgu.idiva, &cgu.idivb, &cgu.idivc, &cgu.idivd, &cgu.idive, &cgu.safe, &cgu.usb0, &cgu.periph, &cgu.usb1,
        &cgu.m4, &cgu.spifi, &cgu.spi, &cgu.phy_rx, &cgu.phy_tx, &cgu.apb1, &cgu.apb3, &cgu.lcd, &cgu.adchs,
        &cgu.sdio, &cgu.ssp0, &cgu.ssp1, &cgu.uart0, &cgu.uart1, &cgu.uart2, &cgu.uart3, &cgu.out, &cgu.audio,
        &cgu.out0, &cgu.out1,
    ]
}

fn is_base_clock_in_use(base_source_id: u8) -> bool {
    // Scans every base clock, PLL, and divider for one that currently
    // selects `base_source_id` as its source.
    let cgu = unsafe { pac::cgu::RegisterBlock::steal() };
    let base_in_use = base_clock_registers(cgu)
        .iter()
        .any(|b| !b.read().power_down() && b.read().source() == base_source_id);
    let pll_in_use = cgu.pll1.control_selects(base_source_id)
        || cgu.pll_usb.control_selects(base_source_id)
        || cgu.pll_audio.control_selects(base_source_id);

    base_in_use || pll_in_use
}

/// Enables a branch clock: enables its base clock and any bus clock it
/// depends on, clears auto-disable, sets the divisor for "divideable"
/// clocks, and sets enable.
pub fn enable_branch_clock(
    branch: &BranchClockReg,
    bus_branch: Option<&BranchClockReg>,
    base: &pac::cgu::BaseClockReg,
    base_source: ClockSource,
    divisor: Option<u8>,
    no_fallback: bool,
) -> Result<(), ClockError> {
    enable_base_clock(base, base_source, None, no_fallback)?;
    if let Some(bus) = bus_branch {
        bus.set_auto_disable(false);
        bus.set_enable();
    }
    branch.set_auto_disable(false);
    if let Some(divisor) = divisor {
        let control = pac::ccu::BranchClockControl::new(true, false, false, divisor);
        branch.set_control(control);
    } else {
        branch.set_enable();
    }
    Ok(())
}

/// Disables a branch clock, attempting to tear down its base clock if it
/// becomes unused. Refuses clocks flagged `protected` (CPU bus/core).
pub fn disable_branch_clock(
    branch: &BranchClockReg,
    base: &pac::cgu::BaseClockReg,
    base_source_id: u8,
    hardware_needed: bool,
    protected: bool,
) {
    if protected {
        warn!("refusing to disable a protected branch clock");
        return;
    }
    // The auto-disable flags must be written, then a full barrier issued,
    // strictly before the enable bit is cleared.
    branch.set_auto_disable(true);
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    branch.clear_enable();

    disable_base_clock_if_unused(base, base_source_id, hardware_needed);
}

/// Soft-starts the CPU base clock to `target_hz` via the main PLL, required
/// above [`SOFT_START_THRESHOLD_HZ`]. Switches to the internal oscillator,
/// brings the PLL up at the target, engages the half-speed output divider,
/// switches back, holds briefly, then undoes the divider.
pub fn soft_start_cpu_clock(target_hz: u32) -> Result<(), ClockError> {
    let cgu = unsafe { pac::cgu::RegisterBlock::steal() };

    if target_hz <= SOFT_START_THRESHOLD_HZ {
        enable_base_clock(&cgu.m4, ClockSource::MainPll, None, false)?;
        notify_frequency_change(ClockSource::MainPll);
        return Ok(());
    }

    cgu.m4
        .modify(|bits| bits.with_source(ClockSource::InternalOscillator as u8));
    notify_frequency_change(ClockSource::InternalOscillator);

    let input = solver::ensure_up(ClockSource::PrimaryInput, false)?;
    let input_hz = registry::entry(input).measured_frequency_hz;
    super::pll::bring_up_main_pll(input_hz, target_hz).map_err(ClockError::Pll)?;

    cgu.pll1.set_output_divider_bypass(false);
    cgu.m4.modify(|bits| bits.with_source(ClockSource::MainPll as u8));
    notify_frequency_change(ClockSource::MainPll);

    crate::timer::delay_us(SOFT_START_HOLD_US);

    cgu.pll1.set_output_divider_bypass(true);
    wait_for_pll1_lock();

    Ok(())
}

fn wait_for_pll1_lock() {
    let cgu = unsafe { pac::cgu::RegisterBlock::steal() };
    for _ in 0..1_000_000 {
        if cgu.pll1.locked() {
            return;
        }
    }
    warn!("PLL1 re-lock after soft-start divider change timed out");
}

/// Walks base clocks, PLLs, and integer dividers selecting `source` and
/// invokes their change handlers, depth-first and non-reentrant. A call
/// arriving while propagation is already in progress is dropped with a
/// warning rather than queued, per spec §5's "must not be invoked from
/// within a change handler" ordering guarantee.
fn notify_frequency_change(source: ClockSource) {
    let already_propagating = critical_section::with(|cs| {
        let cell = PROPAGATING.borrow(cs);
        if cell.get() {
            true
        } else {
            cell.set(true);
            false
        }
    });

    if already_propagating {
        warn!("frequency-change propagation invoked re-entrantly; dropping");
        return;
    }

    propagate(source, 0);

    critical_section::with(|cs| PROPAGATING.borrow(cs).set(false));
}

/// One level of the depth-first walk described in spec §4.F: base clocks
/// directly sourced from `source` inform registered consumers; PLLs and
/// integer dividers selecting `source` are remeasured and recursed into,
/// since their own output changed as a result.
fn propagate(source: ClockSource, depth: u8) {
    if depth >= MAX_PROPAGATION_DEPTH {
        warn!("frequency-change propagation exceeded max depth; assuming a dependency cycle");
        return;
    }

    let cgu = unsafe { pac::cgu::RegisterBlock::steal() };
    let select = source as u8;
    let source_frequency_hz = registry::entry(source).measured_frequency_hz;

    for base in base_clock_registers(cgu) {
        let bits = base.read();
        if bits.power_down() || bits.source() != select {
            continue;
        }
        let divisor = bits.divisor() as u32 + 1;
        inform_consumers(source, source_frequency_hz / divisor);
    }

    for (pll_source, selects_source) in [
        (ClockSource::MainPll, cgu.pll1.control_selects(select)),
        (ClockSource::UsbPll, cgu.pll_usb.control_selects(select)),
        (ClockSource::AudioPll, cgu.pll_audio.control_selects(select)),
    ] {
        if selects_source && registry::entry(pll_source).ready {
            let measured = super::monitor::measure(pll_source);
            registry::mark_ready(pll_source, measured);
            propagate(pll_source, depth + 1);
        }
    }

    for divider in [
        ClockSource::DividerAOut,
        ClockSource::DividerBOut,
        ClockSource::DividerCOut,
        ClockSource::DividerDOut,
        ClockSource::DividerEOut,
    ] {
        if divider == source || !registry::entry(divider).ready {
            continue;
        }
        let bits = solver::divider_register(divider).read();
        if bits.power_down() || bits.source() != select {
            continue;
        }
        let measured = super::monitor::measure(divider);
        registry::mark_ready(divider, measured);
        propagate(divider, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_branch_clocks_refuse_disable() {
        // is_protected is a pure classification helper; exercised directly
        // since disable_branch_clock needs real register state.
        assert!(is_protected(true, false));
        assert!(is_protected(false, true));
        assert!(!is_protected(false, false));
    }
}
