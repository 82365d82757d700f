//! Function setup orchestration, prepopulation, run/halt, and the running
//! query.
//!
//! Grounded in `original_source/.../lpc43xx/drivers/sgpio.c`'s
//! `sgpio_set_up_functions`, `sgpio_run`, `sgpio_halt`, and `sgpio_running`.

use crate::chip::interrupt::Interrupt;
use crate::fmt::*;
use crate::interrupt;
use crate::nvic;
use crate::pac;

use super::isr::{self, CopyRoutine};
use super::optimizer;
use super::planner;
use super::{Sgpio, SgpioError, SgpioFunction, NUM_SLICES};

use core::cell::Cell;
use critical_section::Mutex;

/// The function currently wired to the `SGPIO` interrupt vector, if any.
/// Installed by [`run`], cleared by [`halt`].
///
/// # Safety
/// The pointed-to [`SgpioFunction`] must outlive the `Sgpio` it came from
/// for as long as the SGPIO interrupt can fire, which `run`/`halt` jointly
/// guarantee by construction: `run` only installs a pointer borrowed from
/// the caller's own `&mut Sgpio`, and `halt` disables the interrupt and
/// clears the pointer before returning.
#[derive(Clone, Copy)]
struct ActiveIsr {
    function: *mut SgpioFunction<'static>,
    io_slice: u8,
    routine: CopyRoutine,
}

// SAFETY: the raw pointer is only ever dereferenced from the SGPIO ISR,
// which runs on this single core with interrupts otherwise masked.
unsafe impl Send for ActiveIsr {}

static ACTIVE_ISR: Mutex<Cell<Option<ActiveIsr>>> = Mutex::new(Cell::new(None));

/// Resets bookkeeping, runs the planner over every enabled function, then
/// grows buffer depth as far as the optimizer allows and applies shift
/// limits across the final chains.
///
/// Per spec, a setup failure on any function aborts the whole call with
/// that function's error code; slices claimed by functions configured
/// before the failure are left claimed (the caller should not retry
/// without calling [`halt`] first, were the engine already running).
pub fn set_up_functions(sgpio: &mut Sgpio) -> Result<(), SgpioError> {
    sgpio.slices_in_use = 0;
    sgpio.pins_in_use = 0;
    sgpio.swap_irqs_required = 0;

    for index in 0..sgpio.functions.len() {
        planner::set_up_function(sgpio, index)?;
    }

    while !optimizer::attempt_buffer_optimization(sgpio)? {}

    optimizer::enforce_all_shift_limits(sgpio)?;

    let mut isr_function: Option<usize> = None;
    for index in 0..sgpio.functions.len() {
        if !sgpio.functions[index].enabled {
            continue;
        }
        if isr::requires_isr(&sgpio.functions[index]) {
            if isr_function.is_some() {
                warn!("more than one SGPIO function needs interrupt-driven refilling");
                return Err(SgpioError::MultipleIrqFunctionsUnsupported);
            }
            isr_function = Some(index);
            sgpio.swap_irqs_required |= 1 << sgpio.functions[index].io_slice;
        }
    }

    Ok(())
}

/// Writes `function`'s current buffer contents into its slice chain's data
/// and shadow registers so the first swap after [`run`] starts from real
/// data rather than whatever was last latched.
fn prepopulate(reg: &pac::sgpio::RegisterBlock, function: &mut SgpioFunction) {
    use super::SgpioFunctionMode::*;

    if !matches!(function.mode, StreamDataOut | FixedDataOut | StreamBidirectional) {
        return;
    }

    let chain_slices = 1u8 << function.buffer_depth_order;
    let mask = (1u32 << function.buffer_order) - 1;
    let mut position = 0u32;

    for depth in 0..chain_slices {
        let Some(slice) = planner::slice_in_concatenation(function.io_slice, depth) else { continue };
        let mut bytes = [0u8; 4];
        for byte in bytes.iter_mut() {
            *byte = function.buffer[(position & mask) as usize];
            position = position.wrapping_add(1);
        }
        let word = u32::from_le_bytes(bytes);
        reg.data[slice as usize].write(word);
        reg.data_shadow[slice as usize].write(word);
    }
    function.position_in_buffer = position & mask;

    if function.mode == StreamBidirectional {
        if let Some(direction_buffer) = function.direction_buffer.as_deref_mut() {
            let direction_chain_slices = 1u8 << function.direction_buffer_depth_order;
            let direction_mask = (1u32 << function.direction_buffer_order) - 1;
            let mut direction_position = 0u32;

            for depth in 0..direction_chain_slices {
                let Some(slice) = planner::slice_in_concatenation(function.direction_slice, depth) else {
                    continue;
                };
                let mut bytes = [0u8; 4];
                for byte in bytes.iter_mut() {
                    *byte = direction_buffer[(direction_position & direction_mask) as usize];
                    direction_position = direction_position.wrapping_add(1);
                }
                let word = u32::from_le_bytes(bytes);
                reg.data[slice as usize].write(word);
                reg.data_shadow[slice as usize].write(word);
            }
            function.position_in_direction_buffer = direction_position & direction_mask;
        }
    }
}

/// Starts every configured, enabled function: prepopulates output buffers,
/// arms the exchange-clock interrupt for whichever single function needs
/// one, and enables the slices' shift clocks together.
pub fn run(sgpio: &mut Sgpio) -> Result<(), SgpioError> {
    let reg = unsafe { pac::sgpio::RegisterBlock::steal() };

    reg.shift_clock_enable.write(0);
    reg.exchange_clock_interrupt.disable_slices(u32::MAX);
    reg.exchange_clock_interrupt.acknowledge(u32::MAX);
    nvic::disable(Interrupt::SGPIO);

    critical_section::with(|cs| ACTIVE_ISR.borrow(cs).set(None));

    let mut shift_clock_enable_mask = 0u32;
    let mut selected: Option<ActiveIsr> = None;

    for index in 0..sgpio.functions.len() {
        if !sgpio.functions[index].enabled {
            continue;
        }

        prepopulate(reg, &mut sgpio.functions[index]);

        let io_slice = sgpio.functions[index].io_slice;
        shift_clock_enable_mask |= 1 << io_slice;
        if sgpio.functions[index].mode == super::SgpioFunctionMode::StreamBidirectional {
            shift_clock_enable_mask |= 1 << sgpio.functions[index].direction_slice;
        }

        if sgpio.swap_irqs_required & (1 << io_slice) != 0 {
            let Some(routine) = isr::routine_for(&sgpio.functions[index]) else { continue };
            // SAFETY: see `ActiveIsr`'s doc comment. `sgpio` (and hence this
            // function's buffer) is guaranteed by the caller to live until
            // `halt` is called, which clears this pointer before returning.
            let function_ptr = &mut sgpio.functions[index] as *mut SgpioFunction
                as *mut SgpioFunction<'static>;
            selected = Some(ActiveIsr { function: function_ptr, io_slice, routine });
        }
    }

    if let Some(active) = selected {
        critical_section::with(|cs| ACTIVE_ISR.borrow(cs).set(Some(active)));
        reg.exchange_clock_interrupt.enable_slices(1 << active.io_slice);
        unsafe { nvic::enable(Interrupt::SGPIO) };
    }

    reg.shift_clock_enable.write(shift_clock_enable_mask);
    sgpio.running = true;
    Ok(())
}

/// Stops every shift clock and disarms the exchange-clock interrupt,
/// draining whatever the last incomplete swap left in each running
/// function's shadow registers into its buffer first.
pub fn halt(sgpio: &mut Sgpio) {
    let reg = unsafe { pac::sgpio::RegisterBlock::steal() };

    reg.shift_clock_enable.write(0);
    reg.exchange_clock_interrupt.disable_slices(u32::MAX);
    nvic::disable(Interrupt::SGPIO);
    critical_section::with(|cs| ACTIVE_ISR.borrow(cs).set(None));

    for index in 0..sgpio.functions.len() {
        if !sgpio.functions[index].enabled {
            continue;
        }
        if sgpio.functions[index].mode == super::SgpioFunctionMode::StreamDataIn {
            if let Some(routine) = isr::routine_for(&sgpio.functions[index]) {
                routine(&mut sgpio.functions[index], reg);
            }
        }
    }

    sgpio.running = false;
}

/// Whether `function_index` is currently shifting: true iff any slice in its
/// chain has its shift clock enabled and a nonzero cycle counter.
pub fn running(sgpio: &Sgpio, function_index: usize) -> bool {
    if !sgpio.running {
        return false;
    }
    let Some(function) = sgpio.functions.get(function_index) else { return false };
    if !function.enabled {
        return false;
    }

    let reg = unsafe { pac::sgpio::RegisterBlock::steal() };
    let enable_mask = reg.shift_clock_enable.read();
    let chain_slices = 1u8 << function.buffer_depth_order;

    for depth in 0..chain_slices {
        let Some(slice) = planner::slice_in_concatenation(function.io_slice, depth) else { continue };
        let slice = slice as usize;
        if slice >= NUM_SLICES {
            continue;
        }
        if enable_mask & (1 << slice) != 0 && reg.cycle_count[slice].read() != 0 {
            return true;
        }
    }
    false
}

/// Installed as the vector for the SGPIO exchange-clock interrupt:
/// acknowledges it and dispatches to whichever single function currently
/// needs interrupt-driven refilling.
#[cfg(feature = "rt")]
#[interrupt]
fn SGPIO() {
    let reg = unsafe { pac::sgpio::RegisterBlock::steal() };

    let active = critical_section::with(|cs| ACTIVE_ISR.borrow(cs).get());
    let Some(active) = active else {
        reg.exchange_clock_interrupt.acknowledge(u32::MAX);
        return;
    };

    if reg.exchange_clock_interrupt.pending() & (1 << active.io_slice) == 0 {
        return;
    }
    reg.exchange_clock_interrupt.acknowledge(1 << active.io_slice);

    // SAFETY: `active.function` was installed by `run` from a live `&mut
    // SgpioFunction` and is cleared by `halt` before the interrupt is ever
    // disarmed at the NVIC, so it is valid for the lifetime of this call.
    let function = unsafe { &mut *active.function };
    (active.routine)(function, reg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pac::scu::ResistorConfig;
    use crate::sgpio::{
        SgpioCaptureEdge, SgpioClockQualifier, SgpioClockSource, SgpioFunctionMode,
        SgpioFunctionOverrides, SgpioPinConfiguration, MAXIMUM_BUS_WIDTH,
    };

    fn blank_pins() -> [SgpioPinConfiguration; MAXIMUM_BUS_WIDTH] {
        [SgpioPinConfiguration { sgpio_pin: 0, scu_group: 0, scu_pin: 0, pull: ResistorConfig::NoPull }; MAXIMUM_BUS_WIDTH]
    }

    fn clock_generation_function<'a>(buffer: &'a mut [u8]) -> SgpioFunction<'a> {
        SgpioFunction {
            enabled: true,
            mode: SgpioFunctionMode::ClockGeneration,
            pin_configurations: blank_pins(),
            bus_width: 1,
            shift_clock_source: SgpioClockSource::Local,
            shift_clock_edge: SgpioCaptureEdge::Rising,
            shift_clock_input: None,
            shift_clock_frequency: 1_000_000,
            shift_clock_qualifier: SgpioClockQualifier::Always,
            shift_clock_qualifier_is_active_low: false,
            shift_clock_qualifier_input: None,
            shift_clock_output: None,
            buffer,
            buffer_order: 0,
            direction_buffer: None,
            direction_buffer_order: 0,
            position_in_buffer: 0,
            position_in_direction_buffer: 0,
            shift_count_limit: 0,
            data_in_buffer: 0,
            overrides: SgpioFunctionOverrides::default(),
            io_slice: 0,
            buffer_depth_order: 0,
            direction_slice: 0,
            direction_buffer_depth_order: 0,
        }
    }

    #[test]
    fn not_running_before_run_is_called() {
        let mut buffer = [0u8; 1];
        let mut functions = [clock_generation_function(&mut buffer)];
        let sgpio = Sgpio::new(&mut functions, 12_000_000);
        assert!(!running(&sgpio, 0));
    }

    #[test]
    fn running_is_false_for_an_out_of_range_index() {
        let mut buffer = [0u8; 1];
        let mut functions = [clock_generation_function(&mut buffer)];
        let mut sgpio = Sgpio::new(&mut functions, 12_000_000);
        sgpio.running = true;
        assert!(!running(&sgpio, 5));
    }
}
