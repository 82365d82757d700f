//! Buffer-depth growth: chains adjacent free slices onto a function's I/O
//! (and, for bidirectional functions, direction) slice so its double-buffer
//! holds more data before the data-shuttle ISR needs to run.
//!
//! Grounded in `original_source/.../lpc43xx/drivers/sgpio.c`'s
//! `sgpio_attempt_buffer_optimization` and its helpers (`sgpio_slices_for_buffer_free`,
//! `sgpio_copy_slice_properties`, `sgpio_attempt_to_double_buffer_size`,
//! `sgpio_attempt_to_double_direction_buffer_size`,
//! `sgpio_ensure_direction_specification_is_possible`, `sgpio_apply_shift_limits`,
//! `sgpio_set_up_double_buffering`, `sgpio_enforce_all_shift_limits`).

use crate::pac;

use super::planner::slice_in_concatenation;
use super::{Sgpio, SgpioError, SgpioFunction, SgpioFunctionMode, BITS_PER_SLICE, MAXIMUM_SLICE_CHAIN_DEPTH, NUM_SLICES};

/// Programs `slice`'s buffer-swap-control register so the data/shadow
/// registers swap every `shifts_per_swap` shifts, where `shifts_per_swap` is
/// however many `bus_width`-wide samples a `total_concatenated_slices`-deep
/// chain holds, and ensures shifting doesn't stop at that swap.
///
/// A chain of 8 slices shifting 1 bit at a time holds exactly 256 shifts,
/// which overflows the register's 8-bit field; the original relies on this
/// wrapping to `0 - 1 = 255`, so the arithmetic here deliberately matches it
/// with a `u8` truncation followed by a wrapping subtract.
pub(super) fn set_up_double_buffering(
    reg: &pac::sgpio::RegisterBlock,
    slice: u8,
    total_concatenated_slices: u8,
    bus_width: u8,
) {
    let shifts_per_swap = ((BITS_PER_SLICE * total_concatenated_slices as u32) / bus_width as u32) as u8;
    let encoded = shifts_per_swap.wrapping_sub(1);
    reg.data_buffer_swap_control[slice as usize].write(encoded, encoded);
    reg.stop_on_next_buffer_swap.clear_bits(1 << slice);
}

/// Limits how many shifts `slice` performs before halting, if `function`
/// requested a `shift_count_limit`. A limit of zero means "unlimited" and is
/// a no-op.
pub(super) fn apply_shift_limits(
    reg: &pac::sgpio::RegisterBlock,
    function: &SgpioFunction,
    slice: u8,
    total_concatenated_slices: u8,
    bus_width: u8,
) -> Result<(), SgpioError> {
    let shifts_per_swap = ((BITS_PER_SLICE * total_concatenated_slices as u32) / bus_width as u32) as u8;

    if function.shift_count_limit == 0 {
        return Ok(());
    }

    if function.shift_count_limit > shifts_per_swap as u32 {
        return Err(SgpioError::ShiftLimitExceedsChain);
    }

    reg.data_buffer_swap_control[slice as usize].write((function.shift_count_limit - 1) as u8, 0);
    reg.stop_on_next_buffer_swap.set_bits(1 << slice);

    Ok(())
}

/// Copies one slice's clocking, feature, and swap-control configuration to
/// another, so a newly-grown chain slice matches the chain it joins.
pub(super) fn copy_slice_properties(reg: &pac::sgpio::RegisterBlock, to_slice: u8, from_slice: u8) {
    let (to, from) = (to_slice as usize, from_slice as usize);

    reg.shift_configuration[to].write(reg.shift_configuration[from].read());
    reg.feature_control[to].write(reg.feature_control[from].read());
    reg.cycles_per_shift_clock[to].write(reg.cycles_per_shift_clock[from].read());
    reg.cycle_count[to].write(reg.cycle_count[from].read());
    reg.data_buffer_swap_control[to].write_raw(reg.data_buffer_swap_control[from].raw());

    let to_mask = 1 << to_slice;
    let from_mask = 1 << from_slice;
    if reg.stop_on_next_buffer_swap.read() & from_mask != 0 {
        reg.stop_on_next_buffer_swap.set_bits(to_mask);
    } else {
        reg.stop_on_next_buffer_swap.clear_bits(to_mask);
    }
}

/// Checks every slice from `first_new_slice_depth` (inclusive) up to
/// `buffer_depth_slices` (exclusive) in `io_slice`'s concatenation chain,
/// returning whether all of them are currently unused.
pub(super) fn slices_for_buffer_free(
    sgpio: &Sgpio,
    io_slice: u8,
    first_new_slice_depth: u8,
    buffer_depth_slices: u8,
) -> bool {
    for depth in first_new_slice_depth..buffer_depth_slices {
        let Some(target_slice) = slice_in_concatenation(io_slice, depth) else {
            return false;
        };
        if sgpio.slices_in_use & (1 << target_slice) != 0 {
            return false;
        }
    }
    true
}

/// Reduces `maximum_depth` to however many slices the function's own buffer
/// actually needs, so growth never allocates more chain than the user's
/// buffer can fill.
fn limit_buffer_depth_to_user_limits(function: &SgpioFunction, maximum_depth: u8) -> u8 {
    let buffer_size_bytes = 1u32 << function.buffer_order;
    let mut buffer_size_slices = buffer_size_bytes / 4;

    if buffer_size_bytes < 4 {
        return 1;
    }

    if function.mode == SgpioFunctionMode::FixedDataOut && buffer_size_slices > 1 && function.shift_count_limit == 0 {
        buffer_size_slices /= 2;
    }

    if buffer_size_slices > maximum_depth as u32 {
        maximum_depth
    } else {
        buffer_size_slices as u8
    }
}

/// The most useful buffer depth (in slices) for `function`, accounting for
/// the mode's own ceiling, the user's buffer size, and (for bidirectional
/// functions whose I/O slice lives in the upper half of the chip) the need
/// to leave room for a direction chain.
pub(super) fn maximum_useful_buffer_depth_for_function(function: &SgpioFunction) -> Result<u8, SgpioError> {
    match function.mode {
        SgpioFunctionMode::ClockGeneration => Ok(1),

        SgpioFunctionMode::StreamDataIn | SgpioFunctionMode::StreamDataOut | SgpioFunctionMode::FixedDataOut => {
            Ok(limit_buffer_depth_to_user_limits(function, MAXIMUM_SLICE_CHAIN_DEPTH))
        }

        SgpioFunctionMode::StreamBidirectional => {
            let maximum_bidirectional_depth = if function.io_slice >= (NUM_SLICES as u8 / 2) {
                MAXIMUM_SLICE_CHAIN_DEPTH / 2
            } else {
                MAXIMUM_SLICE_CHAIN_DEPTH
            };
            Ok(limit_buffer_depth_to_user_limits(function, maximum_bidirectional_depth))
        }
    }
}

/// Attempts to double the direction chain's depth by one step, claiming the
/// slices needed in `function.direction_slice`'s concatenation chain.
/// Returns whether the growth succeeded.
fn attempt_to_double_direction_buffer_size(sgpio: &mut Sgpio, index: usize) -> bool {
    let concat_order = sgpio.functions[index].direction_buffer_depth_order;
    let desired_order = concat_order + 1;
    let buffer_depth_slices = 1u8 << concat_order;
    let desired_buffer_depth = 1u8 << desired_order;

    let direction_slice = sgpio.functions[index].direction_slice;
    if !slices_for_buffer_free(sgpio, direction_slice, buffer_depth_slices, desired_buffer_depth) {
        return false;
    }

    sgpio.functions[index].direction_buffer_depth_order = desired_order;

    let reg = unsafe { pac::sgpio::RegisterBlock::steal() };
    let bus_width = sgpio.functions[index].bus_width;
    set_up_double_buffering(reg, direction_slice, desired_buffer_depth, bus_width);

    for depth in 0..desired_buffer_depth {
        let Some(target_slice) = slice_in_concatenation(direction_slice, depth) else { continue };

        if target_slice != direction_slice {
            copy_slice_properties(reg, target_slice, direction_slice);
        }

        reg.shift_configuration[target_slice as usize].write(pac::sgpio::ShiftConfigBits {
            enable_concatenation: true,
            concatenation_order: desired_order,
            ..reg.shift_configuration[target_slice as usize].read()
        });

        sgpio.slices_in_use |= 1 << target_slice;
    }

    true
}

/// Checks whether the direction chain can already express `desired_buffer_depth`
/// worth of data-chain growth, growing the direction chain by one step if not.
/// Always returns true for non-bidirectional functions, which have no
/// direction chain to keep in step.
fn ensure_direction_specification_is_possible(sgpio: &mut Sgpio, index: usize, desired_buffer_depth: u8) -> bool {
    if sgpio.functions[index].mode != SgpioFunctionMode::StreamBidirectional {
        return true;
    }

    let direction_buffer_depth = 1u32 << sgpio.functions[index].direction_buffer_depth_order;
    let bus_width = sgpio.functions[index].bus_width;
    let direction_shift_width = if bus_width == 1 { 1u32 } else { 2 };

    let shifts_in_new_buffer = (desired_buffer_depth as u32 * 32) / bus_width as u32;
    let shifts_in_current_direction_buffer = (direction_buffer_depth * 32) / direction_shift_width;

    if shifts_in_current_direction_buffer >= shifts_in_new_buffer {
        return true;
    }

    attempt_to_double_direction_buffer_size(sgpio, index)
}

/// Attempts to double `function`'s data buffer depth by one step, claiming
/// the slices needed in its I/O slice's concatenation chain. Returns whether
/// the growth succeeded.
///
/// The direction-chain check runs last deliberately: it may grow the
/// direction chain even on a path that otherwise fails, which is harmless
/// since the direction chain only ever grows when it's actually needed.
fn attempt_to_double_buffer_size(sgpio: &mut Sgpio, index: usize) -> Result<bool, SgpioError> {
    let concat_order = sgpio.functions[index].buffer_depth_order;
    let desired_order = concat_order + 1;
    let buffer_depth_slices = 1u8 << concat_order;
    let desired_buffer_depth = 1u8 << desired_order;

    let mode = sgpio.functions[index].mode;
    let mode_accepts_input = matches!(mode, SgpioFunctionMode::StreamDataIn | SgpioFunctionMode::StreamBidirectional);

    if desired_buffer_depth > maximum_useful_buffer_depth_for_function(&sgpio.functions[index])? {
        return Ok(false);
    }

    let io_slice = sgpio.functions[index].io_slice;
    if !slices_for_buffer_free(sgpio, io_slice, buffer_depth_slices, desired_buffer_depth) {
        return Ok(false);
    }

    if !ensure_direction_specification_is_possible(sgpio, index, desired_buffer_depth) {
        return Ok(false);
    }

    sgpio.functions[index].buffer_depth_order = desired_order;

    let reg = unsafe { pac::sgpio::RegisterBlock::steal() };
    let bus_width = sgpio.functions[index].bus_width;
    set_up_double_buffering(reg, io_slice, desired_buffer_depth, bus_width);

    // Bidirectional input isn't implemented: the original leaves this slice
    // as 0xFF (never matching) and always self-loops instead, a known
    // upstream limitation preserved here.
    let input_slice = if mode == SgpioFunctionMode::StreamBidirectional { None } else { Some(io_slice) };

    for depth in 0..desired_buffer_depth {
        let Some(target_slice) = slice_in_concatenation(io_slice, depth) else { continue };

        if target_slice != io_slice {
            copy_slice_properties(reg, target_slice, io_slice);
        }

        let enable_concatenation = !mode_accepts_input || Some(target_slice) != input_slice;

        reg.shift_configuration[target_slice as usize].write(pac::sgpio::ShiftConfigBits {
            enable_concatenation,
            concatenation_order: desired_order,
            ..reg.shift_configuration[target_slice as usize].read()
        });

        sgpio.slices_in_use |= 1 << target_slice;
    }

    Ok(true)
}

/// Runs one pass of buffer-depth growth over every configured function,
/// returning whether the configuration is already optimal (no function grew).
/// Call repeatedly until it returns `true`.
pub(super) fn attempt_buffer_optimization(sgpio: &mut Sgpio) -> Result<bool, SgpioError> {
    let mut already_optimal = true;

    for index in 0..sgpio.functions.len() {
        if !sgpio.functions[index].enabled {
            continue;
        }

        let optimization_achieved = match sgpio.functions[index].mode {
            SgpioFunctionMode::StreamDataIn
            | SgpioFunctionMode::StreamDataOut
            | SgpioFunctionMode::FixedDataOut
            | SgpioFunctionMode::StreamBidirectional => attempt_to_double_buffer_size(sgpio, index)?,
            SgpioFunctionMode::ClockGeneration => false,
        };

        if optimization_achieved {
            already_optimal = false;
        }
    }

    Ok(already_optimal)
}

/// Applies each configured function's `shift_count_limit` across its entire
/// (now-final) data chain and, for bidirectional functions, its direction
/// chain as well.
pub(super) fn enforce_all_shift_limits(sgpio: &Sgpio) -> Result<(), SgpioError> {
    let reg = unsafe { pac::sgpio::RegisterBlock::steal() };

    for function in sgpio.functions.iter() {
        if !function.enabled {
            continue;
        }

        let buffer_depth = function.buffer_depth_slices();
        let direction_buffer_depth = function.direction_buffer_depth_slices();
        let direction_bus_width = if function.bus_width == 1 { 1 } else { 2 };

        for depth in 0..buffer_depth {
            let Some(slice) = slice_in_concatenation(function.io_slice, depth) else { continue };
            apply_shift_limits(reg, function, slice, buffer_depth, function.bus_width)?;
        }

        if function.mode == SgpioFunctionMode::StreamBidirectional {
            for depth in 0..direction_buffer_depth {
                let Some(slice) = slice_in_concatenation(function.direction_slice, depth) else { continue };
                apply_shift_limits(reg, function, slice, direction_buffer_depth, direction_bus_width)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pac::scu::ResistorConfig;
    use crate::sgpio::{SgpioCaptureEdge, SgpioClockQualifier, SgpioClockSource, SgpioFunctionOverrides, SgpioPinConfiguration, MAXIMUM_BUS_WIDTH};

    fn blank_pins() -> [SgpioPinConfiguration; MAXIMUM_BUS_WIDTH] {
        [SgpioPinConfiguration { sgpio_pin: 0, scu_group: 0, scu_pin: 0, pull: ResistorConfig::NoPull }; MAXIMUM_BUS_WIDTH]
    }

    fn function<'a>(mode: SgpioFunctionMode, buffer: &'a mut [u8], buffer_order: u8) -> SgpioFunction<'a> {
        SgpioFunction {
            enabled: true,
            mode,
            pin_configurations: blank_pins(),
            bus_width: 1,
            shift_clock_source: SgpioClockSource::Local,
            shift_clock_edge: SgpioCaptureEdge::Rising,
            shift_clock_input: None,
            shift_clock_frequency: 0,
            shift_clock_qualifier: SgpioClockQualifier::Always,
            shift_clock_qualifier_is_active_low: false,
            shift_clock_qualifier_input: None,
            shift_clock_output: None,
            buffer,
            buffer_order,
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
    fn small_buffer_caps_depth_at_one_slice() {
        let mut buffer = [0u8; 2];
        let f = function(SgpioFunctionMode::StreamDataIn, &mut buffer, 1);
        assert_eq!(limit_buffer_depth_to_user_limits(&f, MAXIMUM_SLICE_CHAIN_DEPTH), 1);
    }

    #[test]
    fn fixed_data_out_halves_slices_when_unlimited() {
        let mut buffer = [0u8; 8];
        let f = function(SgpioFunctionMode::FixedDataOut, &mut buffer, 3);
        // 8 bytes = 2 slices, halved to 1 since the shadow register doubles as storage.
        assert_eq!(limit_buffer_depth_to_user_limits(&f, MAXIMUM_SLICE_CHAIN_DEPTH), 1);
    }

    #[test]
    fn clock_generation_never_grows_past_one_slice() {
        let mut buffer = [0u8; 4];
        let f = function(SgpioFunctionMode::ClockGeneration, &mut buffer, 2);
        assert_eq!(maximum_useful_buffer_depth_for_function(&f).unwrap(), 1);
    }

    #[test]
    fn bidirectional_upper_half_io_slice_halves_max_depth() {
        let mut buffer = [0u8; 64];
        let mut f = function(SgpioFunctionMode::StreamBidirectional, &mut buffer, 6);
        f.io_slice = 8;
        assert_eq!(
            maximum_useful_buffer_depth_for_function(&f).unwrap(),
            MAXIMUM_SLICE_CHAIN_DEPTH / 2
        );
    }
}
