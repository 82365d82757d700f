//! Slice selection, clocking, qualifier, and bus-topology setup.
//!
//! Grounded in `original_source/.../lpc43xx/drivers/sgpio.c`'s
//! `sgpio_slice_for_io`/`sgpio_slice_for_clockgen`/`sgpio_slice_for_direction`/
//! `sgpio_slice_in_concatenation`, `sgpio_set_up_clocking`,
//! `sgpio_set_up_shift_condition`, `sgpio_set_up_bus_topology`, and
//! `sgpio_set_up_function`. The hardware's slice routing is fixed in
//! silicon and not configurable, hence the lookup tables below.

use crate::pac;
use crate::pac::sgpio::{FeatureControlBits, ShiftConfigBits};
use crate::scu;

use super::{
    SgpioCaptureEdge, SgpioClockQualifier, SgpioClockSource, SgpioError, SgpioFunction,
    SgpioFunctionMode, NUM_SLICES,
};

// Slice letter -> index, matching the vendor's A..P naming.
const SLICE_A: u8 = 0;
const SLICE_B: u8 = 1;
const SLICE_C: u8 = 2;
const SLICE_D: u8 = 3;
const SLICE_E: u8 = 4;
const SLICE_F: u8 = 5;
const SLICE_G: u8 = 6;
const SLICE_H: u8 = 7;
const SLICE_I: u8 = 8;
const SLICE_J: u8 = 9;
const SLICE_K: u8 = 10;
const SLICE_L: u8 = 11;
const SLICE_M: u8 = 12;
const SLICE_N: u8 = 13;
const SLICE_O: u8 = 14;
const SLICE_P: u8 = 15;

const IO_SLICE_FOR_PIN: [u8; NUM_SLICES] = [
    SLICE_A, SLICE_I, SLICE_E, SLICE_J, SLICE_C, SLICE_K, SLICE_F, SLICE_L, SLICE_B, SLICE_M,
    SLICE_G, SLICE_N, SLICE_D, SLICE_O, SLICE_H, SLICE_P,
];

const CLOCKGEN_SLICE_FOR_PIN: [u8; NUM_SLICES] = [
    SLICE_B, SLICE_D, SLICE_E, SLICE_H, SLICE_C, SLICE_F, SLICE_O, SLICE_P, SLICE_A, SLICE_M,
    SLICE_G, SLICE_N, SLICE_I, SLICE_J, SLICE_K, SLICE_L,
];

const DIRECTION_SLICE_FOR_PIN_2BIT: [u8; 8] =
    [SLICE_H, SLICE_D, SLICE_G, SLICE_O, SLICE_P, SLICE_B, SLICE_N, SLICE_M];
const DIRECTION_SLICE_FOR_PIN_4BIT: [u8; 4] = [SLICE_H, SLICE_O, SLICE_P, SLICE_N];
const DIRECTION_SLICE_FOR_PIN_8BIT: [u8; 4] = [SLICE_H, SLICE_O, SLICE_P, SLICE_N];

/// The slice a given pin naturally feeds into for I/O.
pub(super) fn slice_for_io(pin: u8) -> Option<u8> {
    IO_SLICE_FOR_PIN.get(pin as usize).copied()
}

/// The pin that feeds `slice` in single-bit (serial) mode.
pub(super) fn io_pin_for_slice(slice: u8) -> Option<u8> {
    (0..NUM_SLICES as u8).find(|&pin| slice_for_io(pin) == Some(slice))
}

/// The slice that can generate a clock on `pin`.
pub(super) fn slice_for_clockgen(pin: u8) -> u8 {
    CLOCKGEN_SLICE_FOR_PIN[pin as usize]
}

/// The slice that controls the direction of the bus starting at `first_pin`
/// with the given `bus_width`. For a 1-bit bus, the direction slice is the
/// I/O slice's mirror in the opposite concatenation chain.
pub(super) fn slice_for_direction(first_pin: u8, bus_width: u8) -> Option<u8> {
    match bus_width {
        8 => Some(DIRECTION_SLICE_FOR_PIN_8BIT[(first_pin / 8) as usize]),
        4 => Some(DIRECTION_SLICE_FOR_PIN_4BIT[(first_pin / 8) as usize]),
        2 => Some(DIRECTION_SLICE_FOR_PIN_2BIT[(first_pin / 2) as usize]),
        1 => slice_for_io(first_pin + (NUM_SLICES as u8 / 2)),
        _ => None,
    }
}

/// The slice `depth` positions past `io_slice` in its natural concatenation
/// order, assuming no wraparound.
pub(super) fn slice_in_concatenation(io_slice: u8, depth: u8) -> Option<u8> {
    let pin = io_pin_for_slice(io_slice)?;
    slice_for_io(pin + depth)
}

/// Routes a pin through the SCU and marks it used.
pub(super) fn set_up_pin(
    sgpio: &mut super::Sgpio,
    pin_config: super::SgpioPinConfiguration,
) -> Result<(), SgpioError> {
    scu::configure_sgpio_pin(pin_config.sgpio_pin, pin_config.scu_group, pin_config.scu_pin, pin_config.pull)?;
    sgpio.pins_in_use |= 1 << pin_config.sgpio_pin;
    Ok(())
}

/// Configures the shift clock for `slice` from `function`'s description.
pub(super) fn set_up_clocking(
    reg: &pac::sgpio::RegisterBlock,
    sgpio_clock_hz: u32,
    function: &mut SgpioFunction,
    slice: u8,
) -> Result<(), SgpioError> {
    let (use_external_clock, use_nonlocal_clock, select) = match function.shift_clock_source {
        SgpioClockSource::Local => (false, false, 0),
        SgpioClockSource::Pin(select) => (true, true, select),
        SgpioClockSource::Slice(select) => (false, true, select),
    };

    reg.feature_control[slice as usize].write(FeatureControlBits {
        use_nonlocal_clock,
        shift_on_falling_edge: function.shift_clock_edge == SgpioCaptureEdge::Falling,
        ..reg.feature_control[slice as usize].read()
    });

    reg.shift_configuration[slice as usize].write(ShiftConfigBits {
        use_external_clock,
        clock_source_pin: select,
        clock_source_slice: select,
        ..reg.shift_configuration[slice as usize].read()
    });

    if let SgpioClockSource::Local = function.shift_clock_source {
        let divider = if function.shift_clock_frequency == 0 {
            1
        } else {
            sgpio_clock_hz / function.shift_clock_frequency
        };
        if divider == 0 {
            return Err(SgpioError::ClockTooSlow);
        }
        reg.cycles_per_shift_clock[slice as usize].write(divider - 1);
        reg.cycle_count[slice as usize].write(divider - 1);
        function.shift_clock_frequency = sgpio_clock_hz / divider;
    } else if let SgpioClockSource::Pin(_) = function.shift_clock_source {
        let input = function.shift_clock_input.ok_or(SgpioError::ClockInputMissing)?;
        scu::configure_sgpio_pin(input.sgpio_pin, input.scu_group, input.scu_pin, input.pull)?;
    }

    Ok(())
}

/// Configures the shift qualifier for `slice` from `function`'s description.
pub(super) fn set_up_shift_condition(
    reg: &pac::sgpio::RegisterBlock,
    function: &SgpioFunction,
    slice: u8,
) -> Result<(), SgpioError> {
    let (mode, select) = match function.shift_clock_qualifier {
        SgpioClockQualifier::Always => (0u8, 0u8),
        SgpioClockQualifier::Never => (1u8, 0u8),
        SgpioClockQualifier::Slice(select) => (2u8, select),
        SgpioClockQualifier::Pin(select) => (3u8, select),
    };

    // Only the qualifier fields are touched here; `set_up_clocking` already
    // wrote the clock-selector fields on this slice and `set_up_bus_topology`
    // runs afterward, so a read-modify-write leaves both alone.
    reg.shift_configuration[slice as usize].write(ShiftConfigBits {
        shift_qualifier_mode: mode,
        shift_qualifier_pin: select,
        shift_qualifier_slice: select,
        ..reg.shift_configuration[slice as usize].read()
    });

    reg.feature_control[slice as usize].write(FeatureControlBits {
        invert_shift_qualifier: function.shift_clock_qualifier_is_active_low,
        ..reg.feature_control[slice as usize].read()
    });

    if let SgpioClockQualifier::Pin(_) = function.shift_clock_qualifier {
        let input = function.shift_clock_qualifier_input.ok_or(SgpioError::QualifierInputMissing)?;
        scu::configure_sgpio_pin(input.sgpio_pin, input.scu_group, input.scu_pin, input.pull)?;
    }

    Ok(())
}

/// Configures the bus width, initial (un-concatenated) buffering, and, for
/// bidirectional functions, the direction slice's mirrored settings.
pub(super) fn set_up_bus_topology(
    reg: &pac::sgpio::RegisterBlock,
    function: &mut SgpioFunction,
) -> Result<(), SgpioError> {
    let io_slice = function.io_slice;

    let parallel_mode = match function.bus_width {
        1 => 0u8,
        2 => 1u8,
        3 => {
            function.bus_width = 4;
            2u8
        }
        4 => 2u8,
        5 | 6 | 7 => {
            function.bus_width = 8;
            3u8
        }
        8 => 3u8,
        _ => return Err(SgpioError::InvalidBusWidth),
    };

    reg.feature_control[io_slice as usize].write(FeatureControlBits { parallel_mode, ..Default::default() });

    reg.shift_configuration[io_slice as usize].write(ShiftConfigBits { enable_concatenation: false, ..Default::default() });
    function.buffer_depth_order = 0;

    super::optimizer::set_up_double_buffering(reg, io_slice, 1, function.bus_width);

    if function.mode == SgpioFunctionMode::StreamBidirectional {
        super::optimizer::copy_slice_properties(reg, function.direction_slice, io_slice);

        if function.bus_width != 1 {
            reg.feature_control[function.direction_slice as usize]
                .write(FeatureControlBits { parallel_mode: 1, ..Default::default() });
        }

        reg.shift_configuration[function.direction_slice as usize]
            .write(ShiftConfigBits { enable_concatenation: true, concatenation_order: 0, ..Default::default() });

        function.direction_buffer_depth_order = 0;
    }

    Ok(())
}

/// Picks the I/O (and, for bidirectional, direction) slice for `function`,
/// then configures its clocking, qualifier, and bus topology.
pub(super) fn set_up_function(sgpio: &mut super::Sgpio, index: usize) -> Result<(), SgpioError> {
    if !sgpio.functions[index].enabled {
        return Ok(());
    }

    let first_pin = sgpio.functions[index].pin_configurations[0].sgpio_pin;
    let bus_width = sgpio.functions[index].bus_width;

    if sgpio.functions[index].mode == SgpioFunctionMode::StreamBidirectional {
        let direction_slice =
            slice_for_direction(first_pin, bus_width).ok_or(SgpioError::NoDirectionSlice)?;
        if sgpio.slices_in_use & (1 << direction_slice) != 0 {
            return Err(SgpioError::DirectionSliceBusy);
        }
        sgpio.functions[index].direction_slice = direction_slice;
        sgpio.slices_in_use |= 1 << direction_slice;
    }

    let io_slice = match sgpio.functions[index].mode {
        SgpioFunctionMode::StreamBidirectional
        | SgpioFunctionMode::StreamDataIn
        | SgpioFunctionMode::StreamDataOut
        | SgpioFunctionMode::FixedDataOut => slice_for_io(first_pin).ok_or(SgpioError::InvalidBusWidth)?,
        SgpioFunctionMode::ClockGeneration => slice_for_clockgen(first_pin),
    };
    sgpio.functions[index].io_slice = io_slice;

    for i in 0..bus_width as usize {
        let pin_config = sgpio.functions[index].pin_configurations[i];
        set_up_pin(sgpio, pin_config)?;
    }

    let reg = unsafe { pac::sgpio::RegisterBlock::steal() };
    set_up_clocking(reg, sgpio.sgpio_clock_hz, &mut sgpio.functions[index], io_slice)?;
    set_up_shift_condition(reg, &sgpio.functions[index], io_slice)?;
    set_up_bus_topology(reg, &mut sgpio.functions[index])?;

    sgpio.slices_in_use |= 1 << io_slice;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_slice_table_round_trips_through_io_pin() {
        for pin in 0..16u8 {
            let slice = slice_for_io(pin).unwrap();
            assert_eq!(io_pin_for_slice(slice), Some(pin));
        }
    }

    #[test]
    fn one_bit_direction_slice_is_io_slice_mirror() {
        // pin 0 lives in the first half of the chip; its mirror is pin 8's
        // I/O slice.
        assert_eq!(slice_for_direction(0, 1), slice_for_io(8));
    }

    #[test]
    fn concatenation_walks_the_io_table_in_order() {
        let io_slice = slice_for_io(0).unwrap();
        assert_eq!(slice_in_concatenation(io_slice, 0), Some(io_slice));
        assert_eq!(slice_in_concatenation(io_slice, 1), slice_for_io(1));
    }
}
