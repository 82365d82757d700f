//! Serial-GPIO (SGPIO) streaming engine.
//!
//! Sixteen slices, each shifting up to 32 bits before swapping its data and
//! shadow registers, can be chained together to build wide, deep streaming
//! buffers for logic-analyzer-style capture, pattern generation, or simple
//! clock generation. Grounded throughout in
//! `original_source/.../lpc43xx/drivers/sgpio.c`, `sgpio_data.c`, and
//! `include/drivers/sgpio.h`.
//!
//! The module is split the way the original driver's own source files are:
//! [`planner`] picks slices and wires up clocking/qualifiers/bus topology,
//! [`optimizer`] grows buffer depth by chaining adjacent free slices,
//! [`isr`] decides whether a function needs interrupt-driven refilling and
//! (if so) performs it, and [`lifecycle`] owns prepopulation, run/halt, and
//! the running query.

mod isr;
mod lifecycle;
mod optimizer;
mod planner;

pub use lifecycle::{halt, run, running, set_up_functions};

use crate::pac::scu::ResistorConfig;
use crate::scu::ScuError;

/// Number of SGPIO slices (and SGPIO pins).
pub const NUM_SLICES: usize = 16;
/// Bits shifted per slice register.
pub const BITS_PER_SLICE: u32 = 32;
/// Maximum number of slices that may be chained into a single function.
pub const MAXIMUM_SLICE_CHAIN_DEPTH: u8 = 8;
/// Maximum pins (and hence slices) a single function's bus may span.
pub const MAXIMUM_BUS_WIDTH: usize = 8;

/// A single SGPIO pin's SCU routing, mirroring [`crate::scu::configure_sgpio_pin`]'s
/// arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SgpioPinConfiguration {
    pub sgpio_pin: u8,
    pub scu_group: u8,
    pub scu_pin: u8,
    pub pull: ResistorConfig,
}

/// Which edge of the shift clock captures or drives data.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SgpioCaptureEdge {
    Rising,
    Falling,
}

/// Where a function's shift clock comes from.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SgpioClockSource {
    /// Clock generated locally by a counter in the I/O slice, dividing the
    /// SGPIO branch clock down to [`SgpioFunction::shift_clock_frequency`].
    Local,
    /// Clock driven from an SGPIO pin. `select` is the raw 2-bit hardware
    /// selector (`0..=3`, mapping to SGPIO08..SGPIO11).
    Pin(u8),
    /// Clock driven from another slice's output. `select` is the raw 2-bit
    /// hardware selector (`0..=3`, mapping to slices D, H, O, P).
    Slice(u8),
}

/// What gates whether a shift clock edge causes a shift.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SgpioClockQualifier {
    /// Always shift.
    Always,
    /// Never shift (function is paused).
    Never,
    /// Shift iff the given slice currently reads logic 1. `select` is the
    /// raw 2-bit selector (`0..=3`, mapping to A/D, H/O, I/D, P/O).
    Slice(u8),
    /// Shift iff the given pin currently reads logic 1. `select` is the
    /// raw 2-bit selector (`0..=3`, mapping to SGPIO8..SGPIO11).
    Pin(u8),
}

/// The overall behavior an SGPIO function implements.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SgpioFunctionMode {
    /// Capture data rapidly over a set of pins.
    StreamDataIn,
    /// Stream data out rapidly over a set of pins.
    StreamDataOut,
    /// Stream a fixed, unchanging pattern out; the buffer is assumed
    /// constant for the duration of the stream, which can avoid an ISR
    /// entirely for small patterns.
    FixedDataOut,
    /// Stream data over pins that are sometimes input, sometimes output,
    /// with direction driven from a second, direction-only slice chain.
    StreamBidirectional,
    /// Use a single slice to generate a free-running clock on a single pin.
    ClockGeneration,
}

/// Errors from configuring or running the SGPIO engine.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SgpioError {
    /// Routing a pin through the SCU failed.
    PinRouting(ScuError),
    /// `bus_width` is not representable as any SGPIO parallel mode.
    InvalidBusWidth,
    /// No direction slice could be found for this pin/bus-width combination.
    NoDirectionSlice,
    /// The computed direction slice is already used by another function.
    DirectionSliceBusy,
    /// A mode this planner doesn't implement was requested.
    InvalidMode,
    /// `shift_clock_frequency` could not be reached by dividing the branch
    /// clock (the computed divisor rounded to zero).
    ClockTooSlow,
    /// A clock source of [`SgpioClockSource::Pin`] was requested without a
    /// corresponding pin configuration.
    ClockInputMissing,
    /// A clock qualifier of [`SgpioClockQualifier::Pin`] was requested
    /// without a corresponding pin configuration.
    QualifierInputMissing,
    /// `shift_count_limit` is larger than the slice chain can express.
    ShiftLimitExceedsChain,
    /// No free, frequency-matched slice could output the shift clock.
    ClockOutputUnavailable,
    /// More than one configured function needs interrupt-driven refilling;
    /// the master ISR dispatch only ever installs one.
    MultipleIrqFunctionsUnsupported,
}

impl From<ScuError> for SgpioError {
    fn from(value: ScuError) -> Self {
        SgpioError::PinRouting(value)
    }
}

/// User-supplied, rarely-needed overrides to a function's default behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SgpioFunctionOverrides {
    /// Forces polling-only operation: the IRQ is never armed, and the
    /// caller is responsible for noticing that `data_in_buffer` no longer
    /// advances. Useful when another core polls the exchange status
    /// directly instead.
    pub never_use_isr: bool,
}

/// One SGPIO function: a single logical stream, pattern, or clock bound to
/// a contiguous, ascending run of pins.
pub struct SgpioFunction<'a> {
    pub enabled: bool,
    pub mode: SgpioFunctionMode,

    /// Pins used by this function, in ascending SGPIO pin-number order. The
    /// first `bus_width` entries are read; `bus_width` must divide the
    /// first pin's number evenly.
    pub pin_configurations: [SgpioPinConfiguration; MAXIMUM_BUS_WIDTH],
    pub bus_width: u8,

    pub shift_clock_source: SgpioClockSource,
    pub shift_clock_edge: SgpioCaptureEdge,
    /// Required when `shift_clock_source` is [`SgpioClockSource::Pin`].
    pub shift_clock_input: Option<SgpioPinConfiguration>,
    /// Desired local shift clock frequency in Hz; `0` means "as fast as
    /// possible" (a divisor of one). Ignored unless `shift_clock_source`
    /// is [`SgpioClockSource::Local`]. Updated in place to the achieved
    /// rate once configured.
    pub shift_clock_frequency: u32,

    pub shift_clock_qualifier: SgpioClockQualifier,
    pub shift_clock_qualifier_is_active_low: bool,
    /// Required when `shift_clock_qualifier` is [`SgpioClockQualifier::Pin`].
    pub shift_clock_qualifier_input: Option<SgpioPinConfiguration>,

    /// If set, a locally-generated shift clock is also mirrored onto this
    /// pin.
    pub shift_clock_output: Option<SgpioPinConfiguration>,

    /// Packed binary data scanned in or out. Length must be a power of two.
    pub buffer: &'a mut [u8],
    /// `buffer.len() == 1 << buffer_order`.
    pub buffer_order: u8,

    /// Bidirectional mode only: packed direction bits, two bits per sample
    /// for parallel buses (lsb = pin 0's direction, msb = all others), one
    /// bit per sample for a 1-bit bus.
    pub direction_buffer: Option<&'a mut [u8]>,
    pub direction_buffer_order: u8,

    pub position_in_buffer: u32,
    pub position_in_direction_buffer: u32,

    /// Stops shifting after this many shift-clock cycles, if nonzero. Must
    /// be no larger than the buffer's slice chain can express once the
    /// chain is finalized.
    pub shift_count_limit: u32,
    /// Number of times the driver has placed fresh data into the buffer
    /// since the caller last inspected it. The caller decrements this when
    /// consuming data.
    pub data_in_buffer: u32,

    pub overrides: SgpioFunctionOverrides,

    // Computed during `set_up_functions`; not meaningful before that runs.
    pub(crate) io_slice: u8,
    pub(crate) buffer_depth_order: u8,
    pub(crate) direction_slice: u8,
    pub(crate) direction_buffer_depth_order: u8,
}

impl<'a> SgpioFunction<'a> {
    fn buffer_depth_slices(&self) -> u8 {
        1 << self.buffer_depth_order
    }

    fn direction_buffer_depth_slices(&self) -> u8 {
        1 << self.direction_buffer_depth_order
    }
}

/// State for one SGPIO instance: a set of functions sharing the sixteen
/// slices and sixteen pins of a single SGPIO peripheral.
pub struct Sgpio<'a> {
    pub running: bool,
    pub functions: &'a mut [SgpioFunction<'a>],

    pub(crate) slices_in_use: u16,
    pub(crate) pins_in_use: u16,
    pub(crate) swap_irqs_required: u16,

    /// Frequency of the SGPIO branch clock, in Hz, used to compute local
    /// shift-clock dividers. Passed in rather than queried, since the
    /// clock registry does not track individual peripheral-bus branches.
    pub sgpio_clock_hz: u32,
}

impl<'a> Sgpio<'a> {
    /// Wraps `functions` (not yet configured) as an SGPIO instance.
    pub fn new(functions: &'a mut [SgpioFunction<'a>], sgpio_clock_hz: u32) -> Self {
        Self {
            running: false,
            functions,
            slices_in_use: 0,
            pins_in_use: 0,
            swap_irqs_required: 0,
            sgpio_clock_hz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(sgpio_pin: u8) -> SgpioPinConfiguration {
        SgpioPinConfiguration { sgpio_pin, scu_group: 0, scu_pin: 0, pull: ResistorConfig::NoPull }
    }

    pub(super) fn blank_pins() -> [SgpioPinConfiguration; MAXIMUM_BUS_WIDTH] {
        [pin(0); MAXIMUM_BUS_WIDTH]
    }

    #[test]
    fn buffer_depth_helpers_match_order() {
        let mut pins = blank_pins();
        pins[0] = pin(0);
        let mut buffer = [0u8; 4];
        let f = SgpioFunction {
            enabled: true,
            mode: SgpioFunctionMode::StreamDataIn,
            pin_configurations: pins,
            bus_width: 1,
            shift_clock_source: SgpioClockSource::Local,
            shift_clock_edge: SgpioCaptureEdge::Rising,
            shift_clock_input: None,
            shift_clock_frequency: 0,
            shift_clock_qualifier: SgpioClockQualifier::Always,
            shift_clock_qualifier_is_active_low: false,
            shift_clock_qualifier_input: None,
            shift_clock_output: None,
            buffer: &mut buffer,
            buffer_order: 2,
            direction_buffer: None,
            direction_buffer_order: 0,
            position_in_buffer: 0,
            position_in_direction_buffer: 0,
            shift_count_limit: 0,
            data_in_buffer: 0,
            overrides: SgpioFunctionOverrides::default(),
            io_slice: 0,
            buffer_depth_order: 3,
            direction_slice: 0,
            direction_buffer_depth_order: 1,
        };
        assert_eq!(f.buffer_depth_slices(), 8);
        assert_eq!(f.direction_buffer_depth_slices(), 2);
    }
}
