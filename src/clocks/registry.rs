//! Clock-source registry.
//!
//! A process-lifetime table recording, per clock source, its configured
//! frequency, measured frequency, parent, readiness, and failure count.
//! Grounded in `platform_clock.c`'s `platform_clock_source_configurations`
//! table; the enumeration mirrors `clock_source_t` from `platform_clock.h`.

use critical_section::Mutex;
use core::cell::RefCell;

/// Maximum number of bring-up attempts before a source is permanently refused.
pub const MAX_BRINGUP_ATTEMPTS: u8 = 5;

/// Identifies a clock source, physical or virtual.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ClockSource {
    Oscillator32k = 0x00,
    InternalOscillator = 0x01,
    EnetRxClock = 0x02,
    EnetTxClock = 0x03,
    GpClockInput = 0x04,
    XtalOscillator = 0x06,
    UsbPll = 0x07,
    AudioPll = 0x08,
    MainPll = 0x09,
    DividerAOut = 0x0c,
    DividerBOut = 0x0d,
    DividerCOut = 0x0e,
    DividerDOut = 0x0f,
    DividerEOut = 0x10,
    /// Resolves at query time to the configured primary clock input (default: crystal).
    PrimaryInput = 0x1E,
    /// Resolves at query time to the configured primary clock source (default: main PLL).
    Primary = 0x1F,
}

const SOURCE_COUNT: usize = 17;

impl ClockSource {
    fn slot(self) -> Option<usize> {
        match self {
            ClockSource::Oscillator32k => Some(0),
            ClockSource::InternalOscillator => Some(1),
            ClockSource::EnetRxClock => Some(2),
            ClockSource::EnetTxClock => Some(3),
            ClockSource::GpClockInput => Some(4),
            ClockSource::XtalOscillator => Some(5),
            ClockSource::UsbPll => Some(6),
            ClockSource::AudioPll => Some(7),
            ClockSource::MainPll => Some(8),
            ClockSource::DividerAOut => Some(9),
            ClockSource::DividerBOut => Some(10),
            ClockSource::DividerCOut => Some(11),
            ClockSource::DividerDOut => Some(12),
            ClockSource::DividerEOut => Some(13),
            ClockSource::PrimaryInput | ClockSource::Primary => None,
        }
    }

    /// True for the two virtual tokens that are resolved rather than measured directly.
    pub fn is_virtual(self) -> bool {
        matches!(self, ClockSource::PrimaryInput | ClockSource::Primary)
    }
}

/// A single clock source's registry entry.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub struct SourceEntry {
    pub configured_frequency_hz: u32,
    pub measured_frequency_hz: u32,
    pub parent: Option<ClockSource>,
    pub ready: bool,
    pub failure_count: u8,
}

impl SourceEntry {
    const fn empty() -> Self {
        Self {
            configured_frequency_hz: 0,
            measured_frequency_hz: 0,
            parent: None,
            ready: false,
            failure_count: 0,
        }
    }
}

struct Registry {
    entries: [SourceEntry; SOURCE_COUNT],
    primary_input: ClockSource,
    primary: ClockSource,
}

impl Registry {
    const fn new() -> Self {
        let mut entries = [SourceEntry::empty(); SOURCE_COUNT];
        entries[1] = SourceEntry {
            configured_frequency_hz: 12_000_000,
            measured_frequency_hz: 12_000_000,
            parent: None,
            ready: true,
            failure_count: 0,
        };
        Self {
            entries,
            primary_input: ClockSource::XtalOscillator,
            primary: ClockSource::MainPll,
        }
    }
}

static REGISTRY: Mutex<RefCell<Registry>> = Mutex::new(RefCell::new(Registry::new()));

/// Resolves a virtual source (`Primary`/`PrimaryInput`) to a physical one.
///
/// Downstream firmware overrides the resolution by calling
/// [`set_primary_input`] / [`set_primary`] before `init`.
pub fn resolve(source: ClockSource) -> ClockSource {
    critical_section::with(|cs| {
        let reg = REGISTRY.borrow(cs).borrow();
        match source {
            ClockSource::Primary => reg.primary,
            ClockSource::PrimaryInput => reg.primary_input,
            other => other,
        }
    })
}

/// Overrides the primary clock input (defaults to the external crystal).
pub fn set_primary_input(source: ClockSource) {
    critical_section::with(|cs| {
        REGISTRY.borrow(cs).borrow_mut().primary_input = source;
    });
}

/// Overrides the primary clock source (defaults to the main PLL).
pub fn set_primary(source: ClockSource) {
    critical_section::with(|cs| {
        REGISTRY.borrow(cs).borrow_mut().primary = source;
    });
}

/// Reads a copy of the registry entry for a physical source.
///
/// # Panics
/// Panics if `source` is a virtual token; callers must [`resolve`] first.
pub fn entry(source: ClockSource) -> SourceEntry {
    let slot = source.slot().expect("entry() requires a resolved physical source");
    critical_section::with(|cs| REGISTRY.borrow(cs).borrow().entries[slot])
}

/// Mutates the registry entry for a physical source.
pub fn with_entry_mut<R>(source: ClockSource, f: impl FnOnce(&mut SourceEntry) -> R) -> R {
    let slot = source.slot().expect("with_entry_mut() requires a resolved physical source");
    critical_section::with(|cs| f(&mut REGISTRY.borrow(cs).borrow_mut().entries[slot]))
}

/// Marks a source ready with the given measured frequency, resetting its failure count.
pub fn mark_ready(source: ClockSource, measured_frequency_hz: u32) {
    with_entry_mut(source, |entry| {
        entry.ready = true;
        entry.measured_frequency_hz = measured_frequency_hz;
        entry.failure_count = 0;
    });
}

/// Records a failed bring-up attempt. Returns `true` if the failure threshold
/// has now been exceeded and further attempts should be refused.
pub fn record_failure(source: ClockSource) -> bool {
    with_entry_mut(source, |entry| {
        entry.failure_count = entry.failure_count.saturating_add(1);
        entry.failure_count > MAX_BRINGUP_ATTEMPTS
    })
}

/// Iterates over every physical (non-virtual) source.
pub fn physical_sources() -> impl Iterator<Item = ClockSource> {
    [
        ClockSource::Oscillator32k,
        ClockSource::InternalOscillator,
        ClockSource::EnetRxClock,
        ClockSource::EnetTxClock,
        ClockSource::GpClockInput,
        ClockSource::XtalOscillator,
        ClockSource::UsbPll,
        ClockSource::AudioPll,
        ClockSource::MainPll,
        ClockSource::DividerAOut,
        ClockSource::DividerBOut,
        ClockSource::DividerCOut,
        ClockSource::DividerDOut,
        ClockSource::DividerEOut,
    ]
    .into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_oscillator_starts_ready() {
        let entry = entry(ClockSource::InternalOscillator);
        assert!(entry.ready);
        assert_eq!(entry.measured_frequency_hz, 12_000_000);
    }

    #[test]
    fn primary_resolves_to_overridable_default() {
        assert_eq!(resolve(ClockSource::Primary), ClockSource::MainPll);
        assert_eq!(resolve(ClockSource::PrimaryInput), ClockSource::XtalOscillator);
    }

    #[test]
    fn failure_count_trips_after_threshold() {
        for _ in 0..MAX_BRINGUP_ATTEMPTS {
            assert!(!record_failure(ClockSource::UsbPll));
        }
        assert!(record_failure(ClockSource::UsbPll));
    }
}
