//! System reset driver: persists the reason for the last reset across a
//! soft reset, and triggers new resets.
//!
//! Grounded in `original_source/firmware/drivers/reset.c` and
//! `.../lpc43xx/drivers/platform_reset.c`. The original keeps a single
//! `uint32_t` marked `ATTR_PERSISTENT` (excluded from the startup `.bss`
//! zero-fill) so its value survives a reset that doesn't also clear SRAM.
//! The Rust equivalent is a `static` placed in a `.uninit` linker section
//! that the firmware's linker script must exclude from zero-initialization;
//! this module only owns the read/write discipline around that cell, not
//! the linker script itself.

use crate::pac;

/// Why the system most recently reset.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetReason {
    /// No reset reason could be determined (first boot, or memory was not
    /// intact).
    Unknown,
    /// [`reset`] was called directly by firmware.
    Soft,
    /// A CPU fault handler requested the reset.
    Fault,
    /// SRAM did not look intact at boot; most likely a power cycle.
    PowerCycle,
    /// The windowed watchdog timed out without a corresponding soft reset.
    WatchdogTimeout,
    /// The reset was requested to jump to newly flashed firmware.
    NewFirmware,
    /// The reset was requested in order to switch the active clock source.
    ExternalClockSwitch,
}

// High two bytes mark the word as one we wrote ourselves, so it reads as
// garbage (and hence "unknown, memory not intact") on a true power cycle
// instead of coincidentally matching a real reason.
const VALID_MASK: u32 = 0xAA55_0000;

const WORD_UNKNOWN: u32 = 0xAA55_FF00;
const WORD_SOFT: u32 = 0xAA55_FF01;
const WORD_FAULT: u32 = 0xAA55_FF02;
const WORD_POWER_CYCLE: u32 = 0xAA55_FF03;
const WORD_WATCHDOG: u32 = 0xAA55_FF04;
const WORD_NEW_FIRMWARE: u32 = 0xAA55_FF05;
const WORD_EXTCLOCK: u32 = 0xAA55_CCDD;

impl ResetReason {
    fn from_word(word: u32) -> Self {
        match word {
            WORD_SOFT => ResetReason::Soft,
            WORD_FAULT => ResetReason::Fault,
            WORD_POWER_CYCLE => ResetReason::PowerCycle,
            WORD_WATCHDOG => ResetReason::WatchdogTimeout,
            WORD_NEW_FIRMWARE => ResetReason::NewFirmware,
            WORD_EXTCLOCK => ResetReason::ExternalClockSwitch,
            _ => ResetReason::Unknown,
        }
    }

    fn to_word(self) -> u32 {
        match self {
            ResetReason::Unknown => WORD_UNKNOWN,
            ResetReason::Soft => WORD_SOFT,
            ResetReason::Fault => WORD_FAULT,
            ResetReason::PowerCycle => WORD_POWER_CYCLE,
            ResetReason::WatchdogTimeout => WORD_WATCHDOG,
            ResetReason::NewFirmware => WORD_NEW_FIRMWARE,
            ResetReason::ExternalClockSwitch => WORD_EXTCLOCK,
        }
    }
}

/// Survives a soft reset as long as the linker script keeps
/// `.uninit.reset_reason` out of the zero-initialized region. Must not be
/// given a Rust initializer beyond the `0` literal below, since that
/// initializer is never actually re-run on a soft reset -- this is purely
/// the type the section is declared with.
#[link_section = ".uninit.reset_reason"]
static mut RESET_REASON_WORD: u32 = 0;

/// The reset reason snapshotted by [`init`], for the remainder of this boot.
static LAST_REASON: critical_section::Mutex<core::cell::Cell<ResetReason>> =
    critical_section::Mutex::new(core::cell::Cell::new(ResetReason::Unknown));

/// Returns whether SRAM looks like it survived from a previous boot,
/// judged by whether the persistent word carries our "we wrote this" mask.
fn memory_likely_intact(word: u32) -> bool {
    (word & VALID_MASK) == VALID_MASK
}

/// Snapshots the persistent reset-reason word and clears it to `Unknown`.
///
/// Must be called exactly once, early in startup, before anything else
/// reads [`last_reset_reason`].
///
/// # Safety
/// Must not run concurrently with any other access to the persistent word;
/// callers must guarantee this runs before interrupts are enabled.
pub unsafe fn init() {
    let word = core::ptr::read_volatile(core::ptr::addr_of!(RESET_REASON_WORD));

    let reason = if memory_likely_intact(word) {
        ResetReason::from_word(word)
    } else {
        ResetReason::PowerCycle
    };

    critical_section::with(|cs| {
        LAST_REASON.borrow(cs).set(reason);
    });

    core::ptr::write_volatile(core::ptr::addr_of_mut!(RESET_REASON_WORD), WORD_UNKNOWN);
}

/// Returns the reason the system most recently reset, as determined by
/// [`init`].
pub fn last_reset_reason() -> ResetReason {
    critical_section::with(|cs| LAST_REASON.borrow(cs).get())
}

/// Resets the entire system, recording `reason` so the next boot's
/// [`init`] can report it.
///
/// If `include_always_on_domain` is set, the reset goes through the
/// windowed watchdog (which also resets the always-on/RTC power domain);
/// otherwise only the core reset is triggered.
pub fn reset(reason: ResetReason, include_always_on_domain: bool) -> ! {
    critical_section::with(|_cs| unsafe {
        core::ptr::write_volatile(core::ptr::addr_of_mut!(RESET_REASON_WORD), reason.to_word());
    });

    let rgu = unsafe { pac::rgu::RegisterBlock::steal() };
    if include_always_on_domain {
        let wwdt = unsafe { pac::wwdt::RegisterBlock::steal() };
        wwdt.mode.modify(|bits| bits | 0b11);
        wwdt.timeout_constant.write(100_000);
        critical_section::with(|_cs| wwdt.feed_sequence());
    } else {
        rgu.trigger_core_reset();
    }

    loop {
        cortex_m::asm::nop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_reasons() {
        for reason in [
            ResetReason::Soft,
            ResetReason::Fault,
            ResetReason::PowerCycle,
            ResetReason::WatchdogTimeout,
            ResetReason::NewFirmware,
            ResetReason::ExternalClockSwitch,
        ] {
            assert_eq!(ResetReason::from_word(reason.to_word()), reason);
        }
    }

    #[test]
    fn garbage_word_reads_as_unknown() {
        assert_eq!(ResetReason::from_word(0xDEAD_BEEF), ResetReason::Unknown);
    }

    #[test]
    fn valid_mask_rejects_words_without_our_marker() {
        assert!(!memory_likely_intact(0x0000_0001));
        assert!(memory_likely_intact(WORD_SOFT));
    }
}
