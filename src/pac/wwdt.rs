//! Windowed watchdog timer register block (WWDT).
//!
//! Base address 0x4008_0000. Layout grounded in
//! `original_source/.../include/drivers/platform_reset.h`'s
//! `platform_watchdog_register_block_t`.

use super::common::Reg32;

/// The watchdog mode register: enable, reset-on-timeout, flags, lock bits.
#[repr(transparent)]
pub struct ModeReg(Reg32);

impl ModeReg {
    pub fn read(&self) -> u32 {
        self.0.read()
    }

    pub fn modify(&self, f: impl FnOnce(u32) -> u32) {
        self.0.modify(f);
    }
}

/// The full WWDT register block.
#[repr(C)]
pub struct RegisterBlock {
    pub mode: ModeReg,
    pub timeout_constant: Reg32,
    pub feed: Reg32,
    pub timer_value: Reg32,
    _reserved0: u32,
    pub warning_threshold: Reg32,
    pub valid_feed_threshold: Reg32,
}

/// Base address of the WWDT register block.
pub const WWDT_BASE: usize = 0x4008_0000;

impl RegisterBlock {
    /// Returns a `'static` reference to the WWDT register block.
    ///
    /// # Safety
    /// See [`super::cgu::RegisterBlock::steal`].
    pub unsafe fn steal() -> &'static Self {
        &*(WWDT_BASE as *const Self)
    }

    /// Feeds the watchdog with the fixed 0xAA, 0x55 sequence. Must be
    /// wrapped in a `critical_section` to avoid an aborted feed sequence.
    pub fn feed_sequence(&self) {
        self.feed.write(0xAA);
        self.feed.write(0x55);
    }
}
