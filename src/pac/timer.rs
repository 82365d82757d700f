//! Standard timer/counter register block (TIMER0-3).
//!
//! Base addresses 0x4008_4000 (TIMER0), 0x4008_5000 (TIMER1),
//! 0x400C_3000 (TIMER2), 0x400C_4000 (TIMER3). Layout grounded in
//! `original_source/.../include/drivers/platform_timer.h`'s
//! `platform_timer_registers_t`.

use super::common::Reg32;
use static_assertions::const_assert_eq;

/// The full standard-timer register block.
#[repr(C)]
pub struct RegisterBlock {
    /// Interrupt pending/clear register (match0-3, capture0-3 in the low 8 bits).
    pub interrupt_pending: Reg32,
    /// Timer control: bit0 enable, bit1 reset.
    pub control: Reg32,
    pub value: Reg32,
    pub prescaler: Reg32,
    pub prescale_counter: Reg32,
    pub match_control: Reg32,
    pub match_value: [Reg32; 4],
    pub capture_control: Reg32,
    pub captured_value: [Reg32; 4],
    pub external_match_register: Reg32,
    _reserved: [u32; 12],
    pub count_control_register: Reg32,
}

const_assert_eq!(core::mem::offset_of!(RegisterBlock, value), 0x08);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, match_control), 0x14);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, capture_control), 0x28);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, external_match_register), 0x3c);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, count_control_register), 0x70);

impl RegisterBlock {
    /// Enables the counter (sets the run bit, leaves reset clear).
    pub fn enable(&self) {
        self.control.write(1);
    }

    /// Disables the counter.
    pub fn disable(&self) {
        self.control.clear_bits(1);
    }

    /// Holds the counter in reset; the counter stays at zero while this is set.
    pub fn hold_in_reset(&self, reset: bool) {
        if reset {
            self.control.set_bits(1 << 1);
        } else {
            self.control.clear_bits(1 << 1);
        }
    }

    /// True once the given match channel (0-3) has an unacknowledged interrupt.
    pub fn match_interrupt_pending(&self, channel: u8) -> bool {
        self.interrupt_pending.read() & (1 << channel) != 0
    }

    /// Acknowledges the given match channel's interrupt.
    pub fn clear_match_interrupt(&self, channel: u8) {
        self.interrupt_pending.write(1 << channel);
    }
}

/// Base addresses of the four standard timer instances.
pub const TIMER_BASES: [usize; 4] = [0x4008_4000, 0x4008_5000, 0x400C_3000, 0x400C_4000];

impl RegisterBlock {
    /// Returns a `'static` reference to the register block for timer `index` (0-3).
    ///
    /// # Safety
    /// See [`super::cgu::RegisterBlock::steal`].
    pub unsafe fn steal(index: usize) -> &'static Self {
        &*(TIMER_BASES[index] as *const Self)
    }
}
