//! Repetitive Interrupt Timer (RITIMER) register block.
//!
//! Base address 0x400C_5000, the slot immediately following TIMER3
//! (0x400C_4000) in the APB1 peripheral region `original_source` also
//! places TIMER2/TIMER3 in (see [`super::timer::TIMER_BASES`]); RITIMER
//! has no register header in `original_source` (the upstream platform
//! timer is built on a standard `TIMER` block instead, see
//! [`super::timer`]), only an IRQ-table entry
//! (`platform_vectors.h`'s `RITIMER_IRQ`) and a CCU branch-clock gate
//! ([`super::ccu::M4Clocks::ritimer`]). Register layout (compare value,
//! mask, control, free-running counter, no prescaler) matches the RIT
//! block shared across the wider LPC1000/4000 family.
//!
//! Used here as the free-running platform microsecond timer instead of
//! reserving one of the four standard `TIMER0-3` blocks for it, so all
//! four remain available to [`super::timer`]'s acquire/release pool.

use super::common::Reg32;
use static_assertions::const_assert_eq;

/// The full RITIMER register block.
#[repr(C)]
pub struct RegisterBlock {
    pub compare_value: Reg32,
    pub mask: Reg32,
    pub control: Reg32,
    pub counter: Reg32,
}

const_assert_eq!(core::mem::offset_of!(RegisterBlock, control), 0x08);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, counter), 0x0c);
const_assert_eq!(core::mem::size_of::<RegisterBlock>(), 0x10);

/// Timer-enable bit in `control`: the counter free-runs while set,
/// regardless of any compare match (clear-on-match and enable-on-break are
/// left clear, so a match neither resets the counter nor halts it).
const RITEN: u32 = 1 << 3;

impl RegisterBlock {
    /// Starts the free-running counter. Compare/mask are left at their
    /// reset value (0): with `RITENCLR` clear a match never resets the
    /// counter, so this is a pure up-counting tick source.
    pub fn enable(&self) {
        self.control.write(RITEN);
    }

    /// Stops the counter.
    pub fn disable(&self) {
        self.control.clear_bits(RITEN);
    }
}

/// Base address of the RITIMER register block.
pub const RITIMER_BASE: usize = 0x400C_5000;

impl RegisterBlock {
    /// Returns a `'static` reference to the RITIMER register block.
    ///
    /// # Safety
    /// See [`super::cgu::RegisterBlock::steal`].
    pub unsafe fn steal() -> &'static Self {
        &*(RITIMER_BASE as *const Self)
    }
}
