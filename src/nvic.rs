//! Thin wrapper over `cortex_m::peripheral::NVIC` for arming and disarming
//! the vector table slots this HAL owns.
//!
//! Kept separate from [`crate::chip::interrupt`] (which only names the
//! vectors) so the timer façade and the SGPIO lifecycle driver can enable,
//! disable, and prioritize interrupts without reaching into `cortex-m`
//! directly.

use cortex_m::peripheral::NVIC;

use crate::chip::interrupt::Interrupt;

/// Enables `interrupt` at the NVIC.
///
/// # Safety
/// Enabling an interrupt whose handler is not installed, or whose handler
/// assumes state that has not yet been initialized, can corrupt shared
/// state if the interrupt fires immediately. Callers must have the
/// peripheral and its ISR-visible data ready before calling this.
pub unsafe fn enable(interrupt: Interrupt) {
    NVIC::unmask(interrupt);
}

/// Disables `interrupt` at the NVIC. Does not clear a pending flag.
pub fn disable(interrupt: Interrupt) {
    NVIC::mask(interrupt);
}

/// Clears any pending flag for `interrupt` without handling it.
pub fn unpend(interrupt: Interrupt) {
    NVIC::unpend(interrupt);
}

/// Returns whether `interrupt` is currently pending.
pub fn is_pending(interrupt: Interrupt) -> bool {
    NVIC::is_pending(interrupt)
}

/// Sets the NVIC priority for `interrupt`.
///
/// # Safety
/// Must not be called while `interrupt` is enabled and able to preempt
/// code relying on the old priority for mutual exclusion. Steals the core
/// `NVIC` peripheral rather than threading it through every caller, in
/// keeping with how this HAL steals its own register blocks.
pub unsafe fn set_priority(interrupt: Interrupt, priority: u8) {
    let mut core_peripherals = cortex_m::Peripherals::steal();
    core_peripherals.NVIC.set_priority(interrupt, priority);
}
