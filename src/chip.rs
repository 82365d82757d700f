//! Chip-level peripheral singletons and interrupt vector glue.
//!
//! Other embassy-family HALs select their chip variant via a
//! `chips/<chip>.rs` file swapped in by `lib.rs` with
//! `#[cfg_attr(feature = "...", path = "...")]`; no such file exists for the
//! LPC43xx application core here, since there is no `svd2rust`-generated PAC
//! to build one from. This module is written directly against the
//! hand-authored register blocks in [`crate::pac`] instead. `lpc4337` and
//! `lpc4357` expose an identical application-core peripheral set (the delta
//! is Ethernet and a second Cortex-M0 core on lpc4357, both out of scope),
//! so one `chip.rs` serves both chip features rather than a per-chip file.

use core::cell::Cell;

use embassy_hal_internal::impl_peripheral;

macro_rules! peripherals_def {
    ($($name:ident),* $(,)?) => {
        /// Singleton handles for the peripherals this HAL drives.
        ///
        /// Obtained once via [`Peripherals::take`]; each field is a
        /// zero-sized token proving exclusive ownership of that peripheral,
        /// in the same style as the rest of the `embassy` family.
        #[allow(non_snake_case)]
        pub struct Peripherals {
            $(
                /// Singleton token for this peripheral.
                pub $name: peripherals::$name,
            )*
        }

        /// Zero-sized peripheral tokens, one type per peripheral.
        pub mod peripherals {
            $(
                #[allow(non_snake_case)]
                #[doc = concat!("Singleton token for the ", stringify!($name), " peripheral.")]
                pub struct $name {
                    _private: (),
                }
                impl_peripheral!($name);
            )*
        }

        impl Peripherals {
            fn steal_all() -> Self {
                Self {
                    $(
                        $name: peripherals::$name { _private: () },
                    )*
                }
            }
        }
    };
}

peripherals_def!(SGPIO, TIMER0, TIMER1, TIMER2, TIMER3, WWDT);

static TAKEN: critical_section::Mutex<Cell<bool>> = critical_section::Mutex::new(Cell::new(false));

impl Peripherals {
    /// Returns the peripheral singletons.
    ///
    /// # Panics
    /// Panics if called more than once.
    pub fn take() -> Self {
        critical_section::with(|cs| {
            let taken = TAKEN.borrow(cs);
            if taken.replace(true) {
                panic!("Peripherals::take() called more than once");
            }
        });
        Self::steal_all()
    }

    /// Returns the peripheral singletons without checking whether they have
    /// already been taken.
    ///
    /// # Safety
    /// Circumvents the single-ownership guarantee [`Peripherals::take`]
    /// provides. The caller must ensure no other owner of any of these
    /// peripherals exists for the lifetime of the returned value.
    pub unsafe fn steal() -> Self {
        Self::steal_all()
    }
}

/// Interrupt vector numbers and the `#[interrupt]` attribute macro.
///
/// LPC43xx application-core IRQ numbering, as laid out in the vendor
/// vector table (mirrored by the `original_source` linker scripts this
/// crate was ported from). Only the vectors this HAL actually arms are
/// named here.
pub mod interrupt {
    pub use cortex_m_rt::interrupt;

    /// A vector table slot this HAL can enable, disable, or handle.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[repr(u8)]
    pub enum Interrupt {
        /// Windowed watchdog timer warning/timeout.
        WWDT = 0,
        /// Standard timer 0 match/capture.
        TIMER0 = 12,
        /// Standard timer 1 match/capture.
        TIMER1 = 13,
        /// Standard timer 2 match/capture.
        TIMER2 = 14,
        /// Standard timer 3 match/capture.
        TIMER3 = 15,
        /// UART0.
        UART0 = 24,
        /// UART1.
        UART1 = 25,
        /// UART2.
        UART2 = 26,
        /// UART3.
        UART3 = 27,
        /// SGPIO shift-complete / data-shuttle interrupt.
        SGPIO = 31,
    }

    // SAFETY: the discriminants above are the vendor's own IRQ numbers and
    // match the vector table this HAL's linker script lays out.
    unsafe impl cortex_m::interrupt::InterruptNumber for Interrupt {
        fn number(self) -> u16 {
            self as u8 as u16
        }
    }
}
