//! Clock Control Unit (CCU) register block.
//!
//! Base address 0x4005_1000. Layout grounded in `platform_clock.h`'s
//! `platform_clock_control_register_block_t`; offsets pinned below match
//! its `ASSERT_OFFSET` set exactly.

use super::common::Reg32;
use static_assertions::const_assert_eq;

/// A branch-clock control/current register pair.
#[repr(C)]
pub struct BranchClockReg {
    control: Reg32,
    current: Reg32,
}

const_assert_eq!(core::mem::size_of::<BranchClockReg>(), 8);

/// Decoded contents of a branch clock's control register.
#[derive(Clone, Copy)]
pub struct BranchClockControl(u32);

impl BranchClockControl {
    /// Whether the branch clock is requested enabled.
    pub fn enable(self) -> bool {
        self.0 & 1 != 0
    }

    /// Builds a control word with the given enable/auto-disable/wake flags
    /// and divisor.
    pub fn new(enable: bool, auto_disable: bool, wake_after_powerdown: bool, divisor: u8) -> Self {
        let mut bits = 0u32;
        if enable {
            bits |= 1;
        }
        if auto_disable {
            bits |= 1 << 1;
        }
        if wake_after_powerdown {
            bits |= 1 << 2;
        }
        bits |= ((divisor & 0x7) as u32) << 5;
        Self(bits)
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BranchClockReg {
    /// Reads the control (requested) register.
    pub fn control(&self) -> BranchClockControl {
        BranchClockControl(self.control.read())
    }

    /// Writes the control register.
    pub fn set_control(&self, control: BranchClockControl) {
        self.control.write(control.0);
    }

    /// Sets only the auto-disable flag (`disable_when_bus_transactions_complete`),
    /// leaving the rest of the control register untouched. Used by the
    /// disable sequence, which must write this strictly before clearing enable.
    pub fn set_auto_disable(&self, auto_disable: bool) {
        if auto_disable {
            self.control.set_bits(1 << 1);
        } else {
            self.control.clear_bits(1 << 1);
        }
    }

    /// Clears the enable bit. Callers must issue a memory barrier between
    /// [`Self::set_auto_disable`] and this call (see `CCU` disable ordering
    /// in the clock-manager module).
    pub fn clear_enable(&self) {
        self.control.clear_bits(1);
    }

    /// Sets the enable bit directly.
    pub fn set_enable(&self) {
        self.control.set_bits(1);
    }

    /// True once the hardware reports the clock as actually enabled.
    pub fn is_enabled(&self) -> bool {
        self.current.read() & 1 != 0
    }
}

/// APB3 peripheral branch clocks.
#[repr(C)]
pub struct Apb3Clocks {
    pub bus: BranchClockReg,
    pub i2c1: BranchClockReg,
    pub dac: BranchClockReg,
    pub adc0: BranchClockReg,
    pub adc1: BranchClockReg,
    pub can0: BranchClockReg,
}

/// APB1 peripheral branch clocks.
#[repr(C)]
pub struct Apb1Clocks {
    pub bus: BranchClockReg,
    pub motocon_pwm: BranchClockReg,
    pub i2c0: BranchClockReg,
    pub i2s: BranchClockReg,
    pub can1: BranchClockReg,
}

/// M4-core-related branch clocks.
#[repr(C)]
pub struct M4Clocks {
    pub bus: BranchClockReg,
    pub spifi: BranchClockReg,
    pub gpio: BranchClockReg,
    pub lcd: BranchClockReg,
    pub ethernet: BranchClockReg,
    pub usb0: BranchClockReg,
    pub emc: BranchClockReg,
    pub sdio: BranchClockReg,
    pub dma: BranchClockReg,
    pub core: BranchClockReg,
    _reserved0: [u32; 6],
    pub sct: BranchClockReg,
    pub usb1: BranchClockReg,
    pub emcdiv: BranchClockReg,
    pub flasha: BranchClockReg,
    pub flashb: BranchClockReg,
    pub m0app: BranchClockReg,
    pub adchs: BranchClockReg,
    pub eeprom: BranchClockReg,
    _reserved1: [u32; 22],
    pub wwdt: BranchClockReg,
    pub usart0: BranchClockReg,
    pub uart1: BranchClockReg,
    pub ssp0: BranchClockReg,
    pub timer0: BranchClockReg,
    pub timer1: BranchClockReg,
    pub scu: BranchClockReg,
    pub creg: BranchClockReg,
    _reserved2: [u32; 48],
    pub ritimer: BranchClockReg,
    pub usart2: BranchClockReg,
    pub usart3: BranchClockReg,
    pub timer2: BranchClockReg,
    pub timer3: BranchClockReg,
    pub ssp1: BranchClockReg,
    pub qei: BranchClockReg,
}

/// Peripheral-bus branch clocks (SGPIO lives here).
#[repr(C)]
pub struct PeriphClocks {
    pub bus: BranchClockReg,
    pub core: BranchClockReg,
    pub sgpio: BranchClockReg,
}

/// The full CCU register block (CCU1 + CCU2).
#[repr(C)]
pub struct RegisterBlock {
    pub ccu1_power_down: Reg32,
    pub ccu1_base_clocks_needed: Reg32,
    _reserved0: [u32; 62],
    pub apb3: Apb3Clocks,
    _reserved1: [u32; 52],
    pub apb1: Apb1Clocks,
    _reserved2: [u32; 54],
    pub spifi: BranchClockReg,
    _reserved3: [u32; 62],
    pub m4: M4Clocks,
    _reserved4: [u32; 50],
    pub periph: PeriphClocks,
    _reserved5: [u32; 58],
    pub usb0: BranchClockReg,
    _reserved6: [u32; 62],
    pub usb1: BranchClockReg,
    _reserved7: [u32; 62],
    pub spi: BranchClockReg,
    _reserved8: [u32; 62],
    pub adchs: BranchClockReg,
    _reserved9: [u32; 318],
    pub ccu2_power_down: Reg32,
    pub ccu2_base_clocks_needed: Reg32,
    _reserved10: [u32; 62],
    pub audio: BranchClockReg,
    _reserved11: [u32; 62],
    pub usart3: BranchClockReg,
    _reserved12: [u32; 62],
    pub usart2: BranchClockReg,
    _reserved13: [u32; 62],
    pub uart1: BranchClockReg,
    _reserved14: [u32; 62],
    pub usart0: BranchClockReg,
    _reserved15: [u32; 62],
    pub ssp1: BranchClockReg,
    _reserved16: [u32; 62],
    pub ssp0: BranchClockReg,
    _reserved17: [u32; 62],
    pub sdio: BranchClockReg,
    _reserved18: [u32; 62],
}

const_assert_eq!(core::mem::offset_of!(RegisterBlock, apb3), 0x0100);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, apb1), 0x0200);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, spifi), 0x0300);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, m4), 0x0400);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, m4) + core::mem::offset_of!(M4Clocks, core), 0x0448);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, m4) + core::mem::offset_of!(M4Clocks, sct), 0x0468);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, m4) + core::mem::offset_of!(M4Clocks, wwdt), 0x0500);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, m4) + core::mem::offset_of!(M4Clocks, ritimer), 0x0600);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, periph), 0x0700);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, usb0), 0x0800);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, usb1), 0x0900);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, spi), 0x0A00);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, ccu2_power_down), 0x1000);

/// Base address of the CCU register block.
pub const CCU_BASE: usize = 0x4005_1000;

impl RegisterBlock {
    /// Returns a `'static` reference to the CCU register block.
    ///
    /// # Safety
    /// See [`super::cgu::RegisterBlock::steal`].
    pub unsafe fn steal() -> &'static Self {
        &*(CCU_BASE as *const Self)
    }
}
