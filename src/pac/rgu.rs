//! Reset Generation Unit (RGU) register block.
//!
//! Base address 0x4005_3000. Layout grounded in
//! `original_source/.../include/drivers/platform_reset.h`'s
//! `platform_reset_register_block_t`.

use super::common::Reg32;
use static_assertions::const_assert_eq;

/// The full RGU register block.
#[repr(C)]
pub struct RegisterBlock {
    pub reset_control: [Reg32; 2],
    _reserved0: [u32; 2],
    pub reset_status: [Reg32; 4],
    pub reset_active_status: [Reg32; 2],
    pub reset_ext_stat: [Reg32; 64],
}

const_assert_eq!(core::mem::offset_of!(RegisterBlock, reset_status), 0x10);

impl RegisterBlock {
    /// Core reset bit in `reset_control[0]`, bit 0.
    pub fn trigger_core_reset(&self) {
        self.reset_control[0].write(1);
    }

    /// M4 core reset bit in `reset_control[0]`, bit 13, matching the
    /// `m4_core_reset` field.
    pub fn trigger_m4_core_reset(&self) {
        self.reset_control[0].write(1 << 13);
    }

    /// SGPIO peripheral reset bit in `reset_control[1]`, bit 25, matching
    /// the `sgpio_reset` field. Used to bring the SGPIO block back to its
    /// power-on state before reconfiguring it.
    pub fn trigger_sgpio_reset(&self) {
        self.reset_control[1].write(1 << 25);
    }
}

/// Base address of the RGU register block.
pub const RGU_BASE: usize = 0x4005_3000;

impl RegisterBlock {
    /// Returns a `'static` reference to the RGU register block.
    ///
    /// # Safety
    /// See [`super::cgu::RegisterBlock::steal`].
    pub unsafe fn steal() -> &'static Self {
        &*(RGU_BASE as *const Self)
    }
}
