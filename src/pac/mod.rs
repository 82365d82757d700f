//! Hand-authored register-access layer for the LPC43xx application core.
//!
//! There is no `svd2rust`-generated PAC crate for this family on
//! crates.io, so the register blocks below are written by hand from the
//! vendor reference manual (as mirrored by the `original_source` headers
//! this crate was ported from). Every block pins its layout with
//! [`static_assertions::const_assert_eq`] against the offsets the headers
//! assert, so a transcription mistake fails the build instead of silently
//! corrupting a register read.
//!
//! Each block exposes `unsafe fn steal() -> &'static Self` in the
//! convention of a generated PAC; callers outside this crate only see
//! this module when the `unstable-pac` feature is enabled.

pub(crate) mod common;

pub mod ccu;
pub mod cgu;
pub mod rgu;
pub mod ritimer;
pub mod scu;
pub mod sgpio;
pub mod timer;
pub mod wwdt;
