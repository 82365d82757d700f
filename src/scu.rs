//! SGPIO-to-SCU pin mapping.
//!
//! Every SGPIO pin routes through one specific SCU (group, pin, function)
//! tuple; the mapping is fixed in silicon and enumerated by the vendor
//! datasheet. Grounded in `original_source/.../drivers/sgpio.c`'s
//! `scu_mappings` table and `sgpio_get_scu_function_for_pin_config`/
//! `sgpio_set_up_pin`. Out of scope: a general-purpose SCU driver for
//! non-SGPIO peripherals (spec §1's non-goals) -- this module only knows
//! enough about the SCU to route SGPIO pins.

use crate::pac;
use crate::pac::scu::ResistorConfig;

/// One `{sgpio pin, scu group, scu pin} -> scu function` mapping entry.
struct ScuMapping {
    sgpio_pin: u8,
    group: u8,
    pin: u8,
    function: u8,
}

/// The fixed SGPIO pin routing table, transcribed from the vendor
/// datasheet's SGPIO pin-assignment table (page breaks roughly preserved
/// as blank lines).
const SCU_MAPPINGS: &[ScuMapping] = &[
    ScuMapping { sgpio_pin: 0, group: 0, pin: 0, function: 3 },
    ScuMapping { sgpio_pin: 1, group: 0, pin: 1, function: 3 },
    ScuMapping { sgpio_pin: 7, group: 1, pin: 0, function: 6 },
    ScuMapping { sgpio_pin: 8, group: 1, pin: 1, function: 3 },
    ScuMapping { sgpio_pin: 9, group: 1, pin: 2, function: 3 },
    ScuMapping { sgpio_pin: 10, group: 1, pin: 3, function: 2 },
    ScuMapping { sgpio_pin: 11, group: 1, pin: 4, function: 2 },
    ScuMapping { sgpio_pin: 15, group: 1, pin: 5, function: 6 },
    ScuMapping { sgpio_pin: 14, group: 1, pin: 6, function: 6 },
    ScuMapping { sgpio_pin: 8, group: 1, pin: 12, function: 6 },
    ScuMapping { sgpio_pin: 9, group: 1, pin: 13, function: 6 },
    ScuMapping { sgpio_pin: 10, group: 1, pin: 14, function: 6 },
    ScuMapping { sgpio_pin: 2, group: 1, pin: 15, function: 2 },
    ScuMapping { sgpio_pin: 3, group: 1, pin: 16, function: 2 },
    ScuMapping { sgpio_pin: 11, group: 1, pin: 17, function: 6 },
    ScuMapping { sgpio_pin: 12, group: 1, pin: 18, function: 6 },
    ScuMapping { sgpio_pin: 13, group: 1, pin: 20, function: 6 },
    ScuMapping { sgpio_pin: 4, group: 2, pin: 0, function: 1 },
    ScuMapping { sgpio_pin: 5, group: 2, pin: 1, function: 0 },
    ScuMapping { sgpio_pin: 6, group: 2, pin: 2, function: 0 },
    ScuMapping { sgpio_pin: 12, group: 2, pin: 3, function: 0 },
    ScuMapping { sgpio_pin: 13, group: 2, pin: 4, function: 0 },
    ScuMapping { sgpio_pin: 14, group: 2, pin: 5, function: 0 },
    ScuMapping { sgpio_pin: 7, group: 2, pin: 6, function: 0 },
    ScuMapping { sgpio_pin: 15, group: 2, pin: 8, function: 0 },
    ScuMapping { sgpio_pin: 8, group: 4, pin: 2, function: 7 },
    ScuMapping { sgpio_pin: 9, group: 4, pin: 3, function: 7 },
    ScuMapping { sgpio_pin: 10, group: 4, pin: 4, function: 7 },
    ScuMapping { sgpio_pin: 11, group: 4, pin: 5, function: 7 },
    ScuMapping { sgpio_pin: 12, group: 4, pin: 6, function: 7 },
    ScuMapping { sgpio_pin: 13, group: 4, pin: 8, function: 7 },
    ScuMapping { sgpio_pin: 14, group: 4, pin: 9, function: 7 },
    ScuMapping { sgpio_pin: 15, group: 4, pin: 10, function: 7 },
    ScuMapping { sgpio_pin: 4, group: 6, pin: 3, function: 2 },
    ScuMapping { sgpio_pin: 5, group: 6, pin: 6, function: 2 },
    ScuMapping { sgpio_pin: 6, group: 6, pin: 7, function: 2 },
    ScuMapping { sgpio_pin: 7, group: 6, pin: 8, function: 2 },
    ScuMapping { sgpio_pin: 4, group: 7, pin: 0, function: 7 },
    ScuMapping { sgpio_pin: 5, group: 7, pin: 1, function: 7 },
    ScuMapping { sgpio_pin: 6, group: 7, pin: 2, function: 7 },
    ScuMapping { sgpio_pin: 7, group: 7, pin: 7, function: 7 },
    ScuMapping { sgpio_pin: 3, group: 9, pin: 5, function: 6 },
    ScuMapping { sgpio_pin: 8, group: 9, pin: 6, function: 6 },
];

/// Errors from routing an SGPIO pin through the SCU.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScuError {
    /// No `(sgpio_pin, group, pin)` combination in [`SCU_MAPPINGS`] matched.
    NoMatchingFunction,
}

/// Finds the SCU alternate-function number that routes `scu_group`/`scu_pin`
/// to `sgpio_pin`.
fn function_for_pin(sgpio_pin: u8, scu_group: u8, scu_pin: u8) -> Result<u8, ScuError> {
    SCU_MAPPINGS
        .iter()
        .find(|m| m.sgpio_pin == sgpio_pin && m.group == scu_group && m.pin == scu_pin)
        .map(|m| m.function)
        .ok_or(ScuError::NoMatchingFunction)
}

/// Routes `scu_group`/`scu_pin` to `sgpio_pin`'s SGPIO alternate function,
/// configured for fast (>30 MHz) IO: fast slew rate, input buffer enabled,
/// glitch filter disabled.
pub fn configure_sgpio_pin(
    sgpio_pin: u8,
    scu_group: u8,
    scu_pin: u8,
    pull: ResistorConfig,
) -> Result<(), ScuError> {
    let function = function_for_pin(sgpio_pin, scu_group, scu_pin)?;
    let scu = unsafe { pac::scu::RegisterBlock::steal() };
    scu.group[scu_group as usize].pin[scu_pin as usize].configure(function, pull, true, true, true);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mapping_resolves() {
        assert_eq!(function_for_pin(0, 0, 0), Ok(3));
        assert_eq!(function_for_pin(15, 4, 10), Ok(7));
    }

    #[test]
    fn unknown_combination_is_an_error() {
        assert_eq!(function_for_pin(0, 3, 3), Err(ScuError::NoMatchingFunction));
    }
}
