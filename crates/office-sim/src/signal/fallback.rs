//! No interrupt handling on this platform; the run ends on its timer

use office_core::OfficeResult;

pub fn install_interrupt_handler() -> OfficeResult<()> {
    Ok(())
}

#[inline]
pub fn interrupted() -> bool {
    false
}

pub fn clear_interrupted() {}
