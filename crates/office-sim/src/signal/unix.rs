//! Unix SIGINT handling
//!
//! The handler only stores to an atomic flag; the binary polls
//! [`interrupted`] from its refresh loop and shuts the simulator down.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use office_core::{OfficeError, OfficeResult};

static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signum: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT handler (idempotent)
pub fn install_interrupt_handler() -> OfficeResult<()> {
    if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // Safety: the handler only touches an atomic
    unsafe { signal::sigaction(Signal::SIGINT, &action) }.map_err(|e| {
        HANDLER_INSTALLED.store(false, Ordering::SeqCst);
        OfficeError::Platform(e as i32)
    })?;
    Ok(())
}

/// Whether SIGINT arrived since start (or the last `clear_interrupted`)
#[inline]
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

pub fn clear_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
