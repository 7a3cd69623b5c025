//! Process-wide fault registration
//!
//! The panic hook only ever sees a [`RestoreHandle`], never the engine.

use std::panic::{self, PanicHookInfo};
use std::sync::OnceLock;

use crate::restore::RestoreHandle;

type Hook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Hook that was active before the first install
static PREVIOUS: OnceLock<Hook> = OnceLock::new();

fn chain(info: &PanicHookInfo<'_>) {
    if let Some(previous) = PREVIOUS.get() {
        previous(info);
    }
}

/// Install a panic hook that restores the captured originals, then runs the
/// hook that was active before. Installing again replaces the handle.
pub fn install(handle: RestoreHandle) {
    let current = panic::take_hook();
    if PREVIOUS.get().is_none() {
        let _ = PREVIOUS.set(current);
    }
    panic::set_hook(Box::new(move |info| {
        handle.restore_all();
        chain(info);
    }));
}

/// Stop restoring on panic
pub fn uninstall() {
    if PREVIOUS.get().is_some() {
        let _ours = panic::take_hook();
        panic::set_hook(Box::new(chain));
    }
}
