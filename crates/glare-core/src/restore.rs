//! Restoring captured original ramps
//!
//! Everything here works on data captured at initialization and never
//! allocates, logs, or propagates a failure: each display's write is attempted
//! on its own and its result is only reported.

use std::sync::Arc;

use crate::backend::RampWriter;
use crate::model::{DisplayHandle, MonitorRecord};
use crate::ramp::Ramp;

/// Write `original` back to `handle`. No original means failure.
pub(crate) fn write_original<W: RampWriter + ?Sized>(
    writer: &W,
    handle: DisplayHandle,
    original: Option<&Ramp>,
) -> bool {
    match original {
        Some(ramp) => writer.write_ramp(handle, ramp).is_ok(),
        None => false,
    }
}

#[derive(Debug, Clone, Copy)]
struct RestoreSlot {
    handle: DisplayHandle,
    original: Option<Ramp>,
}

/// Restore-capable view of the engine: the captured originals plus a writer
/// that shares no state with the engine's backend connection.
#[derive(Clone)]
pub struct RestoreHandle {
    slots: Arc<[RestoreSlot]>,
    writer: Arc<dyn RampWriter>,
}

impl RestoreHandle {
    pub(crate) fn new<'a>(
        records: impl Iterator<Item = &'a MonitorRecord>,
        writer: Arc<dyn RampWriter>,
    ) -> Self {
        let slots: Arc<[RestoreSlot]> = records
            .map(|r| RestoreSlot {
                handle: r.handle,
                original: r.original_ramp().copied(),
            })
            .collect();
        Self { slots, writer }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Restore every display, reporting `(index, success)` for each
    pub fn restore_each(&self, mut report: impl FnMut(usize, bool)) {
        for (index, slot) in self.slots.iter().enumerate() {
            let ok = write_original(&*self.writer, slot.handle, slot.original.as_ref());
            report(index, ok);
        }
    }

    /// Restore every display; true when all of them were restored
    pub fn restore_all(&self) -> bool {
        let mut all = true;
        self.restore_each(|_, ok| all &= ok);
        all
    }
}

impl std::fmt::Debug for RestoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreHandle")
            .field("displays", &self.slots.len())
            .finish()
    }
}
