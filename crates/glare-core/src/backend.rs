//! Seam between the engine and the platform's per-display ramp interface

use std::sync::Arc;

use crate::error::BackendError;
use crate::model::{DisplayDescriptor, DisplayHandle};
use crate::ramp::Ramp;

/// Writes ramps to displays.
///
/// A successful return only means the platform took the call; whether the ramp
/// is actually active has to be checked by reading it back.
pub trait RampWriter: Send + Sync {
    fn write_ramp(&self, handle: DisplayHandle, ramp: &Ramp) -> Result<(), BackendError>;
}

/// Full platform access used by the engine
pub trait GammaBackend: RampWriter {
    /// Attached displays with an active output
    fn displays(&self) -> Result<Vec<DisplayDescriptor>, BackendError>;

    /// Ramp currently active on a display
    fn read_ramp(&self, handle: DisplayHandle) -> Result<Ramp, BackendError>;

    /// A writer that shares no lock with this backend, for use from the fault
    /// path. `originals` are the ramps it will be asked to put back; a backend
    /// may prepare whatever it needs for them here so that restoring later
    /// costs no allocation or round trip beyond the write itself.
    fn restore_writer(
        &self,
        originals: &[(DisplayHandle, Ramp)],
    ) -> Result<Arc<dyn RampWriter>, BackendError>;
}

impl<T: RampWriter + ?Sized> RampWriter for Arc<T> {
    fn write_ramp(&self, handle: DisplayHandle, ramp: &Ramp) -> Result<(), BackendError> {
        (**self).write_ramp(handle, ramp)
    }
}

impl<T: GammaBackend + ?Sized> GammaBackend for Arc<T> {
    fn displays(&self) -> Result<Vec<DisplayDescriptor>, BackendError> {
        (**self).displays()
    }

    fn read_ramp(&self, handle: DisplayHandle) -> Result<Ramp, BackendError> {
        (**self).read_ramp(handle)
    }

    fn restore_writer(
        &self,
        originals: &[(DisplayHandle, Ramp)],
    ) -> Result<Arc<dyn RampWriter>, BackendError> {
        (**self).restore_writer(originals)
    }
}
