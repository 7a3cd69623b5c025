//! Monitor registry: enumerated displays and their captured original ramps

use tracing::{debug, warn};

use crate::backend::GammaBackend;
use crate::error::{EngineError, EngineResult};
use crate::model::{DisplayHandle, MonitorInfo, MonitorRecord};
use crate::ramp::Ramp;

#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<MonitorRecord>,
}

impl Registry {
    /// Enumerate displays and capture each one's current ramp as its original.
    ///
    /// A display whose ramp cannot be read is kept so it can still be written
    /// to, but it has no original and restoring it reports failure.
    pub fn enumerate<B: GammaBackend + ?Sized>(backend: &B) -> EngineResult<Self> {
        let displays = backend.displays()?;
        if displays.is_empty() {
            return Err(EngineError::NoDisplays);
        }
        let mut records = Vec::with_capacity(displays.len());
        for descriptor in displays {
            let original = match backend.read_ramp(descriptor.handle) {
                Ok(ramp) => {
                    debug!(name = %descriptor.name, ?ramp, "captured original ramp");
                    Some(ramp)
                }
                Err(err) => {
                    warn!(name = %descriptor.name, error = %err, "could not capture original ramp");
                    None
                }
            };
            records.push(MonitorRecord::new(descriptor, original));
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> EngineResult<&MonitorRecord> {
        let count = self.records.len();
        self.records
            .get(index)
            .ok_or(EngineError::IndexOutOfRange { index, count })
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> EngineResult<&mut MonitorRecord> {
        let count = self.records.len();
        self.records
            .get_mut(index)
            .ok_or(EngineError::IndexOutOfRange { index, count })
    }

    /// Index of the primary display, or 0 when none reports itself primary
    pub fn primary_index(&self) -> usize {
        self.records.iter().position(|r| r.primary).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitorRecord> {
        self.records.iter()
    }

    /// Captured originals by handle, for preparing a restore writer
    pub fn originals(&self) -> Vec<(DisplayHandle, Ramp)> {
        self.records
            .iter()
            .filter_map(|r| r.original_ramp().map(|ramp| (r.handle, *ramp)))
            .collect()
    }

    pub fn infos(&self) -> Vec<MonitorInfo> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| r.info(i))
            .collect()
    }
}
