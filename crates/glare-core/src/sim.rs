//! In-memory backend with a configurable acceptance policy per display.
//!
//! Used for dry runs and as the acceptance oracle in tests. Writes that the
//! policy rejects can be dropped or clamped while still reporting success,
//! which is how real drivers behave when they dislike a ramp.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{GammaBackend, RampWriter};
use crate::error::BackendError;
use crate::model::{DisplayDescriptor, DisplayHandle};
use crate::ramp::{Ramp, RAMP_SIZE};

/// What a display does with a ramp it does not accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectMode {
    /// Report success and keep the previous ramp
    Ignore,
    /// Report success and clamp entries into the allowed band
    Clamp,
    /// Report failure
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptancePolicy {
    AcceptAll,
    /// Accept ramps whose entries all lie within `limit` of identity
    MaxDeviation { limit: u16, mode: RejectMode },
    /// Reject every write, identity included
    RejectAll { hard: bool },
}

#[derive(Debug, Clone)]
pub struct SimulatedDisplay {
    name: String,
    primary: bool,
    readable: bool,
    active: Ramp,
    policy: AcceptancePolicy,
    failing_write: Option<usize>,
    writes: Vec<Ramp>,
}

impl SimulatedDisplay {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: false,
            readable: true,
            active: Ramp::identity(),
            policy: AcceptancePolicy::AcceptAll,
            failing_write: None,
            writes: Vec::new(),
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Reads fail, so no original can be captured
    pub fn unreadable(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn with_ramp(mut self, ramp: Ramp) -> Self {
        self.active = ramp;
        self
    }

    pub fn with_policy(mut self, policy: AcceptancePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The `nth` write (counting from 1) fails whatever the policy says
    pub fn failing_write(mut self, nth: usize) -> Self {
        self.failing_write = Some(nth);
        self
    }

    fn write(&mut self, ramp: &Ramp) -> Result<(), BackendError> {
        self.writes.push(*ramp);
        if self.failing_write == Some(self.writes.len()) {
            return Err(BackendError::platform("set gamma", "transient failure"));
        }
        match self.policy {
            AcceptancePolicy::AcceptAll => {
                self.active = *ramp;
                Ok(())
            }
            AcceptancePolicy::MaxDeviation { limit, mode } => {
                if ramp.max_deviation() <= limit {
                    self.active = *ramp;
                    return Ok(());
                }
                match mode {
                    RejectMode::Ignore => Ok(()),
                    RejectMode::Clamp => {
                        self.active = clamp_to_band(ramp, limit);
                        Ok(())
                    }
                    RejectMode::Fail => Err(BackendError::platform(
                        "set gamma",
                        "ramp outside accepted range",
                    )),
                }
            }
            AcceptancePolicy::RejectAll { hard: true } => {
                Err(BackendError::platform("set gamma", "display refuses ramps"))
            }
            AcceptancePolicy::RejectAll { hard: false } => Ok(()),
        }
    }
}

fn clamp_to_band(ramp: &Ramp, limit: u16) -> Ramp {
    let identity = Ramp::identity();
    let mut out = [0u16; RAMP_SIZE];
    for (i, e) in out.iter_mut().enumerate() {
        let id = identity.get(i);
        *e = ramp
            .get(i)
            .clamp(id.saturating_sub(limit), id.saturating_add(limit));
    }
    Ramp::from_entries(out)
}

/// Cloning shares the simulated displays
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    displays: Arc<Mutex<Vec<SimulatedDisplay>>>,
}

impl SimulatedBackend {
    pub fn new(displays: Vec<SimulatedDisplay>) -> Self {
        Self {
            displays: Arc::new(Mutex::new(displays)),
        }
    }

    /// Two displays: a permissive primary and a secondary that silently clamps
    /// anything further than a quarter of full scale from identity.
    pub fn demo() -> Self {
        Self::new(vec![
            SimulatedDisplay::new("SIM-1").primary(),
            SimulatedDisplay::new("SIM-2").with_policy(AcceptancePolicy::MaxDeviation {
                limit: 16384,
                mode: RejectMode::Clamp,
            }),
        ])
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SimulatedDisplay>> {
        self.displays.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_display<T>(
        &self,
        handle: DisplayHandle,
        f: impl FnOnce(&mut SimulatedDisplay) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut displays = self.lock();
        let display = displays
            .get_mut(handle.0 as usize)
            .ok_or(BackendError::UnknownDisplay(handle.0))?;
        f(display)
    }

    pub fn active_ramp(&self, index: usize) -> Option<Ramp> {
        self.lock().get(index).map(|d| d.active)
    }

    /// Every ramp written to a display, in order
    pub fn writes(&self, index: usize) -> Vec<Ramp> {
        self.lock()
            .get(index)
            .map(|d| d.writes.clone())
            .unwrap_or_default()
    }

    pub fn set_policy(&self, index: usize, policy: AcceptancePolicy) {
        if let Some(d) = self.lock().get_mut(index) {
            d.policy = policy;
        }
    }
}

impl RampWriter for SimulatedBackend {
    fn write_ramp(&self, handle: DisplayHandle, ramp: &Ramp) -> Result<(), BackendError> {
        self.with_display(handle, |d| d.write(ramp))
    }
}

impl GammaBackend for SimulatedBackend {
    fn displays(&self) -> Result<Vec<DisplayDescriptor>, BackendError> {
        Ok(self
            .lock()
            .iter()
            .enumerate()
            .map(|(i, d)| DisplayDescriptor {
                handle: DisplayHandle(i as u32),
                name: d.name.clone(),
                model: Some("Simulated".to_string()),
                primary: d.primary,
            })
            .collect())
    }

    fn read_ramp(&self, handle: DisplayHandle) -> Result<Ramp, BackendError> {
        self.with_display(handle, |d| {
            if d.readable {
                Ok(d.active)
            } else {
                Err(BackendError::platform("get gamma", "read not supported"))
            }
        })
    }

    fn restore_writer(
        &self,
        _originals: &[(DisplayHandle, Ramp)],
    ) -> Result<Arc<dyn RampWriter>, BackendError> {
        Ok(Arc::new(self.clone()))
    }
}
