//! Adaptive ramp application
//!
//! A successful write does not mean the display shows the ramp: drivers clamp
//! or drop ramps they consider too aggressive and still report success. Every
//! write is therefore read back and compared, and the engine bisects on how far
//! toward the target it can blend away from identity before the display stops
//! honoring it.

use tracing::{debug, info, warn};

use crate::backend::GammaBackend;
use crate::curve::CurveSpec;
use crate::error::{BackendError, EngineError, EngineResult};
use crate::model::{DisplayHandle, MonitorInfo};
use crate::ramp::{self, Ramp, TOLERANCE};
use crate::registry::Registry;
use crate::restore::{self, RestoreHandle};

/// Probes per display and apply call
pub const MAX_ATTEMPTS: usize = 6;
/// Search stops once the bracket is narrower than this
pub const CONVERGENCE: f64 = 0.02;
/// Factor the remembered safe scale is widened by at the start of a search
pub const EXPLORE_FACTOR: f64 = 1.05;
/// Safe scale recorded after a display rejected everything
pub const FALLBACK_SAFE_SCALE: f64 = 0.1;

/// Why a probed ramp did not take
#[derive(Debug)]
pub enum Rejection {
    /// The write call itself failed
    Hard(BackendError),
    /// The write reported success but the active ramp differs
    Silent { index: usize, delta: u16 },
    /// The active ramp could not be read back, so nothing can be confirmed
    Unverified(BackendError),
}

/// Result of one write plus read-back
#[derive(Debug)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

/// Outcome of adaptively applying a ramp to one display
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyOutcome {
    /// A blend at `scale` toward the target was verified active
    Applied { scale: f64 },
    /// Nothing was accepted; the identity ramp was written instead
    Fallback,
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

/// Write `ramp` and check that the display now shows it
pub fn probe<B: GammaBackend + ?Sized>(backend: &B, handle: DisplayHandle, ramp: &Ramp) -> Verdict {
    if let Err(err) = backend.write_ramp(handle, ramp) {
        return Verdict::Rejected(Rejection::Hard(err));
    }
    match backend.read_ramp(handle) {
        Ok(active) => match active.first_mismatch(ramp, TOLERANCE) {
            None => Verdict::Accepted,
            Some((index, delta)) => Verdict::Rejected(Rejection::Silent { index, delta }),
        },
        Err(err) => Verdict::Rejected(Rejection::Unverified(err)),
    }
}

/// Result of a bisection run against an acceptance oracle
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    /// Largest accepted scale with the ramp written at that scale
    pub accepted: Option<(f64, Ramp)>,
    /// Whether the last probe was the accepted one
    pub final_accepted: bool,
    pub attempts: usize,
}

/// Bisect the blend scale between identity and `target`, seeded by `safe_scale`.
///
/// Deterministic for a given sequence of oracle verdicts.
pub fn bisect(
    target: &Ramp,
    safe_scale: f64,
    mut oracle: impl FnMut(f64, &Ramp) -> Verdict,
) -> Search {
    let identity = Ramp::identity();
    let mut low = 0.0_f64;
    let mut high = (safe_scale * EXPLORE_FACTOR).min(1.0);
    let mut search = Search {
        accepted: None,
        final_accepted: false,
        attempts: 0,
    };

    for attempt in 0..MAX_ATTEMPTS {
        let scale = if attempt == 0 { high } else { (low + high) / 2.0 };
        let blended = identity.blend_toward(target, scale);
        search.attempts = attempt + 1;

        match oracle(scale, &blended) {
            Verdict::Accepted => {
                debug!(attempt, scale, "ramp accepted");
                low = scale;
                search.accepted = Some((scale, blended));
                search.final_accepted = true;
            }
            Verdict::Rejected(reason) => {
                debug!(attempt, scale, ?reason, "ramp rejected");
                high = scale;
                search.final_accepted = false;
            }
        }

        if high - low < CONVERGENCE {
            break;
        }
    }
    search
}

enum EngineState {
    Uninitialized,
    Initialized(Registry),
}

/// Applies ramps to every display of a backend and can put them back
pub struct Engine<B: GammaBackend> {
    backend: B,
    state: EngineState,
    restore: Option<RestoreHandle>,
}

impl<B: GammaBackend> Engine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: EngineState::Uninitialized,
            restore: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, EngineState::Initialized(_))
    }

    /// Enumerate displays and capture their original ramps. Only the first
    /// successful call has an effect; returns the number of displays.
    pub fn initialize(&mut self) -> EngineResult<usize> {
        if let EngineState::Initialized(registry) = &self.state {
            return Ok(registry.len());
        }
        let registry = Registry::enumerate(&self.backend)?;
        let captured = registry.iter().filter(|r| r.has_original()).count();
        info!(displays = registry.len(), captured, "displays enumerated");

        self.restore = match self.backend.restore_writer(&registry.originals()) {
            Ok(writer) => Some(RestoreHandle::new(registry.iter(), writer)),
            Err(err) => {
                warn!(error = %err, "no independent restore writer, fault restore disabled");
                None
            }
        };
        let count = registry.len();
        self.state = EngineState::Initialized(registry);
        Ok(count)
    }

    fn registry(&self) -> EngineResult<&Registry> {
        match &self.state {
            EngineState::Initialized(registry) => Ok(registry),
            EngineState::Uninitialized => Err(EngineError::NotInitialized),
        }
    }

    fn registry_mut(&mut self) -> EngineResult<&mut Registry> {
        match &mut self.state {
            EngineState::Initialized(registry) => Ok(registry),
            EngineState::Uninitialized => Err(EngineError::NotInitialized),
        }
    }

    pub fn monitor_count(&self) -> usize {
        self.registry().map_or(0, Registry::len)
    }

    pub fn monitor_info(&self, index: usize) -> EngineResult<MonitorInfo> {
        Ok(self.registry()?.get(index)?.info(index))
    }

    pub fn monitors(&self) -> Vec<MonitorInfo> {
        self.registry().map(Registry::infos).unwrap_or_default()
    }

    pub fn primary_index(&self) -> EngineResult<usize> {
        Ok(self.registry()?.primary_index())
    }

    /// Handle for fault-path registration; `None` before initialization
    pub fn restore_handle(&self) -> Option<RestoreHandle> {
        self.restore.clone()
    }

    /// Adaptively apply `target` to display `index`
    pub fn apply_ramp(&mut self, index: usize, target: &Ramp) -> EngineResult<ApplyOutcome> {
        let backend = &self.backend;
        let record = match &mut self.state {
            EngineState::Initialized(registry) => registry.get_mut(index)?,
            EngineState::Uninitialized => return Err(EngineError::NotInitialized),
        };
        let handle = record.handle;

        let search = bisect(target, record.safe_scale, |_, blended| {
            probe(backend, handle, blended)
        });

        if let Some((scale, last_good)) = search.accepted {
            // the display currently holds a rejected probe unless the last one
            // was accepted, so the verified ramp has to be written and checked again
            let verified = search.final_accepted
                || match probe(backend, handle, &last_good) {
                    Verdict::Accepted => true,
                    Verdict::Rejected(reason) => {
                        warn!(name = %record.name, ?reason, "re-applying verified ramp failed");
                        false
                    }
                };
            if verified {
                record.safe_scale = scale;
                info!(name = %record.name, scale, attempts = search.attempts, "ramp applied");
                return Ok(ApplyOutcome::Applied { scale });
            }
        }

        record.safe_scale = FALLBACK_SAFE_SCALE;
        if let Err(err) = backend.write_ramp(handle, &Ramp::identity()) {
            warn!(name = %record.name, error = %err, "identity fallback write failed");
        }
        warn!(name = %record.name, attempts = search.attempts, "no verified ramp, using identity");
        Ok(ApplyOutcome::Fallback)
    }

    /// Build `curve` at `strength` and apply it to every display in turn.
    /// True only if every display accepted a ramp.
    pub fn apply_all(&mut self, curve: &CurveSpec, strength: f64) -> bool {
        let count = self.monitor_count();
        if count == 0 {
            return false;
        }
        let target = ramp::build(curve, strength);
        let mut all = true;
        for index in 0..count {
            match self.apply_ramp(index, &target) {
                Ok(outcome) => all &= outcome.is_applied(),
                Err(err) => {
                    warn!(index, error = %err, "apply failed");
                    all = false;
                }
            }
        }
        all
    }

    /// Build `curve` at `strength` and apply it to display `index`
    pub fn apply_one(&mut self, index: usize, curve: &CurveSpec, strength: f64) -> bool {
        let target = ramp::build(curve, strength);
        match self.apply_ramp(index, &target) {
            Ok(outcome) => outcome.is_applied(),
            Err(err) => {
                warn!(index, error = %err, "apply failed");
                false
            }
        }
    }

    /// Write every captured original back; true when all were restored
    pub fn restore_all(&self) -> bool {
        let Ok(registry) = self.registry() else {
            return true;
        };
        let mut all = true;
        for record in registry.iter() {
            let ok = restore::write_original(&self.backend, record.handle, record.original_ramp());
            if !ok {
                warn!(name = %record.name, "restore failed");
            }
            all &= ok;
        }
        all
    }

    pub fn restore_one(&self, index: usize) -> EngineResult<bool> {
        let record = self.registry()?.get(index)?;
        if !record.has_original() {
            return Err(EngineError::NoOriginal(index));
        }
        Ok(restore::write_original(
            &self.backend,
            record.handle,
            record.original_ramp(),
        ))
    }

    /// Estimate the power-law strength active on display `index` from its
    /// mid-scale entry. Clamped to [0.1, 9.0]; 1.0 when the sample is degenerate.
    pub fn read_gamma(&self, index: usize) -> EngineResult<f64> {
        let record = self.registry()?.get(index)?;
        let active = self.backend.read_ramp(record.handle)?;
        Ok(estimate_gamma(&active))
    }

    /// Forget what was learned about display `index`
    pub fn reset_safe_scale(&mut self, index: usize) -> EngineResult<()> {
        self.registry_mut()?.get_mut(index)?.safe_scale = crate::model::INITIAL_SAFE_SCALE;
        Ok(())
    }
}

/// Power-law strength matching the ramp's entry at input 128/255
pub fn estimate_gamma(ramp: &Ramp) -> f64 {
    let input = 128.0 / 255.0;
    let output = f64::from(ramp.get(128)) / 65535.0;
    if output <= 0.0 || output >= 1.0 {
        return 1.0;
    }
    let gamma = f64::ln(input) / f64::ln(output);
    if gamma.is_nan() {
        return 1.0;
    }
    gamma.clamp(crate::curve::MIN_STRENGTH, crate::curve::MAX_STRENGTH)
}
