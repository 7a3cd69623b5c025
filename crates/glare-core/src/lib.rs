//! Gamma ramp engine
//!
//! Builds 256-entry ramps from tone curves, applies them to displays while
//! verifying what the platform actually accepted, and restores the displays'
//! original ramps on request or on panic.

pub mod backend;
pub mod curve;
pub mod engine;
pub mod error;
pub mod fault;
pub mod model;
pub mod ramp;
pub mod registry;
pub mod restore;
pub mod sim;

pub use backend::{GammaBackend, RampWriter};
pub use curve::{evaluate, ControlPoint, CurveSpec, CustomCurve, ToneCurve};
pub use engine::{ApplyOutcome, Engine};
pub use error::{BackendError, CurveError, EngineError, EngineResult};
pub use model::{DisplayDescriptor, DisplayHandle, MonitorInfo, MonitorRecord};
pub use ramp::{build, Ramp, RAMP_SIZE, TOLERANCE};
pub use restore::RestoreHandle;
