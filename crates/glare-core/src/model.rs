use serde::{Deserialize, Serialize};

use crate::ramp::Ramp;

/// Opaque platform handle for one display (an X11 CRTC id on X11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayHandle(pub u32);

/// One display as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDescriptor {
    pub handle: DisplayHandle,
    pub name: String, // output name, e.g. "DP-1"
    pub model: Option<String>,
    pub primary: bool,
}

/// Safe scale a display starts with before anything has been learned
pub const INITIAL_SAFE_SCALE: f64 = 1.0;

/// A display known to the engine
#[derive(Debug, Clone)]
pub struct MonitorRecord {
    pub handle: DisplayHandle,
    pub name: String,
    pub model: Option<String>,
    pub primary: bool,
    original_ramp: Option<Ramp>, // captured once at enumeration
    pub(crate) safe_scale: f64,  // written only by the engine
}

impl MonitorRecord {
    pub fn new(descriptor: DisplayDescriptor, original_ramp: Option<Ramp>) -> Self {
        Self {
            handle: descriptor.handle,
            name: descriptor.name,
            model: descriptor.model,
            primary: descriptor.primary,
            original_ramp,
            safe_scale: INITIAL_SAFE_SCALE,
        }
    }

    pub fn original_ramp(&self) -> Option<&Ramp> {
        self.original_ramp.as_ref()
    }

    pub fn has_original(&self) -> bool {
        self.original_ramp.is_some()
    }

    pub fn safe_scale(&self) -> f64 {
        self.safe_scale
    }

    pub fn info(&self, index: usize) -> MonitorInfo {
        MonitorInfo {
            index,
            name: self.name.clone(),
            model: self.model.clone(),
            primary: self.primary,
            has_original: self.has_original(),
            safe_scale: self.safe_scale,
        }
    }
}

/// Descriptor handed to callers outside the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorInfo {
    pub index: usize,
    pub name: String,
    pub model: Option<String>,
    pub primary: bool,
    pub has_original: bool,
    pub safe_scale: f64,
}
