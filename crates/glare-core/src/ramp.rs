//! 256-entry gamma ramps
//!
//! A single monochrome ramp is applied to all three channels. Ramps handed to
//! a backend are always non-decreasing: platform acceptance heuristics reject
//! flat or decreasing runs regardless of the curve's intent.

use crate::curve::{clamp_strength, evaluate, CurveSpec};

/// Number of entries in a ramp
pub const RAMP_SIZE: usize = 256;
/// Read-back tolerance per entry, about 0.8% of the 16-bit range
pub const TOLERANCE: u16 = 512;

/// Quantized lookup table of 256 16-bit entries
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ramp([u16; RAMP_SIZE]);

impl Ramp {
    pub const fn from_entries(entries: [u16; RAMP_SIZE]) -> Self {
        Self(entries)
    }

    /// Linear passthrough: entry `i` is `i * 257`
    pub fn identity() -> Self {
        let mut entries = [0u16; RAMP_SIZE];
        for (i, e) in entries.iter_mut().enumerate() {
            *e = (i as u16) * 257;
        }
        Self(entries)
    }

    pub fn entries(&self) -> &[u16; RAMP_SIZE] {
        &self.0
    }

    pub fn get(&self, index: usize) -> u16 {
        self.0[index]
    }

    pub fn is_non_decreasing(&self) -> bool {
        self.0.windows(2).all(|w| w[1] >= w[0])
    }

    /// Bump every entry that is not strictly above its predecessor to
    /// `predecessor + 1`, saturating at 65535.
    pub fn enforce_monotonic(&mut self) {
        for i in 1..RAMP_SIZE {
            let prev = self.0[i - 1];
            if self.0[i] <= prev {
                self.0[i] = prev.saturating_add(1);
            }
        }
    }

    /// `self + scale * (target - self)` per entry, rounded and made monotonic
    pub fn blend_toward(&self, target: &Ramp, scale: f64) -> Ramp {
        let scale = if scale.is_nan() { 0.0 } else { scale.clamp(0.0, 1.0) };
        let mut out = [0u16; RAMP_SIZE];
        for (i, e) in out.iter_mut().enumerate() {
            let base = f64::from(self.0[i]);
            let v = base + scale * (f64::from(target.0[i]) - base);
            *e = v.round().clamp(0.0, 65535.0) as u16;
        }
        let mut ramp = Ramp(out);
        ramp.enforce_monotonic();
        ramp
    }

    /// First entry whose absolute difference exceeds `tolerance`, with that difference
    pub fn first_mismatch(&self, other: &Ramp, tolerance: u16) -> Option<(usize, u16)> {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a.abs_diff(*b))
            .enumerate()
            .find(|&(_, d)| d > tolerance)
    }

    pub fn matches(&self, other: &Ramp, tolerance: u16) -> bool {
        self.first_mismatch(other, tolerance).is_none()
    }

    /// Largest absolute difference from the identity ramp
    pub fn max_deviation(&self) -> u16 {
        let identity = Ramp::identity();
        self.0
            .iter()
            .zip(identity.0.iter())
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0)
    }
}

impl Default for Ramp {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Debug for Ramp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ramp[{}, {}, {}, .. {}]",
            self.0[0], self.0[1], self.0[128], self.0[255]
        )
    }
}

/// Upper bound of the soft envelope around identity value `identity`
fn envelope_max(identity: f64) -> f64 {
    (identity * 3.0 + 0.2).min(1.0)
}

/// Build a quantized, non-decreasing ramp for `curve`. `strength` is clamped to
/// [0.1, 9.0] and parameterizes `Power` curves.
pub fn build(curve: &CurveSpec, strength: f64) -> Ramp {
    let curve = curve.with_strength(clamp_strength(strength));
    let mut entries = [0u16; RAMP_SIZE];
    for (i, e) in entries.iter_mut().enumerate() {
        let identity = i as f64 / (RAMP_SIZE - 1) as f64;
        let out = evaluate(&curve, identity).clamp(0.0, envelope_max(identity));
        *e = (out * 65535.0).round() as u16;
    }
    let mut ramp = Ramp(entries);
    ramp.enforce_monotonic();
    ramp
}
