//! Tone curve model
//!
//! Curves are named after the standards they visually resemble. None of them
//! is a calibrated transform: they are shapes applied as a plain output remap.

use serde::{Deserialize, Serialize};

use crate::error::CurveError;

/// Lowest accepted strength
pub const MIN_STRENGTH: f64 = 0.1;
/// Highest accepted strength
pub const MAX_STRENGTH: f64 = 9.0;
/// Fixed strength of the cinema preset
pub const CINEMA_STRENGTH: f64 = 2.6;

/// Clamp a strength into [`MIN_STRENGTH`], [`MAX_STRENGTH`]. NaN maps to 1.0.
pub fn clamp_strength(strength: f64) -> f64 {
    if strength.is_nan() {
        return 1.0;
    }
    strength.clamp(MIN_STRENGTH, MAX_STRENGTH)
}

/// Curve identifier, as persisted and selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToneCurve {
    Linear,
    #[default]
    Power,
    ShadowLift,
    SoftContrast,
    Cinema,
    Custom,
}

impl ToneCurve {
    pub const ALL: [ToneCurve; 6] = [
        ToneCurve::Linear,
        ToneCurve::Power,
        ToneCurve::ShadowLift,
        ToneCurve::SoftContrast,
        ToneCurve::Cinema,
        ToneCurve::Custom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToneCurve::Linear => "linear",
            ToneCurve::Power => "power",
            ToneCurve::ShadowLift => "shadow-lift",
            ToneCurve::SoftContrast => "soft-contrast",
            ToneCurve::Cinema => "cinema",
            ToneCurve::Custom => "custom",
        }
    }
}

/// One point of a custom curve, both coordinates in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub x: f64,
    pub y: f64,
}

impl ControlPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A validated piecewise-linear curve: at least two points, coordinates in
/// [0, 1], sorted ascending by x.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomCurve {
    points: Vec<ControlPoint>,
}

impl CustomCurve {
    pub fn new(points: Vec<ControlPoint>) -> Result<Self, CurveError> {
        if points.len() < 2 {
            return Err(CurveError::TooFewPoints(points.len()));
        }
        for (index, p) in points.iter().enumerate() {
            let in_range = |v: f64| (0.0..=1.0).contains(&v);
            if !in_range(p.x) || !in_range(p.y) {
                return Err(CurveError::OutOfRange {
                    index,
                    x: p.x,
                    y: p.y,
                });
            }
        }
        if let Some(i) = points.windows(2).position(|w| w[1].x < w[0].x) {
            return Err(CurveError::Unsorted(i + 1));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    fn interpolate(&self, x: f64) -> f64 {
        // new() guarantees at least two points
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }
        for w in self.points.windows(2) {
            let (a, b) = (w[0], w[1]);
            if x >= a.x && x <= b.x {
                let t = if b.x > a.x { (x - a.x) / (b.x - a.x) } else { 0.0 };
                return a.y + t * (b.y - a.y);
            }
        }
        x
    }
}

/// A tone curve with its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum CurveSpec {
    Linear,
    Power(f64),
    ShadowLift,
    SoftContrast,
    Cinema,
    Custom(CustomCurve),
}

impl CurveSpec {
    /// Build a spec from an identifier. `strength` parameterizes `Power` only;
    /// `Custom` without a curve falls back to `Linear`.
    pub fn from_tone(tone: ToneCurve, strength: f64, custom: Option<CustomCurve>) -> Self {
        match tone {
            ToneCurve::Linear => CurveSpec::Linear,
            ToneCurve::Power => CurveSpec::Power(clamp_strength(strength)),
            ToneCurve::ShadowLift => CurveSpec::ShadowLift,
            ToneCurve::SoftContrast => CurveSpec::SoftContrast,
            ToneCurve::Cinema => CurveSpec::Cinema,
            ToneCurve::Custom => custom.map_or(CurveSpec::Linear, CurveSpec::Custom),
        }
    }

    pub fn tone(&self) -> ToneCurve {
        match self {
            CurveSpec::Linear => ToneCurve::Linear,
            CurveSpec::Power(_) => ToneCurve::Power,
            CurveSpec::ShadowLift => ToneCurve::ShadowLift,
            CurveSpec::SoftContrast => ToneCurve::SoftContrast,
            CurveSpec::Cinema => ToneCurve::Cinema,
            CurveSpec::Custom(_) => ToneCurve::Custom,
        }
    }

    /// Same curve with `Power` re-parameterized to `strength`
    pub fn with_strength(&self, strength: f64) -> Self {
        match self {
            CurveSpec::Power(_) => CurveSpec::Power(clamp_strength(strength)),
            other => other.clone(),
        }
    }
}

/// Map a normalized sample through `curve`. Inputs and outputs are clamped to [0, 1].
pub fn evaluate(curve: &CurveSpec, x: f64) -> f64 {
    let x = if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) };
    let y = match curve {
        CurveSpec::Linear => x,
        CurveSpec::Power(strength) => power(x, clamp_strength(*strength)),
        CurveSpec::ShadowLift => shadow_lift(x),
        CurveSpec::SoftContrast => soft_contrast(x),
        CurveSpec::Cinema => power(x, CINEMA_STRENGTH),
        CurveSpec::Custom(custom) => custom.interpolate(x),
    };
    if y.is_nan() {
        0.0
    } else {
        y.clamp(0.0, 1.0)
    }
}

fn power(x: f64, strength: f64) -> f64 {
    x.powf(1.0 / strength)
}

// sRGB-shaped encode
fn shadow_lift(x: f64) -> f64 {
    if x <= 0.0031308 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

// Rec.709-shaped encode
fn soft_contrast(x: f64) -> f64 {
    const BETA: f64 = 0.018;
    const ALPHA: f64 = 1.099;
    if x < BETA {
        4.5 * x
    } else {
        ALPHA * x.powf(0.45) - (ALPHA - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(points: &[(f64, f64)]) -> CustomCurve {
        CustomCurve::new(points.iter().map(|&(x, y)| ControlPoint::new(x, y)).collect()).unwrap()
    }

    #[test]
    fn test_linear_is_identity() {
        for i in 0..=10 {
            let x = i as f64 / 10.0;
            assert_eq!(evaluate(&CurveSpec::Linear, x), x);
        }
    }

    #[test]
    fn test_power_curve() {
        let y = evaluate(&CurveSpec::Power(2.0), 0.25);
        assert!((y - 0.5).abs() < 1e-12);
        assert_eq!(evaluate(&CurveSpec::Power(2.0), 0.0), 0.0);
        assert_eq!(evaluate(&CurveSpec::Power(2.0), 1.0), 1.0);
    }

    #[test]
    fn test_cinema_matches_power_2_6() {
        for i in 0..=20 {
            let x = i as f64 / 20.0;
            assert_eq!(
                evaluate(&CurveSpec::Cinema, x),
                evaluate(&CurveSpec::Power(2.6), x)
            );
        }
    }

    #[test]
    fn test_shadow_lift_segments() {
        let y = evaluate(&CurveSpec::ShadowLift, 0.001);
        assert!((y - 0.01292).abs() < 1e-9);
        let y = evaluate(&CurveSpec::ShadowLift, 1.0);
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_soft_contrast_segments() {
        let y = evaluate(&CurveSpec::SoftContrast, 0.01);
        assert!((y - 0.045).abs() < 1e-12);
        let y = evaluate(&CurveSpec::SoftContrast, 1.0);
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        assert_eq!(evaluate(&CurveSpec::Power(2.2), -1.0), 0.0);
        assert_eq!(evaluate(&CurveSpec::Power(2.2), 3.0), 1.0);
        assert_eq!(evaluate(&CurveSpec::Linear, f64::NAN), 0.0);
    }

    #[test]
    fn test_custom_exact_points() {
        let c = CurveSpec::Custom(custom(&[(0.0, 0.0), (0.5, 0.7), (1.0, 1.0)]));
        assert_eq!(evaluate(&c, 0.0), 0.0);
        assert_eq!(evaluate(&c, 0.5), 0.7);
        assert_eq!(evaluate(&c, 1.0), 1.0);
    }

    #[test]
    fn test_custom_interpolates() {
        let c = CurveSpec::Custom(custom(&[(0.0, 0.0), (0.5, 0.7), (1.0, 1.0)]));
        assert!((evaluate(&c, 0.25) - 0.35).abs() < 1e-12);
        assert!((evaluate(&c, 0.75) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_custom_holds_ends() {
        let c = CurveSpec::Custom(custom(&[(0.2, 0.3), (0.8, 0.9)]));
        assert_eq!(evaluate(&c, 0.0), 0.3);
        assert_eq!(evaluate(&c, 0.1), 0.3);
        assert_eq!(evaluate(&c, 0.95), 0.9);
    }

    #[test]
    fn test_custom_validation() {
        assert_eq!(
            CustomCurve::new(vec![ControlPoint::new(0.0, 0.0)]),
            Err(CurveError::TooFewPoints(1))
        );
        assert!(matches!(
            CustomCurve::new(vec![ControlPoint::new(0.0, 0.0), ControlPoint::new(1.2, 1.0)]),
            Err(CurveError::OutOfRange { index: 1, .. })
        ));
        assert_eq!(
            CustomCurve::new(vec![ControlPoint::new(0.6, 0.0), ControlPoint::new(0.4, 1.0)]),
            Err(CurveError::Unsorted(1))
        );
    }

    #[test]
    fn test_from_tone() {
        assert_eq!(CurveSpec::from_tone(ToneCurve::Power, 20.0, None), CurveSpec::Power(9.0));
        assert_eq!(CurveSpec::from_tone(ToneCurve::Custom, 1.0, None), CurveSpec::Linear);
        assert_eq!(
            CurveSpec::from_tone(ToneCurve::Cinema, 1.0, None).tone(),
            ToneCurve::Cinema
        );
    }
}
