//! Persisted settings
//!
//! The engine never sees this format; it only gets a `CurveSpec` built from it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glare_core::curve::{clamp_strength, ControlPoint, CustomCurve, CurveSpec, ToneCurve};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CONFIG_FILENAME: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Last applied strength, 0.1 - 9.0
    pub strength: f64,
    pub curve: ToneCurve,
    /// Custom curve points as `x:y` pairs joined by commas
    pub custom_points: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strength: 1.0,
            curve: ToneCurve::Power,
            custom_points: "0:0,1:1".to_string(),
        }
    }
}

impl Settings {
    /// `$XDG_CONFIG_HOME/glare/config.yaml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("glare").join(CONFIG_FILENAME))
    }

    /// Load from the default location. A missing file gives defaults; an
    /// unreadable or invalid one gives defaults and a warning.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("no config directory, using default settings");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "no settings file");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(path = %path.display(), "ignoring settings: {err:#}");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(settings.sanitize())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path().context("no config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let yaml = serde_yaml::to_string(self).context("failed to serialize settings")?;
        fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    fn sanitize(mut self) -> Self {
        self.strength = clamp_strength(self.strength);
        self
    }

    /// Curve described by these settings, with `strength` for power curves
    pub fn curve_spec(&self) -> Result<CurveSpec> {
        let custom = match self.curve {
            ToneCurve::Custom => Some(
                CustomCurve::new(parse_points(&self.custom_points)?)
                    .context("invalid custom curve")?,
            ),
            _ => None,
        };
        Ok(CurveSpec::from_tone(self.curve, self.strength, custom))
    }
}

/// Parse `x:y` pairs joined by commas, e.g. `0:0,0.5:0.7,1:1`
pub fn parse_points(s: &str) -> Result<Vec<ControlPoint>> {
    let mut points = Vec::new();
    for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((x, y)) = pair.split_once(':') else {
            bail!("control point {pair:?} is not of the form x:y");
        };
        let x: f64 = x
            .trim()
            .parse()
            .with_context(|| format!("bad x in control point {pair:?}"))?;
        let y: f64 = y
            .trim()
            .parse()
            .with_context(|| format!("bad y in control point {pair:?}"))?;
        points.push(ControlPoint::new(x, y));
    }
    Ok(points)
}

pub fn format_points(points: &[ControlPoint]) -> String {
    points
        .iter()
        .map(|p| format!("{}:{}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(",")
}
