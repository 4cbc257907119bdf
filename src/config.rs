use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

// ---------------------------------------------------------------------------
// Interpolation kind
// ---------------------------------------------------------------------------

/// Interpolation used to carry irregular samples onto the phase grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpKind {
    /// Piecewise linear between neighbouring samples.
    #[default]
    Linear,
    /// First-order spline. Evaluates identically to `Linear`.
    Slinear,
    /// Not-a-knot cubic spline.
    Cubic,
}

impl InterpKind {
    /// Fewest distinct samples the interpolant can be built from.
    pub fn min_points(self) -> usize {
        match self {
            InterpKind::Linear | InterpKind::Slinear => 2,
            InterpKind::Cubic => 4,
        }
    }
}

impl fmt::Display for InterpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpKind::Linear => "linear",
            InterpKind::Slinear => "slinear",
            InterpKind::Cubic => "cubic",
        };
        write!(f, "{name}")
    }
}

impl FromStr for InterpKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(InterpKind::Linear),
            "slinear" => Ok(InterpKind::Slinear),
            "cubic" => Ok(InterpKind::Cubic),
            other => Err(AnalysisError::invalid(
                "interpolation",
                format!("unknown kind '{other}' (expected linear, slinear or cubic)"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase grid
// ---------------------------------------------------------------------------

/// Largest grid `GridConfig::validate` accepts.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Uniform phase grid `start, start + step, ...` up to but excluding `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            start: -10.0,
            end: 100.0,
            step: 1.0,
        }
    }
}

impl GridConfig {
    /// Number of grid points. Zero for a grid that does not validate.
    pub fn len(&self) -> usize {
        if self.validate().is_err() {
            return 0;
        }
        ((self.end - self.start) / self.step).ceil() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid phases. Each point is computed from its index, never accumulated.
    pub fn points(&self) -> Vec<f64> {
        (0..self.len())
            .map(|k| self.start + k as f64 * self.step)
            .collect()
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.start.is_finite() && self.end.is_finite() && self.step.is_finite()) {
            return Err(AnalysisError::invalid(
                "grid",
                "start, end and step must be finite",
            ));
        }
        if self.step <= 0.0 {
            return Err(AnalysisError::invalid(
                "grid.step",
                format!("must be positive, got {}", self.step),
            ));
        }
        if self.end <= self.start {
            return Err(AnalysisError::invalid(
                "grid",
                format!(
                    "end ({}) must be greater than start ({})",
                    self.end, self.start
                ),
            ));
        }
        let count = ((self.end - self.start) / self.step).ceil();
        // Peak detection needs at least one interior point.
        if count < 3.0 {
            return Err(AnalysisError::invalid(
                "grid",
                "must contain at least 3 points",
            ));
        }
        if count > MAX_GRID_POINTS as f64 {
            return Err(AnalysisError::invalid(
                "grid",
                format!("{count} points exceeds the limit of {MAX_GRID_POINTS}"),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Phase window
// ---------------------------------------------------------------------------

/// Open phase interval `(lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct PhaseWindow {
    pub lo: f64,
    pub hi: f64,
}

impl PhaseWindow {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Strict membership: the bounds themselves are outside.
    pub fn contains(&self, phase: f64) -> bool {
        self.lo < phase && phase < self.hi
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.lo.is_finite() && self.hi.is_finite()) || self.lo >= self.hi {
            return Err(AnalysisError::invalid(
                "peak_window",
                format!("({}, {}) is not an increasing finite interval", self.lo, self.hi),
            ));
        }
        Ok(())
    }
}

impl From<(f64, f64)> for PhaseWindow {
    fn from((lo, hi): (f64, f64)) -> Self {
        Self { lo, hi }
    }
}

impl From<PhaseWindow> for (f64, f64) {
    fn from(w: PhaseWindow) -> Self {
        (w.lo, w.hi)
    }
}

impl fmt::Display for PhaseWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lo, self.hi)
    }
}

/// Parses `"lo,hi"`, e.g. `-8,45`.
impl FromStr for PhaseWindow {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lo, hi) = s
            .split_once(',')
            .ok_or_else(|| AnalysisError::invalid("peak_window", format!("'{s}' is not 'lo,hi'")))?;
        let parse = |tok: &str| {
            tok.trim().parse::<f64>().map_err(|_| {
                AnalysisError::invalid("peak_window", format!("'{tok}' is not a number"))
            })
        };
        let window = PhaseWindow::new(parse(lo)?, parse(hi)?);
        window.validate()?;
        Ok(window)
    }
}

// ---------------------------------------------------------------------------
// Stage configs
// ---------------------------------------------------------------------------

/// Settings for the curve resampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResampleConfig {
    pub grid: GridConfig,
    pub interpolation: InterpKind,
    /// Fewest distinct phases an object needs to be resampled.
    pub min_samples: usize,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            interpolation: InterpKind::default(),
            min_samples: 4,
        }
    }
}

impl ResampleConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        self.grid.validate()?;
        let floor = self.interpolation.min_points();
        if self.min_samples < floor {
            return Err(AnalysisError::invalid(
                "min_samples",
                format!(
                    "{} interpolation needs at least {floor} samples, got {}",
                    self.interpolation, self.min_samples
                ),
            ));
        }
        Ok(())
    }
}

/// Settings for the peak extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeakConfig {
    /// Minimum distance in days between a kept peak and any trough.
    pub min_separation: f64,
    /// Peaks outside this window are dropped as non-physical.
    pub phase_window: Option<PhaseWindow>,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            min_separation: 4.0,
            phase_window: None,
        }
    }
}

impl PeakConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if !self.min_separation.is_finite() || self.min_separation <= 0.0 {
            return Err(AnalysisError::invalid(
                "min_separation",
                format!("must be positive, got {}", self.min_separation),
            ));
        }
        if let Some(window) = &self.phase_window {
            window.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Whole-run config
// ---------------------------------------------------------------------------

/// Configuration shared by every object in a run.
///
/// Loaded from JSON; missing sections and fields fall back to defaults:
///
/// ```json
/// {
///   "resample": { "grid": { "start": -10, "end": 100, "step": 1 },
///                 "interpolation": "cubic", "min_samples": 4 },
///   "peaks": { "min_separation": 4, "phase_window": [-8, 45] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub resample: ResampleConfig,
    pub peaks: PeakConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        self.resample.validate()?;
        self.peaks.validate()
    }

    /// Read and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_matches_half_open_range() {
        let grid = GridConfig::default();
        let points = grid.points();
        assert_eq!(points.len(), 110);
        assert_eq!(points[0], -10.0);
        assert_eq!(*points.last().unwrap(), 99.0);
    }

    #[test]
    fn fractional_step_grid() {
        let grid = GridConfig {
            start: 0.0,
            end: 2.0,
            step: 0.5,
        };
        assert_eq!(grid.points(), vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn rejects_reversed_grid() {
        let grid = GridConfig {
            start: 10.0,
            end: -10.0,
            step: 1.0,
        };
        assert!(matches!(
            grid.validate(),
            Err(AnalysisError::InvalidParameter { .. })
        ));
        assert!(grid.is_empty());
    }

    #[test]
    fn rejects_grids_too_fine_to_allocate() {
        for step in [1e-18, 1e-9, 1e-4] {
            let grid = GridConfig {
                step,
                ..GridConfig::default()
            };
            assert!(
                matches!(grid.validate(), Err(AnalysisError::InvalidParameter { .. })),
                "step {step} accepted"
            );
            assert!(grid.points().is_empty());
        }
        let finest = GridConfig {
            start: 0.0,
            end: MAX_GRID_POINTS as f64,
            step: 1.0,
        };
        assert!(finest.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_step() {
        for step in [0.0, -1.0, f64::NAN] {
            let grid = GridConfig {
                step,
                ..GridConfig::default()
            };
            assert!(grid.validate().is_err(), "step {step} accepted");
        }
    }

    #[test]
    fn rejects_non_positive_separation() {
        let peaks = PeakConfig {
            min_separation: 0.0,
            ..PeakConfig::default()
        };
        assert!(peaks.validate().is_err());
    }

    #[test]
    fn cubic_needs_four_samples() {
        let config = ResampleConfig {
            interpolation: InterpKind::Cubic,
            min_samples: 3,
            ..ResampleConfig::default()
        };
        assert!(config.validate().is_err());
        let config = ResampleConfig {
            min_samples: 4,
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_phase_window() {
        let w: PhaseWindow = "-8, 45".parse().unwrap();
        assert_eq!(w, PhaseWindow::new(-8.0, 45.0));
        assert!(w.contains(0.0));
        assert!(!w.contains(-8.0));
        assert!(!w.contains(45.0));
        assert!("45,-8".parse::<PhaseWindow>().is_err());
        assert!("oops".parse::<PhaseWindow>().is_err());
    }

    #[test]
    fn interp_kind_round_trips_through_text() {
        for kind in [InterpKind::Linear, InterpKind::Slinear, InterpKind::Cubic] {
            assert_eq!(kind.to_string().parse::<InterpKind>().unwrap(), kind);
        }
        assert!("quadratic".parse::<InterpKind>().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "resample": { "interpolation": "cubic" }, "peaks": { "phase_window": [-8, 45] } }"#,
        )
        .unwrap();
        assert_eq!(config.resample.interpolation, InterpKind::Cubic);
        assert_eq!(config.resample.grid, GridConfig::default());
        assert_eq!(config.resample.min_samples, 4);
        assert_eq!(config.peaks.min_separation, 4.0);
        assert_eq!(config.peaks.phase_window, Some(PhaseWindow::new(-8.0, 45.0)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_json_field_is_rejected() {
        let parsed: Result<PipelineConfig, _> =
            serde_json::from_str(r#"{ "peaks": { "separation": 4 } }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn config_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "peaks": { "min_separation": -1 } }"#).unwrap();
        assert!(PipelineConfig::from_json_file(&path).is_err());

        std::fs::write(&path, r#"{ "resample": { "grid": { "step": 4 } } }"#).unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.resample.grid.len(), 28);
    }
}
