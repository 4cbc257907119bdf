use serde::Serialize;

use super::interp::Interpolant;
use crate::config::ResampleConfig;
use crate::data::model::RawSample;
use crate::error::{AnalysisError, AnalysisResult};

/// A light curve carried onto the uniform phase grid.
///
/// `magnitude[i]` is NaN wherever `phase_grid[i]` lies outside the observed
/// phase span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinnedCurve {
    phase_grid: Vec<f64>,
    magnitude: Vec<f64>,
}

impl BinnedCurve {
    pub fn new(phase_grid: Vec<f64>, magnitude: Vec<f64>) -> AnalysisResult<Self> {
        if phase_grid.len() != magnitude.len() {
            return Err(AnalysisError::invalid(
                "curve",
                format!(
                    "{} grid points but {} magnitudes",
                    phase_grid.len(),
                    magnitude.len()
                ),
            ));
        }
        Ok(Self {
            phase_grid,
            magnitude,
        })
    }

    pub fn phase_grid(&self) -> &[f64] {
        &self.phase_grid
    }

    pub fn magnitude(&self) -> &[f64] {
        &self.magnitude
    }

    pub fn len(&self) -> usize {
        self.phase_grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phase_grid.is_empty()
    }

    /// Grid points that carry a value.
    pub fn coverage(&self) -> usize {
        self.magnitude.iter().filter(|m| !m.is_nan()).count()
    }
}

/// Collapse repeated phases, keeping the first sample seen for each phase,
/// and return `(phases, magnitudes)` sorted by phase.
///
/// Non-finite samples cannot be interpolated and are dropped.
pub fn distinct_phases(samples: &[RawSample]) -> (Vec<f64>, Vec<f64>) {
    let mut finite: Vec<&RawSample> = samples
        .iter()
        .filter(|s| s.phase.is_finite() && s.magnitude.is_finite())
        .collect();
    if finite.len() < samples.len() {
        log::debug!(
            "dropped {} non-finite samples",
            samples.len() - finite.len()
        );
    }
    // Stable: equal phases keep arrival order, so dedup keeps the first seen.
    finite.sort_by(|a, b| a.phase.total_cmp(&b.phase));
    finite.dedup_by(|later, earlier| later.phase == earlier.phase);

    finite.iter().map(|s| (s.phase, s.magnitude)).unzip()
}

/// Interpolate `samples` onto the configured grid.
///
/// Returns `InvalidParameter` for a configuration that does not validate and
/// `InsufficientData` when fewer than `config.min_samples` distinct phases
/// remain after de-duplication.
pub fn resample(samples: &[RawSample], config: &ResampleConfig) -> AnalysisResult<BinnedCurve> {
    config.validate()?;
    let (phase, magnitude) = distinct_phases(samples);
    if phase.len() < config.min_samples {
        return Err(AnalysisError::InsufficientData {
            required: config.min_samples,
            actual: phase.len(),
        });
    }

    let interp = Interpolant::new(config.interpolation, phase, magnitude)?;
    let grid = config.grid.points();
    let values = grid.iter().map(|&g| interp.eval(g)).collect();
    BinnedCurve::new(grid, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GridConfig, InterpKind};
    use approx::assert_abs_diff_eq;

    fn samples(points: &[(f64, f64)]) -> Vec<RawSample> {
        points
            .iter()
            .map(|&(p, m)| RawSample::new(p, m, 0.05))
            .collect()
    }

    fn config(kind: InterpKind) -> ResampleConfig {
        ResampleConfig {
            interpolation: kind,
            ..ResampleConfig::default()
        }
    }

    #[test]
    fn three_distinct_phases_are_insufficient() {
        let s = samples(&[(0.0, -18.0), (5.0, -18.2), (10.0, -17.9)]);
        assert_eq!(
            resample(&s, &ResampleConfig::default()),
            Err(AnalysisError::InsufficientData {
                required: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn four_distinct_phases_resample() {
        let s = samples(&[(0.0, -18.0), (5.0, -18.2), (10.0, -17.9), (20.0, -17.5)]);
        let curve = resample(&s, &ResampleConfig::default()).unwrap();
        assert_eq!(curve.len(), 110);
        assert_eq!(curve.coverage(), 21);
    }

    #[test]
    fn duplicates_do_not_count_towards_minimum() {
        let s = samples(&[(0.0, -18.0), (5.0, -18.2), (5.0, -18.4), (10.0, -17.9)]);
        assert!(matches!(
            resample(&s, &ResampleConfig::default()),
            Err(AnalysisError::InsufficientData { actual: 3, .. })
        ));
    }

    #[test]
    fn first_seen_duplicate_wins() {
        let s = samples(&[
            (10.0, -17.0),
            (0.0, -18.0),
            (5.0, -19.0),
            (20.0, -16.0),
            (5.0, -15.0),
        ]);
        let (phase, mag) = distinct_phases(&s);
        assert_eq!(phase, vec![0.0, 5.0, 10.0, 20.0]);
        assert_eq!(mag, vec![-18.0, -19.0, -17.0, -16.0]);

        let curve = resample(&s, &ResampleConfig::default()).unwrap();
        // grid starts at -10, so phase 5 is index 15
        assert_eq!(curve.magnitude()[15], -19.0);
    }

    #[test]
    fn grid_outside_observed_span_is_nan() {
        let s = samples(&[(-3.5, -18.0), (4.0, -18.6), (12.0, -17.9), (30.25, -17.2)]);
        for kind in [InterpKind::Linear, InterpKind::Slinear, InterpKind::Cubic] {
            let curve = resample(&s, &config(kind)).unwrap();
            for (&g, &m) in curve.phase_grid().iter().zip(curve.magnitude()) {
                if g < -3.5 || g > 30.25 {
                    assert!(m.is_nan(), "{kind}: value at {g}");
                } else {
                    assert!(m.is_finite(), "{kind}: NaN at {g}");
                }
            }
        }
    }

    #[test]
    fn resampling_is_deterministic() {
        let s = samples(&[
            (12.0, -17.9),
            (-3.5, -18.0),
            (4.0, -18.6),
            (30.25, -17.2),
            (18.0, -17.6),
            (4.0, -18.1),
        ]);
        for kind in [InterpKind::Linear, InterpKind::Cubic] {
            let a = resample(&s, &config(kind)).unwrap();
            let b = resample(&s, &config(kind)).unwrap();
            let bits = |c: &BinnedCurve| c.magnitude().iter().map(|m| m.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(&a), bits(&b));
        }
    }

    #[test]
    fn linear_values_between_samples() {
        let s = samples(&[(0.0, -18.0), (4.0, -17.0), (8.0, -18.0), (12.0, -16.0)]);
        let cfg = ResampleConfig {
            grid: GridConfig {
                start: 0.0,
                end: 13.0,
                step: 1.0,
            },
            ..ResampleConfig::default()
        };
        let curve = resample(&s, &cfg).unwrap();
        assert_abs_diff_eq!(curve.magnitude()[2], -17.5, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.magnitude()[10], -17.0, epsilon = 1e-12);
        assert_eq!(curve.magnitude()[12], -16.0);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let s = samples(&[
            (0.0, -18.0),
            (f64::NAN, -18.5),
            (4.0, f64::NAN),
            (5.0, -18.2),
            (10.0, -17.9),
        ]);
        assert!(matches!(
            resample(&s, &ResampleConfig::default()),
            Err(AnalysisError::InsufficientData { actual: 3, .. })
        ));
    }

    #[test]
    fn invalid_config_is_rejected_before_resampling() {
        let s = samples(&[(0.0, -18.0), (5.0, -18.2), (10.0, -17.9), (20.0, -17.5)]);
        let reversed = ResampleConfig {
            grid: GridConfig {
                start: 100.0,
                end: -10.0,
                step: 1.0,
            },
            ..ResampleConfig::default()
        };
        assert!(matches!(
            resample(&s, &reversed),
            Err(AnalysisError::InvalidParameter { .. })
        ));

        let cubic_with_three = ResampleConfig {
            interpolation: InterpKind::Cubic,
            min_samples: 3,
            ..ResampleConfig::default()
        };
        assert!(matches!(
            resample(&s, &cubic_with_three),
            Err(AnalysisError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn curve_rejects_mismatched_lengths() {
        assert!(BinnedCurve::new(vec![0.0, 1.0], vec![1.0]).is_err());
    }
}
