use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use super::classify::{classify_peaks, LabelledPeaks};
use super::peaks::extract_peaks;
use super::resample::{resample, BinnedCurve};
use crate::config::PipelineConfig;
use crate::data::model::{LightCurve, ObjectHeader};
use crate::error::{AnalysisError, AnalysisResult};

// ---------------------------------------------------------------------------
// Per-object pipeline
// ---------------------------------------------------------------------------

/// Everything derived from one object: one row of the population table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectAnalysis {
    pub id: String,
    pub header: ObjectHeader,
    /// Observations in the source file, before de-duplication.
    pub n_samples: usize,
    pub peaks: LabelledPeaks,
    pub curve: BinnedCurve,
}

/// Resample, extract and classify one object.
pub fn analyze_object(lc: &LightCurve, config: &PipelineConfig) -> AnalysisResult<ObjectAnalysis> {
    let id = lc.id();
    let curve = resample(&lc.samples, &config.resample)?;
    let candidates = extract_peaks(&curve, &config.peaks)?;
    let peaks = classify_peaks(&candidates);
    for anomaly in peaks.anomalies() {
        log::warn!("{id}: {anomaly}");
    }
    log::debug!(
        "{id}: {} samples, {} grid points covered, {} peaks",
        lc.samples.len(),
        curve.coverage(),
        peaks.len()
    );
    Ok(ObjectAnalysis {
        id,
        header: lc.header.clone(),
        n_samples: lc.samples.len(),
        peaks,
        curve,
    })
}

// ---------------------------------------------------------------------------
// PopulationTable
// ---------------------------------------------------------------------------

/// An object left out of the table and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedObject {
    pub id: String,
    pub reason: String,
}

/// Per-object results for one run, keyed by object id, all on one grid.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulationTable {
    grid: Vec<f64>,
    rows: BTreeMap<String, ObjectAnalysis>,
    skipped: Vec<SkippedObject>,
}

impl PopulationTable {
    pub fn new(grid: Vec<f64>) -> Self {
        Self {
            grid,
            ..Self::default()
        }
    }

    /// Add a row. A curve on a different grid is an error; a repeated id is
    /// skipped and `Ok(false)` returned.
    pub fn insert(&mut self, row: ObjectAnalysis) -> AnalysisResult<bool> {
        if row.curve.phase_grid() != self.grid.as_slice() {
            return Err(AnalysisError::invalid(
                "grid",
                format!("{}: curve is not on the table grid", row.id),
            ));
        }
        if self.rows.contains_key(&row.id) {
            log::warn!("{}: duplicate object id, keeping the first", row.id);
            self.skip(row.id, "duplicate object id");
            return Ok(false);
        }
        self.rows.insert(row.id.clone(), row);
        Ok(true)
    }

    pub fn skip(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedObject {
            id: id.into(),
            reason: reason.into(),
        });
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    pub fn get(&self, id: &str) -> Option<&ObjectAnalysis> {
        self.rows.get(id)
    }

    /// Rows in id order.
    pub fn rows(&self) -> impl Iterator<Item = &ObjectAnalysis> {
        self.rows.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|k| k.as_str())
    }

    pub fn skipped(&self) -> &[SkippedObject] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self) -> PopulationSummary {
        let curves: Vec<&BinnedCurve> = self.rows.values().map(|r| &r.curve).collect();
        summarize(&self.grid, &curves)
    }
}

/// Build a table from per-object outcomes. Failed objects are recorded as
/// skipped; only a curve on the wrong grid aborts.
pub fn aggregate_results<I>(grid: Vec<f64>, results: I) -> AnalysisResult<PopulationTable>
where
    I: IntoIterator<Item = (String, AnalysisResult<ObjectAnalysis>)>,
{
    let mut table = PopulationTable::new(grid);
    for (id, result) in results {
        match result {
            Ok(row) => {
                table.insert(row)?;
            }
            Err(err) => {
                log::warn!("{id}: skipped, {err}");
                table.skip(id, err.to_string());
            }
        }
    }
    Ok(table)
}

/// Run the whole pipeline over `objects`.
///
/// The configuration is validated first; an invalid one fails before any
/// object is touched. Objects are processed in parallel and merged in input
/// order.
pub fn aggregate(objects: &[LightCurve], config: &PipelineConfig) -> AnalysisResult<PopulationTable> {
    config.validate()?;
    let results: Vec<(String, AnalysisResult<ObjectAnalysis>)> = objects
        .par_iter()
        .map(|lc| (lc.id(), analyze_object(lc, config)))
        .collect();
    let table = aggregate_results(config.resample.grid.points(), results)?;
    log::info!(
        "{} of {} objects analysed, {} skipped",
        table.len(),
        objects.len(),
        table.skipped().len()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// Cross-object summary
// ---------------------------------------------------------------------------

/// Statistics of all contributing curves at one grid phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryPoint {
    pub phase: f64,
    pub mean: f64,
    /// Population standard deviation (divides by `count`).
    pub std: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulationSummary {
    pub points: Vec<SummaryPoint>,
}

impl PopulationSummary {
    pub fn mean(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.mean).collect()
    }

    pub fn std(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.std).collect()
    }
}

/// NaN-excluding mean and standard deviation at each grid point.
/// Points where no curve has a value are NaN.
pub fn summarize(grid: &[f64], curves: &[&BinnedCurve]) -> PopulationSummary {
    let points = grid
        .iter()
        .enumerate()
        .map(|(k, &phase)| {
            let values: Vec<f64> = curves
                .iter()
                .filter_map(|c| c.magnitude().get(k).copied())
                .filter(|v| !v.is_nan())
                .collect();
            let count = values.len();
            if count == 0 {
                return SummaryPoint {
                    phase,
                    mean: f64::NAN,
                    std: f64::NAN,
                    count,
                };
            }
            let n = count as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            SummaryPoint {
                phase,
                mean,
                std: var.sqrt(),
                count,
            }
        })
        .collect();
    PopulationSummary { points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classify::PeakSlot;
    use crate::config::{GridConfig, InterpKind, ResampleConfig};
    use crate::data::model::{HeaderValue, RawSample};
    use approx::assert_abs_diff_eq;

    fn light_curve(name: &str, points: &[(f64, f64)]) -> LightCurve {
        let mut header = ObjectHeader::new();
        header.insert("snName", HeaderValue::String(name.to_string()));
        let samples = points
            .iter()
            .map(|&(p, m)| RawSample::new(p, m, 0.05))
            .collect();
        LightCurve::new(header, samples)
    }

    fn double_peaked(name: &str, shift: f64) -> LightCurve {
        light_curve(
            name,
            &[
                (-8.0 + shift, -17.6),
                (-4.0 + shift, -18.0),
                (0.0 + shift, -18.3),
                (4.0 + shift, -18.0),
                (9.0 + shift, -17.4),
                (14.0 + shift, -17.0),
                (20.0 + shift, -17.3),
                (27.0 + shift, -17.6),
                (34.0 + shift, -17.2),
                (45.0 + shift, -16.4),
                (60.0 + shift, -15.6),
            ],
        )
    }

    #[test]
    fn pipeline_labels_both_maxima() {
        let lc = double_peaked("sn2006D", 0.0);
        let row = analyze_object(&lc, &PipelineConfig::default()).unwrap();
        assert_eq!(row.id, "sn2006D");
        assert_eq!(row.n_samples, 11);
        let first = row.peaks.first_max().unwrap();
        let second = row.peaks.second_max().unwrap();
        assert_eq!((first.phase, first.magnitude), (0.0, -18.3));
        assert_eq!((second.phase, second.magnitude), (27.0, -17.6));
        assert!(row.peaks.anomalies().is_empty());
    }

    #[test]
    fn cubic_pipeline_finds_the_same_maxima() {
        let lc = double_peaked("sn2006D", 0.0);
        let config = PipelineConfig {
            resample: ResampleConfig {
                interpolation: InterpKind::Cubic,
                ..ResampleConfig::default()
            },
            ..PipelineConfig::default()
        };
        let row = analyze_object(&lc, &config).unwrap();
        let near = |slot: PeakSlot, phase: f64, tol: f64| {
            row.peaks
                .candidates(slot)
                .iter()
                .any(|p| (p.phase - phase).abs() <= tol)
        };
        assert!(near(PeakSlot::FirstMax, 0.0, 2.0), "{:?}", row.peaks);
        assert!(near(PeakSlot::SecondMax, 27.0, 3.0), "{:?}", row.peaks);
    }

    #[test]
    fn sparse_objects_are_skipped_not_fatal() {
        let objects = vec![
            double_peaked("sn2006D", 0.0),
            light_curve("sn2001xx", &[(0.0, -18.0), (5.0, -18.1), (10.0, -17.5)]),
            double_peaked("sn2007af", 2.0),
        ];
        let table = aggregate(&objects, &PipelineConfig::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.ids().collect::<Vec<_>>(), vec!["sn2006D", "sn2007af"]);
        assert_eq!(table.skipped().len(), 1);
        assert_eq!(table.skipped()[0].id, "sn2001xx");
        assert!(table.skipped()[0].reason.contains("insufficient data"));
        assert!(table.get("sn2001xx").is_none());
    }

    #[test]
    fn invalid_config_fails_before_processing() {
        let config = PipelineConfig {
            resample: ResampleConfig {
                grid: GridConfig {
                    start: 100.0,
                    end: -10.0,
                    step: 1.0,
                },
                ..ResampleConfig::default()
            },
            ..PipelineConfig::default()
        };
        let result = aggregate(&[double_peaked("sn2006D", 0.0)], &config);
        assert!(matches!(result, Err(AnalysisError::InvalidParameter { .. })));
    }

    #[test]
    fn duplicate_ids_keep_first_row() {
        let objects = vec![double_peaked("sn2006D", 0.0), double_peaked("sn2006D", 3.0)];
        let table = aggregate(&objects, &PipelineConfig::default()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("sn2006D").unwrap().peaks.first_max().unwrap().phase, 0.0);
        assert_eq!(table.skipped()[0].reason, "duplicate object id");
    }

    #[test]
    fn rows_on_a_foreign_grid_are_rejected() {
        let lc = double_peaked("sn2006D", 0.0);
        let row = analyze_object(&lc, &PipelineConfig::default()).unwrap();
        let result = aggregate_results(vec![0.0, 1.0, 2.0], vec![(row.id.clone(), Ok(row))]);
        assert!(result.is_err());
    }

    #[test]
    fn summary_excludes_nan() {
        let grid = vec![0.0, 1.0, 2.0];
        let a = BinnedCurve::new(grid.clone(), vec![f64::NAN, 2.0, f64::NAN]).unwrap();
        let b = BinnedCurve::new(grid.clone(), vec![3.0, 4.0, f64::NAN]).unwrap();
        let summary = summarize(&grid, &[&a, &b]);

        assert_eq!(summary.points[0].mean, 3.0);
        assert_eq!(summary.points[0].std, 0.0);
        assert_eq!(summary.points[0].count, 1);

        assert_eq!(summary.points[1].mean, 3.0);
        assert_abs_diff_eq!(summary.points[1].std, 1.0, epsilon = 1e-12);
        assert_eq!(summary.points[1].count, 2);

        assert!(summary.points[2].mean.is_nan());
        assert!(summary.points[2].std.is_nan());
        assert_eq!(summary.points[2].count, 0);
    }

    #[test]
    fn summary_is_order_independent() {
        let objects = vec![
            double_peaked("a", 0.0),
            double_peaked("b", 1.5),
            double_peaked("c", -2.0),
        ];
        let mut reversed = objects.clone();
        reversed.reverse();
        let config = PipelineConfig::default();
        let s1 = aggregate(&objects, &config).unwrap().summary();
        let s2 = aggregate(&reversed, &config).unwrap().summary();
        for (p, q) in s1.points.iter().zip(&s2.points) {
            assert_eq!(p.count, q.count);
            if p.count > 0 {
                assert_abs_diff_eq!(p.mean, q.mean, epsilon = 1e-12);
                assert_abs_diff_eq!(p.std, q.std, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn empty_population_summary_is_all_nan() {
        let table = PopulationTable::new(GridConfig::default().points());
        let summary = table.summary();
        assert_eq!(summary.points.len(), 110);
        assert!(summary.mean().iter().all(|m| m.is_nan()));
    }
}
