use std::collections::BTreeSet;

use serde::Serialize;

use super::resample::BinnedCurve;
use crate::config::PeakConfig;
use crate::error::AnalysisResult;

/// A brightness maximum: a local minimum of magnitude on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakCandidate {
    pub phase: f64,
    pub magnitude: f64,
}

/// Interior indices strictly below both neighbours. NaN never qualifies.
pub fn local_minima(values: &[f64]) -> Vec<usize> {
    strict_extrema(values, |centre, side| centre < side)
}

/// Interior indices strictly above both neighbours. NaN never qualifies.
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    strict_extrema(values, |centre, side| centre > side)
}

fn strict_extrema(values: &[f64], beats: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    values
        .windows(3)
        .enumerate()
        .filter(|(_, w)| beats(w[1], w[0]) && beats(w[1], w[2]))
        .map(|(i, _)| i + 1)
        .collect()
}

/// Indices into `peaks` that lie too close to a trough.
///
/// Each trough discards at most one peak: the first, in phase order, with
/// `peak - separation < trough < peak + separation`. The scan always starts
/// from the first peak, so two troughs can name the same peak.
pub fn peaks_near_troughs(peaks: &[f64], troughs: &[f64], separation: f64) -> BTreeSet<usize> {
    troughs
        .iter()
        .filter_map(|&trough| {
            peaks
                .iter()
                .position(|&peak| peak - separation < trough && trough < peak + separation)
        })
        .collect()
}

/// Brightness peaks of `curve` that survive trough suppression and the
/// optional phase window, in ascending phase.
///
/// Passing `None` (no curve could be built) yields no candidates. A
/// configuration that does not validate is `InvalidParameter`.
pub fn extract_peaks<'a>(
    curve: impl Into<Option<&'a BinnedCurve>>,
    config: &PeakConfig,
) -> AnalysisResult<Vec<PeakCandidate>> {
    config.validate()?;
    let Some(curve) = curve.into() else {
        return Ok(Vec::new());
    };
    let grid = curve.phase_grid();
    let mag = curve.magnitude();

    let peaks: Vec<PeakCandidate> = local_minima(mag)
        .into_iter()
        .map(|i| PeakCandidate {
            phase: grid[i],
            magnitude: mag[i],
        })
        .collect();
    let trough_phases: Vec<f64> = local_maxima(mag).into_iter().map(|i| grid[i]).collect();
    let peak_phases: Vec<f64> = peaks.iter().map(|p| p.phase).collect();

    let discard = peaks_near_troughs(&peak_phases, &trough_phases, config.min_separation);
    if !discard.is_empty() {
        log::debug!(
            "discarding {} of {} peaks within {} days of a trough",
            discard.len(),
            peaks.len(),
            config.min_separation
        );
    }

    Ok(peaks
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !discard.contains(i))
        .map(|(_, p)| p)
        .filter(|p| {
            config
                .phase_window
                .map_or(true, |window| window.contains(p.phase))
        })
        .collect())
}
