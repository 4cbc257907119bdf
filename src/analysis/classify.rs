use std::fmt;

use serde::Serialize;

use super::peaks::PeakCandidate;
use crate::config::PhaseWindow;

/// Named slot a brightness peak is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PeakSlot {
    FirstMax,
    SecondMax,
    Other,
}

impl PeakSlot {
    pub const FIRST_MAX_WINDOW: PhaseWindow = PhaseWindow::new(-15.0, 8.0);
    pub const SECOND_MAX_WINDOW: PhaseWindow = PhaseWindow::new(15.0, 40.0);

    /// Slot for a peak at `phase`. Window bounds are exclusive.
    pub fn for_phase(phase: f64) -> Self {
        if Self::FIRST_MAX_WINDOW.contains(phase) {
            PeakSlot::FirstMax
        } else if Self::SECOND_MAX_WINDOW.contains(phase) {
            PeakSlot::SecondMax
        } else {
            PeakSlot::Other
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PeakSlot::FirstMax => "firstMax",
            PeakSlot::SecondMax => "secondMax",
            PeakSlot::Other => "other",
        }
    }
}

impl fmt::Display for PeakSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Something about an object's peaks a caller should look at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PeakAnomaly {
    /// More than one candidate landed in a slot that holds a single peak.
    MultiplePeaksInSlot { slot: PeakSlot, count: usize },
}

impl fmt::Display for PeakAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeakAnomaly::MultiplePeaksInSlot { slot, count } => {
                write!(f, "{count} peaks in {slot}")
            }
        }
    }
}

/// Peaks of one object sorted into slots.
///
/// Ambiguous slots keep every candidate; the matching anomaly is in
/// `anomalies` and the single-peak accessors return `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelledPeaks {
    first_max: Vec<PeakCandidate>,
    second_max: Vec<PeakCandidate>,
    other: Vec<PeakCandidate>,
    anomalies: Vec<PeakAnomaly>,
}

impl LabelledPeaks {
    pub fn candidates(&self, slot: PeakSlot) -> &[PeakCandidate] {
        match slot {
            PeakSlot::FirstMax => &self.first_max,
            PeakSlot::SecondMax => &self.second_max,
            PeakSlot::Other => &self.other,
        }
    }

    /// The peak in `slot` when it holds exactly one.
    pub fn single(&self, slot: PeakSlot) -> Option<&PeakCandidate> {
        match self.candidates(slot) {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn first_max(&self) -> Option<&PeakCandidate> {
        self.single(PeakSlot::FirstMax)
    }

    pub fn second_max(&self) -> Option<&PeakCandidate> {
        self.single(PeakSlot::SecondMax)
    }

    pub fn other(&self) -> &[PeakCandidate] {
        &self.other
    }

    pub fn anomalies(&self) -> &[PeakAnomaly] {
        &self.anomalies
    }

    pub fn is_ambiguous(&self, slot: PeakSlot) -> bool {
        self.anomalies
            .iter()
            .any(|a| matches!(a, PeakAnomaly::MultiplePeaksInSlot { slot: s, .. } if *s == slot))
    }

    pub fn is_empty(&self) -> bool {
        self.first_max.is_empty() && self.second_max.is_empty() && self.other.is_empty()
    }

    pub fn len(&self) -> usize {
        self.first_max.len() + self.second_max.len() + self.other.len()
    }

    /// `secondMaxMag - firstMaxMag`, when both maxima are unambiguous.
    pub fn second_minus_first_magnitude(&self) -> Option<f64> {
        Some(self.second_max()?.magnitude - self.first_max()?.magnitude)
    }
}

/// Sort candidates into slots by phase window and flag crowded slots.
pub fn classify_peaks(candidates: &[PeakCandidate]) -> LabelledPeaks {
    let mut labelled = LabelledPeaks::default();
    for &peak in candidates {
        match PeakSlot::for_phase(peak.phase) {
            PeakSlot::FirstMax => labelled.first_max.push(peak),
            PeakSlot::SecondMax => labelled.second_max.push(peak),
            PeakSlot::Other => labelled.other.push(peak),
        }
    }
    for slot in [PeakSlot::FirstMax, PeakSlot::SecondMax] {
        let count = labelled.candidates(slot).len();
        if count > 1 {
            labelled
                .anomalies
                .push(PeakAnomaly::MultiplePeaksInSlot { slot, count });
        }
    }
    labelled
}
