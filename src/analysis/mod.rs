/// Analysis core: from raw photometry to labelled peaks and population
/// statistics.
///
/// Pipeline:
/// ```text
///   Vec<RawSample>
///        │
///        ▼
///   ┌──────────┐
///   │ resample  │  de-duplicate, interpolate onto the phase grid → BinnedCurve
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  peaks    │  local minima of magnitude, trough suppression → PeakCandidate
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ classify  │  firstMax / secondMax / other → LabelledPeaks
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ aggregate │  parallel over objects → PopulationTable, PopulationSummary
///   └──────────┘
/// ```

pub mod aggregate;
pub mod classify;
pub mod interp;
pub mod peaks;
pub mod resample;
