/// Data layer: photometry types, loading, and header selection.
///
/// Architecture:
/// ```text
///  band directory (.txt / .dat / .csv)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse header block + photometry table → LightCurve
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ LightCurveSet │  Vec<LightCurve>, header key index
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  header predicates / id selection → indices
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
