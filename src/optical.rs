use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::analysis::aggregate::PopulationTable;
use crate::error::{AnalysisError, AnalysisResult};

/// Column holding the object name in the optical table.
pub const NAME_COLUMN: &str = "SN_name";

pub const ABS_MAG_B: &str = "AbsMagB";
pub const FIRST_MAX_PHASE: &str = "firstMaxPhase";
pub const FIRST_MAX_MAG: &str = "firstMaxMag";
pub const SECOND_MAX_PHASE: &str = "secondMaxPhase";
pub const SECOND_MAX_MAG: &str = "secondMaxMag";
pub const MAG_DIFFERENCE: &str = "SecondMaxMag - FirstMaxMag";

/// `(x, y)` column pairs regressed by [`standard_comparisons`]: every NIR
/// peak quantity against every optical fit parameter, then stretch against
/// second-maximum phase.
pub const STANDARD_COMPARISONS: [(&str, &str); 9] = [
    (MAG_DIFFERENCE, ABS_MAG_B),
    (SECOND_MAX_PHASE, ABS_MAG_B),
    (MAG_DIFFERENCE, "x0"),
    (SECOND_MAX_PHASE, "x0"),
    (MAG_DIFFERENCE, "x1"),
    (SECOND_MAX_PHASE, "x1"),
    (MAG_DIFFERENCE, "c"),
    (SECOND_MAX_PHASE, "c"),
    ("x1", SECOND_MAX_PHASE),
];

// ---------------------------------------------------------------------------
// OpticalTable – fitted optical parameters per object
// ---------------------------------------------------------------------------

/// Optical light-curve fit parameters, one row per object.
#[derive(Debug, Clone, Default)]
pub struct OpticalTable {
    columns: Vec<String>,
    rows: BTreeMap<String, Vec<f64>>,
}

impl OpticalTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read optical table {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Whitespace-delimited text; the first non-comment row names the
    /// columns. Cells that are not numbers become NaN.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.split('#').next().unwrap_or("").trim()))
            .filter(|(_, l)| !l.is_empty());

        let Some((_, header)) = lines.next() else {
            bail!("Optical table is empty");
        };
        let names: Vec<&str> = header.split_whitespace().collect();
        let Some(name_idx) = names.iter().position(|&c| c == NAME_COLUMN) else {
            bail!("Optical table has no '{NAME_COLUMN}' column");
        };
        let columns: Vec<String> = names
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != name_idx)
            .map(|(_, c)| c.to_string())
            .collect();

        let mut rows = BTreeMap::new();
        for (line_no, line) in lines {
            let cells: Vec<&str> = line.split_whitespace().collect();
            if cells.len() != names.len() {
                bail!(
                    "line {line_no}: expected {} cells, found {}",
                    names.len(),
                    cells.len()
                );
            }
            let name = cells[name_idx].to_string();
            let values: Vec<f64> = cells
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != name_idx)
                .map(|(_, c)| c.parse().unwrap_or(f64::NAN))
                .collect();
            if rows.contains_key(&name) {
                log::warn!("{name}: repeated in optical table, keeping the first row");
                continue;
            }
            rows.insert(name, values);
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|k| k.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rows.contains_key(name)
    }

    pub fn get(&self, name: &str, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(name).map(|row| row[idx])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ComparisonFrame – NIR peaks joined with optical parameters
// ---------------------------------------------------------------------------

/// Objects present in both the NIR population and the optical table, with
/// NIR peak columns and optical columns side by side. Missing values are NaN.
#[derive(Debug, Clone, Default)]
pub struct ComparisonFrame {
    ids: Vec<String>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl ComparisonFrame {
    pub fn join(table: &PopulationTable, optical: &OpticalTable) -> Self {
        let mut frame = Self::default();
        let mut missing = 0usize;

        for row in table.rows() {
            if !optical.contains(&row.id) {
                missing += 1;
                continue;
            }
            let first = row.peaks.first_max();
            let second = row.peaks.second_max();
            let mut push = |column: &str, value: Option<f64>| {
                frame
                    .columns
                    .entry(column.to_string())
                    .or_default()
                    .push(value.unwrap_or(f64::NAN));
            };
            push(FIRST_MAX_PHASE, first.map(|p| p.phase));
            push(FIRST_MAX_MAG, first.map(|p| p.magnitude));
            push(SECOND_MAX_PHASE, second.map(|p| p.phase));
            push(SECOND_MAX_MAG, second.map(|p| p.magnitude));
            push(MAG_DIFFERENCE, row.peaks.second_minus_first_magnitude());

            for column in optical.columns() {
                push(column, optical.get(&row.id, column));
            }
            let mu = optical
                .get(&row.id, "mu_Snoopy")
                .or_else(|| row.header.require_f64("mu_Snoopy").ok());
            let abs_mag = match (optical.get(&row.id, "mB"), mu) {
                (Some(mb), Some(mu)) => Some(mb - mu),
                _ => None,
            };
            push(ABS_MAG_B, abs_mag);

            frame.ids.push(row.id.clone());
        }

        if missing > 0 {
            log::warn!("{missing} NIR objects have no optical parameters");
        }
        log::info!("{} objects with both NIR peaks and optical parameters", frame.len());
        frame
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|c| c.as_slice())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Regress column `y` on column `x`.
    pub fn regress(&self, x: &str, y: &str) -> AnalysisResult<Regression> {
        let xs = self
            .column(x)
            .ok_or_else(|| AnalysisError::invalid("x", format!("no column '{x}'")))?;
        let ys = self
            .column(y)
            .ok_or_else(|| AnalysisError::invalid("y", format!("no column '{y}'")))?;
        linregress(xs, ys)
    }
}

// ---------------------------------------------------------------------------
// Linear regression
// ---------------------------------------------------------------------------

/// Ordinary least squares fit of `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    /// Two-sided p-value for a zero slope.
    pub p_value: f64,
    /// Standard error of the slope.
    pub std_err: f64,
    pub n: usize,
}

impl fmt::Display for Regression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slope {:.4}, intercept {:.4}, r {:.4}, p {:.4}, n {}",
            self.slope, self.intercept, self.r_value, self.p_value, self.n
        )
    }
}

/// Least squares over pairs where neither value is NaN.
pub fn linregress(x: &[f64], y: &[f64]) -> AnalysisResult<Regression> {
    if x.len() != y.len() {
        return Err(AnalysisError::invalid(
            "regression",
            format!("{} x values but {} y values", x.len(), y.len()),
        ));
    }
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .unzip();
    let n = xs.len();
    if n < 3 {
        return Err(AnalysisError::InsufficientData {
            required: 3,
            actual: n,
        });
    }

    let nf = n as f64;
    let x_mean = xs.iter().sum::<f64>() / nf;
    let y_mean = ys.iter().sum::<f64>() / nf;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&a, &b) in xs.iter().zip(&ys) {
        let (dx, dy) = (a - x_mean, b - y_mean);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return Err(AnalysisError::invalid("x", "all x values are identical"));
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let r = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    let df = nf - 2.0;
    let one_minus_r2 = (1.0 - r) * (1.0 + r);
    let std_err = (one_minus_r2 * syy / sxx / df).sqrt();
    let p_value = if one_minus_r2 <= 0.0 {
        0.0
    } else {
        let t = r * (df / one_minus_r2).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| AnalysisError::invalid("regression", e.to_string()))?;
        2.0 * dist.sf(t.abs())
    };

    Ok(Regression {
        slope,
        intercept,
        r_value: r,
        p_value,
        std_err,
        n,
    })
}

/// One named regression of the standard set.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub x: &'static str,
    pub y: &'static str,
    pub result: AnalysisResult<Regression>,
}

/// Run every pair in [`STANDARD_COMPARISONS`]. A pair that cannot be fitted
/// keeps its error and the rest still run.
pub fn standard_comparisons(frame: &ComparisonFrame) -> Vec<Comparison> {
    STANDARD_COMPARISONS
        .iter()
        .map(|&(x, y)| {
            let result = frame.regress(x, y);
            if let Err(err) = &result {
                log::warn!("{y} vs {x}: {err}");
            }
            Comparison { x, y, result }
        })
        .collect()
}
