use std::path::Path;

use anyhow::{bail, Context, Result};

use super::model::{HeaderValue, LightCurve, LightCurveSet, ObjectHeader, RawSample, NAME_KEY};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Names of the photometry columns to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotometryColumns {
    pub phase: String,
    pub magnitude: String,
    pub magnitude_error: String,
}

impl Default for PhotometryColumns {
    fn default() -> Self {
        Self {
            phase: "Phase(T_Bmax)".to_string(),
            magnitude: "Abs mag".to_string(),
            magnitude_error: "Error Abs mag".to_string(),
        }
    }
}

/// Load one light curve. Dispatch by extension.
///
/// Supported formats:
/// * `.txt` / `.dat` – photometry table under a metadata header block
/// * `.csv`          – columns `phase`, `magnitude`, `magnitude_error`
pub fn load_file(path: &Path, columns: &PhotometryColumns) -> Result<LightCurve> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut lc = match ext.as_str() {
        "txt" | "dat" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            parse_photometry(&text, columns)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        "csv" => load_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    lc.source = Some(path.to_path_buf());
    Ok(lc)
}

/// Whether `load_file` knows how to read this path.
pub fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("txt" | "dat" | "csv")
    )
}

/// Load every supported file in a band directory, in file-name order.
pub fn load_band_dir(dir: &Path, columns: &PhotometryColumns) -> Result<LightCurveSet> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("listing {}", dir.display()))?
            .path();
        if path.is_file() && is_supported(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let curves = paths
        .iter()
        .map(|p| load_file(p, columns))
        .collect::<Result<Vec<_>>>()?;
    log::info!("loaded {} light curves from {}", curves.len(), dir.display());
    Ok(LightCurveSet::from_curves(curves))
}

// ---------------------------------------------------------------------------
// Photometry text format
// ---------------------------------------------------------------------------

/// Expected layout:
///
/// ```text
/// # sn2006D  K band
/// 0.0085 0.0097 # (zhelio, zcmb)
/// 32.91 0.05 33.02 # (mu_Snoopy, err_mu_Snoopy, mu_LCDM)
/// #
/// # Phase(T_Bmax) | App mag | Error App mag | Abs mag | Error Abs mag
/// -4.81  15.01  0.03  -17.90  0.06
/// ...
/// ```
///
/// The second token of the first line is the object name. Non-comment lines
/// above the column header pair whitespace-separated values with the
/// parenthesised key list after ` # `. The column header is the first comment
/// line containing `|`. Below it, blank lines and `#` comments are skipped and
/// each row maps one token to one column.
pub fn parse_photometry(text: &str, columns: &PhotometryColumns) -> Result<LightCurve> {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.first().context("empty photometry file")?;

    let mut header = ObjectHeader::new();
    if let Some(name) = first.split_whitespace().nth(1) {
        header.insert(NAME_KEY, HeaderValue::String(name.to_string()));
    }

    let header_idx = lines
        .iter()
        .position(|l| l.starts_with('#') && l.contains('|'))
        .context("no column header line ('# a | b | ...')")?;

    for (line_no, line) in lines[..header_idx].iter().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        parse_header_line(line, &mut header)
            .with_context(|| format!("header line {}", line_no + 1))?;
    }

    let column_names: Vec<String> = lines[header_idx]
        .split('|')
        .map(|c| c.trim().trim_matches('#').trim().to_string())
        .collect();
    let position = |name: &str| {
        column_names
            .iter()
            .position(|c| c == name)
            .with_context(|| format!("missing '{name}' column (have {column_names:?})"))
    };
    let phase_idx = position(&columns.phase)?;
    let mag_idx = position(&columns.magnitude)?;
    let err_idx = position(&columns.magnitude_error)?;

    let mut samples = Vec::new();
    for (offset, raw) in lines[header_idx + 1..].iter().enumerate() {
        let line_no = header_idx + offset + 2;
        let line = match raw.split_once('#') {
            Some((before, _)) => before,
            None => raw,
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let cell = |idx: usize, name: &str| -> Result<f64> {
            let tok = tokens
                .get(idx)
                .with_context(|| format!("line {line_no}: no value for '{name}'"))?;
            tok.parse::<f64>()
                .with_context(|| format!("line {line_no}, {name}: '{tok}' is not a number"))
        };
        samples.push(RawSample {
            phase: cell(phase_idx, &columns.phase)?,
            magnitude: cell(mag_idx, &columns.magnitude)?,
            magnitude_error: cell(err_idx, &columns.magnitude_error)?,
        });
    }

    Ok(LightCurve::new(header, samples))
}

/// `v1 v2 ... # (k1, k2, ...)`
fn parse_header_line(line: &str, header: &mut ObjectHeader) -> Result<()> {
    let (values, keys) = line
        .split_once(" # ")
        .with_context(|| format!("expected 'values # (keys)', got '{line}'"))?;
    let keys = keys.trim();
    let keys = keys.strip_prefix('(').unwrap_or(keys);
    let keys = match keys.rfind(')') {
        Some(end) => &keys[..end],
        None => keys,
    };
    let keys: Vec<&str> = keys.split(',').map(str::trim).collect();
    let values: Vec<&str> = values.split_whitespace().collect();
    if values.len() < keys.len() {
        bail!("{} keys but only {} values", keys.len(), values.len());
    }
    for (key, value) in keys.iter().zip(&values) {
        header.insert(*key, HeaderValue::guess(value));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with `phase`, `magnitude` and `magnitude_error`
/// columns. Other columns are ignored. The object is named after the file.
fn load_csv(path: &Path) -> Result<LightCurve> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening CSV {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))
    };
    let phase_idx = position("phase")?;
    let mag_idx = position("magnitude")?;
    let err_idx = position("magnitude_error")?;

    let mut samples = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let cell = |idx: usize, name: &str| -> Result<f64> {
            let tok = record.get(idx).unwrap_or("").trim();
            tok.parse::<f64>()
                .with_context(|| format!("CSV row {row_no}, {name}: '{tok}' is not a number"))
        };
        samples.push(RawSample {
            phase: cell(phase_idx, "phase")?,
            magnitude: cell(mag_idx, "magnitude")?,
            magnitude_error: cell(err_idx, "magnitude_error")?,
        });
    }

    Ok(LightCurve::new(ObjectHeader::new(), samples))
}
