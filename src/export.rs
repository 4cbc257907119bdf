use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Float64Builder, ListBuilder, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::analysis::aggregate::{ObjectAnalysis, PopulationSummary, PopulationTable, SkippedObject};
use crate::analysis::classify::{LabelledPeaks, PeakSlot};
use crate::data::model::ObjectHeader;
use crate::style::PlotStyle;

// ---------------------------------------------------------------------------
// Flattened rows
// ---------------------------------------------------------------------------

/// One population row flattened to scalar columns.
///
/// Slot columns are empty when the slot holds no peak or is ambiguous.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationRecord {
    pub object: String,
    pub n_samples: usize,
    pub first_max_phase: Option<f64>,
    pub first_max_mag: Option<f64>,
    pub second_max_phase: Option<f64>,
    pub second_max_mag: Option<f64>,
    /// Phases of peaks outside both slots, `;`-separated.
    pub other_phases: String,
    pub other_mags: String,
    pub anomalies: String,
    pub mu_snoopy: Option<f64>,
    pub err_mu_snoopy: Option<f64>,
    pub mu_lcdm: Option<f64>,
    pub color: String,
    pub marker: String,
}

impl PopulationRecord {
    pub fn new(row: &ObjectAnalysis, style: &PlotStyle) -> Self {
        let peaks = &row.peaks;
        let first = peaks.first_max();
        let second = peaks.second_max();
        let join = |values: Vec<String>| values.join(";");
        Self {
            object: row.id.clone(),
            n_samples: row.n_samples,
            first_max_phase: first.map(|p| p.phase),
            first_max_mag: first.map(|p| p.magnitude),
            second_max_phase: second.map(|p| p.phase),
            second_max_mag: second.map(|p| p.magnitude),
            other_phases: join(peaks.other().iter().map(|p| p.phase.to_string()).collect()),
            other_mags: join(peaks.other().iter().map(|p| p.magnitude.to_string()).collect()),
            anomalies: join(peaks.anomalies().iter().map(|a| a.to_string()).collect()),
            mu_snoopy: row.header.require_f64("mu_Snoopy").ok(),
            err_mu_snoopy: row.header.require_f64("err_mu_Snoopy").ok(),
            mu_lcdm: row.header.require_f64("mu_LCDM").ok(),
            color: style.color.clone(),
            marker: style.marker.to_string(),
        }
    }
}

/// Flatten every row of `table` in id order, drawing one style per row.
pub fn records(
    table: &PopulationTable,
    styles: &mut impl Iterator<Item = PlotStyle>,
) -> Vec<PopulationRecord> {
    table
        .rows()
        .zip(styles)
        .map(|(row, style)| PopulationRecord::new(row, &style))
        .collect()
}

// ---------------------------------------------------------------------------
// Table writers
// ---------------------------------------------------------------------------

/// Write the population table. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – flattened records
/// * `.json`    – records plus header, labelled peaks and the binned curve
/// * `.parquet` – flattened records plus a `magnitude` list column
pub fn write_table(path: &Path, table: &PopulationTable, records: &[PopulationRecord]) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => write_csv(path, records),
        "json" => write_json(path, table, records),
        "parquet" | "pq" => write_parquet(path, table, records),
        other => bail!("Unsupported output extension: .{other}"),
    }?;
    log::info!("wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

fn write_csv(path: &Path, records: &[PopulationRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for record in records {
        writer.serialize(record).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

#[derive(Serialize)]
struct JsonRow<'a> {
    #[serde(flatten)]
    record: &'a PopulationRecord,
    header: &'a ObjectHeader,
    peaks: &'a LabelledPeaks,
    magnitude: &'a [f64],
}

#[derive(Serialize)]
struct JsonExport<'a> {
    grid: &'a [f64],
    rows: Vec<JsonRow<'a>>,
    skipped: &'a [SkippedObject],
}

fn write_json(path: &Path, table: &PopulationTable, records: &[PopulationRecord]) -> Result<()> {
    let rows = records
        .iter()
        .filter_map(|record| {
            let row = table.get(&record.object)?;
            Some(JsonRow {
                record,
                header: &row.header,
                peaks: &row.peaks,
                magnitude: row.curve.magnitude(),
            })
        })
        .collect();
    let export = JsonExport {
        grid: table.grid(),
        rows,
        skipped: table.skipped(),
    };
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &export).context("writing JSON")?;
    Ok(())
}

fn write_parquet(path: &Path, table: &PopulationTable, records: &[PopulationRecord]) -> Result<()> {
    let batch = record_batch(records, Some(table))?;
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// Arrow batch of the flattened records. With a table, a `magnitude`
/// list column carries each object's binned curve (NaN stored as null).
pub fn record_batch(records: &[PopulationRecord], table: Option<&PopulationTable>) -> Result<RecordBatch> {
    let utf8 = |name: &str, f: fn(&PopulationRecord) -> &str| -> (Field, ArrayRef) {
        let values: Vec<&str> = records.iter().map(f).collect();
        (Field::new(name, DataType::Utf8, false), Arc::new(StringArray::from(values)))
    };
    let float = |name: &str, f: fn(&PopulationRecord) -> Option<f64>| -> (Field, ArrayRef) {
        let values: Vec<Option<f64>> = records.iter().map(f).collect();
        (Field::new(name, DataType::Float64, true), Arc::new(Float64Array::from(values)))
    };

    let mut columns = vec![
        utf8("object", |r| r.object.as_str()),
        (
            Field::new("nSamples", DataType::UInt64, false),
            Arc::new(UInt64Array::from(
                records.iter().map(|r| r.n_samples as u64).collect::<Vec<_>>(),
            )) as ArrayRef,
        ),
        float("firstMaxPhase", |r| r.first_max_phase),
        float("firstMaxMag", |r| r.first_max_mag),
        float("secondMaxPhase", |r| r.second_max_phase),
        float("secondMaxMag", |r| r.second_max_mag),
        utf8("otherPhases", |r| r.other_phases.as_str()),
        utf8("otherMags", |r| r.other_mags.as_str()),
        utf8("anomalies", |r| r.anomalies.as_str()),
        float("muSnoopy", |r| r.mu_snoopy),
        float("errMuSnoopy", |r| r.err_mu_snoopy),
        float("muLcdm", |r| r.mu_lcdm),
        utf8("color", |r| r.color.as_str()),
        utf8("marker", |r| r.marker.as_str()),
    ];

    if let Some(table) = table {
        let mut builder = ListBuilder::new(Float64Builder::new());
        for record in records {
            let Some(row) = table.get(&record.object) else {
                bail!("{}: not in the population table", record.object);
            };
            let values = builder.values();
            for &m in row.curve.magnitude() {
                values.append_option((!m.is_nan()).then_some(m));
            }
            builder.append(true);
        }
        columns.push((
            Field::new(
                "magnitude",
                DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
                false,
            ),
            Arc::new(builder.finish()),
        ));
    }

    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = columns.into_iter().unzip();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).context("building record batch")
}

/// Render the flattened records as a terminal table.
pub fn pretty_table(records: &[PopulationRecord]) -> Result<String> {
    let batch = record_batch(records, None)?;
    Ok(pretty_format_batches(&[batch])
        .context("formatting table")?
        .to_string())
}

// ---------------------------------------------------------------------------
// Summary curve
// ---------------------------------------------------------------------------

/// Write the population mean curve as CSV `phase,mean,std,count`.
pub fn write_summary_csv(path: &Path, summary: &PopulationSummary) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for point in &summary.points {
        writer.serialize(point).context("writing summary row")?;
    }
    writer.flush().context("flushing summary CSV")?;
    log::info!("wrote {} summary points to {}", summary.points.len(), path.display());
    Ok(())
}

/// Text description of one object's labelled peaks.
pub fn describe_peaks(peaks: &LabelledPeaks) -> String {
    let mut lines = Vec::new();
    for slot in [PeakSlot::FirstMax, PeakSlot::SecondMax, PeakSlot::Other] {
        let candidates = peaks.candidates(slot);
        if candidates.is_empty() {
            lines.push(format!("{slot:>9}: -"));
            continue;
        }
        let text: Vec<String> = candidates
            .iter()
            .map(|p| format!("{:.1} d @ {:.3} mag", p.phase, p.magnitude))
            .collect();
        lines.push(format!("{slot:>9}: {}", text.join(", ")));
    }
    for anomaly in peaks.anomalies() {
        lines.push(format!("  warning: {anomaly}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate::aggregate;
    use crate::config::PipelineConfig;
    use crate::data::model::{HeaderValue, LightCurve, RawSample};
    use crate::style::StyleCycle;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn object(name: &str, mu: Option<f64>) -> LightCurve {
        let mut header = ObjectHeader::new();
        header.insert("snName", HeaderValue::String(name.to_string()));
        if let Some(mu) = mu {
            header.insert("mu_Snoopy", HeaderValue::Float(mu));
        }
        let samples = [
            (-8.0, -17.6),
            (-4.0, -18.0),
            (0.0, -18.3),
            (4.0, -18.0),
            (9.0, -17.4),
            (14.0, -17.0),
            (20.0, -17.3),
            (27.0, -17.6),
            (34.0, -17.2),
            (45.0, -16.4),
        ]
        .iter()
        .map(|&(p, m)| RawSample::new(p, m, 0.05))
        .collect();
        LightCurve::new(header, samples)
    }

    fn population() -> (PopulationTable, Vec<PopulationRecord>) {
        let objects = vec![
            object("sn2006D", Some(32.8)),
            object("sn2007af", None),
            LightCurve::new(ObjectHeader::new(), vec![RawSample::new(0.0, -18.0, 0.1)]),
        ];
        let table = aggregate(&objects, &PipelineConfig::default()).unwrap();
        let recs = records(&table, &mut StyleCycle::new());
        (table, recs)
    }

    #[test]
    fn records_flatten_slots_and_styles() {
        let (_, recs) = population();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].object, "sn2006D");
        assert_eq!(recs[0].first_max_phase, Some(0.0));
        assert_eq!(recs[0].second_max_mag, Some(-17.6));
        assert_eq!(recs[0].mu_snoopy, Some(32.8));
        assert_eq!(recs[1].mu_snoopy, None);
        assert_eq!(recs[0].anomalies, "");
        assert_eq!(recs[0].marker, "o");
        assert_eq!(recs[1].marker, "v");
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let (table, recs) = population();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.csv");
        write_table(&path, &table, &recs).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("object,nSamples,firstMaxPhase,firstMaxMag"));
        assert!(lines.next().unwrap().starts_with("sn2006D,10,0.0,-18.3"));
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn json_export_carries_curves_and_skips() {
        let (table, recs) = population();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.json");
        write_table(&path, &table, &recs).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["grid"].as_array().unwrap().len(), 110);
        let rows = value["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["object"], "sn2006D");
        assert_eq!(rows[0]["magnitude"].as_array().unwrap().len(), 110);
        assert!(rows[0]["magnitude"][0].is_null());
        assert_eq!(rows[0]["header"]["mu_Snoopy"], 32.8);
        assert_eq!(value["skipped"][0]["id"], "unnamed");
    }

    #[test]
    fn parquet_export_round_trips_row_count() {
        let (table, recs) = population();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.parquet");
        write_table(&path, &table, &recs).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);
        assert!(batches[0].schema().field_with_name("magnitude").is_ok());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let (table, recs) = population();
        let dir = tempfile::tempdir().unwrap();
        let err = write_table(&dir.path().join("peaks.xlsx"), &table, &recs).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }

    #[test]
    fn summary_csv_lists_every_grid_point() {
        let (table, _) = population();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        write_summary_csv(&path, &table.summary()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "phase,mean,std,count");
        assert_eq!(lines.len(), 111);
        assert_eq!(lines[11], "0.0,-18.3,0.0,2");
    }

    #[test]
    fn pretty_table_names_objects() {
        let (_, recs) = population();
        let text = pretty_table(&recs).unwrap();
        assert!(text.contains("sn2006D"));
        assert!(text.contains("secondMaxPhase"));
    }

    #[test]
    fn describe_marks_empty_slots() {
        let text = describe_peaks(&LabelledPeaks::default());
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| l.ends_with(": -")));
    }
}
