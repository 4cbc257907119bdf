use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use crate::error::{AnalysisError, AnalysisResult};

// ---------------------------------------------------------------------------
// RawSample – one photometric observation
// ---------------------------------------------------------------------------

/// One observation of an object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RawSample {
    /// Days relative to the reference epoch (B-band maximum).
    pub phase: f64,
    pub magnitude: f64,
    pub magnitude_error: f64,
}

impl RawSample {
    pub const fn new(phase: f64, magnitude: f64, magnitude_error: f64) -> Self {
        Self {
            phase,
            magnitude,
            magnitude_error,
        }
    }
}

// ---------------------------------------------------------------------------
// HeaderValue – a single entry of a file header
// ---------------------------------------------------------------------------

/// A header value with the type guessed from its text.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Float(f64),
    Null,
}

// -- Manual Eq/Ord so header values can sit in a BTreeSet --

impl Eq for HeaderValue {}

impl PartialOrd for HeaderValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeaderValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use HeaderValue::*;
        fn discriminant(v: &HeaderValue) -> u8 {
            match v {
                Null => 0,
                Integer(_) => 1,
                Float(_) => 2,
                String(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::String(s) => write!(f, "{s}"),
            HeaderValue::Integer(i) => write!(f, "{i}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Null => write!(f, "<null>"),
        }
    }
}

impl Serialize for HeaderValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HeaderValue::String(s) => serializer.serialize_str(s),
            HeaderValue::Integer(i) => serializer.serialize_i64(*i),
            HeaderValue::Float(v) => serializer.serialize_f64(*v),
            HeaderValue::Null => serializer.serialize_none(),
        }
    }
}

impl HeaderValue {
    /// Guess the type of a header token: integer, then float, then text.
    pub fn guess(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return HeaderValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return HeaderValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return HeaderValue::Float(f);
        }
        HeaderValue::String(s.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectHeader – per-object metadata
// ---------------------------------------------------------------------------

pub const NAME_KEY: &str = "snName";

/// Key/value metadata parsed from a photometry file header.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ObjectHeader {
    values: BTreeMap<String, HeaderValue>,
}

impl ObjectHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: HeaderValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The object name, if the header carries one.
    pub fn name(&self) -> Option<String> {
        match self.values.get(NAME_KEY)? {
            HeaderValue::Null => None,
            value => Some(value.to_string()),
        }
    }

    /// Numeric entry that must be present.
    pub fn require_f64(&self, key: &str) -> AnalysisResult<f64> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| AnalysisError::MissingHeaderKey(key.to_string()))?;
        value.as_f64().ok_or_else(|| AnalysisError::NonNumericHeader {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn distance_modulus(&self) -> AnalysisResult<DistanceModulus> {
        DistanceModulus::from_header(self)
    }
}

impl FromIterator<(String, HeaderValue)> for ObjectHeader {
    fn from_iter<I: IntoIterator<Item = (String, HeaderValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// DistanceModulus – typed view of the header's distance estimates
// ---------------------------------------------------------------------------

/// Distance modulus estimates carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceModulus {
    /// SNooPy light-curve fit.
    pub mu_snoopy: f64,
    pub err_mu_snoopy: f64,
    /// Flat LCDM prediction from redshift.
    pub mu_lcdm: f64,
}

impl DistanceModulus {
    pub fn from_header(header: &ObjectHeader) -> AnalysisResult<Self> {
        Ok(Self {
            mu_snoopy: header.require_f64("mu_Snoopy")?,
            err_mu_snoopy: header.require_f64("err_mu_Snoopy")?,
            mu_lcdm: header.require_f64("mu_LCDM")?,
        })
    }
}

// ---------------------------------------------------------------------------
// LightCurve – one object as loaded from disk
// ---------------------------------------------------------------------------

/// Header and photometry of one object in one band.
#[derive(Debug, Clone)]
pub struct LightCurve {
    pub header: ObjectHeader,
    /// Observations in file order.
    pub samples: Vec<RawSample>,
    pub source: Option<PathBuf>,
}

impl LightCurve {
    pub fn new(header: ObjectHeader, samples: Vec<RawSample>) -> Self {
        Self {
            header,
            samples,
            source: None,
        }
    }

    /// Identifier used as the population table key: the header name, else the
    /// source file stem, else `"unnamed"`.
    pub fn id(&self) -> String {
        if let Some(name) = self.header.name() {
            return name;
        }
        self.source
            .as_ref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unnamed".to_string())
    }
}

// ---------------------------------------------------------------------------
// LightCurveSet – every object loaded for a band
// ---------------------------------------------------------------------------

/// All light curves of a band with header key indices.
#[derive(Debug, Clone)]
pub struct LightCurveSet {
    pub curves: Vec<LightCurve>,
    /// Ordered list of header keys seen across all objects.
    pub header_keys: Vec<String>,
    /// For each header key the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<HeaderValue>>,
}

impl LightCurveSet {
    pub fn from_curves(curves: Vec<LightCurve>) -> Self {
        let mut unique_values: BTreeMap<String, BTreeSet<HeaderValue>> = BTreeMap::new();

        for lc in &curves {
            for (key, val) in lc.header.iter() {
                unique_values
                    .entry(key.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        let header_keys: Vec<String> = unique_values.keys().cloned().collect();
        LightCurveSet {
            curves,
            header_keys,
            unique_values,
        }
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Keep only the curves at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Self {
        let curves = indices
            .iter()
            .filter_map(|&i| self.curves.get(i).cloned())
            .collect();
        Self::from_curves(curves)
    }
}
