use std::collections::{BTreeMap, BTreeSet};

use super::model::{HeaderValue, LightCurveSet};

// ---------------------------------------------------------------------------
// Header predicate: which values are accepted per header key
// ---------------------------------------------------------------------------

/// Per-key selection: maps header key → set of accepted values.
/// A key absent from the map places no constraint.
pub type HeaderFilter = BTreeMap<String, BTreeSet<HeaderValue>>;

/// Parse `key=value` selectors into a [`HeaderFilter`]. Repeated keys
/// accumulate values.
pub fn parse_selectors<S: AsRef<str>>(selectors: &[S]) -> anyhow::Result<HeaderFilter> {
    let mut filter = HeaderFilter::new();
    for sel in selectors {
        let sel = sel.as_ref();
        let (key, value) = sel
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("selector '{sel}' is not key=value"))?;
        filter
            .entry(key.trim().to_string())
            .or_default()
            .insert(HeaderValue::guess(value));
    }
    Ok(filter)
}

/// Return indices of curves that pass all header filters.
///
/// A curve passes a key filter when:
/// * The accepted set is empty → nothing accepted → fails
/// * The curve's value for that key is in the accepted set → passes
/// * The curve lacks the key → passes only if `Null` is accepted
pub fn filtered_indices(set: &LightCurveSet, filters: &HeaderFilter) -> Vec<usize> {
    set.curves
        .iter()
        .enumerate()
        .filter(|(_, lc)| {
            for (key, accepted) in filters {
                if accepted.is_empty() {
                    return false;
                }
                match lc.header.get(key) {
                    Some(val) => {
                        if !accepted.contains(val) {
                            return false;
                        }
                    }
                    None => {
                        if !accepted.contains(&HeaderValue::Null) {
                            return false;
                        }
                    }
                }
            }
            true
        })
        .map(|(i, _)| i)
        .collect()
}

/// Filter keys that no curve in the set carries.
pub fn unknown_keys<'a>(set: &LightCurveSet, filters: &'a HeaderFilter) -> Vec<&'a str> {
    filters
        .keys()
        .filter(|key| !set.unique_values.contains_key(*key))
        .map(|key| key.as_str())
        .collect()
}

/// Indices of the first curve for each requested object id, in request order.
/// Names with no matching curve are skipped with a warning.
pub fn select_by_id<S: AsRef<str>>(set: &LightCurveSet, ids: &[S]) -> Vec<usize> {
    ids.iter()
        .filter_map(|id| {
            let id = id.as_ref();
            let found = set.curves.iter().position(|lc| lc.id() == id);
            if found.is_none() {
                log::warn!("no light curve for requested object '{id}'");
            }
            found
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{LightCurve, ObjectHeader};

    fn curve(name: &str, survey: Option<&str>) -> LightCurve {
        let mut header = ObjectHeader::new();
        header.insert("snName", HeaderValue::guess(name));
        if let Some(s) = survey {
            header.insert("survey", HeaderValue::guess(s));
        }
        LightCurve::new(header, Vec::new())
    }

    fn set() -> LightCurveSet {
        LightCurveSet::from_curves(vec![
            curve("sn2006D", Some("CSP")),
            curve("sn2007af", Some("CfA")),
            curve("sn2008bc", None),
            curve("sn2006D", Some("CfA")),
        ])
    }

    #[test]
    fn selectors_parse_into_typed_values() {
        let f = parse_selectors(&["survey=CSP", "survey=CfA", "year=2006"]).unwrap();
        assert_eq!(f["survey"].len(), 2);
        assert!(f["year"].contains(&HeaderValue::Integer(2006)));
        assert!(parse_selectors(&["nonsense"]).is_err());
    }

    #[test]
    fn filters_on_header_value() {
        let f = parse_selectors(&["survey=CSP"]).unwrap();
        assert_eq!(filtered_indices(&set(), &f), vec![0]);
    }

    #[test]
    fn missing_key_passes_only_when_null_accepted() {
        let mut f = parse_selectors(&["survey=CfA"]).unwrap();
        assert_eq!(filtered_indices(&set(), &f), vec![1, 3]);
        f.get_mut("survey").unwrap().insert(HeaderValue::Null);
        assert_eq!(filtered_indices(&set(), &f), vec![1, 2, 3]);
    }

    #[test]
    fn empty_selection_hides_everything() {
        let mut f = HeaderFilter::new();
        f.insert("survey".into(), BTreeSet::new());
        assert!(filtered_indices(&set(), &f).is_empty());
    }

    #[test]
    fn reports_keys_no_curve_has() {
        let f = parse_selectors(&["survey=CSP", "telescope=du Pont"]).unwrap();
        assert_eq!(unknown_keys(&set(), &f), vec!["telescope"]);
    }

    #[test]
    fn select_by_id_takes_first_match_in_request_order() {
        let picked = select_by_id(&set(), &["sn2008bc", "sn2006D", "sn1900zz"]);
        assert_eq!(picked, vec![2, 0]);
    }
}
