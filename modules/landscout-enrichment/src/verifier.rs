// CompletenessVerifier: which records still lack required census values.
//
// The required template is every base metric in every radius band. A field
// counts as missing when its cell is absent, blank, or a "not available"
// marker.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use landscout_common::metrics::required_fields;
use landscout_common::{
    parse_number, Record, NEAREST_LANDMARK_ADDRESS, NEAREST_LANDMARK_TRAVEL_TIME,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Incomplete,
}

fn is_present(record: &Record, field: &str) -> bool {
    match record.get(field) {
        None => false,
        Some(cell) => !matches!(parse_number(cell), Ok(None)),
    }
}

/// Required `{metric}_{radius}` fields that `record` lacks.
pub fn missing_fields(record: &Record) -> BTreeSet<String> {
    required_fields()
        .into_iter()
        .filter(|field| !is_present(record, field))
        .collect()
}

pub fn classify(record: &Record) -> Completeness {
    if missing_fields(record).is_empty() {
        Completeness::Complete
    } else {
        Completeness::Incomplete
    }
}

/// True when a coordinate-bearing record lacks the landmark address or
/// travel time.
pub fn needs_distance(record: &Record) -> bool {
    record.identity_key().is_some()
        && (!record.has_value(NEAREST_LANDMARK_ADDRESS)
            || !is_present(record, NEAREST_LANDMARK_TRAVEL_TIME))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    /// Records with coordinates.
    pub checked: usize,
    /// Of those, records missing at least one required field.
    pub missing_rows: usize,
    /// Missing-record count per required field. Fields nobody is missing
    /// are omitted.
    pub per_field_counts: BTreeMap<String, usize>,
}

impl AuditReport {
    pub fn complete(&self) -> usize {
        self.checked - self.missing_rows
    }

    pub fn missing_count(&self, field: &str) -> usize {
        self.per_field_counts.get(field).copied().unwrap_or(0)
    }
}

/// Aggregate [`missing_fields`] over every record that has coordinates.
pub fn audit<'a>(records: impl IntoIterator<Item = &'a Record>) -> AuditReport {
    let mut report = AuditReport::default();
    for record in records {
        if record.identity_key().is_none() {
            continue;
        }
        report.checked += 1;
        let missing = missing_fields(record);
        if missing.is_empty() {
            continue;
        }
        report.missing_rows += 1;
        for field in missing {
            *report.per_field_counts.entry(field).or_default() += 1;
        }
    }
    report
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Completeness Audit ===")?;
        writeln!(f, "Records checked:      {}", self.checked)?;
        writeln!(f, "Complete:             {}", self.complete())?;
        writeln!(f, "Missing data:         {}", self.missing_rows)?;
        if !self.per_field_counts.is_empty() {
            writeln!(f, "\nMissing by field:")?;
            for (field, count) in &self.per_field_counts {
                writeln!(f, "  {field:<24} {count}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use landscout_common::{FieldValue, LATITUDE, LONGITUDE};

    use super::*;

    fn complete_record() -> Record {
        let mut record = Record::from_cells([(LATITUDE, "42.65"), (LONGITUDE, "-73.75")]);
        for field in required_fields() {
            record.set(&field, FieldValue::Number(1.0));
        }
        record
    }

    #[test]
    fn all_bands_filled_is_complete() {
        let record = complete_record();
        assert!(missing_fields(&record).is_empty());
        assert_eq!(classify(&record), Completeness::Complete);
    }

    #[test]
    fn removing_any_single_field_makes_it_incomplete() {
        for field in required_fields() {
            let mut record = complete_record();
            record.set(&field, FieldValue::Null);
            assert_eq!(classify(&record), Completeness::Incomplete, "{field}");
            assert_eq!(missing_fields(&record), BTreeSet::from([field.clone()]));
        }
    }

    #[test]
    fn sentinel_cell_counts_as_missing() {
        let mut record = complete_record();
        record.set("MedianGrossRent_10", FieldValue::Text("(X)".into()));
        assert_eq!(
            missing_fields(&record),
            BTreeSet::from(["MedianGrossRent_10".to_string()])
        );
    }

    #[test]
    fn audit_counts_rows_and_fields_and_skips_uncoordinated() {
        let mut partial = complete_record();
        partial.set("TotPop_5", FieldValue::Null);
        partial.set("TotPop_10", FieldValue::Null);
        let mut other = complete_record();
        other.set(LATITUDE, FieldValue::Text("43.0".into()));
        other.set("TotPop_5", FieldValue::Null);
        let no_coords = Record::from_cells([("Address", "1 Main St")]);

        let report = audit([&complete_record(), &partial, &other, &no_coords]);
        assert_eq!(report.checked, 3);
        assert_eq!(report.missing_rows, 2);
        assert_eq!(report.complete(), 1);
        assert_eq!(report.missing_count("TotPop_5"), 2);
        assert_eq!(report.missing_count("TotPop_10"), 1);
        assert_eq!(report.missing_count("AvgGrossRent_25"), 0);
    }

    #[test]
    fn distance_candidates() {
        let mut record = complete_record();
        assert!(needs_distance(&record));
        record.set(NEAREST_LANDMARK_ADDRESS, FieldValue::Text("1 Mall Rd".into()));
        assert!(needs_distance(&record));
        record.set(NEAREST_LANDMARK_TRAVEL_TIME, FieldValue::Number(7.5));
        assert!(!needs_distance(&record));
        assert!(!needs_distance(&Record::from_cells([("Address", "x")])));
    }
}
