// Census artifact parsing.
//
// The artifact is a CSV with one row per radius band, in ascending band order,
// and one column per statistic. Each metric/band cell is coerced on its own:
// a missing column or an unparseable cell drops only that value.

use landscout_common::metrics::MOBILE_HOMES_PER_K;
use landscout_common::{parse_number, BaseMetric, FieldValue, Fields, RadiusBand, BASE_METRICS};
use tracing::{debug, warn};

use crate::error::{EnrichError, Result};

/// Values pulled from one artifact, plus what had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CensusExtract {
    pub fields: Fields,
    /// `{metric}_{radius}` columns (or bare metric names when the whole
    /// column was absent) that yielded no value.
    pub skipped: Vec<String>,
}

impl CensusExtract {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Index of the column naming `metric`. The canonical name is preferred,
/// then aliases in order.
fn column_for(metric: &BaseMetric, headers: &[String]) -> Option<usize> {
    std::iter::once(metric.name)
        .chain(metric.aliases.iter().copied())
        .find_map(|name| headers.iter().position(|h| h.trim() == name))
}

/// Parse an artifact body. `label` identifies the record in logs.
///
/// Only a body that is not CSV at all is an error; everything finer grained
/// is logged and skipped.
pub fn parse_artifact(body: &str, label: &str) -> Result<CensusExtract> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EnrichError::ArtifactParse(format!("{label}: unreadable header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::with_capacity(RadiusBand::ALL.len());
    for (index, row) in reader.records().enumerate() {
        if index >= RadiusBand::ALL.len() {
            debug!(label, rows = index + 1, "artifact has extra rows; ignoring");
            break;
        }
        match row {
            Ok(row) => rows.push(Some(row)),
            Err(e) => {
                warn!(label, row = index, error = %e, "artifact row unreadable; skipping band");
                rows.push(None);
            }
        }
    }

    let mut extract = CensusExtract::default();

    for metric in BASE_METRICS {
        let Some(col) = column_for(metric, &headers) else {
            warn!(label, metric = metric.name, "artifact column not found; skipping metric");
            extract.skipped.push(metric.name.to_string());
            continue;
        };

        for (index, band) in RadiusBand::ALL.iter().enumerate() {
            let field = metric.field(*band);
            let cell = rows
                .get(index)
                .and_then(|r| r.as_ref())
                .and_then(|r| r.get(col));
            let Some(cell) = cell else {
                debug!(label, field = %field, "artifact has no cell for band");
                extract.skipped.push(field);
                continue;
            };
            match parse_number(cell) {
                Ok(Some(value)) => {
                    extract.fields.insert(field, FieldValue::Number(value));
                }
                Ok(None) => {
                    debug!(label, field = %field, raw = cell, "artifact value not available");
                    extract.skipped.push(field);
                }
                Err(e) => {
                    warn!(label, field = %field, error = %e, "artifact value unparseable; skipping");
                    extract.skipped.push(field);
                }
            }
        }
    }

    if let Some(col) = column_for(&MOBILE_HOMES_PER_K, &headers) {
        let cell = rows
            .first()
            .and_then(|r| r.as_ref())
            .and_then(|r| r.get(col));
        match cell.map(parse_number) {
            Some(Ok(Some(value))) => {
                extract
                    .fields
                    .insert(MOBILE_HOMES_PER_K.name.to_string(), FieldValue::Number(value));
            }
            Some(Err(e)) => {
                warn!(label, field = MOBILE_HOMES_PER_K.name, error = %e, "artifact value unparseable; skipping");
            }
            _ => {}
        }
    }

    debug!(
        label,
        values = extract.fields.len(),
        skipped = extract.skipped.len(),
        "artifact parsed"
    );
    Ok(extract)
}
