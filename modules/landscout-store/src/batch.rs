use std::path::Path;

use landscout_common::{Record, REQUIRED_BATCH_COLUMNS};

use crate::error::{Result, StoreError};
use crate::table::read_rows;

/// One uploaded listings file, as read: header plus rows.
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl RawBatch {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self { columns, rows }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| StoreError::csv(path, e))?;
        let (columns, rows) = read_rows(&mut reader).map_err(|e| StoreError::csv(path, e))?;
        Ok(Self { columns, rows })
    }

    /// Parse CSV text. Used by callers that already hold the upload in memory.
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let (columns, rows) =
            read_rows(&mut reader).map_err(|e| StoreError::csv("<memory>", e))?;
        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Required positional columns absent from the header.
    pub fn missing_required_columns(&self) -> Vec<String> {
        REQUIRED_BATCH_COLUMNS
            .iter()
            .filter(|required| !self.columns.iter().any(|c| c == *required))
            .map(|c| c.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let batch = RawBatch::from_csv_str(
            "Latitude,Longitude,For Sale Price\n40.1,-74.0,\"$120,000\"\n41.2,-73.5,\n",
        )
        .unwrap();
        assert_eq!(batch.columns, vec!["Latitude", "Longitude", "For Sale Price"]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.rows[0].number("For Sale Price"), Some(120_000.0));
        assert!(!batch.rows[1].has_value("For Sale Price"));
        assert!(batch.missing_required_columns().is_empty());
    }

    #[test]
    fn reports_missing_coordinates() {
        let batch = RawBatch::from_csv_str("Address,Latitude\n1 Main St,40.1\n").unwrap();
        assert_eq!(batch.missing_required_columns(), vec!["Longitude"]);
    }
}
