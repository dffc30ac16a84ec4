// Whole-table CSV persistence.
//
// The master table is always read in full and written in full. Writes go to
// a temp file in the target directory and are renamed over the old table, so
// a crash mid-write leaves the previous table intact.

use std::fs;
use std::path::Path;

use landscout_common::{Record, STOCK_NUMBER};
use tracing::debug;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    /// Load a table, or an empty one if the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| StoreError::csv(path, e))?;
        let (columns, records) = read_rows(&mut reader).map_err(|e| StoreError::csv(path, e))?;

        debug!(path = %path.display(), rows = records.len(), "table: loaded");
        Ok(Self { columns, records })
    }

    /// Append `name` to the header if it is not there yet.
    pub fn ensure_column(&mut self, name: &str) {
        if !self.columns.iter().any(|c| c == name) {
            self.columns.push(name.to_string());
        }
    }

    /// Make sure every column the record carries is in the header.
    pub fn ensure_columns_for(&mut self, record: &Record) {
        let missing: Vec<String> = record
            .columns()
            .filter(|c| !self.columns.iter().any(|existing| existing == c))
            .map(str::to_string)
            .collect();
        self.columns.extend(missing);
    }

    /// Header as written: `StockNumber` first when present, then the rest in
    /// the order columns were introduced.
    fn header(&self) -> Vec<&str> {
        let mut header: Vec<&str> = Vec::with_capacity(self.columns.len());
        if self.columns.iter().any(|c| c == STOCK_NUMBER) {
            header.push(STOCK_NUMBER);
        }
        header.extend(
            self.columns
                .iter()
                .map(String::as_str)
                .filter(|c| *c != STOCK_NUMBER),
        );
        header
    }

    /// Replace the file at `path` with this table.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            write_rows(&mut writer, &self.header(), &self.records)
                .map_err(|e| StoreError::csv(path, e))?;
            writer
                .flush()
                .map_err(|e| StoreError::io(path, e))?;
        }
        tmp.persist(path)
            .map_err(|e| StoreError::io(path, e.error))?;

        debug!(path = %path.display(), rows = self.records.len(), "table: written");
        Ok(())
    }
}

pub(crate) fn read_rows<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
) -> std::result::Result<(Vec<String>, Vec<Record>), csv::Error> {
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(Record::from_cells(
            columns.iter().cloned().zip(row.iter().map(str::to_string)),
        ));
    }
    Ok((columns, records))
}

pub(crate) fn write_rows<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    header: &[&str],
    records: &[Record],
) -> std::result::Result<(), csv::Error> {
    writer.write_record(header)?;
    for record in records {
        writer.write_record(header.iter().map(|c| record.get(c).unwrap_or("")))?;
    }
    Ok(())
}
