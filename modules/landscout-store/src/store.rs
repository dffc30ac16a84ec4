// RecordStore: the master listing table.
//
// Append-and-update only. Every mutation is a single-writer transaction:
// reload the table from disk, mutate in memory, run the uniqueness gate, and
// atomically replace the file. Running two writers against one table is not
// supported; the last writer wins.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use landscout_common::{
    FieldValue, Fields, IdentityKey, Market, Record, StockNumber, INGEST_DATE, LATITUDE,
    LONGITUDE, MARKET, STOCK_NUMBER,
};
use tracing::{info, warn};

use crate::batch::RawBatch;
use crate::error::{Result, StoreError};
use crate::identifier::{check_uniqueness, IdentifierAllocator};
use crate::ingest_log::IngestLog;
use crate::table::Table;

/// Columns enrichment merges may never touch.
const PROTECTED_COLUMNS: &[&str] = &[STOCK_NUMBER, LATITUDE, LONGITUDE];

/// Outcome of one `ingest` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub total: usize,
    pub added: usize,
    pub duplicates: usize,
    /// Rows dropped because their coordinates were blank or not numbers.
    pub invalid_coordinates: usize,
    pub assigned: Vec<StockNumber>,
    pub log_path: Option<PathBuf>,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Ingestion Complete ===")?;
        writeln!(f, "Listings in file:     {}", self.total)?;
        writeln!(f, "New listings added:   {}", self.added)?;
        writeln!(f, "Already in database:  {}", self.duplicates)?;
        writeln!(f, "Invalid coordinates:  {}", self.invalid_coordinates)?;
        if let (Some(first), Some(last)) = (self.assigned.first(), self.assigned.last()) {
            writeln!(f, "Stock numbers:        {first} .. {last}")?;
        }
        if let Some(path) = &self.log_path {
            writeln!(f, "Saved for reference:  {}", path.display())?;
        }
        Ok(())
    }
}

pub struct RecordStore {
    path: PathBuf,
    log: IngestLog,
    table: Table,
}

impl RecordStore {
    /// Open the master table at `path`, logging raw batches under `log_dir`.
    /// A missing table is treated as empty and created on the first write.
    pub fn open(path: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = Table::load(&path)?;
        info!(path = %path.display(), records = table.records.len(), "record store opened");
        Ok(Self {
            path,
            log: IngestLog::new(log_dir),
            table,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[Record] {
        &self.table.records
    }

    pub fn columns(&self) -> &[String] {
        &self.table.columns
    }

    pub fn len(&self) -> usize {
        self.table.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.records.is_empty()
    }

    /// Record with the given identity key (linear scan).
    pub fn find(&self, key: &IdentityKey) -> Option<&Record> {
        self.table
            .records
            .iter()
            .find(|r| r.identity_key().as_ref() == Some(key))
    }

    /// Re-read the table from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.table = Table::load(&self.path)?;
        Ok(())
    }

    /// Merge a batch of listings for `market`, stamped with the current time.
    pub fn ingest(&mut self, batch: &RawBatch, market: &Market) -> Result<IngestReport> {
        self.ingest_at(batch, market, Local::now())
    }

    /// As [`RecordStore::ingest`], with an explicit ingestion timestamp.
    pub fn ingest_at(
        &mut self,
        batch: &RawBatch,
        market: &Market,
        at: DateTime<Local>,
    ) -> Result<IngestReport> {
        let missing = batch.missing_required_columns();
        if !missing.is_empty() {
            warn!(missing = ?missing, market = %market.code, "batch rejected: required columns absent");
            return Err(StoreError::MissingRequiredColumns(missing));
        }

        let date = at.format("%Y-%m-%d").to_string();
        let stamped: Vec<Record> = batch
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.set(INGEST_DATE, FieldValue::Text(date.clone()));
                row.set(MARKET, FieldValue::Text(market.name.clone()));
                row
            })
            .collect();

        let mut log_columns = batch.columns.clone();
        for extra in [INGEST_DATE, MARKET] {
            if !log_columns.iter().any(|c| c == extra) {
                log_columns.push(extra.to_string());
            }
        }
        let mut report = IngestReport {
            total: batch.len(),
            ..Default::default()
        };

        self.transact(|table| {
            let mut seen: HashSet<IdentityKey> = table
                .records
                .iter()
                .filter_map(Record::identity_key)
                .collect();

            let mut survivors = Vec::new();
            for row in &stamped {
                match row.identity_key() {
                    None => {
                        warn!(row = %row.label(), "row skipped: coordinates missing or not numeric");
                        report.invalid_coordinates += 1;
                    }
                    Some(key) if !seen.insert(key.clone()) => {
                        report.duplicates += 1;
                    }
                    Some(_) => survivors.push(row.clone()),
                }
            }

            let mut allocator = IdentifierAllocator::seeded(&market.code, &table.records);
            for row in &survivors {
                if let Some(raw) = row.get(STOCK_NUMBER) {
                    let supplied: StockNumber = raw.parse()?;
                    allocator.observe(&supplied);
                }
            }

            for column in &batch.columns {
                table.ensure_column(column);
            }
            table.ensure_column(INGEST_DATE);
            table.ensure_column(MARKET);

            for mut row in survivors {
                if !row.has_value(STOCK_NUMBER) {
                    let stock_number = allocator.allocate()?;
                    row.set_stock_number(&stock_number);
                    report.assigned.push(stock_number);
                }
                table.ensure_columns_for(&row);
                table.records.push(row);
                report.added += 1;
            }

            Ok(report.added > 0)
        })?;
        // Only batches that passed the gate get an audit copy.
        report.log_path = Some(self.log.append(&log_columns, &stamped, market, at)?);

        info!(
            market = %market.code,
            total = report.total,
            added = report.added,
            duplicates = report.duplicates,
            invalid = report.invalid_coordinates,
            "batch ingested"
        );
        Ok(report)
    }

    /// Overwrite or add `fields` on the record with identity `key`, leaving
    /// all other fields untouched. Stock number and coordinates are never
    /// changed.
    pub fn merge(&mut self, key: &IdentityKey, fields: &Fields) -> Result<()> {
        self.transact(|table| {
            let index = table
                .records
                .iter()
                .position(|r| r.identity_key().as_ref() == Some(key))
                .ok_or_else(|| StoreError::RecordNotFound(key.to_string()))?;

            let mut changed = false;
            for (field, value) in fields {
                if PROTECTED_COLUMNS.contains(&field.as_str()) {
                    warn!(%key, field = %field, "merge: protected field ignored");
                    continue;
                }
                table.ensure_column(field);
                table.records[index].set(field, value.clone());
                changed = true;
            }
            Ok(changed)
        })
    }

    /// Run `mutate` against a freshly loaded table. When it returns
    /// `Ok(true)` the uniqueness gate runs and the table is atomically
    /// written; on any error nothing is written and the in-memory view is
    /// left as it was on disk.
    fn transact<F>(&mut self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Table) -> Result<bool>,
    {
        let mut table = Table::load(&self.path)?;
        if !mutate(&mut table)? {
            self.table = table;
            return Ok(());
        }

        if let Err(e) = check_uniqueness(&table.records) {
            warn!(error = %e, path = %self.path.display(), "integrity check failed; write aborted");
            return Err(e);
        }

        table.write_atomic(&self.path)?;
        self.table = table;
        Ok(())
    }
}
