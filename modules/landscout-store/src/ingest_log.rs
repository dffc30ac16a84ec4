// Immutable audit copies of every ingested batch.
//
// Each batch lands in `{dir}/{MM-DD-YYYY-HH-MM}-{CODE}.csv`. Files are created
// exclusively; a same-minute collision gets a numeric suffix instead of
// overwriting an earlier log.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use landscout_common::{Market, Record};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::table::write_rows;

const MAX_SUFFIX: u32 = 1000;

pub struct IngestLog {
    dir: PathBuf,
}

impl IngestLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write a stamped batch and return the path it was written to.
    pub fn append(
        &self,
        columns: &[String],
        rows: &[Record],
        market: &Market,
        at: DateTime<Local>,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let stem = format!("{}-{}", at.format("%m-%d-%Y-%H-%M"), market.code);
        let (path, file) = self.create_exclusive(&stem)?;

        let header: Vec<&str> = columns.iter().map(String::as_str).collect();
        let mut writer = csv::Writer::from_writer(file);
        write_rows(&mut writer, &header, rows).map_err(|e| StoreError::csv(&path, e))?;
        writer.flush().map_err(|e| StoreError::io(&path, e))?;

        info!(path = %path.display(), rows = rows.len(), market = %market.code, "ingest log: batch saved");
        Ok(path)
    }

    fn create_exclusive(&self, stem: &str) -> Result<(PathBuf, fs::File)> {
        for n in 0..MAX_SUFFIX {
            let name = if n == 0 {
                format!("{stem}.csv")
            } else {
                format!("{stem}-{n}.csv")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        Err(StoreError::io(
            self.dir.join(format!("{stem}.csv")),
            std::io::Error::new(ErrorKind::AlreadyExists, "too many logs in one minute"),
        ))
    }
}
