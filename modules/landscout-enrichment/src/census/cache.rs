use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use chrono::NaiveDate;
use landscout_common::IdentityKey;
use tracing::debug;

use crate::error::Result;

/// Raw census artifacts on disk, one file per coordinate and download date:
/// `{lat}-{lng}-{YYYYMMDD}.csv`.
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn prefix(key: &IdentityKey) -> String {
        format!("{}-{}-", key.latitude(), key.longitude())
    }

    pub fn file_name(key: &IdentityKey, date: NaiveDate) -> String {
        format!("{}{}.csv", Self::prefix(key), date.format("%Y%m%d"))
    }

    /// Most recently modified artifact for `key`, if any.
    pub fn latest(&self, key: &IdentityKey) -> Option<PathBuf> {
        let prefix = Self::prefix(key);
        let entries = fs::read_dir(&self.dir).ok()?;

        let mut best: Option<(SystemTime, PathBuf)> = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(&prefix) else { continue };
            if !is_dated_csv(rest) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if best.as_ref().map_or(true, |(t, _)| modified >= *t) {
                best = Some((modified, entry.path()));
            }
        }
        best.map(|(_, path)| path)
    }

    pub fn read(&self, path: &Path) -> Result<String> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read cached artifact {}", path.display()))?;
        Ok(text)
    }

    /// Save a downloaded artifact under today's name for `key`.
    pub fn store(&self, key: &IdentityKey, body: &str, date: NaiveDate) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.dir.join(Self::file_name(key, date));

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {}", self.dir.display()))?;
        tmp.write_all(body.as_bytes())
            .context("Failed to write artifact")?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to save artifact {}", path.display()))?;

        debug!(path = %path.display(), bytes = body.len(), "census artifact cached");
        Ok(path)
    }
}

/// `YYYYMMDD.csv`
fn is_dated_csv(rest: &str) -> bool {
    rest.strip_suffix(".csv")
        .is_some_and(|d| d.len() == 8 && d.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn key(lat: &str, lng: &str) -> IdentityKey {
        IdentityKey::from_cells(lat, lng).unwrap()
    }

    #[test]
    fn file_name_carries_coordinate_and_date() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            ArtifactCache::file_name(&key("42.65", "-73.75"), date),
            "42.65--73.75-20240601.csv"
        );
    }

    #[test]
    fn empty_or_missing_dir_has_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().join("census"));
        assert!(cache.latest(&key("1", "2")).is_none());
    }

    #[test]
    fn latest_modified_wins_and_other_coordinates_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let k = key("42.65", "-73.75");

        let older = cache
            .store(&k, "old", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap();
        fs::File::options()
            .write(true)
            .open(&older)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();
        let newer = cache
            .store(&k, "new", NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
            .unwrap();
        cache
            .store(&key("42.65", "-73.751"), "other", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();
        fs::write(dir.path().join("42.65--73.75-notes.txt"), "x").unwrap();

        let latest = cache.latest(&k).unwrap();
        assert_eq!(latest, newer);
        assert_eq!(cache.read(&latest).unwrap(), "new");
    }
}
