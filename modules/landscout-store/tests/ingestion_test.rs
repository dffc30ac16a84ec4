//! RecordStore ingestion and merge behaviour against a real data directory.
//!
//! Run with: cargo test -p landscout-store --test ingestion_test

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::{Local, TimeZone};
use landscout_common::{FieldValue, IdentityKey, Market, StockNumber};
use landscout_store::{RawBatch, RecordStore, StoreError};
use tempfile::TempDir;

fn upstate() -> Market {
    Market::new("Upstate NY", "NY")
}

fn open(dir: &TempDir) -> RecordStore {
    RecordStore::open(dir.path().join("master.csv"), dir.path().join("log")).unwrap()
}

fn batch(csv: &str) -> RawBatch {
    RawBatch::from_csv_str(csv).unwrap()
}

fn log_files(dir: &Path) -> usize {
    fs::read_dir(dir.join("log")).map(|d| d.count()).unwrap_or(0)
}

#[test]
fn batch_with_one_known_coordinate_adds_two() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store
        .ingest(&batch("Latitude,Longitude,Address\n42.65,-73.75,1 State St\n"), &upstate())
        .unwrap();
    assert_eq!(store.len(), 1);

    let report = store
        .ingest(
            &batch(
                "Latitude,Longitude,Address\n\
                 42.65,-73.75,1 State St (relisted)\n\
                 43.08,-73.78,9 Broadway\n\
                 42.89,-78.87,5 Main St\n",
            ),
            &upstate(),
        )
        .unwrap();

    assert_eq!(report.added, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(store.len(), 3);
}

#[test]
fn reingesting_the_same_batch_adds_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let listings = batch("Latitude,Longitude\n42.65,-73.75\n43.08,-73.78\n");

    let first = store.ingest(&listings, &upstate()).unwrap();
    let second = store.ingest(&listings, &upstate()).unwrap();

    assert_eq!(first.added, 2);
    assert_eq!(second.added, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(store.len(), 2);
}

#[test]
fn duplicates_inside_one_batch_are_collapsed() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let report = store
        .ingest(
            &batch("Latitude,Longitude\n42.65,-73.75\n42.650,-73.750\n"),
            &upstate(),
        )
        .unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(report.duplicates, 1);
}

#[test]
fn new_rows_get_sequential_stock_numbers_and_stamps() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let at = Local.with_ymd_and_hms(2024, 6, 1, 14, 30, 0).unwrap();

    store
        .ingest_at(
            &batch("StockNumber,Latitude,Longitude\nNY-00041,40.0,-74.0\nNY-00042,40.5,-74.5\n"),
            &upstate(),
            at,
        )
        .unwrap();
    let report = store
        .ingest_at(
            &batch("Latitude,Longitude\n41.0,-74.0\n41.5,-74.0\n42.0,-74.0\n"),
            &upstate(),
            at,
        )
        .unwrap();

    let assigned: Vec<String> = report.assigned.iter().map(|s| s.to_string()).collect();
    assert_eq!(assigned, vec!["NY-00043", "NY-00044", "NY-00045"]);

    let record = store
        .find(&IdentityKey::from_cells("41.5", "-74").unwrap())
        .unwrap();
    assert_eq!(record.get("StockNumber"), Some("NY-00044"));
    assert_eq!(record.get("Market"), Some("Upstate NY"));
    assert_eq!(record.get("date"), Some("2024-06-01"));
}

#[test]
fn stock_numbers_are_well_formed_and_unique_across_markets() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store
        .ingest(&batch("Latitude,Longitude\n42.6,-73.7\n43.0,-73.7\n"), &upstate())
        .unwrap();
    store
        .ingest(
            &batch("Latitude,Longitude\n27.9,-82.4\n"),
            &Market::new("Florida", "FL"),
        )
        .unwrap();

    let mut seen = HashSet::new();
    for record in store.records() {
        let sn: StockNumber = record.get("StockNumber").unwrap().parse().unwrap();
        assert!(seen.insert(sn));
    }
    assert!(seen.contains(&"FL-00001".parse::<StockNumber>().unwrap()));
    assert!(seen.contains(&"NY-00002".parse::<StockNumber>().unwrap()));
}

#[test]
fn missing_coordinate_column_rejects_before_any_write() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);

    let err = store
        .ingest(&batch("Address,Latitude\n1 Main St,42.6\n"), &upstate())
        .unwrap_err();

    assert!(matches!(err, StoreError::MissingRequiredColumns(ref cols) if cols == &["Longitude"]));
    assert!(!dir.path().join("master.csv").exists());
    assert_eq!(log_files(dir.path()), 0);
}

#[test]
fn every_batch_is_logged_even_when_all_rows_are_duplicates() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let listings = batch("Latitude,Longitude\n42.65,-73.75\n");

    store.ingest(&listings, &upstate()).unwrap();
    let report = store.ingest(&listings, &upstate()).unwrap();

    assert_eq!(report.added, 0);
    assert_eq!(log_files(dir.path()), 2);
    let logged = fs::read_to_string(report.log_path.unwrap()).unwrap();
    assert!(logged.starts_with("Latitude,Longitude,date,Market\n"));
}

#[test]
fn supplied_duplicate_stock_number_aborts_the_write() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store
        .ingest(&batch("Latitude,Longitude\n42.65,-73.75\n"), &upstate())
        .unwrap();
    let before = fs::read_to_string(dir.path().join("master.csv")).unwrap();
    assert_eq!(log_files(dir.path()), 1);

    let err = store
        .ingest(
            &batch("StockNumber,Latitude,Longitude\nNY-00001,44.0,-75.0\n"),
            &upstate(),
        )
        .unwrap_err();

    assert!(err.is_integrity_violation());
    assert!(matches!(err, StoreError::DuplicateIdentifier(ref sn) if sn == "NY-00001"));
    assert_eq!(fs::read_to_string(dir.path().join("master.csv")).unwrap(), before);
    assert_eq!(store.len(), 1);
    assert_eq!(log_files(dir.path()), 1, "aborted batch must not be logged");
}

#[test]
fn merge_updates_only_given_fields_and_persists() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store
        .ingest(
            &batch("Latitude,Longitude,For Sale Price\n42.65,-73.75,\"$250,000\"\n"),
            &upstate(),
        )
        .unwrap();
    let key = IdentityKey::from_cells("42.65", "-73.75").unwrap();

    let mut fields = BTreeMap::new();
    fields.insert("TotPop_5".to_string(), FieldValue::Number(15230.0));
    fields.insert("StockNumber".to_string(), FieldValue::Text("NY-99999".into()));
    store.merge(&key, &fields).unwrap();

    let reopened = open(&dir);
    let record = reopened.find(&key).unwrap();
    assert_eq!(record.get("TotPop_5"), Some("15230"));
    assert_eq!(record.get("StockNumber"), Some("NY-00001"));
    assert_eq!(record.number("For Sale Price"), Some(250_000.0));
    assert!(reopened.columns().iter().any(|c| c == "TotPop_5"));
}

#[test]
fn merge_into_unknown_key_is_not_found() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let key = IdentityKey::from_cells("1", "2").unwrap();
    let err = store.merge(&key, &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound(_)));
}

#[test]
fn blank_coordinates_are_counted_and_skipped() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let report = store
        .ingest(&batch("Latitude,Longitude\n,-73.75\n42.65,-73.75\n"), &upstate())
        .unwrap();
    assert_eq!(report.invalid_coordinates, 1);
    assert_eq!(report.added, 1);
}
