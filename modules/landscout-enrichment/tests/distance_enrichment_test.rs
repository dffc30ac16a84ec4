//! Nearest-landmark enrichment with a scripted Maps API.
//!
//! Run with: cargo test -p landscout-enrichment --test distance_enrichment_test

use std::sync::Arc;
use std::time::Duration;

use landscout_common::config::DistanceConfig;
use landscout_common::{
    FieldValue, Market, NEAREST_LANDMARK_ADDRESS, NEAREST_LANDMARK_DISTANCE,
    NEAREST_LANDMARK_TRAVEL_TIME,
};
use landscout_enrichment::testing::{
    key_for, matrix_no_route, matrix_route, nearby_denied, nearby_empty, nearby_found, MapsReply,
    MockDistanceApi, ALBANY, GREENVILLE,
};
use landscout_enrichment::{DistanceAdapter, EnrichmentOrchestrator, RetryPolicy};
use landscout_store::{RawBatch, RecordStore};
use tempfile::TempDir;

const WALMART: (f64, f64) = (42.7101, -73.8196);

fn adapter(api: Arc<MockDistanceApi>, max_attempts: u32) -> DistanceAdapter {
    DistanceAdapter::new(Box::new(api), &DistanceConfig::default())
        .with_retry(RetryPolicy::immediate(max_attempts))
}

fn seeded_store(dir: &TempDir) -> RecordStore {
    let mut store =
        RecordStore::open(dir.path().join("master.csv"), dir.path().join("log")).unwrap();
    let csv = format!(
        "Latitude,Longitude\n{},{}\n{},{}\n",
        ALBANY.0, ALBANY.1, GREENVILLE.0, GREENVILLE.1
    );
    store
        .ingest(&RawBatch::from_csv_str(&csv).unwrap(), &Market::new("Upstate NY", "NY"))
        .unwrap();
    store
}

#[tokio::test]
async fn resolves_landmark_and_converts_units() {
    let api = Arc::new(
        MockDistanceApi::new()
            .nearby(vec![MapsReply::Json(nearby_found(
                "Walmart Supercenter",
                "141 Washington Ave Ext, Albany",
                WALMART,
            ))])
            .matrix(vec![MapsReply::Json(matrix_route(8046.7, 660.0))]),
    );

    let landmark = adapter(api.clone(), 4).nearest(&key_for(ALBANY)).await.unwrap();

    assert_eq!(landmark.address, "141 Washington Ave Ext, Albany");
    assert_eq!(landmark.distance_miles, 5.0);
    assert_eq!(landmark.travel_minutes, 11.0);
    assert_eq!(api.nearby_calls(), 1);
    assert_eq!(api.matrix_calls(), 1);
}

#[tokio::test]
async fn always_failing_api_gives_up_at_the_attempt_ceiling() {
    let api = Arc::new(MockDistanceApi::new().nearby(vec![MapsReply::NetworkError]));

    let result = adapter(api.clone(), 4).nearest(&key_for(ALBANY)).await;

    assert!(result.is_none());
    assert_eq!(api.nearby_calls(), 4);
    assert_eq!(api.matrix_calls(), 0);
}

#[tokio::test]
async fn parse_failures_are_retried_then_succeed() {
    let api = Arc::new(
        MockDistanceApi::new()
            .nearby(vec![
                MapsReply::ParseError,
                MapsReply::Json(nearby_found("Walmart", "Route 9", WALMART)),
            ])
            .matrix(vec![
                MapsReply::NetworkError,
                MapsReply::NetworkError,
                MapsReply::Json(matrix_route(1609.34, 90.0)),
            ]),
    );

    let landmark = adapter(api.clone(), 4).nearest(&key_for(ALBANY)).await.unwrap();

    assert_eq!(landmark.distance_miles, 1.0);
    assert_eq!(landmark.travel_minutes, 1.5);
    assert_eq!(api.nearby_calls(), 2);
    assert_eq!(api.matrix_calls(), 3);
}

#[tokio::test]
async fn non_ok_status_and_empty_results_are_soft_failures() {
    for reply in [nearby_empty(), nearby_denied()] {
        let api = Arc::new(MockDistanceApi::new().nearby(vec![MapsReply::Json(reply)]));
        assert!(adapter(api.clone(), 4).nearest(&key_for(ALBANY)).await.is_none());
        assert_eq!(api.nearby_calls(), 1, "status replies are not retried");
    }

    let api = Arc::new(MockDistanceApi::new().nearby(vec![MapsReply::Forbidden]));
    assert!(adapter(api.clone(), 4).nearest(&key_for(ALBANY)).await.is_none());
    assert_eq!(api.nearby_calls(), 1);
}

#[tokio::test]
async fn route_without_ok_element_is_no_result() {
    let api = Arc::new(
        MockDistanceApi::new()
            .nearby(vec![MapsReply::Json(nearby_found("Walmart", "Route 9", WALMART))])
            .matrix(vec![MapsReply::Json(matrix_no_route())]),
    );
    assert!(adapter(api.clone(), 4).nearest(&key_for(ALBANY)).await.is_none());
}

#[tokio::test]
async fn distance_run_merges_results_and_counts_failures() {
    let dir = TempDir::new().unwrap();
    // First record: nearby OK + route OK. Second record: the scripts' last
    // replies repeat, so the route lookup fails every attempt.
    let api = Arc::new(
        MockDistanceApi::new()
            .nearby(vec![MapsReply::Json(nearby_found("Walmart", "Route 9", WALMART))])
            .matrix(vec![
                MapsReply::Json(matrix_route(3218.68, 300.0)),
                MapsReply::NetworkError,
            ]),
    );
    let mut orch = EnrichmentOrchestrator::new(seeded_store(&dir))
        .with_distance(adapter(api.clone(), 3), Duration::ZERO);

    let report = orch.run_distance_enrichment().await.unwrap();

    assert_eq!(report.candidates, 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.enriched, 1);
    assert_eq!(report.no_result, 1);
    assert_eq!(api.matrix_calls(), 1 + 3);

    let reopened =
        RecordStore::open(dir.path().join("master.csv"), dir.path().join("log")).unwrap();
    let enriched = reopened
        .records()
        .iter()
        .filter(|r| r.has_value(NEAREST_LANDMARK_TRAVEL_TIME))
        .collect::<Vec<_>>();
    assert_eq!(enriched.len(), 1);
    assert_eq!(enriched[0].get(NEAREST_LANDMARK_ADDRESS), Some("Route 9"));
    assert_eq!(enriched[0].number(NEAREST_LANDMARK_DISTANCE), Some(2.0));
    assert_eq!(enriched[0].number(NEAREST_LANDMARK_TRAVEL_TIME), Some(5.0));
}

#[tokio::test]
async fn records_with_landmark_data_are_not_candidates() {
    let dir = TempDir::new().unwrap();
    let mut store = seeded_store(&dir);
    for key in [key_for(ALBANY), key_for(GREENVILLE)] {
        let mut fields = landscout_common::Fields::new();
        fields.insert(NEAREST_LANDMARK_ADDRESS.into(), FieldValue::Text("Route 9".into()));
        fields.insert(NEAREST_LANDMARK_TRAVEL_TIME.into(), FieldValue::Number(4.0));
        store.merge(&key, &fields).unwrap();
    }
    let api = Arc::new(MockDistanceApi::new());
    let mut orch =
        EnrichmentOrchestrator::new(store).with_distance(adapter(api.clone(), 3), Duration::ZERO);

    let report = orch.run_distance_enrichment().await.unwrap();

    assert_eq!(report.candidates, 0);
    assert_eq!(api.nearby_calls(), 0);
}
