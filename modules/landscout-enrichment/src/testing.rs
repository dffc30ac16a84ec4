// Test mocks for the enrichment pipeline.
//
// Three mocks matching the three external seams:
// - MockCensusSource (CensusSource): scripted extracts per coordinate
// - MockDistanceApi (DistanceApi): scripted Maps responses with call counts
// - MockEngine (SessionEngine): RenderedSession over canned pages
//
// Plus builders for census artifacts, report pages and Maps payloads.
// Wrap a mock in `Arc` to keep a handle on its counters after handing it over.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use landscout_common::metrics::required_fields;
use landscout_common::{
    BaseMetric, FieldValue, Fields, IdentityKey, RadiusBand, BASE_METRICS,
};
use maps_client::{
    DistanceMatrixResponse, LatLng, MapsError, NearbySearch, NearbySearchResponse,
};
use serde_json::json;

use crate::census::{
    BrowserSession, CensusExtract, CensusSource, PageRenderer, RenderedSession, SessionEngine,
};
use crate::distance::DistanceApi;
use crate::error::{EnrichError, Result};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Albany, NY.
pub const ALBANY: (f64, f64) = (42.6526, -73.7562);
/// Greenville, SC.
pub const GREENVILLE: (f64, f64) = (34.8526, -82.394);
/// Tampa, FL.
pub const TAMPA: (f64, f64) = (27.9506, -82.4572);

pub fn key_for((lat, lng): (f64, f64)) -> IdentityKey {
    IdentityKey::from_coordinates(lat, lng).expect("finite test coordinates")
}

// ---------------------------------------------------------------------------
// Census values
// ---------------------------------------------------------------------------

/// Every required `{metric}_{radius}` field set to 1.
pub fn complete_census_fields() -> Fields {
    required_fields()
        .into_iter()
        .map(|f| (f, FieldValue::Number(1.0)))
        .collect()
}

pub fn extract_of(fields: Fields) -> CensusExtract {
    CensusExtract {
        fields,
        skipped: Vec::new(),
    }
}

/// Census artifact CSV with one column per base metric plus
/// `MobileHomesPerK`. `cell` decides each metric/band value; `None` leaves
/// the cell blank.
pub fn census_artifact<F>(cell: F) -> String
where
    F: Fn(&BaseMetric, RadiusBand) -> Option<String>,
{
    let mut header: Vec<&str> = BASE_METRICS.iter().map(|m| m.name).collect();
    header.push("MobileHomesPerK");
    let mut body = header.join(",");
    body.push('\n');

    for band in RadiusBand::ALL {
        let mut row: Vec<String> = BASE_METRICS
            .iter()
            .map(|m| cell(m, band).unwrap_or_default())
            .collect();
        row.push("42.5".to_string());
        body.push_str(&row.join(","));
        body.push('\n');
    }
    body
}

/// Artifact with every metric populated.
pub fn full_census_artifact() -> String {
    census_artifact(|_, band| Some((band.miles() * 1000).to_string()))
}

/// Artifact where the column for `metric` is absent entirely.
pub fn census_artifact_without_column(metric: &str) -> String {
    let full = full_census_artifact();
    let mut lines = full.lines();
    let header: Vec<&str> = lines.next().unwrap_or_default().split(',').collect();
    let dropped = header.iter().position(|h| *h == metric);

    let strip = |line: &str| -> String {
        line.split(',')
            .enumerate()
            .filter(|(i, _)| Some(*i) != dropped)
            .map(|(_, v)| v)
            .collect::<Vec<_>>()
            .join(",")
    };

    let mut body = strip(&header.join(","));
    body.push('\n');
    for line in lines {
        body.push_str(&strip(line));
        body.push('\n');
    }
    body
}

// ---------------------------------------------------------------------------
// MockCensusSource
// ---------------------------------------------------------------------------

/// Scripted census replies per coordinate. Each call for a key takes the
/// next reply in its script; the last reply repeats. `None` in a script is a
/// transient failure. Unregistered keys always fail.
pub struct MockCensusSource {
    scripts: HashMap<IdentityKey, Vec<Option<Fields>>>,
    calls: Mutex<HashMap<IdentityKey, u32>>,
}

impl MockCensusSource {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn on(mut self, key: IdentityKey, fields: Fields) -> Self {
        self.scripts.insert(key, vec![Some(fields)]);
        self
    }

    pub fn failing(mut self, key: IdentityKey) -> Self {
        self.scripts.insert(key, vec![None]);
        self
    }

    pub fn on_sequence(mut self, key: IdentityKey, replies: Vec<Option<Fields>>) -> Self {
        self.scripts.insert(key, replies);
        self
    }

    pub fn calls(&self, key: &IdentityKey) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

impl Default for MockCensusSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CensusSource for MockCensusSource {
    async fn fetch(&self, key: &IdentityKey) -> Result<CensusExtract> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(key.clone()).or_default();
            *n += 1;
            *n as usize - 1
        };

        let reply = self
            .scripts
            .get(key)
            .and_then(|script| script.get(call.min(script.len().saturating_sub(1))))
            .cloned()
            .flatten();

        match reply {
            Some(fields) => Ok(extract_of(fields)),
            None => Err(EnrichError::TransientNetwork(format!(
                "MockCensusSource: no reply for {key}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockDistanceApi
// ---------------------------------------------------------------------------

/// One scripted Maps reply.
#[derive(Debug, Clone)]
pub enum MapsReply {
    Json(serde_json::Value),
    NetworkError,
    ParseError,
    Forbidden,
}

impl MapsReply {
    fn resolve<T: serde::de::DeserializeOwned>(&self) -> std::result::Result<T, MapsError> {
        match self {
            MapsReply::Json(value) => Ok(serde_json::from_value(value.clone())?),
            MapsReply::NetworkError => Err(MapsError::Network("connection reset by peer".into())),
            MapsReply::ParseError => Err(MapsError::Parse("EOF while parsing a value".into())),
            MapsReply::Forbidden => Err(MapsError::Api {
                status: 403,
                message: "forbidden".into(),
            }),
        }
    }
}

/// Scripted Maps API. Replies are consumed in order; the last one repeats.
pub struct MockDistanceApi {
    nearby: Vec<MapsReply>,
    matrix: Vec<MapsReply>,
    nearby_calls: AtomicU32,
    matrix_calls: AtomicU32,
}

impl MockDistanceApi {
    pub fn new() -> Self {
        Self {
            nearby: vec![MapsReply::Json(nearby_empty())],
            matrix: vec![MapsReply::Json(matrix_no_route())],
            nearby_calls: AtomicU32::new(0),
            matrix_calls: AtomicU32::new(0),
        }
    }

    pub fn nearby(mut self, replies: Vec<MapsReply>) -> Self {
        self.nearby = replies;
        self
    }

    pub fn matrix(mut self, replies: Vec<MapsReply>) -> Self {
        self.matrix = replies;
        self
    }

    pub fn nearby_calls(&self) -> u32 {
        self.nearby_calls.load(Ordering::SeqCst)
    }

    pub fn matrix_calls(&self) -> u32 {
        self.matrix_calls.load(Ordering::SeqCst)
    }

    fn pick(replies: &[MapsReply], call: u32) -> &MapsReply {
        let idx = (call as usize).min(replies.len().saturating_sub(1));
        &replies[idx]
    }
}

impl Default for MockDistanceApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DistanceApi for MockDistanceApi {
    async fn nearby_search(
        &self,
        _search: &NearbySearch,
    ) -> std::result::Result<NearbySearchResponse, MapsError> {
        let call = self.nearby_calls.fetch_add(1, Ordering::SeqCst);
        Self::pick(&self.nearby, call).resolve()
    }

    async fn driving_distance(
        &self,
        _origin: LatLng,
        _destination: LatLng,
    ) -> std::result::Result<DistanceMatrixResponse, MapsError> {
        let call = self.matrix_calls.fetch_add(1, Ordering::SeqCst);
        Self::pick(&self.matrix, call).resolve()
    }
}

pub fn nearby_found(name: &str, vicinity: &str, (lat, lng): (f64, f64)) -> serde_json::Value {
    json!({
        "status": "OK",
        "results": [{
            "name": name,
            "place_id": format!("place-{name}"),
            "vicinity": vicinity,
            "geometry": {"location": {"lat": lat, "lng": lng}}
        }]
    })
}

pub fn nearby_empty() -> serde_json::Value {
    json!({"status": "ZERO_RESULTS", "results": []})
}

pub fn nearby_denied() -> serde_json::Value {
    json!({"status": "REQUEST_DENIED", "results": [], "error_message": "The provided API key is invalid."})
}

pub fn matrix_route(meters: f64, seconds: f64) -> serde_json::Value {
    json!({
        "status": "OK",
        "rows": [{"elements": [{
            "status": "OK",
            "distance": {"text": "", "value": meters},
            "duration": {"text": "", "value": seconds}
        }]}]
    })
}

pub fn matrix_no_route() -> serde_json::Value {
    json!({"status": "OK", "rows": [{"elements": [{"status": "ZERO_RESULTS"}]}]})
}

// ---------------------------------------------------------------------------
// MockEngine
// ---------------------------------------------------------------------------

/// Report form as served by the census endpoint.
pub fn report_form_page() -> String {
    r#"<html><body>
<form name="capsform" action="/cgi-bin/broker" method="get">
  <input type="hidden" name="_PROGRAM" value="apps.capsACS.sas">
  <input type="text" name="latitude">
  <input type="text" name="longitude">
  <input type="text" name="radii">
  <input type="submit" value="Generate Report">
</form>
</body></html>"#
        .to_string()
}

/// Results page linking the artifact at `href`.
pub fn results_page(href: &str) -> String {
    format!(
        r#"<html><body><h2>Report ready</h2>
<a href="/tmp/report.html">View HTML report</a>
<a href="{href}">CSV file</a>
</body></html>"#
    )
}

/// Session engine over canned pages. Pages are matched by URL prefix, in
/// registration order; downloads by exact URL.
pub struct MockEngine {
    name: String,
    available: bool,
    pages: Arc<Vec<(String, String)>>,
    downloads: Arc<HashMap<String, String>>,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    poll_interval: Duration,
}

impl MockEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            pages: Arc::new(Vec::new()),
            downloads: Arc::new(HashMap::new()),
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// Engine whose `open` always fails.
    pub fn unavailable(name: &str) -> Self {
        Self {
            available: false,
            ..Self::new(name)
        }
    }

    pub fn on_page(mut self, url_prefix: &str, html: &str) -> Self {
        Arc::make_mut(&mut self.pages).push((url_prefix.to_string(), html.to_string()));
        self
    }

    pub fn on_download(mut self, url: &str, body: &str) -> Self {
        Arc::make_mut(&mut self.downloads).insert(url.to_string(), body.to_string());
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionEngine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(EnrichError::Other(anyhow::anyhow!(
                "MockEngine {}: not available",
                self.name
            )));
        }
        let renderer = MockRenderer {
            pages: self.pages.clone(),
            downloads: self.downloads.clone(),
            closes: self.closes.clone(),
        };
        Ok(Box::new(
            RenderedSession::new(&self.name, renderer).with_poll_interval(self.poll_interval),
        ))
    }
}

struct MockRenderer {
    pages: Arc<Vec<(String, String)>>,
    downloads: Arc<HashMap<String, String>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        self.pages
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, html)| html.clone())
            .ok_or_else(|| EnrichError::TransientNetwork(format!("MockEngine: no page for {url}")))
    }

    async fn download(&self, url: &str) -> Result<String> {
        self.downloads
            .get(url)
            .cloned()
            .ok_or_else(|| EnrichError::TransientNetwork(format!("MockEngine: no download for {url}")))
    }

    async fn shutdown(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
