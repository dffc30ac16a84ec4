use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::coercion::{coerce_number, format_number};
use crate::error::StockNumberError;

// --- Well-known columns ---

pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";
pub const STOCK_NUMBER: &str = "StockNumber";
pub const MARKET: &str = "Market";
pub const INGEST_DATE: &str = "date";

pub const NEAREST_LANDMARK_ADDRESS: &str = "NearestLandmarkAddress";
pub const NEAREST_LANDMARK_DISTANCE: &str = "NearestLandmarkDistance";
pub const NEAREST_LANDMARK_TRAVEL_TIME: &str = "NearestLandmarkTravelTime";

/// Columns every ingested batch must carry.
pub const REQUIRED_BATCH_COLUMNS: &[&str] = &[LATITUDE, LONGITUDE];

// --- Identity ---

/// Coordinate pair used to detect duplicate listings.
///
/// Both halves are the shortest decimal rendering of the parsed coordinate,
/// so `40.10` and `40.1` are the same key but two points a metre apart are
/// not. There is no distance tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    latitude: String,
    longitude: String,
}

impl IdentityKey {
    /// Build a key from raw cell text. `None` when either coordinate is
    /// missing or not a number.
    pub fn from_cells(latitude: &str, longitude: &str) -> Option<Self> {
        let lat = canonical_coordinate(latitude)?;
        let lng = canonical_coordinate(longitude)?;
        Some(Self {
            latitude: lat,
            longitude: lng,
        })
    }

    pub fn from_coordinates(latitude: f64, longitude: f64) -> Option<Self> {
        Some(Self {
            latitude: canonical(latitude)?,
            longitude: canonical(longitude)?,
        })
    }

    pub fn latitude(&self) -> &str {
        &self.latitude
    }

    pub fn longitude(&self) -> &str {
        &self.longitude
    }

    /// Parsed coordinates. Construction guarantees both parse.
    pub fn coordinates(&self) -> (f64, f64) {
        (
            self.latitude.parse().unwrap_or(f64::NAN),
            self.longitude.parse().unwrap_or(f64::NAN),
        )
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.latitude, self.longitude)
    }
}

fn canonical_coordinate(raw: &str) -> Option<String> {
    canonical(raw.trim().parse().ok()?)
}

/// Shortest decimal text, with `-0` folded into `0`.
fn canonical(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let value = if value == 0.0 { 0.0 } else { value };
    Some(value.to_string())
}

// --- StockNumber ---

fn stock_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9]+)-(\d{5})$").expect("valid regex"))
}

/// Largest sequence a five-digit stock number can carry.
pub const MAX_SEQUENCE: u32 = 99_999;

/// Stable human-readable listing identifier, `REGION-NNNNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StockNumber {
    region: String,
    sequence: u32,
}

impl StockNumber {
    pub fn new(region: &str, sequence: u32) -> Result<Self, StockNumberError> {
        if region.is_empty() || !region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StockNumberError::InvalidRegion(region.to_string()));
        }
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(StockNumberError::SequenceOverflow(sequence));
        }
        Ok(Self {
            region: region.to_string(),
            sequence,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl FromStr for StockNumber {
    type Err = StockNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = stock_number_re()
            .captures(s.trim())
            .ok_or_else(|| StockNumberError::Malformed(s.to_string()))?;
        let sequence: u32 = caps[2]
            .parse()
            .map_err(|_| StockNumberError::Malformed(s.to_string()))?;
        Self::new(&caps[1], sequence).map_err(|_| StockNumberError::Malformed(s.to_string()))
    }
}

impl TryFrom<String> for StockNumber {
    type Error = StockNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StockNumber> for String {
    fn from(value: StockNumber) -> Self {
        value.to_string()
    }
}

impl fmt::Display for StockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:05}", self.region, self.sequence)
    }
}

// --- Market ---

/// A labelled ingestion region. `code` becomes the stock number prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Market {
    pub name: String,
    pub code: String,
}

impl Market {
    pub fn new(name: &str, code: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
        }
    }
}

// --- Field values ---

/// A value written into a record by ingestion or enrichment.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Cell text, or `None` for a null.
    pub fn to_cell(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Number(n) => Some(format_number(*n)),
            FieldValue::Text(s) if s.trim().is_empty() => None,
            FieldValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Number)
    }
}

/// Ordered field updates produced by one enrichment fetch.
pub type Fields = BTreeMap<String, FieldValue>;

// --- Record ---

/// One property listing. Columns are open-ended; a missing key and an empty
/// cell both mean null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    cells: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(column, cell)` pairs. Blank cells are dropped.
    pub fn from_cells<I, K, V>(cells: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::new();
        for (k, v) in cells {
            record.set_cell(k.into(), v.into());
        }
        record
    }

    /// Non-blank cell text.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.cells.get(field).map(String::as_str)
    }

    /// Cell coerced to a number.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(coerce_number)
    }

    pub fn has_value(&self, field: &str) -> bool {
        self.cells.contains_key(field)
    }

    pub fn set(&mut self, field: &str, value: FieldValue) {
        match value.to_cell() {
            Some(cell) => {
                self.cells.insert(field.to_string(), cell);
            }
            None => {
                self.cells.remove(field);
            }
        }
    }

    fn set_cell(&mut self, field: String, cell: String) {
        if cell.trim().is_empty() {
            self.cells.remove(&field);
        } else {
            self.cells.insert(field, cell);
        }
    }

    pub fn identity_key(&self) -> Option<IdentityKey> {
        IdentityKey::from_cells(self.get(LATITUDE)?, self.get(LONGITUDE)?)
    }

    /// Parsed stock number, if the cell is present and well formed.
    pub fn stock_number(&self) -> Option<StockNumber> {
        self.get(STOCK_NUMBER)?.parse().ok()
    }

    pub fn set_stock_number(&mut self, stock_number: &StockNumber) {
        self.cells
            .insert(STOCK_NUMBER.to_string(), stock_number.to_string());
    }

    /// Columns holding a value.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Short label for logs: stock number when assigned, else the coordinate key.
    pub fn label(&self) -> String {
        if let Some(sn) = self.get(STOCK_NUMBER) {
            return sn.to_string();
        }
        self.identity_key()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "<no coordinates>".to_string())
    }
}
