use serde::{Deserialize, Serialize};

/// Top-level `status` value for a successful Maps response.
pub const STATUS_OK: &str = "OK";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `lat,lng` as the query parameters expect it.
    pub fn to_param(self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

// --- Places nearby search ---

/// Parameters for a nearby search around one point.
#[derive(Debug, Clone)]
pub struct NearbySearch {
    pub location: LatLng,
    pub radius_m: u32,
    pub keyword: String,
    pub place_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearbySearchResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<Place>,
    pub error_message: Option<String>,
}

impl NearbySearchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Place {
    pub name: String,
    pub place_id: String,
    pub geometry: Geometry,
    pub vicinity: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

// --- Distance Matrix ---

#[derive(Debug, Clone, Deserialize)]
pub struct DistanceMatrixResponse {
    pub status: String,
    #[serde(default)]
    pub rows: Vec<MatrixRow>,
    pub error_message: Option<String>,
}

impl DistanceMatrixResponse {
    /// The single origin/destination element, when both the response and
    /// the element report OK.
    pub fn first_ok_element(&self) -> Option<&MatrixElement> {
        if self.status != STATUS_OK {
            return None;
        }
        let element = self.rows.first()?.elements.first()?;
        (element.status == STATUS_OK).then_some(element)
    }

    /// Status of the first element, for logging when it is not OK.
    pub fn element_status(&self) -> Option<&str> {
        self.rows
            .first()
            .and_then(|r| r.elements.first())
            .map(|e| e.status.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatrixRow {
    #[serde(default)]
    pub elements: Vec<MatrixElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatrixElement {
    pub status: String,
    pub distance: Option<TextValue>,
    pub duration: Option<TextValue>,
}

/// A measurement with its display text. `value` is meters for distances and
/// seconds for durations.
#[derive(Debug, Clone, Deserialize)]
pub struct TextValue {
    pub text: String,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nearby_search_payload() {
        let json = r#"{
            "status": "OK",
            "results": [{
                "name": "Walmart Supercenter",
                "place_id": "ChIJ123",
                "vicinity": "141 Washington Ave Ext, Albany",
                "geometry": {"location": {"lat": 42.68, "lng": -73.84}},
                "rating": 3.9
            }]
        }"#;
        let resp: NearbySearchResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_ok());
        assert_eq!(resp.results[0].geometry.location, LatLng::new(42.68, -73.84));
    }

    #[test]
    fn zero_results_has_no_places() {
        let resp: NearbySearchResponse =
            serde_json::from_str(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap();
        assert!(!resp.is_ok());
        assert!(resp.results.is_empty());
    }

    #[test]
    fn matrix_element_must_be_ok() {
        let json = r#"{
            "status": "OK",
            "rows": [{"elements": [{"status": "NOT_FOUND"}]}]
        }"#;
        let resp: DistanceMatrixResponse = serde_json::from_str(json).unwrap();
        assert!(resp.first_ok_element().is_none());
        assert_eq!(resp.element_status(), Some("NOT_FOUND"));
    }

    #[test]
    fn matrix_element_values() {
        let json = r#"{
            "status": "OK",
            "rows": [{"elements": [{
                "status": "OK",
                "distance": {"text": "5.0 mi", "value": 8047},
                "duration": {"text": "11 mins", "value": 660}
            }]}]
        }"#;
        let resp: DistanceMatrixResponse = serde_json::from_str(json).unwrap();
        let element = resp.first_ok_element().unwrap();
        assert_eq!(element.distance.as_ref().unwrap().value, 8047.0);
        assert_eq!(element.duration.as_ref().unwrap().value, 660.0);
    }
}
