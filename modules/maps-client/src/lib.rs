pub mod error;
pub mod types;

pub use error::{MapsError, Result};
pub use types::{
    DistanceMatrixResponse, LatLng, MatrixElement, NearbySearch, NearbySearchResponse, Place,
    TextValue, STATUS_OK,
};

use std::time::Duration;

use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://maps.googleapis.com/maps/api";

pub struct MapsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl MapsClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Client pointed at a different API root (a proxy or a local fake).
    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(MapsError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Places nearby search. Results are ordered by prominence within the radius.
    pub async fn nearby_search(&self, search: &NearbySearch) -> Result<NearbySearchResponse> {
        tracing::debug!(
            location = %search.location.to_param(),
            keyword = %search.keyword,
            radius_m = search.radius_m,
            "maps: nearby search"
        );

        let radius = search.radius_m.to_string();
        let location = search.location.to_param();
        let mut params: Vec<(&str, &str)> = vec![
            ("location", &location),
            ("radius", &radius),
            ("keyword", &search.keyword),
        ];
        if let Some(ref place_type) = search.place_type {
            params.push(("type", place_type));
        }

        self.get_json("/place/nearbysearch/json", &params).await
    }

    /// Driving Distance Matrix for a single origin/destination pair,
    /// imperial units.
    pub async fn driving_distance(
        &self,
        origin: LatLng,
        destination: LatLng,
    ) -> Result<DistanceMatrixResponse> {
        tracing::debug!(
            origin = %origin.to_param(),
            destination = %destination.to_param(),
            "maps: distance matrix"
        );

        let origins = origin.to_param();
        let destinations = destination.to_param();
        let params = [
            ("origins", origins.as_str()),
            ("destinations", destinations.as_str()),
            ("mode", "driving"),
            ("units", "imperial"),
        ];

        self.get_json("/distancematrix/json", &params).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MapsError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            MapsClient::new("  ".to_string()),
            Err(MapsError::MissingApiKey)
        ));
    }

    #[test]
    fn transport_and_parse_errors_are_transient() {
        assert!(MapsError::Network("reset".into()).is_transient());
        assert!(MapsError::Parse("eof".into()).is_transient());
        assert!(!MapsError::MissingApiKey.is_transient());
        assert!(!MapsError::Api {
            status: 403,
            message: String::new()
        }
        .is_transient());
    }
}
