// Nearest-landmark enrichment: the closest place matching a keyword, and the
// driving distance and time to it.

use std::fmt;

use async_trait::async_trait;
use landscout_common::coercion::round_to;
use landscout_common::config::DistanceConfig;
use landscout_common::{
    FieldValue, Fields, IdentityKey, NEAREST_LANDMARK_ADDRESS, NEAREST_LANDMARK_DISTANCE,
    NEAREST_LANDMARK_TRAVEL_TIME,
};
use maps_client::{
    DistanceMatrixResponse, LatLng, MapsClient, MapsError, NearbySearch, NearbySearchResponse,
};
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

const METERS_PER_MILE: f64 = 1609.34;

/// The two Maps calls the adapter needs.
#[async_trait]
pub trait DistanceApi: Send + Sync {
    async fn nearby_search(&self, search: &NearbySearch) -> Result<NearbySearchResponse, MapsError>;

    async fn driving_distance(
        &self,
        origin: LatLng,
        destination: LatLng,
    ) -> Result<DistanceMatrixResponse, MapsError>;
}

#[async_trait]
impl<T: DistanceApi + ?Sized> DistanceApi for std::sync::Arc<T> {
    async fn nearby_search(&self, search: &NearbySearch) -> Result<NearbySearchResponse, MapsError> {
        (**self).nearby_search(search).await
    }

    async fn driving_distance(
        &self,
        origin: LatLng,
        destination: LatLng,
    ) -> Result<DistanceMatrixResponse, MapsError> {
        (**self).driving_distance(origin, destination).await
    }
}

#[async_trait]
impl DistanceApi for MapsClient {
    async fn nearby_search(&self, search: &NearbySearch) -> Result<NearbySearchResponse, MapsError> {
        MapsClient::nearby_search(self, search).await
    }

    async fn driving_distance(
        &self,
        origin: LatLng,
        destination: LatLng,
    ) -> Result<DistanceMatrixResponse, MapsError> {
        MapsClient::driving_distance(self, origin, destination).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearestLandmark {
    pub name: String,
    pub address: String,
    pub distance_miles: f64,
    pub travel_minutes: f64,
}

impl NearestLandmark {
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            NEAREST_LANDMARK_ADDRESS.to_string(),
            FieldValue::Text(self.address),
        );
        fields.insert(
            NEAREST_LANDMARK_DISTANCE.to_string(),
            FieldValue::Number(self.distance_miles),
        );
        fields.insert(
            NEAREST_LANDMARK_TRAVEL_TIME.to_string(),
            FieldValue::Number(self.travel_minutes),
        );
        fields
    }
}

impl fmt::Display for NearestLandmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.2} mi, {:.2} min)",
            self.address, self.distance_miles, self.travel_minutes
        )
    }
}

pub fn meters_to_miles(meters: f64) -> f64 {
    round_to(meters / METERS_PER_MILE, 2)
}

pub fn seconds_to_minutes(seconds: f64) -> f64 {
    round_to(seconds / 60.0, 2)
}

pub struct DistanceAdapter {
    api: Box<dyn DistanceApi>,
    retry: RetryPolicy,
    keyword: String,
    place_type: Option<String>,
    search_radius_m: u32,
}

impl DistanceAdapter {
    pub fn new(api: Box<dyn DistanceApi>, config: &DistanceConfig) -> Self {
        Self {
            api,
            retry: RetryPolicy::new(config.max_attempts, config.backoff_base()),
            keyword: config.keyword.clone(),
            place_type: Some(config.place_type.clone()).filter(|t| !t.is_empty()),
            search_radius_m: config.search_radius_m,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Nearest landmark for `key`, or `None` on any failure. Failures are
    /// logged, never returned.
    pub async fn nearest(&self, key: &IdentityKey) -> Option<NearestLandmark> {
        let (lat, lng) = key.coordinates();
        let origin = LatLng::new(lat, lng);

        let search = NearbySearch {
            location: origin,
            radius_m: self.search_radius_m,
            keyword: self.keyword.clone(),
            place_type: self.place_type.clone(),
        };
        let places = match self
            .retry
            .run("nearby_search", |_| self.api.nearby_search(&search))
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(%key, error = %e, "nearby search failed");
                return None;
            }
        };

        if !places.is_ok() {
            warn!(
                %key,
                status = %places.status,
                message = places.error_message.as_deref().unwrap_or(""),
                "nearby search returned non-OK status"
            );
            return None;
        }
        let Some(place) = places.results.into_iter().next() else {
            warn!(%key, keyword = %self.keyword, "no landmark found within search radius");
            return None;
        };
        debug!(%key, place = %place.name, "nearest landmark candidate");

        let destination = place.geometry.location;
        let matrix = match self
            .retry
            .run("distance_matrix", |_| {
                self.api.driving_distance(origin, destination)
            })
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(%key, error = %e, "distance matrix failed");
                return None;
            }
        };

        let Some(element) = matrix.first_ok_element() else {
            warn!(
                %key,
                status = %matrix.status,
                element_status = matrix.element_status().unwrap_or("<none>"),
                "distance matrix returned no route"
            );
            return None;
        };
        let (Some(distance), Some(duration)) = (&element.distance, &element.duration) else {
            warn!(%key, "distance matrix element missing distance or duration");
            return None;
        };

        let landmark = NearestLandmark {
            address: place.vicinity.clone().unwrap_or_else(|| place.name.clone()),
            name: place.name,
            distance_miles: meters_to_miles(distance.value),
            travel_minutes: seconds_to_minutes(duration.value),
        };
        info!(%key, landmark = %landmark, "nearest landmark resolved");
        Some(landmark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversions_round_to_two_places() {
        assert_eq!(meters_to_miles(8046.7), 5.0);
        assert_eq!(meters_to_miles(1000.0), 0.62);
        assert_eq!(seconds_to_minutes(660.0), 11.0);
        assert_eq!(seconds_to_minutes(125.0), 2.08);
    }

    #[test]
    fn landmark_fields() {
        let fields = NearestLandmark {
            name: "Walmart Supercenter".into(),
            address: "141 Washington Ave Ext, Albany".into(),
            distance_miles: 4.27,
            travel_minutes: 9.5,
        }
        .into_fields();
        assert_eq!(
            fields[NEAREST_LANDMARK_ADDRESS],
            FieldValue::Text("141 Washington Ave Ext, Albany".into())
        );
        assert_eq!(fields[NEAREST_LANDMARK_DISTANCE], FieldValue::Number(4.27));
        assert_eq!(fields[NEAREST_LANDMARK_TRAVEL_TIME], FieldValue::Number(9.5));
    }
}
