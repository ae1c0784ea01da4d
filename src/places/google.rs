//! Google Places web service lookup

use super::{LookupError, LookupSource};
use crate::config::PlacesSettings;
use crate::network::{ApiRequest, ApiResponse, HttpClient};
use crate::results::{GeoPoint, PlaceCandidate, PlaceDetails, Review};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const DETAIL_FIELDS: &str = "place_id,name,formatted_address,geometry,formatted_phone_number,\
website,rating,user_ratings_total,opening_hours,reviews,photos,url";

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    result: Option<RawPlace>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPlace {
    place_id: String,
    name: String,
    vicinity: Option<String>,
    formatted_address: Option<String>,
    types: Vec<String>,
    geometry: Option<RawGeometry>,
    rating: Option<f32>,
    user_ratings_total: Option<u32>,
    opening_hours: Option<RawHours>,
    formatted_phone_number: Option<String>,
    website: Option<String>,
    reviews: Vec<RawReview>,
    photos: Vec<RawPhoto>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    location: GeoPoint,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHours {
    open_now: Option<bool>,
    weekday_text: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawReview {
    author_name: String,
    text: String,
    rating: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawPhoto {
    photo_reference: String,
}

impl RawPlace {
    fn location(&self) -> Option<GeoPoint> {
        self.geometry.as_ref().map(|g| g.location)
    }

    fn open_now(&self) -> Option<bool> {
        self.opening_hours.as_ref().and_then(|h| h.open_now)
    }

    fn into_candidate(self) -> PlaceCandidate {
        let location = self.location();
        let open_now = self.open_now();
        PlaceCandidate {
            id: self.place_id,
            name: self.name,
            vicinity: self.vicinity.or(self.formatted_address).unwrap_or_default(),
            category_tags: self.types.into_iter().collect(),
            location,
            rating: self.rating,
            user_ratings_total: self.user_ratings_total,
            open_now,
        }
    }

    fn into_details(self) -> PlaceDetails {
        let location = self.location();
        let (open_now, opening_hours) = match self.opening_hours {
            Some(hours) => (hours.open_now, hours.weekday_text),
            None => (None, Vec::new()),
        };
        PlaceDetails {
            id: self.place_id,
            name: self.name,
            address: self.formatted_address.or(self.vicinity).unwrap_or_default(),
            location,
            phone: self.formatted_phone_number,
            website: self.website,
            rating: self.rating,
            user_ratings_total: self.user_ratings_total,
            open_now,
            opening_hours,
            reviews: self
                .reviews
                .into_iter()
                .map(|r| Review {
                    author: r.author_name,
                    text: r.text,
                    rating: r.rating,
                })
                .collect(),
            photos: self.photos.into_iter().map(|p| p.photo_reference).collect(),
            maps_url: self.url,
        }
    }
}

/// Places nearby search + details over the JSON web service
pub struct GooglePlaces {
    client: HttpClient,
    base_url: String,
    api_key: String,
    language: String,
}

impl GooglePlaces {
    pub fn new(client: HttpClient, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            language: "ja".to_string(),
        }
    }

    /// Build from settings; an API key is required
    pub fn from_settings(client: HttpClient, settings: &PlacesSettings) -> Result<Self, LookupError> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LookupError::MissingApiKey("places"))?;

        Ok(Self::new(client, &settings.base_url, api_key).with_language(&settings.language))
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Build the nearby search request
    pub fn nearby_request(&self, location: GeoPoint, radius_m: u32, keyword: &str) -> ApiRequest {
        ApiRequest::get(format!("{}/nearbysearch/json", self.base_url))
            .param("location", format!("{},{}", location.lat, location.lng))
            .param("radius", radius_m.to_string())
            .param("keyword", keyword)
            .param("type", "restaurant")
            .param("language", &self.language)
            .param("key", &self.api_key)
    }

    /// Build the details request
    pub fn details_request(&self, id: &str) -> ApiRequest {
        ApiRequest::get(format!("{}/details/json", self.base_url))
            .param("place_id", id)
            .param("fields", DETAIL_FIELDS)
            .param("language", &self.language)
            .param("key", &self.api_key)
    }

    /// Parse a nearby search response into candidates
    pub fn parse_nearby(&self, response: ApiResponse) -> Result<Vec<PlaceCandidate>, LookupError> {
        check_http(&response)?;
        let body: NearbyResponse = response
            .json()
            .map_err(|e| LookupError::Parse(e.to_string()))?;
        check_status(&body.status, body.error_message, None)?;

        Ok(body.results.into_iter().map(RawPlace::into_candidate).collect())
    }

    /// Parse a details response
    pub fn parse_details(&self, id: &str, response: ApiResponse) -> Result<PlaceDetails, LookupError> {
        check_http(&response)?;
        let body: DetailsResponse = response
            .json()
            .map_err(|e| LookupError::Parse(e.to_string()))?;
        check_status(&body.status, body.error_message, Some(id))?;

        body.result
            .map(RawPlace::into_details)
            .ok_or_else(|| LookupError::NotFound(id.to_string()))
    }
}

fn check_http(response: &ApiResponse) -> Result<(), LookupError> {
    if response.is_success() {
        return Ok(());
    }
    if response.is_rate_limited() {
        return Err(LookupError::RateLimited);
    }
    Err(match response.status {
        401 | 403 => LookupError::AccessDenied(format!("HTTP {}", response.status)),
        code => LookupError::Http(code),
    })
}

fn check_status(status: &str, message: Option<String>, id: Option<&str>) -> Result<(), LookupError> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" => Err(LookupError::RateLimited),
        "REQUEST_DENIED" => Err(LookupError::AccessDenied(message.unwrap_or_default())),
        "NOT_FOUND" => Err(LookupError::NotFound(id.unwrap_or_default().to_string())),
        other => Err(LookupError::Api {
            status: other.to_string(),
            message: message.unwrap_or_default(),
        }),
    }
}

#[async_trait]
impl LookupSource for GooglePlaces {
    fn name(&self) -> &str {
        "google_places"
    }

    async fn search(
        &self,
        location: GeoPoint,
        radius_m: u32,
        keyword: &str,
    ) -> Result<Vec<PlaceCandidate>, LookupError> {
        let request = self.nearby_request(location, radius_m, keyword);
        let response = self.client.execute(request).await?;
        let candidates = self.parse_nearby(response)?;
        debug!("Nearby search '{}' returned {} places", keyword, candidates.len());
        Ok(candidates)
    }

    async fn details(&self, id: &str) -> Result<PlaceDetails, LookupError> {
        let request = self.details_request(id);
        let response = self.client.execute(request).await?;
        self.parse_details(id, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn places(server: &MockServer) -> GooglePlaces {
        GooglePlaces::new(HttpClient::new().unwrap(), server.uri(), "test-key")
    }

    #[tokio::test]
    async fn test_nearby_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nearbysearch/json"))
            .and(query_param("keyword", "ramen"))
            .and(query_param("key", "test-key"))
            .and(query_param("location", "35.6812,139.7671"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "results": [
                    {
                        "place_id": "p1",
                        "name": "Menya Ichi",
                        "vicinity": "Chiyoda",
                        "types": ["restaurant", "food"],
                        "geometry": {"location": {"lat": 35.68, "lng": 139.76}},
                        "rating": 4.3,
                        "user_ratings_total": 210,
                        "opening_hours": {"open_now": true}
                    },
                    {"place_id": "p2", "name": "Menya Ni"}
                ]
            })))
            .mount(&server)
            .await;

        let results = places(&server)
            .search(GeoPoint::new(35.6812, 139.7671), 1500, "ramen")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "p1");
        assert!(results[0].category_tags.contains("food"));
        assert_eq!(results[0].location, Some(GeoPoint::new(35.68, 139.76)));
        assert_eq!(results[0].open_now, Some(true));
        assert_eq!(results[1].vicinity, "");
        assert!(results[1].location.is_none());
    }

    #[tokio::test]
    async fn test_zero_results() {
        let server = MockServer::start().await;
        Mock::given(path("/nearbysearch/json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "ZERO_RESULTS", "results": []})),
            )
            .mount(&server)
            .await;

        let results = places(&server)
            .search(GeoPoint::new(0.0, 0.0), 500, "ramen")
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_provider_status_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/nearbysearch/json"))
            .and(query_param("keyword", "denied"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid."
            })))
            .mount(&server)
            .await;
        Mock::given(path("/nearbysearch/json"))
            .and(query_param("keyword", "limited"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = places(&server);
        let origin = GeoPoint::new(35.0, 139.0);

        let err = source.search(origin, 500, "denied").await.unwrap_err();
        assert!(matches!(err, LookupError::AccessDenied(ref m) if m.contains("invalid")));

        let err = source.search(origin, 500, "limited").await.unwrap_err();
        assert!(matches!(err, LookupError::RateLimited));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(path("/nearbysearch/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = places(&server)
            .search(GeoPoint::new(35.0, 139.0), 500, "ramen")
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Parse(_)));
    }

    #[tokio::test]
    async fn test_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/details/json"))
            .and(query_param("place_id", "p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "result": {
                    "place_id": "p1",
                    "name": "Menya Ichi",
                    "formatted_address": "1-1 Marunouchi, Chiyoda",
                    "formatted_phone_number": "03-0000-0000",
                    "opening_hours": {"open_now": false, "weekday_text": ["Monday: 11:00-22:00"]},
                    "reviews": [
                        {"author_name": "A", "text": "Rich tonkotsu broth", "rating": 5},
                        {"author_name": "B", "text": "  ", "rating": 3}
                    ],
                    "photos": [{"photo_reference": "ref-1"}],
                    "url": "https://maps.google.com/?cid=1"
                }
            })))
            .mount(&server)
            .await;

        let details = places(&server).details("p1").await.unwrap();
        assert_eq!(details.address, "1-1 Marunouchi, Chiyoda");
        assert_eq!(details.open_now, Some(false));
        assert_eq!(details.opening_hours.len(), 1);
        assert_eq!(details.reviews.len(), 2);
        assert_eq!(details.review_text(), "Rich tonkotsu broth");
        assert_eq!(details.photos, vec!["ref-1"]);
    }

    #[tokio::test]
    async fn test_details_not_found() {
        let server = MockServer::start().await;
        Mock::given(path("/details/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "NOT_FOUND"})))
            .mount(&server)
            .await;

        let err = places(&server).details("gone").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound(ref id) if id == "gone"));
    }

    #[test]
    fn test_from_settings_requires_key() {
        let settings = PlacesSettings::default();
        let result = GooglePlaces::from_settings(HttpClient::new().unwrap(), &settings);
        assert!(matches!(result, Err(LookupError::MissingApiKey("places"))));
    }
}
