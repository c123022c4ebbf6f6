//! Geocodificación directa (dirección → coordenadas) con Mapbox

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::models::GeoPoint;
use crate::utils::errors::{AppError, AppResult};

const MAPBOX_FORWARD_URL: &str = "https://api.mapbox.com/search/geocode/v6/forward";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub location: GeoPoint,
    pub formatted_address: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Devuelve el resultado más relevante; `BadRequest` si no hay ninguno
    async fn geocode(&self, address: &str) -> AppResult<GeocodeResult>;
}

#[derive(Debug, Deserialize)]
struct MapboxGeocodingResponse {
    features: Vec<MapboxFeature>,
}

#[derive(Debug, Deserialize)]
struct MapboxFeature {
    geometry: MapboxGeometry,
    properties: MapboxProperties,
}

#[derive(Debug, Deserialize)]
struct MapboxGeometry {
    coordinates: Vec<f64>, // [longitude, latitude]
}

#[derive(Debug, Deserialize)]
struct MapboxProperties {
    full_address: Option<String>,
    name: Option<String>,
    place_name: Option<String>,
}

impl MapboxGeocodingResponse {
    fn first_result(self) -> Option<GeocodeResult> {
        let feature = self.features.into_iter().next()?;
        let (longitude, latitude) = match feature.geometry.coordinates.as_slice() {
            [longitude, latitude, ..] => (*longitude, *latitude),
            _ => return None,
        };
        let properties = feature.properties;
        Some(GeocodeResult {
            location: GeoPoint::new(latitude, longitude),
            formatted_address: properties
                .full_address
                .or(properties.place_name)
                .or(properties.name),
        })
    }
}

pub struct MapboxGeocoder {
    token: String,
    client: reqwest::Client,
}

impl MapboxGeocoder {
    pub fn new(token: String) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { token, client })
    }
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    async fn geocode(&self, address: &str) -> AppResult<GeocodeResult> {
        info!("🗺️ Geocoding address: {}", address);

        let url = format!(
            "{}?q={}&access_token={}&limit=1",
            MAPBOX_FORWARD_URL,
            urlencoding::encode(address),
            self.token
        );

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "SmileTowing/1.0")
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Geocoding request failed: {}", e)))?;

        let status = response.status();
        debug!("📡 Geocoding response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Geocoding failed with status {}: {}", status, body);
            return Err(AppError::ExternalApi(format!("Geocoding failed: {}", status)));
        }

        let parsed: MapboxGeocodingResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Invalid geocoding response: {}", e)))?;

        match parsed.first_result() {
            Some(result) => {
                info!(
                    "✅ Geocoding successful: {} -> ({}, {})",
                    address, result.location.latitude, result.location.longitude
                );
                Ok(result)
            }
            None => {
                warn!("⚠️ No coordinates found for address: {}", address);
                Err(AppError::BadRequest(
                    "We couldn't find that address. Please check it and try again.".to_string(),
                ))
            }
        }
    }
}
