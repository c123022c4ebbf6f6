//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::{MemoryStore, TowRequestRepository, UserRepository, VehicleRepository};
use crate::services::{
    Geocoder, LocalObjectStorage, MatchingService, ObjectStorage, RequestEventBus,
};
use crate::utils::errors::{AppError, AppResult};
use crate::utils::jwt::JwtConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub jwt: JwtConfig,
    pub users: Arc<dyn UserRepository>,
    pub vehicles: Arc<dyn VehicleRepository>,
    pub tow_requests: Arc<dyn TowRequestRepository>,
    pub events: RequestEventBus,
    pub matching: MatchingService,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    pub fn new(
        config: EnvironmentConfig,
        users: Arc<dyn UserRepository>,
        vehicles: Arc<dyn VehicleRepository>,
        tow_requests: Arc<dyn TowRequestRepository>,
        events: RequestEventBus,
        geocoder: Option<Arc<dyn Geocoder>>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let matching =
            MatchingService::new(tow_requests.clone(), events.clone(), config.match_timeout());

        Self {
            jwt: JwtConfig::from(&config),
            config: Arc::new(config),
            users,
            vehicles,
            tow_requests,
            events,
            matching,
            geocoder,
            storage,
        }
    }

    /// Estado completo sobre `MemoryStore`, con almacenamiento local de imágenes
    pub fn in_memory(config: EnvironmentConfig, geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(LocalObjectStorage::new(
            config.upload_dir.clone(),
            config.public_base_url.clone(),
        ));

        Self::new(
            config,
            store.clone(),
            store.clone(),
            store,
            RequestEventBus::new(),
            geocoder,
            storage,
        )
    }

    pub fn geocoder(&self) -> AppResult<&dyn Geocoder> {
        require_geocoder(self.geocoder.as_ref())
    }
}

/// El geocodificador es opcional: sin `MAPBOX_TOKEN` las direcciones no se resuelven
pub fn require_geocoder(geocoder: Option<&Arc<dyn Geocoder>>) -> AppResult<&dyn Geocoder> {
    geocoder.map(|g| g.as_ref()).ok_or_else(|| {
        AppError::ServiceUnavailable(
            "Address lookup is not configured. Please share your location instead.".to_string(),
        )
    })
}
