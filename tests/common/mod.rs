//! Utilidades compartidas por los tests de integración

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use smile_towing::config::EnvironmentConfig;
use smile_towing::models::GeoPoint;
use smile_towing::services::{GeocodeResult, Geocoder};
use smile_towing::utils::errors::{AppError, AppResult};
use smile_towing::{create_app_router, AppState};

pub const PASSWORD: &str = "password123";

/// Geocodificador fijo: solo conoce "1 Market St"
pub struct FakeGeocoder;

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> AppResult<GeocodeResult> {
        if address.contains("1 Market St") {
            Ok(GeocodeResult {
                location: GeoPoint::new(37.7941, -122.3951),
                formatted_address: Some("1 Market St, San Francisco, CA 94105".to_string()),
            })
        } else {
            Err(AppError::BadRequest(
                "We couldn't find that address. Please check it and try again.".to_string(),
            ))
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct Account {
    pub id: Uuid,
    pub token: String,
    pub email: String,
}

pub fn test_config() -> EnvironmentConfig {
    EnvironmentConfig {
        bcrypt_cost: 4,
        expose_reset_tokens: true,
        upload_dir: std::env::temp_dir().join(format!("smile-towing-it-{}", Uuid::new_v4())),
        ..EnvironmentConfig::default()
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(test_config())
}

pub fn create_test_app_with(config: EnvironmentConfig) -> TestApp {
    let state = AppState::in_memory(config, Some(Arc::new(FakeGeocoder)));
    TestApp {
        router: create_app_router(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Registro por el portal indicado (`customer` o `driver`)
    pub async fn sign_up(&self, portal: &str, first_name: &str) -> Account {
        let email = format!("{}.{}@gmail.com", first_name.to_lowercase(), Uuid::new_v4());
        let (status, body) = self
            .request(
                Method::POST,
                &format!("/api/auth/{}/signup", portal),
                None,
                Some(json!({
                    "first_name": first_name,
                    "last_name": "Doe",
                    "email": email,
                    "password": PASSWORD,
                    "confirm_password": PASSWORD,
                    "accept_terms": true
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);

        Account {
            id: body["data"]["user"]["id"].as_str().unwrap().parse().unwrap(),
            token: body["data"]["token"].as_str().unwrap().to_string(),
            email,
        }
    }

    pub async fn customer(&self) -> Account {
        self.sign_up("customer", "Jane").await
    }

    /// Conductor en línea, listo para ver y aceptar trabajos
    pub async fn driver(&self) -> Account {
        let driver = self.offline_driver().await;
        let (status, body) = self
            .put("/api/driver/status", &driver.token, json!({ "is_online": true }))
            .await;
        assert_eq!(status, StatusCode::OK, "going online failed: {}", body);
        driver
    }

    pub async fn offline_driver(&self) -> Account {
        self.sign_up("driver", "John").await
    }
}

pub fn flatbed_request() -> Value {
    json!({
        "latitude": 37.7749,
        "longitude": -122.4194,
        "issue": "Flat tire",
        "truck_type": "Flatbed Tow Truck",
        "preference": "Immediate"
    })
}
