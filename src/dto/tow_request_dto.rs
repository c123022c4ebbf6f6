use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{RequestPreference, TruckType};
use crate::utils::validation::validate_not_blank;

/// Nueva solicitud. La ubicación llega como coordenadas o como dirección.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTowRequestRequest {
    /// Id generado por el cliente (opcional)
    pub id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[validate(length(min = 1, max = 300, message = "Address cannot be empty."))]
    pub address: Option<String>,
    #[validate(length(max = 500, message = "Issue description is too long."))]
    pub issue: Option<String>,
    pub truck_type: Option<TruckType>,
    #[serde(default)]
    pub preference: RequestPreference,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AcceptJobRequest {
    #[validate(
        length(min = 1, max = 100, message = "ETA cannot be empty."),
        custom = "validate_not_blank"
    )]
    pub driver_eta: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DriverLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentQuery {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct TruckTypeResponse {
    pub name: &'static str,
    pub description: &'static str,
    pub price_range: &'static str,
}

impl From<TruckType> for TruckTypeResponse {
    fn from(truck_type: TruckType) -> Self {
        Self {
            name: truck_type.label(),
            description: truck_type.description(),
            price_range: truck_type.price_range(),
        }
    }
}
