use serde::Deserialize;
use validator::Validate;

use crate::utils::validation::validate_not_blank;

// Request para crear un vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(
        length(min = 1, max = 100, message = "Vehicle name is required."),
        custom = "validate_not_blank"
    )]
    pub name: String,
    #[validate(
        length(min = 1, max = 20, message = "License plate is required."),
        custom = "validate_not_blank"
    )]
    pub license_plate: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50, message = "Vehicle type is required."))]
    pub vehicle_type: String,
}

// Request para actualizar un vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[validate(
        length(min = 1, max = 100, message = "Vehicle name cannot be empty."),
        custom = "validate_not_blank"
    )]
    pub name: Option<String>,
    #[validate(
        length(min = 1, max = 20, message = "License plate cannot be empty."),
        custom = "validate_not_blank"
    )]
    pub license_plate: Option<String>,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50, message = "Vehicle type cannot be empty."))]
    pub vehicle_type: Option<String>,
}
