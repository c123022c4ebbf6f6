//! Modelo de Vehicle
//!
//! Vehículos registrados por un usuario (sub-colección de su perfil).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Vehicle principal - mapea exactamente a la tabla vehicles
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub license_plate: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(owner_id: Uuid, name: String, license_plate: String, vehicle_type: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            license_plate: normalize_plate(&license_plate),
            vehicle_type,
            created_at: Utc::now(),
        }
    }
}

/// Matrícula en mayúsculas y sin espacios sobrantes
pub fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_is_normalized() {
        let vehicle = Vehicle::new(
            Uuid::new_v4(),
            "Civic".to_string(),
            "  abc 123 ".to_string(),
            "Sedan".to_string(),
        );
        assert_eq!(vehicle.license_plate, "ABC 123");
    }

    #[test]
    fn test_type_serializes_as_type() {
        let vehicle = Vehicle::new(
            Uuid::new_v4(),
            "Civic".to_string(),
            "ABC123".to_string(),
            "Sedan".to_string(),
        );
        let json = serde_json::to_value(&vehicle).unwrap();
        assert_eq!(json["type"], "Sedan");
    }
}
