//! Coordenadas geográficas compartidas por usuarios y solicitudes de grúa

use serde::{Deserialize, Serialize};

use crate::utils::validation::validate_coordinates;

/// Punto geográfico (latitud, longitud) en grados decimales
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Construir desde columnas opcionales de la base de datos
    pub fn from_columns(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self { latitude, longitude }),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        validate_coordinates(self.latitude, self.longitude).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(37.7749, -122.4194).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_from_columns_requires_both() {
        assert_eq!(
            GeoPoint::from_columns(Some(1.0), Some(2.0)),
            Some(GeoPoint::new(1.0, 2.0))
        );
        assert_eq!(GeoPoint::from_columns(Some(1.0), None), None);
    }
}
