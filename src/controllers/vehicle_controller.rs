use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::vehicle_dto::{CreateVehicleRequest, UpdateVehicleRequest};
use crate::models::vehicle::normalize_plate;
use crate::models::Vehicle;
use crate::repositories::VehicleRepository;
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};

const DUPLICATE_PLATE: &str = "A vehicle with this license plate already exists.";

pub struct VehicleController {
    repository: Arc<dyn VehicleRepository>,
}

impl VehicleController {
    pub fn new(state: &AppState) -> Self {
        Self {
            repository: state.vehicles.clone(),
        }
    }

    pub async fn create(&self, owner_id: Uuid, request: CreateVehicleRequest) -> AppResult<Vehicle> {
        request.validate()?;

        let plate = normalize_plate(&request.license_plate);
        if self.repository.plate_exists(owner_id, &plate, None).await? {
            return Err(AppError::Conflict(DUPLICATE_PLATE.to_string()));
        }

        let vehicle = Vehicle::new(
            owner_id,
            request.name.trim().to_string(),
            plate,
            request.vehicle_type.trim().to_string(),
        );
        let vehicle = self.repository.insert(&vehicle).await?;

        info!("🚗 Vehicle {} registered for {}", vehicle.id, owner_id);
        Ok(vehicle)
    }

    pub async fn list(&self, owner_id: Uuid) -> AppResult<Vec<Vehicle>> {
        self.repository.list_by_owner(owner_id).await
    }

    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> AppResult<Vehicle> {
        self.owned(owner_id, id).await
    }

    pub async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        request: UpdateVehicleRequest,
    ) -> AppResult<Vehicle> {
        request.validate()?;

        let mut vehicle = self.owned(owner_id, id).await?;
        if let Some(plate) = request.license_plate {
            let plate = normalize_plate(&plate);
            if self.repository.plate_exists(owner_id, &plate, Some(id)).await? {
                return Err(AppError::Conflict(DUPLICATE_PLATE.to_string()));
            }
            vehicle.license_plate = plate;
        }
        if let Some(name) = request.name {
            vehicle.name = name.trim().to_string();
        }
        if let Some(vehicle_type) = request.vehicle_type {
            vehicle.vehicle_type = vehicle_type.trim().to_string();
        }

        self.repository.update(&vehicle).await
    }

    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> AppResult<()> {
        self.owned(owner_id, id).await?;
        self.repository.delete(id).await?;
        info!("🗑️ Vehicle {} deleted", id);
        Ok(())
    }

    async fn owned(&self, owner_id: Uuid, id: Uuid) -> AppResult<Vehicle> {
        let vehicle = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

        if vehicle.owner_id != owner_id {
            return Err(AppError::Forbidden(
                "You do not have permission to access this vehicle".to_string(),
            ));
        }
        Ok(vehicle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;

    fn controller() -> VehicleController {
        VehicleController::new(&AppState::in_memory(EnvironmentConfig::default(), None))
    }

    fn civic(plate: &str) -> CreateVehicleRequest {
        CreateVehicleRequest {
            name: "Civic".to_string(),
            license_plate: plate.to_string(),
            vehicle_type: "Sedan".to_string(),
        }
    }

    #[tokio::test]
    async fn test_plate_change_to_existing_plate_is_conflict() {
        let controller = controller();
        let owner = Uuid::new_v4();
        controller.create(owner, civic("abc123")).await.unwrap();
        let second = controller.create(owner, civic("xyz789")).await.unwrap();

        let err = controller
            .update(
                owner,
                second.id,
                UpdateVehicleRequest {
                    name: None,
                    license_plate: Some(" ABC123 ".to_string()),
                    vehicle_type: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_other_owner_cannot_delete() {
        let controller = controller();
        let owner = Uuid::new_v4();
        let vehicle = controller.create(owner, civic("abc123")).await.unwrap();

        assert!(matches!(
            controller.delete(Uuid::new_v4(), vehicle.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            controller.get(owner, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        controller.delete(owner, vehicle.id).await.unwrap();
        assert!(controller.list(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let controller = controller();
        let mut request = civic("abc123");
        request.name = "   ".to_string();

        assert!(matches!(
            controller.create(Uuid::new_v4(), request).await,
            Err(AppError::Validation(_))
        ));
    }
}
