use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{unique_violation_as_conflict, VehicleRepository};
use crate::models::Vehicle;
use crate::utils::errors::AppResult;

const DUPLICATE_PLATE: &str = "A vehicle with this license plate already exists.";

pub struct PgVehicleRepository {
    pool: PgPool,
}

impl PgVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleRepository for PgVehicleRepository {
    async fn insert(&self, vehicle: &Vehicle) -> AppResult<Vehicle> {
        sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (id, owner_id, name, license_plate, vehicle_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(vehicle.id)
        .bind(vehicle.owner_id)
        .bind(&vehicle.name)
        .bind(&vehicle.license_plate)
        .bind(&vehicle.vehicle_type)
        .bind(vehicle.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation_as_conflict(e, DUPLICATE_PLATE))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }

    async fn update(&self, vehicle: &Vehicle) -> AppResult<Vehicle> {
        sqlx::query_as::<_, Vehicle>(
            r#"
            UPDATE vehicles
            SET name = $2, license_plate = $3, vehicle_type = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.name)
        .bind(&vehicle.license_plate)
        .bind(&vehicle.vehicle_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation_as_conflict(e, DUPLICATE_PLATE))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn plate_exists(
        &self,
        owner_id: Uuid,
        license_plate: &str,
        except: Option<Uuid>,
    ) -> AppResult<bool> {
        let result: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM vehicles
                WHERE owner_id = $1 AND license_plate = $2 AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(owner_id)
        .bind(license_plate)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        Ok(result.0)
    }
}
