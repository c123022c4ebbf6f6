use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{unique_violation_as_conflict, TowRequestRepository};
use crate::models::{GeoPoint, RequestPreference, TowRequest, TowStatus, TruckType};
use crate::utils::errors::AppResult;

/// Fila de `tow_requests`; las coordenadas van en columnas separadas
#[derive(Debug, FromRow)]
struct TowRequestRow {
    id: Uuid,
    customer_id: Uuid,
    driver_id: Option<Uuid>,
    latitude: f64,
    longitude: f64,
    driver_latitude: Option<f64>,
    driver_longitude: Option<f64>,
    issue: String,
    truck_type: Option<TruckType>,
    preference: RequestPreference,
    scheduled_for: Option<DateTime<Utc>>,
    status: TowStatus,
    driver_name: Option<String>,
    driver_phone: Option<String>,
    driver_eta: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<TowRequestRow> for TowRequest {
    fn from(row: TowRequestRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            driver_id: row.driver_id,
            location: GeoPoint::new(row.latitude, row.longitude),
            driver_location: GeoPoint::from_columns(row.driver_latitude, row.driver_longitude),
            issue: row.issue,
            truck_type: row.truck_type,
            preference: row.preference,
            scheduled_for: row.scheduled_for,
            status: row.status,
            driver_name: row.driver_name,
            driver_phone: row.driver_phone,
            driver_eta: row.driver_eta,
            created_at: row.created_at,
            updated_at: row.updated_at,
            accepted_at: row.accepted_at,
            completed_at: row.completed_at,
        }
    }
}

pub struct PgTowRequestRepository {
    pool: PgPool,
}

impl PgTowRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TowRequestRepository for PgTowRequestRepository {
    async fn insert(&self, request: &TowRequest) -> AppResult<TowRequest> {
        let row = sqlx::query_as::<_, TowRequestRow>(
            r#"
            INSERT INTO tow_requests (
                id, customer_id, driver_id, latitude, longitude, driver_latitude, driver_longitude,
                issue, truck_type, preference, scheduled_for, status, driver_name, driver_phone,
                driver_eta, created_at, updated_at, accepted_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.customer_id)
        .bind(request.driver_id)
        .bind(request.location.latitude)
        .bind(request.location.longitude)
        .bind(request.driver_location.map(|p| p.latitude))
        .bind(request.driver_location.map(|p| p.longitude))
        .bind(&request.issue)
        .bind(request.truck_type)
        .bind(request.preference)
        .bind(request.scheduled_for)
        .bind(request.status)
        .bind(&request.driver_name)
        .bind(&request.driver_phone)
        .bind(&request.driver_eta)
        .bind(request.created_at)
        .bind(request.updated_at)
        .bind(request.accepted_at)
        .bind(request.completed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation_as_conflict(e, "A tow request with this id already exists."))?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<TowRequest>> {
        let row = sqlx::query_as::<_, TowRequestRow>("SELECT * FROM tow_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TowRequest::from))
    }

    async fn list_by_status(&self, status: TowStatus) -> AppResult<Vec<TowRequest>> {
        let rows = sqlx::query_as::<_, TowRequestRow>(
            "SELECT * FROM tow_requests WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TowRequest::from).collect())
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<TowRequest>> {
        let rows = sqlx::query_as::<_, TowRequestRow>(
            "SELECT * FROM tow_requests WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TowRequest::from).collect())
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> AppResult<Vec<TowRequest>> {
        let rows = sqlx::query_as::<_, TowRequestRow>(
            "SELECT * FROM tow_requests WHERE driver_id = $1 ORDER BY created_at DESC",
        )
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TowRequest::from).collect())
    }

    async fn compare_and_swap(
        &self,
        expected: TowStatus,
        updated: &TowRequest,
    ) -> AppResult<Option<TowRequest>> {
        // customer_id y created_at nunca se reescriben
        let row = sqlx::query_as::<_, TowRequestRow>(
            r#"
            UPDATE tow_requests
            SET driver_id = $3, driver_latitude = $4, driver_longitude = $5, status = $6,
                driver_name = $7, driver_phone = $8, driver_eta = $9, updated_at = $10,
                accepted_at = $11, completed_at = $12
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(updated.id)
        .bind(expected)
        .bind(updated.driver_id)
        .bind(updated.driver_location.map(|p| p.latitude))
        .bind(updated.driver_location.map(|p| p.longitude))
        .bind(updated.status)
        .bind(&updated.driver_name)
        .bind(&updated.driver_phone)
        .bind(&updated.driver_eta)
        .bind(updated.updated_at)
        .bind(updated.accepted_at)
        .bind(updated.completed_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TowRequest::from))
    }
}

#[cfg(test)]
mod tests {
    const SCHEMA: &str = include_str!("../../migrations/20250101000000_initial_schema.sql");

    fn column(name: &str) -> &'static str {
        SCHEMA
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with(&format!("{} ", name)))
            .unwrap_or_else(|| panic!("column {} not in schema", name))
    }

    #[test]
    fn test_driver_columns_fit_validated_profile_fields() {
        // nombre + apellido (100 cada uno) + espacio
        assert!(column("driver_name").starts_with("driver_name TEXT"));
        assert_eq!(
            column("driver_phone"),
            column("phone_number").replace("phone_number", "driver_phone")
        );
        assert!(column("driver_eta").starts_with("driver_eta VARCHAR(100)"));
    }
}
