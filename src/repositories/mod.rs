//! Repositorios
//!
//! Cada agregado tiene un trait de persistencia con dos implementaciones:
//! PostgreSQL (`Pg*Repository`) y memoria (`MemoryStore`), seleccionadas
//! con `STORE_BACKEND`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{PasswordResetToken, TowRequest, TowStatus, User, Vehicle};
use crate::utils::errors::{AppError, AppResult};

pub mod memory_repository;
pub mod tow_request_repository;
pub mod user_repository;
pub mod vehicle_repository;

pub use memory_repository::MemoryStore;
pub use tow_request_repository::PgTowRequestRepository;
pub use user_repository::PgUserRepository;
pub use vehicle_repository::PgVehicleRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Falla con `Conflict` si el email ya está registrado
    async fn insert(&self, user: &User) -> AppResult<User>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Reescribe todas las columnas mutables del perfil
    async fn update(&self, user: &User) -> AppResult<User>;

    async fn store_reset_token(&self, token: &PasswordResetToken) -> AppResult<()>;

    /// Consume el token: una vez leído ya no se puede reutilizar
    async fn take_reset_token(&self, token: &str) -> AppResult<Option<PasswordResetToken>>;
}

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn insert(&self, vehicle: &Vehicle) -> AppResult<Vehicle>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>>;

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Vehicle>>;

    async fn update(&self, vehicle: &Vehicle) -> AppResult<Vehicle>;

    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    async fn plate_exists(
        &self,
        owner_id: Uuid,
        license_plate: &str,
        except: Option<Uuid>,
    ) -> AppResult<bool>;
}

#[async_trait]
pub trait TowRequestRepository: Send + Sync {
    /// Falla con `Conflict` si el id ya existe
    async fn insert(&self, request: &TowRequest) -> AppResult<TowRequest>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<TowRequest>>;

    /// Más antiguas primero
    async fn list_by_status(&self, status: TowStatus) -> AppResult<Vec<TowRequest>>;

    /// Más recientes primero
    async fn list_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<TowRequest>>;

    /// Más recientes primero
    async fn list_by_driver(&self, driver_id: Uuid) -> AppResult<Vec<TowRequest>>;

    /// Guarda `updated` solo si el estado almacenado sigue siendo `expected`.
    /// Devuelve `None` cuando otro escritor llegó antes.
    async fn compare_and_swap(
        &self,
        expected: TowStatus,
        updated: &TowRequest,
    ) -> AppResult<Option<TowRequest>>;
}

/// Traduce violaciones de unicidad de PostgreSQL a `Conflict`
pub(crate) fn unique_violation_as_conflict(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(err),
    }
}
