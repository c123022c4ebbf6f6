use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::profile_dto::{DriverStatusRequest, UpdateProfileRequest, UserProfileResponse};
use crate::models::{GeoPoint, User};
use crate::repositories::UserRepository;
use crate::services::storage_service::{remove_profile_image, store_profile_image};
use crate::services::ObjectStorage;
use crate::state::AppState;
use crate::utils::errors::{validation_error, AppError, AppResult};

pub struct ProfileController {
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn ObjectStorage>,
}

impl ProfileController {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            storage: state.storage.clone(),
        }
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<UserProfileResponse> {
        let user = self.load(user_id).await?;
        Ok(UserProfileResponse::from(&user))
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> AppResult<UserProfileResponse> {
        request.validate()?;

        let mut user = self.load(user_id).await?;
        if let Some(email) = &request.email {
            if email.trim().to_lowercase() != user.email {
                return Err(validation_error("email", "Email cannot be changed."));
            }
        }

        request.into_changes().apply_to(&mut user);
        let user = self.users.update(&user).await?;

        info!("👤 Profile updated for {}", user_id);
        Ok(UserProfileResponse::from(&user))
    }

    /// Sube (o reemplaza) la imagen y guarda su URL en el perfil
    pub async fn upload_image(&self, user_id: Uuid, data: Vec<u8>) -> AppResult<UserProfileResponse> {
        let mut user = self.load(user_id).await?;

        let url = store_profile_image(self.storage.as_ref(), user_id, data).await?;
        user.profile_image_url = Some(url);
        user.updated_at = Utc::now();
        let user = self.users.update(&user).await?;

        info!("🖼️ Profile image updated for {}", user_id);
        Ok(UserProfileResponse::from(&user))
    }

    pub async fn remove_image(&self, user_id: Uuid) -> AppResult<UserProfileResponse> {
        let mut user = self.load(user_id).await?;

        remove_profile_image(self.storage.as_ref(), user_id).await?;
        user.profile_image_url = None;
        user.updated_at = Utc::now();
        let user = self.users.update(&user).await?;

        Ok(UserProfileResponse::from(&user))
    }

    /// Disponibilidad del conductor; la ubicación es opcional pero va completa
    pub async fn set_driver_status(
        &self,
        user_id: Uuid,
        request: DriverStatusRequest,
    ) -> AppResult<UserProfileResponse> {
        let location = match (request.latitude, request.longitude) {
            (Some(latitude), Some(longitude)) => {
                let point = GeoPoint::new(latitude, longitude);
                if !point.is_valid() {
                    return Err(validation_error("location", "Please provide a valid location."));
                }
                Some(point)
            }
            (None, None) => None,
            _ => {
                return Err(validation_error(
                    "location",
                    "Latitude and longitude must be provided together.",
                ))
            }
        };

        let mut user = self.load(user_id).await?;
        user.is_online = request.is_online;
        if let Some(point) = location {
            user.latitude = Some(point.latitude);
            user.longitude = Some(point.longitude);
        }
        user.updated_at = Utc::now();
        let user = self.users.update(&user).await?;

        info!(
            "🚚 Driver {} is now {}",
            user_id,
            if user.is_online { "online" } else { "offline" }
        );
        Ok(UserProfileResponse::from(&user))
    }

    async fn load(&self, user_id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
