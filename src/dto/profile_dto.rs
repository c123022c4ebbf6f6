use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{GeoPoint, ProfileChanges, Role, User};
use crate::utils::validation::validate_not_blank;

// Perfil público (sin hash de contraseña)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub id: Uuid,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub pronouns: Option<String>,
    pub profile_image_url: Option<String>,
    pub is_online: bool,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfileResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            pronouns: user.pronouns.clone(),
            profile_image_url: user.profile_image_url.clone(),
            is_online: user.is_online,
            location: user.location(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// Actualización parcial; el email no se puede cambiar
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(
        length(min = 1, max = 100, message = "First name cannot be empty."),
        custom = "validate_not_blank"
    )]
    pub first_name: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Last name cannot be empty."),
        custom = "validate_not_blank"
    )]
    pub last_name: Option<String>,
    #[validate(length(max = 30, message = "Phone number is too long."))]
    pub phone_number: Option<String>,
    #[validate(length(max = 50, message = "Pronouns are too long."))]
    pub pronouns: Option<String>,
    /// Presente solo para rechazarlo con un mensaje claro
    pub email: Option<String>,
}

impl UpdateProfileRequest {
    pub fn into_changes(self) -> ProfileChanges {
        let trim = |v: Option<String>| v.map(|s| s.trim().to_string());
        ProfileChanges {
            first_name: trim(self.first_name),
            last_name: trim(self.last_name),
            phone_number: trim(self.phone_number),
            pronouns: trim(self.pronouns),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DriverStatusRequest {
    pub is_online: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
