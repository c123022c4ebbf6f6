//! Modelo de User
//!
//! Perfil de usuario (cliente o conductor) tal como se guarda en la tabla `users`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use uuid::Uuid;

use super::geo::GeoPoint;

/// Rol del usuario - mapea al ENUM user_role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    Customer,
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "Customer",
            Role::Driver => "Driver",
        }
    }

    /// Mensaje mostrado cuando alguien entra por el portal del otro rol
    pub fn wrong_portal_message(&self) -> &'static str {
        match self {
            Role::Customer => {
                "You are not authorized to log in as a Customer. Please use the Driver login page."
            }
            Role::Driver => {
                "You are not authorized to log in as a Driver. Please use the Customer login page."
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User - mapea exactamente a la tabla users
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub pronouns: Option<String>,
    pub profile_image_url: Option<String>,
    pub is_online: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        role: Role,
        first_name: String,
        last_name: String,
        email: String,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            role,
            first_name,
            last_name,
            email,
            password_hash,
            phone_number: None,
            pronouns: None,
            profile_image_url: None,
            is_online: false,
            latitude: None,
            longitude: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn location(&self) -> Option<GeoPoint> {
        GeoPoint::from_columns(self.latitude, self.longitude)
    }
}

/// Cambios parciales de perfil; el email no se puede modificar
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub pronouns: Option<String>,
}

impl ProfileChanges {
    pub fn apply_to(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(phone_number) = self.phone_number {
            user.phone_number = Some(phone_number).filter(|p| !p.is_empty());
        }
        if let Some(pronouns) = self.pronouns {
            user.pronouns = Some(pronouns).filter(|p| !p.is_empty());
        }
        user.updated_at = Utc::now();
    }
}

/// Token de reseteo de contraseña de un solo uso
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::new(
            Role::Customer,
            "Jane".to_string(),
            "Doe".to_string(),
            "jane@gmail.com".to_string(),
            "hash".to_string(),
        )
    }

    #[test]
    fn test_full_name() {
        let user = sample_user();
        assert_eq!(user.full_name(), "Jane Doe");
    }

    #[test]
    fn test_profile_changes_keep_untouched_fields() {
        let mut user = sample_user();
        user.phone_number = Some("555-0100".to_string());

        ProfileChanges {
            pronouns: Some("she/her".to_string()),
            ..Default::default()
        }
        .apply_to(&mut user);

        assert_eq!(user.first_name, "Jane");
        assert_eq!(user.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(user.pronouns.as_deref(), Some("she/her"));
    }

    #[test]
    fn test_empty_phone_clears_field() {
        let mut user = sample_user();
        user.phone_number = Some("555-0100".to_string());

        ProfileChanges {
            phone_number: Some(String::new()),
            ..Default::default()
        }
        .apply_to(&mut user);

        assert_eq!(user.phone_number, None);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Customer.to_string(), "Customer");
        assert_eq!(Role::Driver.as_str(), "Driver");
    }
}
