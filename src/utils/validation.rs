//! Utilidades de validación
//!
//! Reglas compartidas por los DTOs: contraseña, email y coordenadas.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

pub const PASSWORD_RULE_MESSAGE: &str =
    "Password must be at least 8 characters long and include at least 1 number.";

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap();
    static ref HAS_DIGIT: Regex = Regex::new(r"\d").unwrap();
}

/// Al menos 8 caracteres y un dígito
pub fn validate_password_strength(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() < 8 || !HAS_DIGIT.is_match(value) {
        let mut error = ValidationError::new("password_strength");
        error.message = Some(PASSWORD_RULE_MESSAGE.into());
        return Err(error);
    }
    Ok(())
}

/// Validar formato de email
pub fn validate_email_format(value: &str) -> Result<(), ValidationError> {
    if !EMAIL_REGEX.is_match(value.trim()) {
        let mut error = ValidationError::new("email");
        error.message = Some("Please enter a valid email address.".into());
        return Err(error);
    }
    Ok(())
}

/// Lista de dominios permitidos; vacía acepta cualquiera
pub fn email_domain_allowed(email: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    email
        .rsplit_once('@')
        .map(|(_, domain)| {
            let domain = domain.to_lowercase();
            allowed.iter().any(|d| *d == domain)
        })
        .unwrap_or(false)
}

/// Validar que un string no esté vacío
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_blank");
        error.message = Some("This field cannot be empty.".into());
        return Err(error);
    }
    Ok(())
}

/// Validar formato de coordenadas GPS
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), ValidationError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        let mut error = ValidationError::new("latitude");
        error.add_param("value".into(), &lat);
        error.message = Some("Latitude must be between -90 and 90.".into());
        return Err(error);
    }

    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        let mut error = ValidationError::new("longitude");
        error.add_param("value".into(), &lng);
        error.message = Some("Longitude must be between -180 and 180.".into());
        return Err(error);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("secret123").is_ok());
        assert!(validate_password_strength("short1").is_err());
        assert!(validate_password_strength("nodigitshere").is_err());
        let err = validate_password_strength("abc").unwrap_err();
        assert_eq!(err.message.unwrap(), PASSWORD_RULE_MESSAGE);
    }

    #[test]
    fn test_email_format() {
        assert!(validate_email_format("jane@gmail.com").is_ok());
        assert!(validate_email_format("jane@").is_err());
        assert!(validate_email_format("not-an-email").is_err());
    }

    #[test]
    fn test_email_domain_allow_list() {
        let allowed = vec!["gmail.com".to_string(), "smiletowing.com".to_string()];
        assert!(email_domain_allowed("jane@Gmail.com", &allowed));
        assert!(!email_domain_allowed("jane@example.org", &allowed));
        assert!(email_domain_allowed("jane@example.org", &[]));
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(37.7749, -122.4194).is_ok());
        assert!(validate_coordinates(91.0, -75.0).is_err());
        assert!(validate_coordinates(45.0, -181.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }
}
