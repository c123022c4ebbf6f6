//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.
//! `ENVIRONMENT` y `JWT_SECRET` son obligatorios; el resto tiene valores por defecto.

use anyhow::{bail, Context, Result};
use rand::{distributions::Alphanumeric, Rng};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Backend de persistencia
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub store_backend: StoreBackend,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
    /// Ventana de búsqueda de conductor (segundos)
    pub match_timeout_secs: u64,
    pub mapbox_token: Option<String>,
    pub redis_url: Option<String>,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    /// Dominios de email aceptados en el registro; vacío = cualquiera
    pub allowed_email_domains: Vec<String>,
    pub password_reset_ttl_minutes: i64,
    /// Devolver el token de reseteo en la respuesta (solo entornos de prueba)
    pub expose_reset_tokens: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            store_backend: StoreBackend::Postgres,
            // Secreto aleatorio por proceso: nunca hay un secreto conocido por defecto
            jwt_secret: rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(64)
                .map(char::from)
                .collect(),
            jwt_expiration: 86_400,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cors_origins: Vec::new(),
            match_timeout_secs: 60,
            mapbox_token: None,
            redis_url: None,
            upload_dir: PathBuf::from("uploads"),
            public_base_url: "http://localhost:3000".to_string(),
            allowed_email_domains: Vec::new(),
            password_reset_ttl_minutes: 30,
            expose_reset_tokens: false,
        }
    }
}

impl EnvironmentConfig {
    /// Cargar configuración desde variables de entorno (después de `dotenvy::dotenv()`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Cargar configuración desde una fuente de variables arbitraria
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let defaults = Self::default();

        let environment = vars.required("ENVIRONMENT")?.trim().to_lowercase();
        let jwt_secret = vars.required("JWT_SECRET")?;

        let config = Self {
            port: vars.parse("PORT", defaults.port)?,
            host: vars.optional("HOST").unwrap_or(defaults.host),
            store_backend: vars.parse("STORE_BACKEND", defaults.store_backend)?,
            jwt_secret,
            jwt_expiration: vars.parse("JWT_EXPIRATION", defaults.jwt_expiration)?,
            bcrypt_cost: vars.parse("BCRYPT_COST", defaults.bcrypt_cost)?,
            cors_origins: vars.list("CORS_ORIGINS"),
            match_timeout_secs: vars.parse("MATCH_TIMEOUT_SECS", defaults.match_timeout_secs)?,
            mapbox_token: vars.optional("MAPBOX_TOKEN"),
            redis_url: vars.optional("REDIS_URL"),
            upload_dir: vars
                .optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            public_base_url: vars
                .optional("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            allowed_email_domains: vars
                .list("ALLOWED_EMAIL_DOMAINS")
                .into_iter()
                .map(|d| d.to_lowercase())
                .collect(),
            password_reset_ttl_minutes: vars.parse(
                "PASSWORD_RESET_TTL_MINUTES",
                defaults.password_reset_ttl_minutes,
            )?,
            expose_reset_tokens: vars.parse("EXPOSE_RESET_TOKENS", defaults.expose_reset_tokens)?,
            environment,
        };

        if config.match_timeout_secs == 0 {
            bail!("MATCH_TIMEOUT_SECS must be greater than zero");
        }
        if config.expose_reset_tokens && config.is_production() {
            bail!("EXPOSE_RESET_TOKENS cannot be enabled in production");
        }

        Ok(config)
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn match_timeout(&self) -> Duration {
        Duration::from_secs(self.match_timeout_secs)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.optional(name)
            .with_context(|| format!("{} must be set", name))
    }

    fn list(&self, name: &str) -> Vec<String> {
        self.optional(name)
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("{} must be a valid value, got '{}'", name, raw)),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    fn load(vars: &[(&str, &str)]) -> Result<EnvironmentConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvironmentConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::default();
        assert_eq!(config.environment, "development");
        assert!(!config.expose_reset_tokens);
        assert_eq!(config.match_timeout(), Duration::from_secs(60));
        assert_eq!(config.password_reset_ttl_minutes, 30);
        assert_eq!(config.server_url(), "0.0.0.0:3000");
    }

    #[test]
    fn test_default_secret_is_not_shared() {
        let a = EnvironmentConfig::default();
        let b = EnvironmentConfig::default();
        assert_eq!(a.jwt_secret.len(), 64);
        assert_ne!(a.jwt_secret, b.jwt_secret);
    }

    #[test]
    fn test_required_variables() {
        let err = load(&[("JWT_SECRET", "s3cret")]).unwrap_err();
        assert!(err.to_string().contains("ENVIRONMENT"));

        let err = load(&[("ENVIRONMENT", "development")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let err = load(&[("ENVIRONMENT", "development"), ("JWT_SECRET", "   ")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_from_lookup() {
        let config = load(&[
            ("ENVIRONMENT", "Development"),
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("STORE_BACKEND", "memory"),
            ("CORS_ORIGINS", "http://a.test, ,http://b.test"),
            ("PUBLIC_BASE_URL", "https://cdn.test/"),
        ])
        .unwrap();

        assert_eq!(config.environment, "development");
        assert!(!config.is_production());
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.port, 8080);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.public_base_url, "https://cdn.test");
        assert!(!config.expose_reset_tokens);

        assert!(load(&[("ENVIRONMENT", "dev"), ("JWT_SECRET", "x"), ("PORT", "abc")]).is_err());
    }

    #[test]
    fn test_reset_tokens_never_exposed_in_production() {
        let config = load(&[
            ("ENVIRONMENT", "staging"),
            ("JWT_SECRET", "s3cret"),
            ("EXPOSE_RESET_TOKENS", "true"),
        ])
        .unwrap();
        assert!(config.expose_reset_tokens);

        let err = load(&[
            ("ENVIRONMENT", "production"),
            ("JWT_SECRET", "s3cret"),
            ("EXPOSE_RESET_TOKENS", "true"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("EXPOSE_RESET_TOKENS"));
    }
}
