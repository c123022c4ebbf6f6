use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::environment::EnvironmentConfig;
use crate::dto::auth_dto::{
    AuthResponse, ChangePasswordRequest, PasswordResetConfirmRequest, PasswordResetRequest,
    SignInRequest, SignUpRequest,
};
use crate::dto::profile_dto::UserProfileResponse;
use crate::models::{PasswordResetToken, Role, User};
use crate::repositories::UserRepository;
use crate::state::AppState;
use crate::utils::errors::{validation_error, AppError, AppResult};
use crate::utils::jwt::{generate_token, JwtConfig};
use crate::utils::validation::email_domain_allowed;

const RESET_TOKEN_LENGTH: usize = 32;
const INVALID_CREDENTIALS: &str = "Invalid email or password.";

pub struct AuthController {
    users: Arc<dyn UserRepository>,
    config: Arc<EnvironmentConfig>,
    jwt: JwtConfig,
}

impl AuthController {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            config: state.config.clone(),
            jwt: state.jwt.clone(),
        }
    }

    /// Registro por portal: el rol lo decide la ruta, no el cliente
    pub async fn sign_up(&self, portal: Role, request: SignUpRequest) -> AppResult<AuthResponse> {
        request.validate()?;

        if !request.accept_terms {
            return Err(validation_error(
                "accept_terms",
                "You must accept the terms and conditions.",
            ));
        }
        if request.password != request.confirm_password {
            return Err(validation_error("confirm_password", "Passwords do not match."));
        }

        let email = normalize_email(&request.email);
        if !email_domain_allowed(&email, &self.config.allowed_email_domains) {
            return Err(validation_error(
                "email",
                "Please use an email address from a supported provider.",
            ));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "An account with this email already exists.".to_string(),
            ));
        }

        let password_hash = self.hash_password(&request.password)?;
        let user = User::new(
            portal,
            request.first_name.trim().to_string(),
            request.last_name.trim().to_string(),
            email,
            password_hash,
        );
        let user = self.users.insert(&user).await?;

        info!("✅ New {} account {}", user.role, user.id);
        self.issue(&user)
    }

    pub async fn sign_in(&self, portal: Role, request: SignInRequest) -> AppResult<AuthResponse> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let valid = verify(&request.password, &user.password_hash)
            .map_err(|e| AppError::Hash(format!("Error verifying password: {}", e)))?;
        if !valid {
            warn!("🔒 Failed sign-in for {}", user.id);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        // credenciales correctas pero portal equivocado
        if user.role != portal {
            return Err(AppError::RoleMismatch(portal.wrong_portal_message().to_string()));
        }

        info!("🔑 {} {} signed in", user.role, user.id);
        self.issue(&user)
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> AppResult<()> {
        request.validate()?;
        if request.new_password != request.confirm_password {
            return Err(validation_error("confirm_password", "Passwords do not match."));
        }

        let mut user = self.load(user_id).await?;
        let valid = verify(&request.current_password, &user.password_hash)
            .map_err(|e| AppError::Hash(format!("Error verifying password: {}", e)))?;
        if !valid {
            return Err(AppError::Unauthorized(
                "Your current password is incorrect.".to_string(),
            ));
        }

        user.password_hash = self.hash_password(&request.new_password)?;
        user.updated_at = Utc::now();
        self.users.update(&user).await?;

        info!("🔑 Password changed for {}", user_id);
        Ok(())
    }

    /// Genera un token de un solo uso. Un email desconocido no es un error
    /// para no revelar qué cuentas existen.
    pub async fn request_password_reset(
        &self,
        request: PasswordResetRequest,
    ) -> AppResult<Option<PasswordResetToken>> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            info!("📧 Password reset requested for unknown email");
            return Ok(None);
        };

        let token = PasswordResetToken {
            token: rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(RESET_TOKEN_LENGTH)
                .map(char::from)
                .collect(),
            user_id: user.id,
            expires_at: Utc::now() + Duration::minutes(self.config.password_reset_ttl_minutes),
        };
        self.users.store_reset_token(&token).await?;

        info!("📧 Password reset token issued for {}", user.id);
        Ok(Some(token))
    }

    pub async fn confirm_password_reset(&self, request: PasswordResetConfirmRequest) -> AppResult<()> {
        request.validate()?;
        if request.new_password != request.confirm_password {
            return Err(validation_error("confirm_password", "Passwords do not match."));
        }

        let invalid = || AppError::BadRequest("This reset link is invalid or has expired.".to_string());
        let token = self
            .users
            .take_reset_token(request.token.trim())
            .await?
            .ok_or_else(invalid)?;
        if token.is_expired() {
            return Err(invalid());
        }

        let mut user = self.load(token.user_id).await?;
        user.password_hash = self.hash_password(&request.new_password)?;
        user.updated_at = Utc::now();
        self.users.update(&user).await?;

        info!("🔑 Password reset completed for {}", user.id);
        Ok(())
    }

    fn issue(&self, user: &User) -> AppResult<AuthResponse> {
        Ok(AuthResponse {
            token: generate_token(user.id, user.role, &self.jwt)?,
            user: UserProfileResponse::from(user),
        })
    }

    fn hash_password(&self, password: &str) -> AppResult<String> {
        hash(password, self.config.bcrypt_cost)
            .map_err(|e| AppError::Hash(format!("Error hashing password: {}", e)))
    }

    async fn load(&self, user_id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> AuthController {
        let config = EnvironmentConfig {
            bcrypt_cost: 4,
            ..EnvironmentConfig::default()
        };
        AuthController::new(&AppState::in_memory(config, None))
    }

    fn sign_up_request(email: &str) -> SignUpRequest {
        SignUpRequest {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            confirm_password: "secret123".to_string(),
            accept_terms: true,
        }
    }

    #[tokio::test]
    async fn test_sign_up_lowercases_email_and_rejects_duplicates() {
        let auth = controller();
        let response = auth
            .sign_up(Role::Customer, sign_up_request("  Jane@Gmail.com "))
            .await
            .unwrap();
        assert_eq!(response.user.email, "jane@gmail.com");
        assert_eq!(response.user.role, Role::Customer);

        let err = auth
            .sign_up(Role::Driver, sign_up_request("jane@gmail.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_sign_up_requires_terms_and_matching_passwords() {
        let auth = controller();

        let mut request = sign_up_request("a@gmail.com");
        request.accept_terms = false;
        assert!(matches!(
            auth.sign_up(Role::Customer, request).await,
            Err(AppError::Validation(_))
        ));

        let mut request = sign_up_request("a@gmail.com");
        request.confirm_password = "different123".to_string();
        assert!(matches!(
            auth.sign_up(Role::Customer, request).await,
            Err(AppError::Validation(_))
        ));

        let mut request = sign_up_request("a@gmail.com");
        request.password = "weak".to_string();
        request.confirm_password = "weak".to_string();
        assert!(matches!(
            auth.sign_up(Role::Customer, request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_blank_names() {
        let auth = controller();

        let mut request = sign_up_request("blank@gmail.com");
        request.first_name = "  ".to_string();
        request.last_name = " ".to_string();
        assert!(matches!(
            auth.sign_up(Role::Customer, request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_in_through_wrong_portal_is_role_mismatch() {
        let auth = controller();
        auth.sign_up(Role::Customer, sign_up_request("jane@gmail.com"))
            .await
            .unwrap();

        let err = auth
            .sign_in(
                Role::Driver,
                SignInRequest {
                    email: "jane@gmail.com".to_string(),
                    password: "secret123".to_string(),
                },
            )
            .await
            .unwrap_err();
        match err {
            AppError::RoleMismatch(msg) => assert_eq!(msg, Role::Driver.wrong_portal_message()),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = auth
            .sign_in(
                Role::Customer,
                SignInRequest {
                    email: "jane@gmail.com".to_string(),
                    password: "wrong1234".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_password_reset_token_is_single_use() {
        let auth = controller();
        auth.sign_up(Role::Driver, sign_up_request("driver@gmail.com"))
            .await
            .unwrap();

        let token = auth
            .request_password_reset(PasswordResetRequest {
                email: "driver@gmail.com".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.token.len(), RESET_TOKEN_LENGTH);
        assert!(token.token.chars().all(|c| c.is_ascii_alphanumeric()));

        let confirm = || PasswordResetConfirmRequest {
            token: token.token.clone(),
            new_password: "newsecret1".to_string(),
            confirm_password: "newsecret1".to_string(),
        };
        auth.confirm_password_reset(confirm()).await.unwrap();
        assert!(matches!(
            auth.confirm_password_reset(confirm()).await,
            Err(AppError::BadRequest(_))
        ));

        auth.sign_in(
            Role::Driver,
            SignInRequest {
                email: "driver@gmail.com".to_string(),
                password: "newsecret1".to_string(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_email_reset_returns_none() {
        let auth = controller();
        let token = auth
            .request_password_reset(PasswordResetRequest {
                email: "nobody@gmail.com".to_string(),
            })
            .await
            .unwrap();
        assert!(token.is_none());
    }
}
