//! Autenticación JWT
//!
//! Extractores que validan el token `Authorization: Bearer <JWT>` y cargan
//! el usuario. Los streams SSE también aceptan `?access_token=` porque
//! `EventSource` no permite cabeceras propias.

use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts},
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::{
    models::{tow_request::Actor, user::Role},
    state::AppState,
    utils::{
        errors::AppError,
        jwt::{extract_token_from_header, verify_token},
    },
};

/// Usuario autenticado que se inyecta en los handlers
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role != role {
            return Err(AppError::RoleMismatch(match role {
                Role::Customer => "This action is only available to customers.".to_string(),
                Role::Driver => "This action is only available to drivers.".to_string(),
            }));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

fn token_from_parts(parts: &Parts) -> Result<String, AppError> {
    if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;
        return extract_token_from_header(value).map(str::to_string);
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.access_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Authorization token required".to_string()))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts)?;
        let claims = verify_token(&token, &state.jwt)?;
        let user_id = claims.user_id()?;

        // el usuario debe seguir existiendo con el mismo rol
        let user = state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
        if user.role != claims.role {
            return Err(AppError::Unauthorized("Token role is no longer valid".to_string()));
        }

        debug!("🔐 Authenticated {} {}", user.role, user_id);
        Ok(Self {
            user_id,
            role: user.role,
        })
    }
}

/// Solo clientes; un conductor recibe `ROLE_MISMATCH`
#[derive(Debug, Clone, Copy)]
pub struct CustomerUser(pub AuthenticatedUser);

/// Solo conductores; un cliente recibe `ROLE_MISMATCH`
#[derive(Debug, Clone, Copy)]
pub struct DriverUser(pub AuthenticatedUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for CustomerUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        user.require_role(Role::Customer)?;
        Ok(Self(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for DriverUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        user.require_role(Role::Driver)?;
        Ok(Self(user))
    }
}
