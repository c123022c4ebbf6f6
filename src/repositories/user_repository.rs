use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{unique_violation_as_conflict, UserRepository};
use crate::models::{PasswordResetToken, User};
use crate::utils::errors::AppResult;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &User) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, role, first_name, last_name, email, password_hash, phone_number,
                pronouns, profile_image_url, is_online, latitude, longitude, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(user.role)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone_number)
        .bind(&user.pronouns)
        .bind(&user.profile_image_url)
        .bind(user.is_online)
        .bind(user.latitude)
        .bind(user.longitude)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation_as_conflict(e, "An account with this email already exists."))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, password_hash = $4, phone_number = $5,
                pronouns = $6, profile_image_url = $7, is_online = $8, latitude = $9,
                longitude = $10, updated_at = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(&user.phone_number)
        .bind(&user.pronouns)
        .bind(&user.profile_image_url)
        .bind(user.is_online)
        .bind(user.latitude)
        .bind(user.longitude)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn store_reset_token(&self, token: &PasswordResetToken) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn take_reset_token(&self, token: &str) -> AppResult<Option<PasswordResetToken>> {
        let found = sqlx::query_as::<_, PasswordResetToken>(
            "DELETE FROM password_reset_tokens WHERE token = $1 RETURNING token, user_id, expires_at",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found)
    }
}
