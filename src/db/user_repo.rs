// src/db/user_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::auth::{User, UserRole},
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, created_at, updated_at";

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um usuário pelo seu e-mail (sem diferenciar maiúsculas)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let maybe_user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(maybe_user)
    }

    // Busca um usuário pelo seu ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let maybe_user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(maybe_user)
    }

    pub async fn list(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    // Cria um novo usuário. E-mail duplicado vira EmailAlreadyExists.
    pub async fn create_user<'e, E>(
        &self,
        executor: E,
        name: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, LOWER($2), $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            map_unique_violation(e, |constraint| match constraint {
                "users_email_key" => AppError::EmailAlreadyExists,
                other => AppError::UniqueConstraintViolation(other.to_string()),
            })
        })?;

        Ok(user)
    }

    pub async fn update_user<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: Option<&str>,
        role: Option<UserRole>,
        is_active: Option<bool>,
    ) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                role = COALESCE($3, role),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(role)
        .bind(is_active)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    pub async fn update_password<'e, E>(&self, executor: E, id: Uuid, password_hash: &str) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(executor)
            .await?;
        Ok(())
    }
}
