// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Claims, User},
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
    jwt_ttl_hours: i64,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String, jwt_ttl_hours: i64) -> Self {
        Self { user_repo, jwt_secret, jwt_ttl_hours }
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<(String, User), AppError> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash).await? {
            tracing::warn!(user_id = %user.id, "Tentativa de login com senha incorreta");
            return Err(AppError::InvalidCredentials);
        }

        // Senha certa, mas conta desativada: avisa (não vaza nada que o usuário não saiba)
        if !user.is_active {
            return Err(AppError::UserInactive);
        }

        let token = self.create_token(&user)?;
        Ok((token, user))
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = self.decode_token(token)?;

        let user = self
            .user_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !user.is_active {
            return Err(AppError::UserInactive);
        }

        Ok(user)
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        Ok(token_data.claims)
    }

    pub fn create_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::hours(self.jwt_ttl_hours);

        let claims = Claims {
            sub: user.id,
            role: user.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

// Hashing fora do runtime assíncrono (bcrypt é caro de propósito)
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password_clone = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password_clone = password.to_owned();
    let hash_clone = password_hash.to_owned();

    let is_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &hash_clone))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
    Ok(is_valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::UserRole;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    fn service() -> AuthService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/gestor_nexus_test")
            .expect("lazy pool");
        AuthService::new(UserRepository::new(pool), "segredo-de-teste".into(), 24)
    }

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@gestornexus.com".into(),
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn token_round_trip_keeps_subject_and_role() {
        let service = service();
        let user = user(UserRole::Gestor);

        let token = service.create_token(&user).unwrap();
        let claims = service.decode_token(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, UserRole::Gestor);
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn rejects_tokens_signed_with_another_secret() {
        let token = service().create_token(&user(UserRole::Superadmin)).unwrap();

        let pool = PgPoolOptions::new().connect_lazy("postgres://localhost/x").unwrap();
        let other = AuthService::new(UserRepository::new(pool), "outro-segredo".into(), 24);

        assert!(matches!(other.decode_token(&token), Err(AppError::InvalidToken)));
        assert!(matches!(other.decode_token("lixo"), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hashed = hash_password("senha-forte-123").await.unwrap();
        assert!(verify_password("senha-forte-123", &hashed).await.unwrap());
        assert!(!verify_password("outra", &hashed).await.unwrap());
    }
}
