// src/db/settings_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::settings::{CompanySettings, UpdateSettingsRequest},
};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Linha única. Se ainda não foi salva, devolve tudo vazio.
    pub async fn get_settings(&self) -> Result<CompanySettings, AppError> {
        let settings = sqlx::query_as::<_, CompanySettings>(
            r#"
            SELECT company_name, document_number, pix_key, address, phone, email, updated_at
            FROM company_settings
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings.unwrap_or_default())
    }

    pub async fn update_settings<'e, E>(
        &self,
        executor: E,
        input: &UpdateSettingsRequest,
    ) -> Result<CompanySettings, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // UPSERT (Insert or Update)
        let settings = sqlx::query_as::<_, CompanySettings>(
            r#"
            INSERT INTO company_settings (id, company_name, document_number, pix_key, address, phone, email)
            VALUES (TRUE, $1, $2, $3, $4, $5, $6)
            ON CONFLICT (id)
            DO UPDATE SET
                company_name = EXCLUDED.company_name,
                document_number = EXCLUDED.document_number,
                pix_key = EXCLUDED.pix_key,
                address = EXCLUDED.address,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                updated_at = NOW()
            RETURNING company_name, document_number, pix_key, address, phone, email, updated_at
            "#,
        )
        .bind(&input.company_name)
        .bind(&input.document_number)
        .bind(&input.pix_key)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .fetch_one(executor)
        .await?;

        Ok(settings)
    }
}
