// src/db/client_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{like_pattern, map_unique_violation},
        error::AppError,
    },
    models::clients::{
        Client, ClientFilters, ClientStatus, ClientStatusHistory, CreateClientPayload, StatusChangeOrigin,
        UpdateClientPayload,
    },
};

const CLIENT_COLUMNS: &str = "id, name, email, phone, document, company_name, seller_id, status, \
     trial_ends_at, notes, status_changed_at, created_at, updated_at";

fn map_client_conflict(e: sqlx::Error) -> AppError {
    map_unique_violation(e, |constraint| match constraint {
        "clients_document_key" => AppError::field("document", "document_already_exists"),
        other => AppError::UniqueConstraintViolation(other.to_string()),
    })
}

// O que o motor de cobrança precisa ler de um cliente
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientBillingRow {
    pub id: Uuid,
    pub name: String,
    pub status: ClientStatus,
    pub trial_ends_at: Option<NaiveDate>,
    pub oldest_unpaid_due_date: Option<NaiveDate>,
    pub has_confirmed_payment: bool,
}

#[derive(Clone)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        payload: &CreateClientPayload,
        seller_id: Option<Uuid>,
        status: ClientStatus,
        trial_ends_at: Option<NaiveDate>,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (name, email, phone, document, company_name, seller_id, status, trial_ends_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(&payload.phone)
        .bind(&payload.document)
        .bind(&payload.company_name)
        .bind(seller_id)
        .bind(status)
        .bind(trial_ends_at)
        .bind(&payload.notes)
        .fetch_one(executor)
        .await
        .map_err(map_client_conflict)?;

        Ok(client)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(client)
    }

    // Trava a linha do cliente até o fim da transação (mudanças de status concorrentes)
    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(client)
    }

    pub async fn list(&self, filters: &ClientFilters, owner: Option<Uuid>) -> Result<Vec<Client>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE 1 = 1"));

        if let Some(owner) = owner {
            builder.push(" AND seller_id = ").push_bind(owner);
        } else if let Some(seller_id) = filters.seller_id {
            builder.push(" AND seller_id = ").push_bind(seller_id);
        }
        if let Some(status) = filters.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR company_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR document ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder.push(" ORDER BY name ASC");

        let clients = builder.build_query_as::<Client>().fetch_all(&self.pool).await?;
        Ok(clients)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateClientPayload,
    ) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                document = COALESCE($5, document),
                company_name = COALESCE($6, company_name),
                seller_id = COALESCE($7, seller_id),
                notes = COALESCE($8, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(&payload.phone)
        .bind(&payload.document)
        .bind(&payload.company_name)
        .bind(payload.seller_id)
        .bind(&payload.notes)
        .fetch_optional(executor)
        .await
        .map_err(map_client_conflict)?;

        Ok(client)
    }

    pub async fn set_status<'e, E>(&self, executor: E, id: Uuid, status: ClientStatus) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients SET status = $2, status_changed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::ClientNotFound)?;

        Ok(client)
    }

    // Reativação de cliente cancelado: zera o trial
    pub async fn clear_trial<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE clients SET trial_ends_at = NULL WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_history<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        from: ClientStatus,
        to: ClientStatus,
        origin: StatusChangeOrigin,
        actor_id: Option<Uuid>,
        reason: Option<&str>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO client_status_history (client_id, from_status, to_status, origin, actor_id, reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(client_id)
        .bind(from)
        .bind(to)
        .bind(origin)
        .bind(actor_id)
        .bind(reason)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_history(&self, client_id: Uuid) -> Result<Vec<ClientStatusHistory>, AppError> {
        let history = sqlx::query_as::<_, ClientStatusHistory>(
            r#"
            SELECT id, client_id, from_status, to_status, origin, actor_id, reason, created_at
            FROM client_status_history
            WHERE client_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }

    // =========================================================================
    //  LEITURAS DO MOTOR DE COBRANÇA
    // =========================================================================

    const BILLING_SELECT: &'static str = r#"
        SELECT
            c.id, c.name, c.status, c.trial_ends_at,
            (SELECT MIN(p.due_date) FROM payments p
              WHERE p.client_id = c.id AND p.status IN ('PENDENTE', 'VENCIDO')) AS oldest_unpaid_due_date,
            EXISTS (SELECT 1 FROM payments p
              WHERE p.client_id = c.id AND p.status = 'CONFIRMADO') AS has_confirmed_payment
        FROM clients c
    "#;

    pub async fn billing_row<'e, E>(&self, executor: E, client_id: Uuid) -> Result<Option<ClientBillingRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ClientBillingRow>(&format!("{} WHERE c.id = $1", Self::BILLING_SELECT))
            .bind(client_id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    // Todos os clientes que a automação ainda pode mover
    pub async fn billing_rows<'e, E>(&self, executor: E) -> Result<Vec<ClientBillingRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, ClientBillingRow>(&format!(
            "{} WHERE c.status <> 'CANCELADO' ORDER BY c.name",
            Self::BILLING_SELECT
        ))
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn count_by_status(&self) -> Result<Vec<(ClientStatus, i64)>, AppError> {
        let rows: Vec<(ClientStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM clients GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}
