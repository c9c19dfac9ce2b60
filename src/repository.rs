use crate::{
    models::{Account, NewUser, User},
    store::StoreHandle,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The persistence contract consumed by the session resolver and the sign-in
/// flow. Handlers only see `Arc<dyn Repository>`, so tests swap in an
/// in-memory implementation.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;

    /// Resolves the user linked to an identity at a provider, if any.
    async fn find_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn create_user(&self, user: NewUser) -> Result<User, sqlx::Error>;

    /// Upserts on `(provider, provider_account_id)`; an existing link gets its token fields refreshed.
    async fn link_account(&self, account: Account) -> Result<(), sqlx::Error>;

    /// Idempotently creates the tables this repository needs.
    async fn ensure_schema(&self) -> Result<(), sqlx::Error>;
}

/// RepositoryState
///
/// The shared persistence handle stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        name TEXT,
        email TEXT,
        image TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

const CREATE_ACCOUNTS: &str = r#"
    CREATE TABLE IF NOT EXISTS accounts (
        provider TEXT NOT NULL,
        provider_account_id TEXT NOT NULL,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        access_token TEXT,
        token_type TEXT,
        scope TEXT,
        PRIMARY KEY (provider, provider_account_id)
    )
"#;

/// PostgresRepository
///
/// `Repository` backed by Postgres through the lazily connected `StoreHandle`.
pub struct PostgresRepository {
    store: Arc<StoreHandle>,
}

impl PostgresRepository {
    pub fn new(store: Arc<StoreHandle>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let pool = self.store.pool().await?;
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, image, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    async fn find_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let pool = self.store.pool().await?;
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.name, u.email, u.image, u.created_at
            FROM users u
            JOIN accounts a ON a.user_id = u.id
            WHERE a.provider = $1 AND a.provider_account_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(pool)
        .await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, sqlx::Error> {
        let pool = self.store.pool().await?;
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, image, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.name)
        .bind(user.email)
        .bind(user.image)
        .fetch_one(pool)
        .await
    }

    async fn link_account(&self, account: Account) -> Result<(), sqlx::Error> {
        let pool = self.store.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO accounts (provider, provider_account_id, user_id, access_token, token_type, scope)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (provider, provider_account_id) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                token_type = EXCLUDED.token_type,
                scope = EXCLUDED.scope
            "#,
        )
        .bind(account.provider)
        .bind(account.provider_account_id)
        .bind(account.user_id)
        .bind(account.access_token)
        .bind(account.token_type)
        .bind(account.scope)
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        let pool = self.store.pool().await?;
        sqlx::query(CREATE_USERS).execute(pool).await?;
        sqlx::query(CREATE_ACCOUNTS).execute(pool).await?;
        Ok(())
    }
}
