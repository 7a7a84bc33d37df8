//! Tenant credential lookup.
//!
//! Each tenant (shop location) owns a publication API token for the review
//! provider. The boundary resolves the token before the pipeline runs;
//! unknown tenants never reach the core.

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;

/// Credential lookup errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("customer lookup failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Tenant id to provider access token.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// `Ok(None)` means the tenant is unknown or inactive.
    async fn access_token(&self, tenant_id: &str) -> Result<Option<String>, DirectoryError>;
}

/// Postgres-backed directory over the `customers` table.
pub struct PgCustomerDirectory {
    pool: PgPool,
}

impl PgCustomerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerDirectory for PgCustomerDirectory {
    async fn access_token(&self, tenant_id: &str) -> Result<Option<String>, DirectoryError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT api_token FROM customers WHERE tenant_id = $1 AND active = true",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(token,)| token))
    }
}

/// Fixed in-memory directory for development and tests.
#[derive(Default)]
pub struct StaticCustomerDirectory {
    tokens: RwLock<HashMap<String, String>>,
}

impl StaticCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(self, tenant_id: &str, token: &str) -> Self {
        self.tokens
            .write()
            .insert(tenant_id.to_string(), token.to_string());
        self
    }
}

#[async_trait]
impl CustomerDirectory for StaticCustomerDirectory {
    async fn access_token(&self, tenant_id: &str) -> Result<Option<String>, DirectoryError> {
        Ok(self.tokens.read().get(tenant_id).cloned())
    }
}
