use anyhow::Result;
use sqlx::{
    migrate::Migrator,
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, PgConnection, PgPool, Postgres, Transaction,
};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppResult;

pub static MIGRATOR: Migrator = sqlx::migrate!("./sql/migrations");

/// Initialize the database connection pool for the application
pub async fn init_pool(config: &AppConfig) -> Result<PgPool> {
    info!("Initializing application database connection pool");

    let options = PgConnectOptions::from_str(&config.database_url)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect_with(options)
        .await?;

    info!("Application database connection pool initialized");
    Ok(pool)
}

/// Create a single admin database connection for migrations
pub async fn create_admin_connection(config: &AppConfig) -> Result<PgConnection> {
    info!("Creating admin database connection for migrations");

    let options = PgConnectOptions::from_str(config.admin_database_url())?;
    let conn = PgConnection::connect_with(&options).await?;

    info!("Admin database connection established");
    Ok(conn)
}

/// Set the tenant context for a transaction
pub async fn set_transaction_tenant_context(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: Uuid,
) -> AppResult<()> {
    sqlx::query("SELECT set_tenant_context($1)")
        .bind(organization_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Clear the tenant context for a transaction (platform-wide access)
pub async fn clear_transaction_tenant_context(tx: &mut Transaction<'_, Postgres>) -> AppResult<()> {
    sqlx::query("SELECT clear_tenant_context()")
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Begin a transaction bound to one organization, or to all of them when `None`
pub async fn begin_scoped(
    pool: &PgPool,
    organization_id: Option<Uuid>,
) -> AppResult<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;

    match organization_id {
        Some(organization_id) => set_transaction_tenant_context(&mut tx, organization_id).await?,
        None => clear_transaction_tenant_context(&mut tx).await?,
    }

    debug!("Transaction tenant context: {:?}", organization_id);
    Ok(tx)
}
