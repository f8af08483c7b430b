use anyhow::Result;
use dotenv::dotenv;
use sqlx::{Connection, PgPool};
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod api;
mod auth;
mod config;
mod db;
mod error;
mod features;
mod model;
mod scope;
mod service;

use api::AppState;
use auth::{AuthService, JwtConfig};
use crate::config::AppConfig;
use model::{NewUser, Role};
use service::{EventService, OrganizationService};

const DEMO_ORGANIZATION_SLUG: &str = "demo-weddings";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment variables from .env file
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting application");
    let config = AppConfig::load()?;

    // Run migrations using a dedicated admin connection
    info!("Running database migrations with admin privileges");
    let mut admin_conn = db::create_admin_connection(&config).await?;
    db::MIGRATOR.run(&mut admin_conn).await?;
    info!("Migrations completed successfully");
    let _ = admin_conn.close().await;

    let pool = db::init_pool(&config).await?;

    let auth_service = AuthService::new(pool.clone(), JwtConfig::from_config(&config));
    let organization_service = OrganizationService::new(pool.clone());

    // One-off job: upgrade legacy feature documents, then exit
    if env::args().nth(1).as_deref() == Some("migrate-features") {
        let migrated = organization_service.migrate_legacy_features().await?;
        info!("Migrated subscribed features for {} organizations", migrated);
        return Ok(());
    }

    seed_demo_data(&pool, &auth_service, &organization_service).await?;

    let state = AppState {
        auth: Arc::new(auth_service),
        organizations: organization_service.clone(),
        events: EventService::new(pool.clone(), organization_service),
    };

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Listening on {}", config.bind_address);
    axum::serve(listener, api::routes(state)).await?;

    Ok(())
}

/// Create the demo organization and its users if they don't exist yet
async fn seed_demo_data(
    pool: &PgPool,
    auth_service: &AuthService,
    organization_service: &OrganizationService,
) -> Result<()> {
    let organization_id: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM core.organization WHERE slug = $1")
            .bind(DEMO_ORGANIZATION_SLUG)
            .fetch_optional(pool)
            .await?;

    let organization_id = match organization_id {
        Some(id) => {
            info!("Demo organization already exists");
            id
        }
        None => {
            info!("Creating demo organization");
            organization_service
                .create_organization("Demo Weddings", DEMO_ORGANIZATION_SLUG)
                .await?
                .id
        }
    };
    info!("Demo organization ID: {}", organization_id);

    let demo_users = [
        ("admin@example.com", "admin_password", "Platform", "Admin", Role::SuperAdmin, None),
        ("owner@example.com", "owner_password", "Olivia", "Owner", Role::PlannerOwner, Some(organization_id)),
        ("planner@example.com", "planner_password", "Pat", "Planner", Role::Planner, Some(organization_id)),
    ];

    for (email, password, first_name, last_name, role, organization_id) in demo_users {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM core.usr WHERE email = $1)")
            .bind(email)
            .fetch_one(pool)
            .await?;

        if exists {
            info!("User {} already exists", email);
            continue;
        }

        auth_service
            .register_user(&NewUser {
                email: email.to_string(),
                password: password.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role,
                organization_id,
            })
            .await?;
    }

    info!("Demo data ready");
    Ok(())
}
