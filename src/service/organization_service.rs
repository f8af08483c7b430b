use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::features::{normalize, upgrade_legacy, FeatureConfig, PartialFeatureConfig};
use crate::model::{AuthContext, Organization};

/// Organization settings: subscribed features and their legacy migration
#[derive(Clone)]
pub struct OrganizationService {
    db_pool: PgPool,
}

impl OrganizationService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Create an organization with no stored feature configuration
    pub async fn create_organization(&self, name: &str, slug: &str) -> AppResult<Organization> {
        let organization = sqlx::query_as::<_, Organization>(
            "INSERT INTO core.organization (name, slug, status, subscribed_features, created_at, updated_at)
             VALUES ($1, $2, 'active', '{}'::jsonb, $3, $3)
             RETURNING *",
        )
        .bind(name)
        .bind(slug)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!("Organization created: {} ({})", organization.slug, organization.id);
        Ok(organization)
    }

    async fn find_organization(&self, organization_id: Uuid) -> AppResult<Organization> {
        sqlx::query_as::<_, Organization>("SELECT * FROM core.organization WHERE id = $1")
            .bind(organization_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound {
                entity: "Organization".into(),
                id: organization_id.to_string(),
            })
    }

    /// Normalized feature configuration of an organization.
    ///
    /// Stored documents are normalized on every read and never rewritten here.
    pub async fn get_features(
        &self,
        auth_context: &AuthContext,
        organization_id: Uuid,
    ) -> AppResult<FeatureConfig> {
        authorize_member(auth_context, organization_id)?;

        let organization = self.find_organization(organization_id).await?;
        if organization.is_suspended() && !auth_context.is_super_admin() {
            return Err(AppError::Forbidden("organization is suspended".into()));
        }

        let stored = PartialFeatureConfig::from_json(&organization.subscribed_features);
        debug!("Normalizing features for organization {}", organization_id);
        Ok(normalize(&stored))
    }

    /// Replace the stored feature document verbatim and return its normalized view
    pub async fn update_features(
        &self,
        auth_context: &AuthContext,
        organization_id: Uuid,
        document: Value,
    ) -> AppResult<FeatureConfig> {
        if !auth_context.is_super_admin() {
            return Err(AppError::Forbidden(
                "only platform administrators can change subscribed features".into(),
            ));
        }

        if !document.is_object() {
            return Err(AppError::Validation(
                "subscribed features must be a JSON object".into(),
            ));
        }

        let organization = sqlx::query_as::<_, Organization>(
            "UPDATE core.organization SET subscribed_features = $1, updated_at = $2
             WHERE id = $3
             RETURNING *",
        )
        .bind(&document)
        .bind(OffsetDateTime::now_utc())
        .bind(organization_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound {
            entity: "Organization".into(),
            id: organization_id.to_string(),
        })?;

        info!(
            "Subscribed features updated for organization {} by user_id: {}",
            organization.id, auth_context.user_id
        );
        Ok(normalize(&PartialFeatureConfig::from_json(
            &organization.subscribed_features,
        )))
    }

    /// Rewrite every stored document that still holds legacy boolean values.
    /// Returns the number of organizations updated.
    pub async fn migrate_legacy_features(&self) -> AppResult<u64> {
        let mut tx = self.db_pool.begin().await?;

        let documents: Vec<(Uuid, Value)> = sqlx::query_as(
            "SELECT id, subscribed_features FROM core.organization FOR UPDATE",
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut migrated = 0;
        for (organization_id, stored) in documents {
            let Some(upgraded) = upgrade_legacy(&stored) else {
                continue;
            };

            sqlx::query(
                "UPDATE core.organization SET subscribed_features = $1, updated_at = $2 WHERE id = $3",
            )
            .bind(upgraded)
            .bind(OffsetDateTime::now_utc())
            .bind(organization_id)
            .execute(&mut *tx)
            .await?;

            debug!("Upgraded legacy features for organization {}", organization_id);
            migrated += 1;
        }

        tx.commit().await?;

        info!("Legacy feature migration complete: {} organizations updated", migrated);
        Ok(migrated)
    }
}

/// Members may only read their own organization; super admins read any
fn authorize_member(auth_context: &AuthContext, organization_id: Uuid) -> AppResult<()> {
    if auth_context.is_super_admin() || auth_context.organization_id == Some(organization_id) {
        return Ok(());
    }

    Err(AppError::Forbidden(format!(
        "user {} is not a member of organization {}",
        auth_context.user_id, organization_id
    )))
}
