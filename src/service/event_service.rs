use sqlx::{PgPool, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::OrganizationService;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::features::Feature;
use crate::model::{AuthContext, Event, EventPage};
use crate::scope::{compute_scope, push_event_filters, EventQuery};

/// Event listings scoped to the caller's organization and role
#[derive(Clone)]
pub struct EventService {
    db_pool: PgPool,
    organizations: OrganizationService,
}

impl EventService {
    pub fn new(db_pool: PgPool, organizations: OrganizationService) -> Self {
        Self {
            db_pool,
            organizations,
        }
    }

    /// List the events visible to the caller
    pub async fn list_events(&self, auth_context: &AuthContext, query: &EventQuery) -> AppResult<EventPage> {
        let organization_id = tenant_filter(auth_context)?;

        if let Some(organization_id) = organization_id {
            self.organizations
                .get_features(auth_context, organization_id)
                .await?
                .require(Feature::Events, None)?;
        }

        let scope = compute_scope(&auth_context.role, auth_context.user_id);
        let mut tx = db::begin_scoped(&self.db_pool, organization_id).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM core.event");
        push_event_filters(&mut count, organization_id, &scope, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut select = QueryBuilder::new("SELECT * FROM core.event");
        push_event_filters(&mut select, organization_id, &scope, query);
        select
            .push(" ORDER BY event_date DESC LIMIT ")
            .push_bind(i64::from(query.per_page()))
            .push(" OFFSET ")
            .push_bind(query.offset());
        let items: Vec<Event> = select.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await?;

        debug!(
            "Listed {} of {} events for user_id: {} (scope: {:?})",
            items.len(),
            total,
            auth_context.user_id,
            scope
        );
        Ok(EventPage {
            items,
            total,
            page: query.page(),
            per_page: query.per_page(),
        })
    }
}

/// Organization every query must be restricted to; `None` for platform-wide access
fn tenant_filter(auth_context: &AuthContext) -> AppResult<Option<Uuid>> {
    if auth_context.is_super_admin() {
        return Ok(None);
    }

    auth_context
        .organization_id
        .map(Some)
        .ok_or_else(|| AppError::Forbidden("user does not belong to an organization".into()))
}
