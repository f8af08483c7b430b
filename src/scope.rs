use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::model::Role;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// Role-derived restriction on which events a user may list.
///
/// Empty means no restriction beyond the organization filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_planner_id: Option<Uuid>,
}

impl ScopeFilter {
    pub fn is_empty(&self) -> bool {
        self.lead_planner_id.is_none()
    }
}

/// Compute the event scope for a user's role
pub fn compute_scope(role: &Role, user_id: Uuid) -> ScopeFilter {
    match role {
        Role::Planner => ScopeFilter {
            lead_planner_id: Some(user_id),
        },
        Role::SuperAdmin | Role::PlannerOwner | Role::Finance => ScopeFilter::default(),
        // Vendors, coordinators and unknown roles are currently unrestricted
        other => {
            debug!("No event scope defined for role {}", other.as_str());
            ScopeFilter::default()
        }
    }
}

/// Filters supplied by the caller of an event listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl EventQuery {
    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.per_page())
    }
}

/// Append the WHERE clause for an event listing.
///
/// The organization filter, the role scope and the caller's filters are all
/// ANDed together; none of them replaces another.
pub fn push_event_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    organization_id: Option<Uuid>,
    scope: &ScopeFilter,
    query: &EventQuery,
) {
    builder.push(" WHERE TRUE");

    if let Some(organization_id) = organization_id {
        builder.push(" AND organization_id = ").push_bind(organization_id);
    }

    if let Some(lead_planner_id) = scope.lead_planner_id {
        builder.push(" AND lead_planner_id = ").push_bind(lead_planner_id);
    }

    if let Some(search) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
    {
        builder
            .push(" AND name ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)))
            .push(" ESCAPE '\\'");
    }

    if let Some(status) = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|status| !status.is_empty())
    {
        builder.push(" AND status = ").push_bind(status.to_string());
    }

    if let Some(from) = query.from {
        builder.push(" AND event_date >= ").push_bind(from);
    }

    if let Some(to) = query.to {
        builder.push(" AND event_date <= ").push_bind(to);
    }
}

/// Search text matches literally; `%` and `_` typed by the caller are not wildcards
fn escape_like(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len());
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
