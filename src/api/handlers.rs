use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::{
    model::{LoginRequest, LoginResponse},
    AppState,
};
use crate::error::{AppError, AppResult};
use crate::features::FeatureConfig;
use crate::model::{AuthContext, EventPage};
use crate::scope::EventQuery;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("email and password are required".into()));
    }

    state
        .auth
        .authenticate(email, &req.password)
        .await
        .map(|(auth_context, token)| Json(LoginResponse::new(auth_context, token)))
}

pub async fn show_features(
    Extension(auth_context): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> AppResult<Json<FeatureConfig>> {
    state
        .organizations
        .get_features(&auth_context, organization_id)
        .await
        .map(Json)
}

pub async fn update_features(
    Extension(auth_context): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
    Json(document): Json<Value>,
) -> AppResult<Json<FeatureConfig>> {
    state
        .organizations
        .update_features(&auth_context, organization_id, document)
        .await
        .map(Json)
}

pub async fn show_event_list(
    Extension(auth_context): Extension<AuthContext>,
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<EventPage>> {
    state
        .events
        .list_events(&auth_context, &query)
        .await
        .map(Json)
}
