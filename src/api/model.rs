use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AuthContext, Role};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub role: Role,
}

impl LoginResponse {
    pub fn new(auth_context: AuthContext, token: String) -> Self {
        let AuthContext {
            user_id,
            organization_id,
            role,
        } = auth_context;
        Self {
            token,
            user_id,
            organization_id,
            role,
        }
    }
}
