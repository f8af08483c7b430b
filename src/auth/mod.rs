mod auth_service;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::model::{AuthContext, Role};

pub use auth_service::AuthService;

/// JWT Claims structure that will be encoded in the token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Organization the user belongs to; absent for super admins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<Uuid>,
    /// Role name
    pub role: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

/// Configuration for JWT tokens
pub struct JwtConfig {
    /// Secret key for signing tokens
    encoding_key: EncodingKey,
    /// Key for verifying token signatures
    decoding_key: DecodingKey,
    /// Token expiration time in seconds
    expiration: i64,
    /// Issuer claim value
    issuer: String,
}

impl JwtConfig {
    pub fn new(secret: &str, expiration: i64, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration,
            issuer: issuer.into(),
        }
    }

    /// Initialize JWT configuration from the application config
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_expiration_seconds,
            config.jwt_issuer.clone(),
        )
    }

    /// Generate a JWT token for an authenticated session
    pub fn generate_token(&self, auth_context: &AuthContext) -> AppResult<String> {
        let now = OffsetDateTime::now_utc();
        let expiration = now + Duration::seconds(self.expiration);

        let claims = Claims {
            sub: auth_context.user_id,
            org: auth_context.organization_id,
            role: auth_context.role.as_str().to_string(),
            iat: now.unix_timestamp(),
            exp: expiration.unix_timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;

        debug!("Generated JWT token for user_id: {}", auth_context.user_id);
        Ok(token)
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        debug!("Validated JWT token for user_id: {}", token_data.claims.sub);
        Ok(token_data.claims)
    }

    /// Convert JWT claims to AuthContext
    pub fn claims_to_auth_context(claims: Claims) -> AuthContext {
        AuthContext {
            user_id: claims.sub,
            organization_id: claims.org,
            role: Role::from(claims.role),
        }
    }
}
