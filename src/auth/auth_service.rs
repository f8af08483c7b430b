use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::model::{AuthContext, NewUser, Role, User};

/// Authentication service for credential checks and session tokens
pub struct AuthService {
    /// Database connection pool
    db_pool: PgPool,
    /// JWT configuration
    pub jwt_config: JwtConfig,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(db_pool: PgPool, jwt_config: JwtConfig) -> Self {
        Self {
            db_pool,
            jwt_config,
        }
    }

    /// Hash a password using Argon2
    pub fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing error: {}", e)))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash using Argon2
    pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| AppError::Internal(format!("Password hash parsing error: {}", e)))?;
        let result = Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();
        Ok(result)
    }

    /// Authenticate a user with email and password
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(AuthContext, String)> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM core.usr WHERE email = $1 AND is_active = TRUE",
        )
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

        if !Self::verify_password(password, &user.password_hash)? {
            warn!("Password verification failed for user: {}", email);
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }

        let auth_context = AuthContext {
            user_id: user.id,
            organization_id: user.organization_id,
            role: user.role(),
        };

        let token = self.jwt_config.generate_token(&auth_context)?;

        info!("User authenticated successfully: {}", email);
        Ok((auth_context, token))
    }

    /// Validate a bearer token and extract the session
    pub fn validate_token(&self, token: &str) -> AppResult<AuthContext> {
        let claims = self.jwt_config.validate_token(token)?;
        let auth_context = JwtConfig::claims_to_auth_context(claims);

        debug!("Token validated for user_id: {}", auth_context.user_id);
        Ok(auth_context)
    }

    /// Register a new user
    pub async fn register_user(&self, new_user: &NewUser) -> AppResult<User> {
        // Everyone except super admins belongs to an organization
        if new_user.role != Role::SuperAdmin && new_user.organization_id.is_none() {
            return Err(AppError::Validation(format!(
                "role {} requires an organization",
                new_user.role.as_str()
            )));
        }

        let password_hash = Self::hash_password(&new_user.password)?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO core.usr (organization_id, email, password_hash, first_name, last_name, role, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7)
             RETURNING *",
        )
        .bind(new_user.organization_id)
        .bind(&new_user.email)
        .bind(password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.role.as_str())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!("New user registered: {} ({})", new_user.email, new_user.role.as_str());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use sqlx::postgres::PgPoolOptions;
    use std::env;
    use dotenv::dotenv;

    async fn setup_test_db() -> PgPool {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for tests");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to create database connection pool");

        db::MIGRATOR.run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn jwt_config() -> JwtConfig {
        JwtConfig::new("test_secret_key_for_jwt_token_testing", 3600, "test_issuer")
    }

    #[test]
    fn test_password_hashing() {
        let hash = AuthService::hash_password("test_password").unwrap();

        assert!(AuthService::verify_password("test_password", &hash).unwrap());
        assert!(!AuthService::verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(AuthService::verify_password("test_password", "plaintext").is_err());
    }

    #[tokio::test]
    async fn test_organization_required_for_planner() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/plannercore_unused")
            .unwrap();
        let auth_service = AuthService::new(pool, jwt_config());

        let result = auth_service
            .register_user(&NewUser {
                email: "planner@example.com".into(),
                password: "test_password".into(),
                first_name: "Pat".into(),
                last_name: "Planner".into(),
                role: Role::Planner,
                organization_id: None,
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_user_registration_and_authentication() {
        let pool = setup_test_db().await;
        let auth_service = AuthService::new(pool.clone(), jwt_config());

        let email = format!("test_admin_{}@example.com", uuid::Uuid::new_v4());

        let user = auth_service
            .register_user(&NewUser {
                email: email.clone(),
                password: "test_password".into(),
                first_name: "Test".into(),
                last_name: "Admin".into(),
                role: Role::SuperAdmin,
                organization_id: None,
            })
            .await
            .unwrap();

        assert_eq!(user.email, email);
        assert!(user.is_active);
        assert_eq!(user.role(), Role::SuperAdmin);

        let (auth_context, token) = auth_service.authenticate(&email, "test_password").await.unwrap();
        assert_eq!(auth_context.user_id, user.id);
        assert!(auth_context.is_super_admin());

        let validated_context = auth_service.validate_token(&token).unwrap();
        assert_eq!(validated_context, auth_context);

        let result = auth_service.authenticate(&email, "wrong_password").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
