//! Authentication for the storefront API: JWT access tokens for registered
//! shoppers, argon2 password hashes, and request extractors for the three
//! caller kinds (authenticated user, staff, and anonymous-or-authenticated
//! shopper).

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::entities::{user, User, UserModel};
use crate::errors::ServiceError;

/// Claim structure for access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    pub staff: bool,
    /// Token id
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller extracted from a bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub is_staff: bool,
    pub token_id: String,
}

/// Authenticated caller that must be staff
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthUser);

/// The current shopper: an authenticated user, or an anonymous visitor
/// identified by a client-held cart session key. A fresh key is generated
/// when the request carries neither credential; the caller learns it from
/// the cart payload and replays it on subsequent requests.
#[derive(Debug, Clone)]
pub enum Shopper {
    Customer(Uuid),
    Anonymous(String),
}

/// Header carrying the anonymous cart session key
pub const CART_SESSION_HEADER: &str = "x-cart-session";

pub fn generate_session_key() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, access_token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            access_token_expiration,
        }
    }
}

pub struct AuthService {
    config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

/// Input for registering a new user
#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Registers a new user with a hashed password. Fails with a conflict
    /// when the email is already taken.
    pub async fn register(&self, input: RegisterInput) -> Result<UserModel, ServiceError> {
        let email = input.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::ValidationError(
                "A valid email address is required".to_string(),
            ));
        }
        if input.password.len() < 8 {
            return Err(ServiceError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let existing = User::find()
            .filter(user::Column::Email.eq(&email))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(hash_password(&input.password)?),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            is_staff: Set(false),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db).await?;
        info!("Registered user {}", created.id);
        Ok(created)
    }

    /// Verifies credentials and issues an access token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, UserModel), ServiceError> {
        let email = email.trim().to_lowercase();
        let user = User::find()
            .filter(user::Column::Email.eq(&email))
            .filter(user::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::AuthError("Invalid email or password".to_string()))?;

        if !verify_password(password, &user.password_hash) {
            return Err(ServiceError::AuthError(
                "Invalid email or password".to_string(),
            ));
        }

        let token = self.issue_token(&user)?;
        Ok((token, user))
    }

    pub fn issue_token(&self, user: &UserModel) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            staff: user.is_staff,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.access_token_expiration.as_secs() as i64,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::AuthError(format!("Failed to issue token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ServiceError::AuthError(format!("Invalid token: {}", e)))?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::AuthError("Invalid token subject".to_string()))?;

        Ok(AuthUser {
            user_id,
            email: data.claims.email,
            is_staff: data.claims.staff,
            token_id: data.claims.jti,
        })
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;
        auth.verify_token(token)
    }
}

impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(ServiceError::Forbidden(
                "Staff access required".to_string(),
            ));
        }
        Ok(StaffUser(user))
    }
}

impl<S> FromRequestParts<S> for Shopper
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if bearer_token(parts).is_some() {
            let user = AuthUser::from_request_parts(parts, state).await?;
            return Ok(Shopper::Customer(user.user_id));
        }

        let session_key = parts
            .headers
            .get(CART_SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.to_string())
            .unwrap_or_else(generate_session_key);

        Ok(Shopper::Anonymous(session_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter2-hunter2").unwrap();
        assert!(verify_password("hunter2-hunter2", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }

    #[test]
    fn generated_session_keys_are_distinct() {
        let a = generate_session_key();
        let b = generate_session_key();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let config = AuthConfig::new(
            "a-sufficiently-long-testing-secret-value".into(),
            Duration::from_secs(3600),
        );
        let db = Arc::new(sea_orm::DatabaseConnection::Disconnected);
        let service = AuthService::new(config, db);

        let user = UserModel {
            id: Uuid::new_v4(),
            email: "shopper@example.com".into(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            is_staff: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let token = service.issue_token(&user).unwrap();
        let auth = service.verify_token(&token).unwrap();
        assert_eq!(auth.user_id, user.id);
        assert_eq!(auth.email, user.email);
        assert!(auth.is_staff);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = AuthConfig::new(
            "a-sufficiently-long-testing-secret-value".into(),
            Duration::from_secs(3600),
        );
        let db = Arc::new(sea_orm::DatabaseConnection::Disconnected);
        let service = AuthService::new(config, db);
        assert!(service.verify_token("not.a.token").is_err());
    }
}
