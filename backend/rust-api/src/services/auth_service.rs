use crate::errors::{is_duplicate_key, ApiError};
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserProfile};
use crate::services::USERS;
use crate::utils::time::chrono_to_bson;
use anyhow::{anyhow, Context};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

pub struct AuthService {
    mongo: Database,
    jwt_service: JwtService,
    token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(mongo: Database, jwt_service: JwtService, token_ttl_seconds: i64) -> Self {
        Self {
            mongo,
            jwt_service,
            token_ttl_seconds,
        }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        hash(password, DEFAULT_COST).context("Failed to hash password")
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        verify(password, hash).context("Failed to verify password")
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
        let users = self.mongo.collection::<User>(USERS);
        let email = normalize_email(&req.email);

        let existing = users
            .find_one(doc! { "email": &email })
            .await
            .context("Failed to check existing user")?;
        if existing.is_some() {
            return Err(ApiError::conflict("User with this email already exists"));
        }

        let now = Utc::now();
        let mut user = User {
            id: None,
            email,
            name: req.name.trim().to_string(),
            password_hash: self.hash_password(&req.password)?,
            role: Default::default(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        // The unique index settles concurrent registrations of the same email.
        let insert_result = users.insert_one(&user).await.map_err(|e| {
            if is_duplicate_key(&e) {
                ApiError::conflict("User with this email already exists")
            } else {
                ApiError::Internal(anyhow::Error::new(e).context("Failed to insert user"))
            }
        })?;

        let user_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("Failed to get inserted user ID"))?;
        user.id = Some(user_id);

        tracing::info!(user_id = %user_id.to_hex(), "User registered");

        let token = self.generate_token(&user)?;
        Ok(AuthResponse {
            token,
            user: UserProfile::from(user),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ApiError> {
        let users = self.mongo.collection::<User>(USERS);
        let email = normalize_email(&req.email);

        let Some(mut user) = users
            .find_one(doc! { "email": &email })
            .await
            .context("Failed to query user")?
        else {
            tracing::warn!(email = %email, "Failed login attempt: unknown email");
            return Err(ApiError::unauthorized("Invalid email or password"));
        };

        if !self.verify_password(&req.password, &user.password_hash)? {
            tracing::warn!(email = %email, "Failed login attempt: invalid password");
            return Err(ApiError::unauthorized("Invalid email or password"));
        }

        let user_id = user.id.ok_or_else(|| anyhow!("User ID not found"))?;
        let now = Utc::now();

        users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "lastLoginAt": chrono_to_bson(now) } },
            )
            .await
            .context("Failed to update last login timestamp")?;
        user.last_login_at = Some(now);

        tracing::info!(user_id = %user_id.to_hex(), "Successful login");

        let token = self.generate_token(&user)?;
        Ok(AuthResponse {
            token,
            user: UserProfile::from(user),
        })
    }

    pub async fn get_user_by_id(&self, user_id: ObjectId) -> Result<UserProfile, ApiError> {
        self.mongo
            .collection::<User>(USERS)
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query user")?
            .map(UserProfile::from)
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    fn generate_token(&self, user: &User) -> Result<String, ApiError> {
        let user_id = user.id.ok_or_else(|| anyhow!("User ID not found"))?;
        let now = Utc::now();
        let exp = now + Duration::seconds(self.token_ttl_seconds);

        let claims = JwtClaims {
            sub: user_id.to_hex(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.as_str().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(&claims)
            .map_err(|e| ApiError::Internal(anyhow!(e)))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> AuthService {
        // The driver connects lazily, so no server is needed for these tests.
        let client = mongodb::Client::with_uri_str("mongodb://127.0.0.1:27017")
            .await
            .unwrap();
        AuthService::new(client.database("formforge_test"), JwtService::new("secret"), 60)
    }

    #[tokio::test]
    async fn password_hash_roundtrip() {
        let service = service().await;
        let hashed = service.hash_password("correct horse").unwrap();
        assert_ne!(hashed, "correct horse");
        assert!(service.verify_password("correct horse", &hashed).unwrap());
        assert!(!service.verify_password("battery staple", &hashed).unwrap());
    }

    #[tokio::test]
    async fn tokens_carry_the_user_identity() {
        let service = service().await;
        let now = Utc::now();
        let user = User {
            id: Some(ObjectId::new()),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            password_hash: String::new(),
            role: Default::default(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let token = service.generate_token(&user).unwrap();
        let claims = JwtService::new("secret").validate_token(&token).unwrap();
        assert_eq!(claims.sub, user.id.unwrap().to_hex());
        assert_eq!(claims.role, "user");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn emails_are_case_folded() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
