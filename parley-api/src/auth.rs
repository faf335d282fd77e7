use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use parley_core::{AccountDirectory, AccountProfile, Identity, IdentityProvider, ParleyError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ApiError;
use crate::state::AppState;

/// Role carried by internal callers such as account provisioning.
pub const SERVICE_ROLE: &str = "service";

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
}

/// The caller resolved by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount(pub Identity);

/// Identity provider backed by HS256 tokens and an account directory.
pub struct JwtIdentity {
    decoding_key: DecodingKey,
    validation: Validation,
    directory: Arc<dyn AccountDirectory>,
}

impl JwtIdentity {
    pub fn new(secret: &str, directory: Arc<dyn AccountDirectory>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation: Validation::default(),
            directory,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentity {
    async fn verify(&self, token: &str) -> Result<Identity> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(token_data) => Ok(Identity {
                account_id: token_data.claims.sub,
                roles: token_data.claims.roles,
            }),
            Err(e) => {
                tracing::debug!("JWT verification failed: {}", e);
                Err(ParleyError::InvalidToken)
            }
        }
    }

    async fn account_profile(&self, account_id: &str) -> Result<AccountProfile> {
        self.directory
            .find_profile(account_id)
            .await?
            .ok_or_else(|| ParleyError::AccountNotFound(account_id.to_string()))
    }
}

/// Generate a token for an account. Minting belongs to the identity subsystem;
/// this exists for local tooling and tests.
pub fn generate_token(account_id: &str, roles: &[&str], secret: &str, ttl_secs: u64) -> anyhow::Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let claims = Claims {
        sub: account_id.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        exp: (now + ttl_secs) as usize,
    };

    let encoding_key = EncodingKey::from_secret(secret.as_ref());
    Ok(encode(&Header::default(), &claims, &encoding_key)?)
}

/// Extract the bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?
        .strip_prefix("Bearer ")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Axum middleware for JWT authentication
pub async fn auth_middleware(mut req: Request, next: axum::middleware::Next) -> Response {
    // /ws authenticates itself before the upgrade
    let path = req.uri().path().to_string();
    if path == "/health" || path.starts_with("/ws") || req.method() == axum::http::Method::OPTIONS {
        return next.run(req).await;
    }

    let token = match bearer_token(req.headers()) {
        Some(t) => t,
        None => {
            tracing::debug!("Missing Authorization header");
            return ApiError::new(ParleyError::InvalidToken, path).into_response();
        }
    };

    let state = match req.extensions().get::<AppState>() {
        Some(state) => state.clone(),
        None => {
            tracing::error!("AppState extension missing from request");
            return ApiError::new(ParleyError::Storage("application state unavailable".into()), path)
                .into_response();
        }
    };

    match state.identity.verify(&token).await {
        Ok(identity) => {
            tracing::debug!("Authenticated account: {}", identity.account_id);
            req.extensions_mut().insert(AuthenticatedAccount(identity));
            next.run(req).await
        }
        Err(e) => ApiError::new(e, path).into_response(),
    }
}
