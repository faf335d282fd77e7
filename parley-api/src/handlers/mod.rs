use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use parley_core::{Confirmation, Identity, Page, PageRequest, ParleyError};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedAccount;
use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;

pub mod chat;
pub mod internal;
pub mod social;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

pub async fn health(Extension(state): Extension<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "parley-api",
        "storage": state.ctx.config.storage.backend,
        "online_accounts": state.registry.online_accounts(),
        "connections": state.registry.connection_count(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn to_request(&self) -> parley_core::Result<PageRequest> {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
        )
    }
}

/// The authenticated account behind a request, plus the path for the response envelope.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Identity,
    pub path: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        match parts.extensions.get::<AuthenticatedAccount>() {
            Some(AuthenticatedAccount(identity)) => Ok(Caller {
                identity: identity.clone(),
                path,
            }),
            None => Err(ApiError::new(ParleyError::InvalidToken, path)),
        }
    }
}

impl Caller {
    pub fn account_id(&self) -> &str {
        &self.identity.account_id
    }

    pub fn fail(&self, error: ParleyError) -> Response {
        ApiError::new(error, self.path.clone()).into_response()
    }

    pub fn reply<T: Serialize>(&self, status: StatusCode, result: parley_core::Result<Confirmation<T>>) -> Response {
        match result {
            Ok(confirmation) => {
                ApiResponse::new(status, confirmation.message, confirmation.data, self.path.clone()).into_response()
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn page<T: Serialize>(&self, result: parley_core::Result<Page<T>>) -> Response {
        self.reply(StatusCode::OK, result.map(|page| Confirmation::new("OK", page)))
    }
}
