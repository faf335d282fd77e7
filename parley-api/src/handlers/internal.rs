use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
};
use parley_core::ParleyError;

use super::Caller;
use crate::auth::SERVICE_ROLE;
use crate::state::AppState;

/// Hook for the identity subsystem, called once when an account is created.
pub async fn provision_account(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Path(account_id): Path<String>,
) -> Response {
    if !caller.identity.has_role(SERVICE_ROLE) {
        tracing::warn!("{} tried to provision {} without the service role", caller.account_id(), account_id);
        return caller.fail(ParleyError::MissingRole(SERVICE_ROLE.to_string()));
    }
    caller.reply(StatusCode::CREATED, state.chat.provision_account(&account_id).await)
}
