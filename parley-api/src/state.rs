use parley_chat::ChatService;
use parley_core::{IdentityProvider, ParleyContext};
use parley_notify::{ConnectionRegistry, NotificationDispatcher, SessionManager};
use parley_social::SocialService;
use std::sync::Arc;

use crate::auth::JwtIdentity;

/// Everything a request handler can reach, shared through an `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub ctx: ParleyContext,
    pub identity: Arc<dyn IdentityProvider>,
    pub registry: Arc<ConnectionRegistry>,
    pub sessions: SessionManager,
    pub social: SocialService,
    pub chat: ChatService,
}

impl AppState {
    pub fn new(ctx: ParleyContext) -> Self {
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(JwtIdentity::new(&ctx.config.server.jwt_secret, ctx.accounts.clone()));
        Self::with_identity(ctx, identity)
    }

    pub fn with_identity(ctx: ParleyContext, identity: Arc<dyn IdentityProvider>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = NotificationDispatcher::new(registry.clone());
        let sessions = SessionManager::new(
            registry.clone(),
            identity.clone(),
            ctx.config.realtime.channel_capacity,
        );

        Self {
            social: SocialService::from_context(&ctx, identity.clone(), dispatcher.clone()),
            chat: ChatService::from_context(&ctx, dispatcher),
            sessions,
            registry,
            identity,
            ctx,
        }
    }
}
