use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{Json, Response},
};
use parley_core::{Confirmation, ConversationId, MessageId, MessageType, NewGroup, ReactionKind};
use serde::Deserialize;

use super::{Caller, PageQuery};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendMessageBody {
    pub conversation_id: ConversationId,
    pub content: String,
    #[serde(default)]
    pub message_type: Option<MessageType>,
}

#[derive(Deserialize)]
pub struct CreateGroupBody {
    pub members: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Deserialize)]
pub struct ReactionBody {
    /// Absent or null clears the caller's reaction.
    #[serde(default)]
    pub reaction: Option<ReactionKind>,
}

pub async fn send_message(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Json(body): Json<SendMessageBody>,
) -> Response {
    let result = state
        .chat
        .send_message(caller.account_id(), body.conversation_id, &body.content, body.message_type)
        .await;
    caller.reply(StatusCode::CREATED, result)
}

pub async fn conversations(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = match query.to_request() {
        Ok(page) => page,
        Err(e) => return caller.fail(e),
    };
    caller.page(state.chat.get_conversations(caller.account_id(), page).await)
}

pub async fn conversation(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Path(conversation_id): Path<ConversationId>,
) -> Response {
    let result = state
        .chat
        .get_conversation(caller.account_id(), conversation_id)
        .await
        .map(|conversation| Confirmation::new("OK", conversation));
    caller.reply(StatusCode::OK, result)
}

pub async fn create_group(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Json(body): Json<CreateGroupBody>,
) -> Response {
    let group = NewGroup {
        admin: caller.account_id().to_string(),
        members: body.members,
        name: body.name,
        description: body.description,
        avatar: body.avatar,
    };
    caller.reply(StatusCode::CREATED, state.chat.create_group(group).await)
}

/// Messages of the conversation `id`, newest first.
pub async fn messages(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Path(conversation_id): Path<ConversationId>,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = match query.to_request() {
        Ok(page) => page,
        Err(e) => return caller.fail(e),
    };
    caller.page(state.chat.get_messages(caller.account_id(), conversation_id, page).await)
}

pub async fn mark_seen(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Path(message_id): Path<MessageId>,
) -> Response {
    let result = state.chat.mark_seen(caller.account_id(), message_id).await;
    caller.reply(StatusCode::OK, result)
}

pub async fn react(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Path(message_id): Path<MessageId>,
    Json(body): Json<ReactionBody>,
) -> Response {
    let result = state.chat.react(caller.account_id(), message_id, body.reaction).await;
    caller.reply(StatusCode::OK, result)
}

pub async fn delete_for_me(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Path(message_id): Path<MessageId>,
) -> Response {
    let result = state.chat.delete_for_me(caller.account_id(), message_id).await;
    caller.reply(StatusCode::OK, result)
}
