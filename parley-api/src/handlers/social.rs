use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{Json, Response},
};
use parley_core::RelationshipId;
use serde::Deserialize;

use super::{Caller, PageQuery};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FriendRequestBody {
    pub target_account_id: String,
}

#[derive(Deserialize)]
pub struct RelationshipBody {
    pub relationship_id: RelationshipId,
}

#[derive(Deserialize)]
pub struct UnfriendBody {
    pub account_id: String,
}

pub async fn request_friend(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Json(body): Json<FriendRequestBody>,
) -> Response {
    let result = state
        .social
        .request_friend(caller.account_id(), &body.target_account_id)
        .await;
    caller.reply(StatusCode::CREATED, result)
}

pub async fn accept_friend_request(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Json(body): Json<RelationshipBody>,
) -> Response {
    let result = state
        .social
        .accept_friend_request(caller.account_id(), body.relationship_id)
        .await;
    caller.reply(StatusCode::OK, result)
}

pub async fn decline_friend_request(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Json(body): Json<RelationshipBody>,
) -> Response {
    let result = state
        .social
        .decline_friend_request(caller.account_id(), body.relationship_id)
        .await;
    caller.reply(StatusCode::OK, result)
}

pub async fn cancel_friend_request(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Json(body): Json<RelationshipBody>,
) -> Response {
    let result = state
        .social
        .cancel_friend_request(caller.account_id(), body.relationship_id)
        .await;
    caller.reply(StatusCode::OK, result)
}

pub async fn friend_requests(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = match query.to_request() {
        Ok(page) => page,
        Err(e) => return caller.fail(e),
    };
    caller.page(state.social.list_pending_requests(caller.account_id(), page).await)
}

pub async fn friends(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = match query.to_request() {
        Ok(page) => page,
        Err(e) => return caller.fail(e),
    };
    caller.page(state.social.list_friends(caller.account_id(), page).await)
}

pub async fn unfriend(
    Extension(state): Extension<AppState>,
    caller: Caller,
    Json(body): Json<UnfriendBody>,
) -> Response {
    let result = state.social.unfriend(caller.account_id(), &body.account_id).await;
    caller.reply(StatusCode::OK, result)
}
