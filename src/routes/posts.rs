use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    dto::{
        common::MessageResponse,
        post::{CreateGamePostRequest, GamePostResponse, ReadyUpResponse, SubmitResultRequest},
    },
    error::AppError,
    services::post_service,
    state::SharedState,
};

/// Routes handling the game-post lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game_post).get(list_game_posts))
        .route("/games/party/{party_id}", get(list_party_game_posts))
        .route("/games/{id}/join", post(join_game_post))
        .route("/games/{id}/ready", post(ready_up))
        .route("/games/{id}/result", post(submit_match_result))
        .route("/games/{id}", delete(delete_game_post))
}

/// Post a new game for others to join.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGamePostRequest,
    responses(
        (status = 200, description = "Game post created", body = GamePostResponse),
        (status = 400, description = "Invalid format or party"),
        (status = 409, description = "Creator already has an active post")
    )
)]
pub async fn create_game_post(
    State(state): State<SharedState>,
    user: CurrentUser,
    Valid(Json(payload)): Valid<Json<CreateGamePostRequest>>,
) -> Result<Json<GamePostResponse>, AppError> {
    let response = post_service::create_post(&state, &user, payload).await?;
    Ok(Json(response))
}

/// List every game post, sweeping expired ones first.
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    responses(
        (status = 200, description = "All game posts", body = [GamePostResponse])
    )
)]
pub async fn list_game_posts(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<Json<Vec<GamePostResponse>>, AppError> {
    let response = post_service::list_posts(&state, &user, None).await?;
    Ok(Json(response))
}

/// List the game posts of one party.
#[utoipa::path(
    get,
    path = "/games/party/{party_id}",
    tag = "games",
    params(("party_id" = Uuid, Path, description = "Party whose posts to list")),
    responses(
        (status = 200, description = "The party's game posts", body = [GamePostResponse])
    )
)]
pub async fn list_party_game_posts(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(party_id): Path<Uuid>,
) -> Result<Json<Vec<GamePostResponse>>, AppError> {
    let response = post_service::list_posts(&state, &user, Some(party_id)).await?;
    Ok(Json(response))
}

/// Join an open game post.
#[utoipa::path(
    post,
    path = "/games/{id}/join",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game post to join")),
    responses(
        (status = 200, description = "Joined", body = MessageResponse),
        (status = 404, description = "No such post"),
        (status = 403, description = "No eligible party for a team post"),
        (status = 409, description = "Already joined, full, or wrong state"),
        (status = 410, description = "Post expired")
    )
)]
pub async fn join_game_post(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = post_service::join_post(&state, &user, id).await?;
    Ok(Json(response))
}

/// Confirm readiness for a joined game.
#[utoipa::path(
    post,
    path = "/games/{id}/ready",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game post to ready up in")),
    responses(
        (status = 200, description = "Readiness recorded", body = ReadyUpResponse),
        (status = 403, description = "Not a participant"),
        (status = 409, description = "Game is not in progress")
    )
)]
pub async fn ready_up(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReadyUpResponse>, AppError> {
    let response = post_service::ready_up(&state, &user, id).await?;
    Ok(Json(response))
}

/// Report the outcome of a game in progress.
#[utoipa::path(
    post,
    path = "/games/{id}/result",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game post to report on")),
    request_body = SubmitResultRequest,
    responses(
        (status = 200, description = "Result recorded", body = MessageResponse),
        (status = 403, description = "Reporter not authorized"),
        (status = 409, description = "Game is not in progress")
    )
)]
pub async fn submit_match_result(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SubmitResultRequest>>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = post_service::submit_result(&state, &user, id, payload).await?;
    Ok(Json(response))
}

/// Delete a game post; creator-only, any status.
#[utoipa::path(
    delete,
    path = "/games/{id}",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game post to delete")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Only the creator can delete"),
        (status = 404, description = "No such post")
    )
)]
pub async fn delete_game_post(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = post_service::delete_post(&state, &user, id).await?;
    Ok(Json(response))
}
