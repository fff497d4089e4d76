use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for scrim-queue-back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::posts::create_game_post,
        crate::routes::posts::list_game_posts,
        crate::routes::posts::list_party_game_posts,
        crate::routes::posts::join_game_post,
        crate::routes::posts::ready_up,
        crate::routes::posts::submit_match_result,
        crate::routes::posts::delete_game_post,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::MessageResponse,
            crate::dto::post::CreateGamePostRequest,
            crate::dto::post::SubmitResultRequest,
            crate::dto::post::GamePostResponse,
            crate::dto::post::MatchResultResponse,
            crate::dto::post::ReadyUpResponse,
            crate::dao::models::GameFormat,
            crate::dao::models::GameType,
            crate::dao::models::PostStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Game post lifecycle operations"),
    )
)]
pub struct ApiDoc;
