use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    dao::{
        models::{GamePostEntity, PartyEntity, PostStatus},
        post_store::GamePostStore,
    },
    dto::{
        common::MessageResponse,
        post::{CreateGamePostRequest, GamePostResponse, ReadyUpResponse, SubmitResultRequest},
    },
    error::ServiceError,
    state::{SharedState, lifecycle},
};

/// Post a new game.
///
/// Collaborator lookups (posting party, active-post uniqueness) happen
/// here; every guard decision is the engine's.
pub async fn create_post(
    state: &SharedState,
    actor: &CurrentUser,
    request: CreateGamePostRequest,
) -> Result<GamePostResponse, ServiceError> {
    let posts = state.require_posts().await?;
    let now = state.now();

    let party = match (request.format.is_team_format(), request.party_id) {
        (true, Some(party_id)) => Some(resolve_party(state, party_id).await?),
        _ => None,
    };

    let has_active_post = posts.find_active_by_creator(actor.id).await?.is_some();

    let post = lifecycle::plan_create(
        request.format,
        request.game_type,
        actor.id,
        &actor.name,
        party.as_ref(),
        has_active_post,
        now,
        state.config().post_ttl(),
    )?;

    posts.insert_post(post.clone()).await?;
    info!(post_id = %post.id, format = %post.format, "game post created");

    Ok(GamePostResponse::for_viewer(post, actor.id))
}

/// List game posts, optionally scoped to a party.
///
/// Stale open posts are swept to `expired` before the read returns, so
/// listings never show an open post past its deadline.
pub async fn list_posts(
    state: &SharedState,
    actor: &CurrentUser,
    party_id: Option<Uuid>,
) -> Result<Vec<GamePostResponse>, ServiceError> {
    let posts = state.require_posts().await?;
    let now = state.now();

    let expired = posts.expire_stale(party_id, now).await?;
    if expired > 0 {
        debug!(expired, "swept stale game posts");
    }

    let listed = posts.list_posts(party_id).await?;
    Ok(listed
        .into_iter()
        .map(|post| GamePostResponse::for_viewer(post, actor.id))
        .collect())
}

/// Join an open post.
pub async fn join_post(
    state: &SharedState,
    actor: &CurrentUser,
    id: Uuid,
) -> Result<MessageResponse, ServiceError> {
    let posts = state.require_posts().await?;
    let now = state.now();

    let post = load_post(&posts, id).await?;
    let actor_parties = if post.format.is_team_format() {
        state
            .require_parties()
            .await?
            .find_by_creator(actor.id)
            .await?
    } else {
        Vec::new()
    };

    let plan = lifecycle::plan_join(&post, actor.id, &actor_parties, now)?;
    if posts
        .conditional_update(id, plan.guard, plan.mutation)
        .await?
    {
        info!(post_id = %id, player = %actor.id, "player joined game post");
        return Ok(MessageResponse::new("joined game"));
    }

    Err(reclassify(&posts, id, |fresh| {
        lifecycle::plan_join(fresh, actor.id, &actor_parties, now).map(|_| ())
    })
    .await)
}

/// Confirm readiness; reports whether the quorum is now complete.
pub async fn ready_up(
    state: &SharedState,
    actor: &CurrentUser,
    id: Uuid,
) -> Result<ReadyUpResponse, ServiceError> {
    let posts = state.require_posts().await?;

    let post = load_post(&posts, id).await?;
    let plan = lifecycle::plan_ready(&post, actor.id)?;
    if !posts
        .conditional_update(id, plan.guard, plan.mutation)
        .await?
    {
        return Err(reclassify(&posts, id, |fresh| {
            lifecycle::plan_ready(fresh, actor.id).map(|_| ())
        })
        .await);
    }

    // The promotion happened (or not) inside the update; re-read to see
    // which way it went.
    let post = load_post(&posts, id).await?;
    let all_ready = post.status == PostStatus::ReadyToStart;
    if all_ready {
        info!(post_id = %id, "all players ready");
    }
    Ok(ReadyUpResponse {
        all_ready,
        message: if all_ready {
            "all players ready, game can start".into()
        } else {
            "ready status updated".into()
        },
    })
}

/// Record the terminal outcome of a game.
pub async fn submit_result(
    state: &SharedState,
    actor: &CurrentUser,
    id: Uuid,
    request: SubmitResultRequest,
) -> Result<MessageResponse, ServiceError> {
    let posts = state.require_posts().await?;
    let now = state.now();

    let post = load_post(&posts, id).await?;
    let team2_party = match post.team2_party_id {
        Some(party_id) if post.format.is_team_format() => {
            state.require_parties().await?.find_by_id(party_id).await?
        }
        _ => None,
    };

    let report: lifecycle::MatchReport = request.into();
    let plan = lifecycle::plan_submit_result(&post, actor.id, report.clone(), team2_party.as_ref(), now)?;
    if posts
        .conditional_update(id, plan.guard, plan.mutation)
        .await?
    {
        info!(post_id = %id, reported_by = %actor.id, "match result recorded");
        return Ok(MessageResponse::new("match result recorded"));
    }

    Err(reclassify(&posts, id, |fresh| {
        lifecycle::plan_submit_result(fresh, actor.id, report, team2_party.as_ref(), now)
            .map(|_| ())
    })
    .await)
}

/// Hard-delete a post; creator-only, allowed in any status.
pub async fn delete_post(
    state: &SharedState,
    actor: &CurrentUser,
    id: Uuid,
) -> Result<MessageResponse, ServiceError> {
    let posts = state.require_posts().await?;

    let post = load_post(&posts, id).await?;
    lifecycle::authorize_delete(&post, actor.id)?;

    if posts.delete_post(id).await? {
        info!(post_id = %id, "game post deleted");
        Ok(MessageResponse::new("game post deleted"))
    } else {
        Err(not_found(id))
    }
}

async fn load_post(
    posts: &Arc<dyn GamePostStore>,
    id: Uuid,
) -> Result<GamePostEntity, ServiceError> {
    posts.find_post(id).await?.ok_or_else(|| not_found(id))
}

async fn resolve_party(state: &SharedState, party_id: Uuid) -> Result<PartyEntity, ServiceError> {
    state
        .require_parties()
        .await?
        .find_by_id(party_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("party `{party_id}` not found")))
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("game post `{id}` not found"))
}

/// A conditional update did not apply: the snapshot went stale between
/// the plan and the atomic step. Re-read and re-plan to name the reason;
/// if the fresh snapshot would admit the transition, the caller simply
/// lost a race and may retry (the mutations are idempotent unions).
async fn reclassify<F>(posts: &Arc<dyn GamePostStore>, id: Uuid, replan: F) -> ServiceError
where
    F: FnOnce(&GamePostEntity) -> Result<(), lifecycle::LifecycleError>,
{
    match posts.find_post(id).await {
        Ok(Some(fresh)) => match replan(&fresh) {
            Err(err) => err.into(),
            Ok(()) => ServiceError::Conflict("lost a concurrent update, retry".into()),
        },
        Ok(None) => not_found(id),
        Err(err) => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            memory::{MemoryPartyDirectory, MemoryPostStore},
            models::{GameFormat, GameType},
        },
        state::{AppState, StorageBackend, test_clock::ManualClock},
    };

    struct Harness {
        state: SharedState,
        parties: Arc<MemoryPartyDirectory>,
        clock: Arc<ManualClock>,
    }

    async fn harness() -> Harness {
        let clock = Arc::new(ManualClock::starting_at(std::time::SystemTime::now()));
        let state = AppState::with_clock(AppConfig::default(), clock.clone());
        let post_store = Arc::new(MemoryPostStore::new());
        let parties = Arc::new(MemoryPartyDirectory::new());
        state
            .install_backend(StorageBackend {
                posts: post_store,
                parties: parties.clone(),
            })
            .await;
        Harness {
            state,
            parties,
            clock,
        }
    }

    fn user(name: &str) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: format!("{name}@example.com"),
            name: name.into(),
        }
    }

    fn seed_party(harness: &Harness, owner: &CurrentUser, members: u32) -> PartyEntity {
        let party = PartyEntity {
            id: Uuid::new_v4(),
            name: format!("{}'s five", owner.name),
            creator_id: owner.id,
            members: (0..members)
                .map(|i| if i == 0 { owner.id } else { Uuid::new_v4() })
                .collect(),
        };
        harness.parties.insert(party.clone());
        party
    }

    fn solo_request() -> CreateGamePostRequest {
        CreateGamePostRequest {
            party_id: None,
            format: GameFormat::OneVsOne,
            game_type: GameType::Deathmatch,
        }
    }

    fn result_request(winner: &CurrentUser, loser: &CurrentUser) -> SubmitResultRequest {
        SubmitResultRequest {
            winner_id: winner.id,
            winner_name: winner.name.clone(),
            loser_id: loser.id,
            loser_name: loser.name.clone(),
            score: "13-7".into(),
        }
    }

    #[tokio::test]
    async fn solo_flow_create_join_ready_result() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");

        let created = create_post(&harness.state, &alice, solo_request()).await.unwrap();
        let id = created.id;
        assert_eq!(created.status, PostStatus::Open);
        assert_eq!(created.creator_name, "alice");

        join_post(&harness.state, &bob, id).await.unwrap();

        let ready = ready_up(&harness.state, &alice, id).await.unwrap();
        assert!(!ready.all_ready);

        let ready = ready_up(&harness.state, &bob, id).await.unwrap();
        assert!(ready.all_ready);

        // Ready-to-start is not in-progress anymore: results are now
        // rejected as a wrong-state transition.
        let err = submit_result(&harness.state, &alice, id, result_request(&alice, &bob))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn solo_result_recorded_while_in_progress() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");

        let created = create_post(&harness.state, &alice, solo_request()).await.unwrap();
        let id = created.id;
        join_post(&harness.state, &bob, id).await.unwrap();

        submit_result(&harness.state, &bob, id, result_request(&bob, &alice))
            .await
            .unwrap();

        let listed = list_posts(&harness.state, &alice, None).await.unwrap();
        let post = listed.iter().find(|post| post.id == id).unwrap();
        assert_eq!(post.status, PostStatus::Completed);
        let result = post.match_result.as_ref().unwrap();
        assert_eq!(result.winner_id, bob.id);
        assert_eq!(result.reported_by, bob.id);
    }

    #[tokio::test]
    async fn second_active_post_is_a_conflict() {
        let harness = harness().await;
        let alice = user("alice");

        create_post(&harness.state, &alice, solo_request()).await.unwrap();
        let err = create_post(&harness.state, &alice, solo_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn mismatched_format_and_game_type_is_invalid() {
        let harness = harness().await;
        let alice = user("alice");
        let request = CreateGamePostRequest {
            party_id: None,
            format: GameFormat::OneVsOne,
            game_type: GameType::BestOf1,
        };
        let err = create_post(&harness.state, &alice, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn five_v_five_needs_a_full_party() {
        let harness = harness().await;
        let alice = user("alice");
        let small = seed_party(&harness, &alice, 4);

        let request = CreateGamePostRequest {
            party_id: Some(small.id),
            format: GameFormat::FiveVsFive,
            game_type: GameType::BestOf3,
        };
        let err = create_post(&harness.state, &alice, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let full = seed_party(&harness, &alice, 5);
        let request = CreateGamePostRequest {
            party_id: Some(full.id),
            format: GameFormat::FiveVsFive,
            game_type: GameType::BestOf3,
        };
        let created = create_post(&harness.state, &alice, request).await.unwrap();
        assert_eq!(created.party_id, Some(full.id));
        assert_eq!(created.max_players, 10);
    }

    #[tokio::test]
    async fn team_post_with_unknown_party_is_not_found() {
        let harness = harness().await;
        let alice = user("alice");
        let request = CreateGamePostRequest {
            party_id: Some(Uuid::new_v4()),
            format: GameFormat::FourVsFour,
            game_type: GameType::BestOf1,
        };
        let err = create_post(&harness.state, &alice, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn team_join_binds_second_party_and_its_captain_reports() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");
        let alice_party = seed_party(&harness, &alice, 5);
        let bob_party = seed_party(&harness, &bob, 5);

        let request = CreateGamePostRequest {
            party_id: Some(alice_party.id),
            format: GameFormat::FiveVsFive,
            game_type: GameType::BestOf3,
        };
        let created = create_post(&harness.state, &alice, request).await.unwrap();
        let id = created.id;

        join_post(&harness.state, &bob, id).await.unwrap();
        let listed = list_posts(&harness.state, &alice, Some(alice_party.id))
            .await
            .unwrap();
        let post = listed.iter().find(|post| post.id == id).unwrap();
        assert_eq!(post.status, PostStatus::InProgress);
        assert_eq!(post.team2_party_id, Some(bob_party.id));

        // A mere party member is not a captain.
        let outsider = user("carol");
        let err = submit_result(&harness.state, &outsider, id, result_request(&bob, &alice))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        submit_result(&harness.state, &bob, id, result_request(&bob, &alice))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn joining_a_team_post_without_an_eligible_party_is_forbidden() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");
        let alice_party = seed_party(&harness, &alice, 4);

        let request = CreateGamePostRequest {
            party_id: Some(alice_party.id),
            format: GameFormat::FourVsFour,
            game_type: GameType::BestOf1,
        };
        let id = create_post(&harness.state, &alice, request).await.unwrap().id;

        let err = join_post(&harness.state, &bob, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn full_post_rejects_another_join() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");
        let carol = user("carol");

        let id = create_post(&harness.state, &alice, solo_request()).await.unwrap().id;
        join_post(&harness.state, &bob, id).await.unwrap();

        let err = join_post(&harness.state, &carol, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Full(_)));

        let err = join_post(&harness.state, &bob, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn expired_post_shows_in_list_and_refuses_joins() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");

        let id = create_post(&harness.state, &alice, solo_request()).await.unwrap().id;

        harness.clock.advance(Duration::from_secs(31 * 60));

        let listed = list_posts(&harness.state, &bob, None).await.unwrap();
        let post = listed.iter().find(|post| post.id == id).unwrap();
        assert_eq!(post.status, PostStatus::Expired);

        // Already swept: the join fails on status, not on the deadline.
        let err = join_post(&harness.state, &bob, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn join_past_deadline_without_sweep_reports_expired() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");

        let id = create_post(&harness.state, &alice, solo_request()).await.unwrap().id;
        harness.clock.advance(Duration::from_secs(31 * 60));

        let err = join_post(&harness.state, &bob, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Expired(_)));
    }

    #[tokio::test]
    async fn ready_twice_reports_the_same_outcome() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");

        let id = create_post(&harness.state, &alice, solo_request()).await.unwrap().id;
        join_post(&harness.state, &bob, id).await.unwrap();

        let first = ready_up(&harness.state, &alice, id).await.unwrap();
        let second = ready_up(&harness.state, &alice, id).await.unwrap();
        assert!(!first.all_ready);
        assert!(!second.all_ready);

        let listed = list_posts(&harness.state, &alice, None).await.unwrap();
        let post = listed.iter().find(|post| post.id == id).unwrap();
        assert_eq!(post.ready_players, vec![alice.id]);
    }

    #[tokio::test]
    async fn submit_result_on_open_post_is_invalid_state() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");

        let id = create_post(&harness.state, &alice, solo_request()).await.unwrap().id;
        let err = submit_result(&harness.state, &alice, id, result_request(&alice, &bob))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn listing_redacts_open_creators_for_strangers() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");

        create_post(&harness.state, &alice, solo_request()).await.unwrap();

        let seen_by_bob = list_posts(&harness.state, &bob, None).await.unwrap();
        assert_eq!(seen_by_bob[0].creator_name, "Anonymous");

        let seen_by_alice = list_posts(&harness.state, &alice, None).await.unwrap();
        assert_eq!(seen_by_alice[0].creator_name, "alice");
    }

    #[tokio::test]
    async fn delete_is_creator_only_and_idempotent_about_absence() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");

        let id = create_post(&harness.state, &alice, solo_request()).await.unwrap().id;

        let err = delete_post(&harness.state, &bob, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        delete_post(&harness.state, &alice, id).await.unwrap();
        let err = delete_post(&harness.state, &alice, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn degraded_mode_refuses_operations() {
        let clock = Arc::new(ManualClock::starting_at(std::time::SystemTime::now()));
        let state = AppState::with_clock(AppConfig::default(), clock);
        let alice = user("alice");

        let err = create_post(&state, &alice, solo_request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[tokio::test]
    async fn completed_post_no_longer_blocks_new_posts() {
        let harness = harness().await;
        let alice = user("alice");
        let bob = user("bob");

        let id = create_post(&harness.state, &alice, solo_request()).await.unwrap().id;
        join_post(&harness.state, &bob, id).await.unwrap();
        submit_result(&harness.state, &alice, id, result_request(&alice, &bob))
            .await
            .unwrap();

        // Completed is terminal, so a fresh post is allowed.
        create_post(&harness.state, &alice, solo_request()).await.unwrap();
    }
}
