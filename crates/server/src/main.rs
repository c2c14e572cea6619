use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use server_api::{favorites, ideas, profile, registration, relations, statistics, ApiContext};
use shared::{
    domain::{Activity, IdeaSubmission, ProfileId, Relation, RelationId, RelationWithProfile, UserProfile},
    error::{ApiError, ErrorCode},
    forms::{
        BusinessPartnerRegistrationForm, CareFacilityRegistrationForm, FavoriteTarget, IdeaForm,
        VolunteerRegistrationForm,
    },
    lifecycle::RelationAction,
    protocol::{
        ActorQuery, BusinessPartnerRegistrationResponse, CareFacilityRegistrationResponse,
        FavoriteItem, FavoriteState, InviteVolunteerRequest, JoinPartnerRequest,
        OrganisationStatistics, ProfileOverview, RegisteredVolunteer, SearchQuery, ServerEvent,
        TeamQuery, TeamSummary, UpdateNotesRequest,
    },
};
use storage::Storage;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, normalize_database_url};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify the path is writable"
        );
        error
    })?;

    let state = AppState::new(ApiContext::new(storage), settings.event_buffer);
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/registrations/business-partners",
            post(http_register_business_partner),
        )
        .route(
            "/registrations/care-facilities",
            post(http_register_care_facility),
        )
        .route("/profiles/:id", get(http_profile))
        .route("/profiles/:id/overview", get(http_profile_overview))
        .route("/partners/:id/team", get(http_team))
        .route("/partners/:id/team/summary", get(http_team_summary))
        .route("/partners/:id/requests", get(http_pending_requests))
        .route(
            "/partners/:id/available-volunteers",
            get(http_available_volunteers),
        )
        .route("/partners/:id/invitations", post(http_invite_volunteer))
        .route("/partners/:id/volunteers", post(http_register_volunteer))
        .route(
            "/partners/:id/volunteers/:volunteer_id/activities",
            get(http_volunteer_activity),
        )
        .route("/volunteers/:id/partners", get(http_volunteer_partners))
        .route(
            "/volunteers/:id/available-partners",
            get(http_available_partners),
        )
        .route("/volunteers/:id/requests", post(http_request_to_join))
        .route("/relations/:id/accept", post(http_accept_request))
        .route("/relations/:id/reject", post(http_reject_request))
        .route("/relations/:id/release", post(http_release_volunteer))
        .route("/relations/:id/cancel", post(http_cancel_request))
        .route("/relations/:id/join", post(http_accept_invitation))
        .route("/relations/:id/notes", put(http_update_notes))
        .route("/favorites", get(http_is_favorite))
        .route("/favorites/toggle", post(http_toggle_favorite))
        .route("/users/:id/favorites", get(http_list_favorites))
        .route("/users/:id/ideas", get(http_list_ideas))
        .route("/ideas", post(http_submit_idea))
        .route(
            "/organisations/:id/statistics",
            get(http_organisation_statistics),
        )
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(err.code), Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        reject(ApiError::new(ErrorCode::Internal, e.to_string()))
    })?;
    Ok("ok")
}

async fn http_register_business_partner(
    State(state): State<Arc<AppState>>,
    Json(form): Json<BusinessPartnerRegistrationForm>,
) -> ApiResult<BusinessPartnerRegistrationResponse> {
    let response = registration::register_business_partner(&state.api, &form)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn http_register_care_facility(
    State(state): State<Arc<AppState>>,
    Json(form): Json<CareFacilityRegistrationForm>,
) -> ApiResult<CareFacilityRegistrationResponse> {
    let response = registration::register_care_facility(&state.api, &form)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn http_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserProfile> {
    let profile = profile::get_profile(&state.api, ProfileId(id))
        .await
        .map_err(reject)?;
    Ok(Json(profile))
}

async fn http_profile_overview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProfileOverview> {
    let overview = profile::profile_overview(&state.api, ProfileId(id))
        .await
        .map_err(reject)?;
    Ok(Json(overview))
}

async fn http_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> ApiResult<Vec<RelationWithProfile>> {
    let team = relations::team(&state.api, ProfileId(id), &query)
        .await
        .map_err(reject)?;
    Ok(Json(team))
}

async fn http_team_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<TeamSummary> {
    let summary = relations::team_summary(&state.api, ProfileId(id))
        .await
        .map_err(reject)?;
    Ok(Json(summary))
}

async fn http_pending_requests(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<RelationWithProfile>> {
    let requests = relations::pending_requests(&state.api, ProfileId(id))
        .await
        .map_err(reject)?;
    Ok(Json(requests))
}

async fn http_available_volunteers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<UserProfile>> {
    let volunteers = relations::available_volunteers(&state.api, ProfileId(id), query.q.as_deref())
        .await
        .map_err(reject)?;
    Ok(Json(volunteers))
}

async fn http_invite_volunteer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<InviteVolunteerRequest>,
) -> ApiResult<Relation> {
    let relation = relations::invite_volunteer(&state.api, ProfileId(id), req.volunteer_id)
        .await
        .map_err(reject)?;
    state.publish(relations::relation_event(RelationAction::Invite, &relation));
    Ok(Json(relation))
}

async fn http_register_volunteer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(form): Json<VolunteerRegistrationForm>,
) -> ApiResult<RegisteredVolunteer> {
    let registered = relations::register_volunteer(&state.api, ProfileId(id), &form)
        .await
        .map_err(reject)?;
    state.publish(relations::relation_event(
        RelationAction::RegisterOnBehalf,
        &registered.relation,
    ));
    Ok(Json(registered))
}

async fn http_volunteer_activity(
    State(state): State<Arc<AppState>>,
    Path((partner_id, volunteer_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Vec<Activity>> {
    let activities =
        relations::volunteer_activity(&state.api, ProfileId(partner_id), ProfileId(volunteer_id))
            .await
            .map_err(reject)?;
    Ok(Json(activities))
}

async fn http_volunteer_partners(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<RelationWithProfile>> {
    let partners = relations::volunteer_partners(&state.api, ProfileId(id))
        .await
        .map_err(reject)?;
    Ok(Json(partners))
}

async fn http_available_partners(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<UserProfile>> {
    let partners = relations::available_partners(&state.api, ProfileId(id), query.q.as_deref())
        .await
        .map_err(reject)?;
    Ok(Json(partners))
}

async fn http_request_to_join(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<JoinPartnerRequest>,
) -> ApiResult<Relation> {
    let relation = relations::request_to_join(&state.api, ProfileId(id), req.partner_id)
        .await
        .map_err(reject)?;
    state.publish(relations::relation_event(
        RelationAction::RequestToJoin,
        &relation,
    ));
    Ok(Json(relation))
}

async fn relation_action(
    state: &AppState,
    relation_id: i64,
    actor: ActorQuery,
    action: RelationAction,
) -> ApiResult<Relation> {
    let relation = relations::apply_action(&state.api, actor.user_id, RelationId(relation_id), action)
        .await
        .map_err(reject)?;
    state.publish(relations::relation_event(action, &relation));
    Ok(Json(relation))
}

async fn http_accept_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Relation> {
    relation_action(&state, id, actor, RelationAction::Accept).await
}

async fn http_reject_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Relation> {
    relation_action(&state, id, actor, RelationAction::Reject).await
}

async fn http_release_volunteer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Relation> {
    relation_action(&state, id, actor, RelationAction::Release).await
}

async fn http_cancel_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Relation> {
    relation_action(&state, id, actor, RelationAction::Cancel).await
}

async fn http_accept_invitation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Relation> {
    relation_action(&state, id, actor, RelationAction::AcceptInvitation).await
}

async fn http_update_notes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(actor): Query<ActorQuery>,
    Json(req): Json<UpdateNotesRequest>,
) -> ApiResult<Relation> {
    let relation = relations::update_notes(
        &state.api,
        actor.user_id,
        RelationId(id),
        req.notes.as_deref(),
    )
    .await
    .map_err(reject)?;
    state.publish(ServerEvent::RelationUpdated {
        relation: relation.clone(),
    });
    Ok(Json(relation))
}

async fn http_is_favorite(
    State(state): State<Arc<AppState>>,
    Query(target): Query<FavoriteTarget>,
) -> ApiResult<FavoriteState> {
    let favorite = favorites::is_favorite(&state.api, &target)
        .await
        .map_err(reject)?;
    Ok(Json(favorite))
}

async fn http_toggle_favorite(
    State(state): State<Arc<AppState>>,
    Json(target): Json<FavoriteTarget>,
) -> ApiResult<FavoriteState> {
    let favorite = favorites::toggle_favorite(&state.api, &target)
        .await
        .map_err(reject)?;
    Ok(Json(favorite))
}

async fn http_list_favorites(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<FavoriteItem>> {
    let items = favorites::list_favorites(&state.api, ProfileId(id))
        .await
        .map_err(reject)?;
    Ok(Json(items))
}

async fn http_submit_idea(
    State(state): State<Arc<AppState>>,
    Json(form): Json<IdeaForm>,
) -> ApiResult<IdeaSubmission> {
    let idea = ideas::submit_idea(&state.api, &form)
        .await
        .map_err(reject)?;
    Ok(Json(idea))
}

async fn http_list_ideas(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<IdeaSubmission>> {
    let submitted = ideas::list_ideas(&state.api, ProfileId(id))
        .await
        .map_err(reject)?;
    Ok(Json(submitted))
}

async fn http_organisation_statistics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrganisationStatistics> {
    let stats = statistics::organisation_statistics(&state.api, ProfileId(id))
        .await
        .map_err(reject)?;
    Ok(Json(stats))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(actor): Query<ActorQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, actor.user_id))
}

/// Streams relation events that involve `user_id` until the client goes
/// away.
async fn ws_connection(state: Arc<AppState>, socket: WebSocket, user_id: ProfileId) {
    let (mut sender, mut receiver) = socket.split();

    if let Err(err) = profile::get_profile(&state.api, user_id).await {
        if let Ok(text) = serde_json::to_string(&ServerEvent::Error(err)) {
            let _ = sender.send(Message::Text(text)).await;
        }
        let _ = sender.close().await;
        return;
    }

    let mut events = BroadcastStream::new(state.events.subscribe());
    info!(%user_id, "event subscriber connected");

    let send_task = tokio::spawn(async move {
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(%user_id, skipped, "event subscriber lagged");
                    continue;
                }
            };
            if !event.concerns(user_id) {
                continue;
            }
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
    info!(%user_id, "event subscriber disconnected");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
