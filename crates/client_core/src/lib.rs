//! HTTP and websocket client for the coordinator server.
//!
//! Every form is validated locally before anything goes over the wire, so a
//! [`ClientError::Validation`] never costs a round trip.

use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Activity, IdeaSubmission, ProfileId, Relation, RelationId, RelationWithProfile, UserProfile},
    error::{ApiError, ApiException, ErrorCode},
    forms::{
        BusinessPartnerRegistrationForm, CareFacilityRegistrationForm, FavoriteTarget, FormError,
        IdeaForm, VolunteerRegistrationForm,
    },
    protocol::{
        ActorQuery, BusinessPartnerRegistrationResponse, CareFacilityRegistrationResponse,
        FavoriteItem, FavoriteState, InviteVolunteerRequest, JoinPartnerRequest,
        OrganisationStatistics, ProfileOverview, RegisteredVolunteer, SearchQuery, ServerEvent,
        TeamQuery, TeamSummary, UpdateNotesRequest,
    },
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid form: {0}")]
    Validation(#[from] FormError),
    #[error("server rejected request: {0}")]
    Api(#[from] ApiException),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("event stream failed: {0}")]
    Realtime(#[from] tokio_tungstenite::tungstenite::Error),
}

impl ClientError {
    /// The server's error code, when the server answered at all.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api(err) => Some(err.code),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

pub struct CoordinatorClient {
    http: Client,
    base: Url,
}

impl CoordinatorClient {
    pub fn new(server_url: &str) -> ClientResult<Self> {
        let mut base = Url::parse(server_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        decode(response).await
    }

    pub async fn health(&self) -> ClientResult<()> {
        let response = self.http.get(self.endpoint("healthz")?).send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(api_failure(response).await.into())
    }

    pub async fn register_business_partner(
        &self,
        form: &BusinessPartnerRegistrationForm,
    ) -> ClientResult<BusinessPartnerRegistrationResponse> {
        form.validate()?;
        self.execute(
            self.http
                .post(self.endpoint("registrations/business-partners")?)
                .json(form),
        )
        .await
    }

    pub async fn register_care_facility(
        &self,
        form: &CareFacilityRegistrationForm,
    ) -> ClientResult<CareFacilityRegistrationResponse> {
        form.validate()?;
        self.execute(
            self.http
                .post(self.endpoint("registrations/care-facilities")?)
                .json(form),
        )
        .await
    }

    pub async fn profile(&self, user_id: ProfileId) -> ClientResult<UserProfile> {
        self.execute(self.http.get(self.endpoint(&format!("profiles/{user_id}"))?))
            .await
    }

    pub async fn profile_overview(&self, user_id: ProfileId) -> ClientResult<ProfileOverview> {
        self.execute(
            self.http
                .get(self.endpoint(&format!("profiles/{user_id}/overview"))?),
        )
        .await
    }

    pub async fn team(
        &self,
        partner_id: ProfileId,
        query: &TeamQuery,
    ) -> ClientResult<Vec<RelationWithProfile>> {
        self.execute(
            self.http
                .get(self.endpoint(&format!("partners/{partner_id}/team"))?)
                .query(query),
        )
        .await
    }

    pub async fn team_summary(&self, partner_id: ProfileId) -> ClientResult<TeamSummary> {
        self.execute(
            self.http
                .get(self.endpoint(&format!("partners/{partner_id}/team/summary"))?),
        )
        .await
    }

    pub async fn pending_requests(
        &self,
        partner_id: ProfileId,
    ) -> ClientResult<Vec<RelationWithProfile>> {
        self.execute(
            self.http
                .get(self.endpoint(&format!("partners/{partner_id}/requests"))?),
        )
        .await
    }

    pub async fn available_volunteers(
        &self,
        partner_id: ProfileId,
        search: Option<&str>,
    ) -> ClientResult<Vec<UserProfile>> {
        self.execute(
            self.http
                .get(self.endpoint(&format!("partners/{partner_id}/available-volunteers"))?)
                .query(&SearchQuery {
                    q: search.map(str::to_string),
                }),
        )
        .await
    }

    pub async fn invite_volunteer(
        &self,
        partner_id: ProfileId,
        volunteer_id: ProfileId,
    ) -> ClientResult<Relation> {
        self.execute(
            self.http
                .post(self.endpoint(&format!("partners/{partner_id}/invitations"))?)
                .json(&InviteVolunteerRequest { volunteer_id }),
        )
        .await
    }

    pub async fn register_volunteer(
        &self,
        partner_id: ProfileId,
        form: &VolunteerRegistrationForm,
    ) -> ClientResult<RegisteredVolunteer> {
        form.validate()?;
        self.execute(
            self.http
                .post(self.endpoint(&format!("partners/{partner_id}/volunteers"))?)
                .json(form),
        )
        .await
    }

    pub async fn volunteer_activity(
        &self,
        partner_id: ProfileId,
        volunteer_id: ProfileId,
    ) -> ClientResult<Vec<Activity>> {
        self.execute(self.http.get(self.endpoint(&format!(
            "partners/{partner_id}/volunteers/{volunteer_id}/activities"
        ))?))
        .await
    }

    pub async fn volunteer_partners(
        &self,
        volunteer_id: ProfileId,
    ) -> ClientResult<Vec<RelationWithProfile>> {
        self.execute(
            self.http
                .get(self.endpoint(&format!("volunteers/{volunteer_id}/partners"))?),
        )
        .await
    }

    pub async fn available_partners(
        &self,
        volunteer_id: ProfileId,
        search: Option<&str>,
    ) -> ClientResult<Vec<UserProfile>> {
        self.execute(
            self.http
                .get(self.endpoint(&format!("volunteers/{volunteer_id}/available-partners"))?)
                .query(&SearchQuery {
                    q: search.map(str::to_string),
                }),
        )
        .await
    }

    pub async fn request_to_join(
        &self,
        volunteer_id: ProfileId,
        partner_id: ProfileId,
    ) -> ClientResult<Relation> {
        self.execute(
            self.http
                .post(self.endpoint(&format!("volunteers/{volunteer_id}/requests"))?)
                .json(&JoinPartnerRequest { partner_id }),
        )
        .await
    }

    async fn relation_action(
        &self,
        actor_id: ProfileId,
        relation_id: RelationId,
        verb: &str,
    ) -> ClientResult<Relation> {
        self.execute(
            self.http
                .post(self.endpoint(&format!("relations/{}/{verb}", relation_id.0))?)
                .query(&ActorQuery { user_id: actor_id }),
        )
        .await
    }

    pub async fn accept_request(
        &self,
        partner_id: ProfileId,
        relation_id: RelationId,
    ) -> ClientResult<Relation> {
        self.relation_action(partner_id, relation_id, "accept").await
    }

    pub async fn reject_request(
        &self,
        partner_id: ProfileId,
        relation_id: RelationId,
    ) -> ClientResult<Relation> {
        self.relation_action(partner_id, relation_id, "reject").await
    }

    pub async fn release_volunteer(
        &self,
        partner_id: ProfileId,
        relation_id: RelationId,
    ) -> ClientResult<Relation> {
        self.relation_action(partner_id, relation_id, "release").await
    }

    pub async fn cancel_request(
        &self,
        volunteer_id: ProfileId,
        relation_id: RelationId,
    ) -> ClientResult<Relation> {
        self.relation_action(volunteer_id, relation_id, "cancel").await
    }

    pub async fn accept_invitation(
        &self,
        volunteer_id: ProfileId,
        relation_id: RelationId,
    ) -> ClientResult<Relation> {
        self.relation_action(volunteer_id, relation_id, "join").await
    }

    pub async fn update_notes(
        &self,
        partner_id: ProfileId,
        relation_id: RelationId,
        notes: Option<&str>,
    ) -> ClientResult<Relation> {
        self.execute(
            self.http
                .put(self.endpoint(&format!("relations/{}/notes", relation_id.0))?)
                .query(&ActorQuery {
                    user_id: partner_id,
                })
                .json(&UpdateNotesRequest {
                    notes: notes.map(str::to_string),
                }),
        )
        .await
    }

    pub async fn is_favorite(&self, target: &FavoriteTarget) -> ClientResult<FavoriteState> {
        self.execute(self.http.get(self.endpoint("favorites")?).query(target))
            .await
    }

    pub async fn toggle_favorite(&self, target: &FavoriteTarget) -> ClientResult<FavoriteState> {
        self.execute(self.http.post(self.endpoint("favorites/toggle")?).json(target))
            .await
    }

    pub async fn list_favorites(&self, user_id: ProfileId) -> ClientResult<Vec<FavoriteItem>> {
        self.execute(
            self.http
                .get(self.endpoint(&format!("users/{user_id}/favorites"))?),
        )
        .await
    }

    pub async fn submit_idea(&self, form: &IdeaForm) -> ClientResult<IdeaSubmission> {
        form.validate()?;
        self.execute(self.http.post(self.endpoint("ideas")?).json(form))
            .await
    }

    pub async fn list_ideas(&self, user_id: ProfileId) -> ClientResult<Vec<IdeaSubmission>> {
        self.execute(self.http.get(self.endpoint(&format!("users/{user_id}/ideas"))?))
            .await
    }

    pub async fn organisation_statistics(
        &self,
        organisation_id: ProfileId,
    ) -> ClientResult<OrganisationStatistics> {
        self.execute(
            self.http
                .get(self.endpoint(&format!("organisations/{organisation_id}/statistics"))?),
        )
        .await
    }

    /// Opens a dedicated event socket for `user_id`. Events keep arriving on
    /// the returned receiver until the server closes the connection.
    pub async fn subscribe_events(
        &self,
        user_id: ProfileId,
    ) -> ClientResult<broadcast::Receiver<ServerEvent>> {
        let mut ws_url = self.endpoint("ws")?;
        let scheme = if ws_url.scheme() == "https" { "wss" } else { "ws" };
        let _ = ws_url.set_scheme(scheme);
        ws_url
            .query_pairs_mut()
            .append_pair("user_id", &user_id.to_string());

        let (ws_stream, _) = connect_async(ws_url.as_str()).await?;
        let (_, mut ws_reader) = ws_stream.split();
        let (events, receiver) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            let _ = events.send(event);
                        }
                        Err(err) => warn!(error = %err, "ignoring malformed server event"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "event stream read failed");
                        break;
                    }
                }
            }
            debug!(%user_id, "event stream closed");
        });

        Ok(receiver)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    if response.status().is_success() {
        return Ok(response.json().await?);
    }
    Err(api_failure(response).await.into())
}

/// Prefers the server's own error body and falls back to the status code.
async fn api_failure(response: Response) -> ApiException {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(err) => err.into(),
        Err(_) => {
            let message = if body.trim().is_empty() {
                status.to_string()
            } else {
                body
            };
            ApiException::new(code_for_status(status), message)
        }
    }
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        _ => ErrorCode::Internal,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
