use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::models::PlayerSession;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Server side of the entry flow.
#[async_trait]
pub trait TournamentApi: Send + Sync {
    /// Mark the player as active in a tournament. Called at most once per
    /// resolved entry and never retried.
    async fn mark_tournament_active(&self, session: &PlayerSession) -> Result<(), ApiClientError>;
}

#[derive(Debug, Serialize)]
struct TournamentActiveRequest {
    tournament_active: bool,
}

/// REST client for the tournament backend.
#[derive(Clone)]
pub struct HttpTournamentApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTournamentApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn tournament_active_url(&self, player_id: &str) -> String {
        format!(
            "{}/api/players/{}/tournament-active",
            self.base_url.trim_end_matches('/'),
            player_id
        )
    }
}

#[async_trait]
impl TournamentApi for HttpTournamentApi {
    async fn mark_tournament_active(&self, session: &PlayerSession) -> Result<(), ApiClientError> {
        let url = self.tournament_active_url(&session.player_id);

        let mut request = self
            .client
            .put(&url)
            .json(&TournamentActiveRequest {
                tournament_active: true,
            });
        if let Some(token) = &session.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                player_id = %session.player_id,
                status = status.as_u16(),
                "Tournament active request rejected"
            );
            return Err(ApiClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(player_id = %session.player_id, "Player marked tournament active");
        Ok(())
    }
}
