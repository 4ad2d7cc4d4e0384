//! Typed access to the backend's content resources.

use std::fmt::Display;

use serde::Serialize;

use crate::client::{ApiClient, ApiError, ApiRequest, RequestOutcome};
use crate::model::{CurrentUser, HealthStatus, PlaylistCatalog, Resource, Video};

/// Endpoints probed by [`ContentApi::check_connection`] through the executor.
const AUTHENTICATED_PROBES: [&str; 3] = ["/playlists", "/videos", "/seasons"];

/// Result of one connectivity probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub endpoint: String,
    pub authenticated: bool,
    pub status: u16,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-endpoint connectivity report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub base_url: String,
    pub probes: Vec<ProbeResult>,
}

impl ConnectionReport {
    /// True if at least one probe succeeded.
    pub fn is_reachable(&self) -> bool {
        self.probes.iter().any(|p| p.success)
    }
}

/// CRUD helpers over an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ContentApi {
    client: ApiClient,
}

impl ContentApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn list<R: Resource>(&self) -> Result<Vec<R>, ApiError> {
        self.client.get(R::PATH).await.json()
    }

    pub async fn get<R: Resource>(&self, id: impl Display) -> Result<R, ApiError> {
        self.client.get(&item_path::<R>(id)).await.json()
    }

    pub async fn create<R: Resource>(&self, item: &R) -> Result<R, ApiError> {
        let body = serde_json::to_value(item)?;
        self.client.post_json(R::PATH, body).await.json()
    }

    pub async fn update<R: Resource>(&self, id: impl Display, item: &R) -> Result<R, ApiError> {
        let body = serde_json::to_value(item)?;
        self.client.put_json(&item_path::<R>(id), body).await.json()
    }

    pub async fn delete<R: Resource>(&self, id: impl Display) -> Result<(), ApiError> {
        self.client.delete(&item_path::<R>(id)).await.into_result()?;
        Ok(())
    }

    pub async fn video(&self, season_id: i64, video_id: &str) -> Result<Video, ApiError> {
        self.client.get(&Video::item_path(season_id, video_id)).await.json()
    }

    pub async fn update_video(&self, video: &Video) -> Result<Video, ApiError> {
        let body = serde_json::to_value(video)?;
        self.client
            .put_json(&Video::item_path(video.season_id, &video.video_id), body)
            .await
            .json()
    }

    pub async fn delete_video(&self, season_id: i64, video_id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&Video::item_path(season_id, video_id))
            .await
            .into_result()?;
        Ok(())
    }

    /// The aggregated `/playlist` view.
    pub async fn catalog(&self) -> Result<PlaylistCatalog, ApiError> {
        self.client.get("/playlist").await.json()
    }

    pub async fn me(&self) -> Result<CurrentUser, ApiError> {
        self.client.get("/user/me").await.json()
    }

    /// Unauthenticated `/health`.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.client
            .execute_public(ApiRequest::get("/health"))
            .await
            .json()
    }

    /// Probe `/health` without a token and the core collections with one.
    pub async fn check_connection(&self) -> ConnectionReport {
        let mut probes = Vec::with_capacity(1 + AUTHENTICATED_PROBES.len());

        let health = self.client.execute_public(ApiRequest::get("/health")).await;
        probes.push(probe("/health", false, &health));

        for endpoint in AUTHENTICATED_PROBES {
            let outcome = self.client.get(endpoint).await;
            probes.push(probe(endpoint, true, &outcome));
        }

        let report = ConnectionReport {
            base_url: self.client.base_url().to_string(),
            probes,
        };
        tracing::info!(
            reachable = report.is_reachable(),
            ok = report.probes.iter().filter(|p| p.success).count(),
            total = report.probes.len(),
            "Connectivity check finished"
        );
        report
    }
}

fn item_path<R: Resource>(id: impl Display) -> String {
    format!("{}/{}", R::PATH, id)
}

fn probe(endpoint: &str, authenticated: bool, outcome: &RequestOutcome) -> ProbeResult {
    ProbeResult {
        endpoint: endpoint.to_string(),
        authenticated,
        status: outcome.status,
        success: outcome.success && !outcome.parse_error,
        error: outcome.error.clone(),
    }
}
