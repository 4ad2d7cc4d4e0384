//! Content resources served by the backend.
//!
//! Field names follow the backend's JSON. Everything except identifiers is
//! optional because the backend omits unset columns.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A resource with standard list/get/create/update/delete routes.
pub trait Resource: Serialize + DeserializeOwned + Send {
    /// Collection path, e.g. `/segments`.
    const PATH: &'static str;
}

/// Home page carousel slide.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HomeCarouselItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub imgsrc: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub active: Option<i32>,
    #[serde(default)]
    pub order: Option<i32>,
}

impl Resource for HomeCarouselItem {
    const PATH: &'static str = "/home-carousel";
}

/// Top-level grouping of playlists (or live TV channels).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    /// Non-zero when the segment lists live TV channels instead of playlists.
    #[serde(default)]
    pub livetv: Option<i32>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub active: Option<i32>,
}

impl Resource for Segment {
    const PATH: &'static str = "/segments";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Playlist {
    /// Player-side playlist identifier.
    pub id: String,
    #[serde(default)]
    pub segment_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subscription: Option<i32>,
    #[serde(default)]
    pub subscription_cost: Option<f64>,
    #[serde(default)]
    pub active: Option<i32>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Resource for Playlist {
    const PATH: &'static str = "/playlists";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Season {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub playlist_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub active: Option<i32>,
}

impl Resource for Season {
    const PATH: &'static str = "/seasons";
}

/// A video is addressed by `(season_id, video_id)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Video {
    pub season_id: i64,
    pub video_id: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub active: Option<i32>,
}

impl Resource for Video {
    const PATH: &'static str = "/videos";
}

impl Video {
    /// Item path, `/videos/{season_id}/{video_id}`.
    pub fn item_path(season_id: i64, video_id: &str) -> String {
        format!("{}/{}/{}", Self::PATH, season_id, video_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveTvChannel {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub number: Option<i32>,
    #[serde(default)]
    pub logo: Option<String>,
}

/// Season inside the aggregated catalog; videos are listed by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogSeason {
    #[serde(default)]
    pub id: Option<i64>,
    pub playlist_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub active: Option<i32>,
    #[serde(default)]
    pub videos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogPlaylist {
    #[serde(flatten)]
    pub playlist: Playlist,
    #[serde(default)]
    pub seasons: Vec<CatalogSeason>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogSegment {
    #[serde(flatten)]
    pub segment: Segment,
    #[serde(default)]
    pub playlist: Option<Vec<CatalogPlaylist>>,
    #[serde(default)]
    pub livetvlist: Option<Vec<LiveTvChannel>>,
}

/// The aggregated `/playlist` view: carousel plus the full segment tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaylistCatalog {
    #[serde(default)]
    pub homecarousel: Vec<HomeCarouselItem>,
    #[serde(default)]
    pub segments: Vec<CatalogSegment>,
}

impl PlaylistCatalog {
    /// Number of playlists across all segments.
    pub fn playlist_count(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|s| s.playlist.as_ref())
            .map(Vec::len)
            .sum()
    }
}

/// `/health` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}

/// The authenticated principal, from `/user/me`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CurrentUser {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
