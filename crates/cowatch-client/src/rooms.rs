#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

//! Room service adapters.
//!
//! The room service is the REST collaborator that owns room records. The
//! synchronization core only needs two things from it: resolving a room
//! before entering its view, and persisting the video link when a
//! participant changes it.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use cowatch_core::SyncError;
use cowatch_proto::{RoomId, RoomInfo, RoomPatch, channel_address};
use reqwest::{Method, RequestBuilder, StatusCode};
use url::Url;

use crate::error::RoomServiceError;

/// Room lookup and update.
pub trait RoomService: Send + Sync + 'static {
    /// Fetch a room by id.
    fn lookup(&self, id: RoomId) -> impl Future<Output = Result<RoomInfo, RoomServiceError>> + Send;

    /// Fetch a room by invite code.
    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<RoomInfo, RoomServiceError>> + Send;

    /// Apply a partial update and return the updated room.
    fn update(
        &self,
        id: RoomId,
        patch: &RoomPatch,
    ) -> impl Future<Output = Result<RoomInfo, RoomServiceError>> + Send;
}

/// How the user named the room to enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomSelector {
    /// Room service id
    Id(RoomId),
    /// Invite code
    Code(String),
}

impl fmt::Display for RoomSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Code(code) => f.write_str(code),
        }
    }
}

/// Resolve a room and the address of its channel.
///
/// # Errors
///
/// - `SyncError::RoomUnreachable` if the room service fails; the room view is
///   not entered
/// - `SyncError::Protocol` if the room code cannot form a channel address
pub async fn enter_room<R: RoomService>(
    service: &R,
    selector: &RoomSelector,
    channel_base: &str,
) -> Result<(RoomInfo, Url), SyncError> {
    let lookup = match selector {
        RoomSelector::Id(id) => service.lookup(*id).await,
        RoomSelector::Code(code) => service.find_by_code(code).await,
    };
    let room = lookup.map_err(|e| SyncError::RoomUnreachable {
        room: selector.to_string(),
        reason: e.to_string(),
    })?;

    let address = channel_address(channel_base, &room.code)?;
    tracing::info!(room = %room.code, id = %room.id, %address, "room resolved");
    Ok((room, address))
}

/// Room service over the REST API.
///
/// Endpoints, relative to the base URL:
///
/// - `GET rooms/{id}/`
/// - `POST rooms/join/` with `{"code": ...}`
/// - `PATCH rooms/{id}/`
#[derive(Debug, Clone)]
pub struct HttpRoomService {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpRoomService {
    /// Service rooted at `base`, e.g. `http://localhost:8000/api/`.
    pub fn new(base: &str) -> Result<Self, RoomServiceError> {
        let mut url = Url::parse(base).map_err(|e| RoomServiceError::InvalidBase {
            base: base.to_string(),
            reason: e.to_string(),
        })?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self { client: reqwest::Client::new(), base: url, token: None })
    }

    /// Authenticate every request with a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Base URL requests are resolved against.
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RoomServiceError> {
        let url = self.base.join(path).map_err(|e| RoomServiceError::InvalidBase {
            base: self.base.to_string(),
            reason: e.to_string(),
        })?;

        let request = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn fetch(request: RequestBuilder, room: String) -> Result<RoomInfo, RoomServiceError> {
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RoomServiceError::NotFound { room });
        }
        Ok(response.error_for_status()?.json::<RoomInfo>().await?)
    }
}

impl RoomService for HttpRoomService {
    fn lookup(&self, id: RoomId) -> impl Future<Output = Result<RoomInfo, RoomServiceError>> + Send {
        let request = self.request(Method::GET, &format!("rooms/{id}/"));
        async move { Self::fetch(request?, id.to_string()).await }
    }

    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<RoomInfo, RoomServiceError>> + Send {
        let body = HashMap::from([("code", code.to_string())]);
        let request = self.request(Method::POST, "rooms/join/").map(|r| r.json(&body));
        let code = code.to_string();
        async move { Self::fetch(request?, code).await }
    }

    fn update(
        &self,
        id: RoomId,
        patch: &RoomPatch,
    ) -> impl Future<Output = Result<RoomInfo, RoomServiceError>> + Send {
        let request = self.request(Method::PATCH, &format!("rooms/{id}/")).map(|r| r.json(patch));
        async move { Self::fetch(request?, id.to_string()).await }
    }
}

/// In-process room service.
///
/// Backs rooms that exist only on the relay (no REST API configured) and
/// tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRoomService {
    rooms: Arc<Mutex<HashMap<RoomId, RoomInfo>>>,
}

impl MemoryRoomService {
    /// Empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Service holding a single room.
    pub fn with_room(room: RoomInfo) -> Self {
        let service = Self::new();
        service.insert(room);
        service
    }

    /// Add or replace a room.
    pub fn insert(&self, room: RoomInfo) {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner).insert(room.id, room);
    }

    /// Current record for a room.
    pub fn get(&self, id: RoomId) -> Option<RoomInfo> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner).get(&id).cloned()
    }

    fn not_found(room: impl ToString) -> RoomServiceError {
        RoomServiceError::NotFound { room: room.to_string() }
    }
}

impl RoomService for MemoryRoomService {
    fn lookup(&self, id: RoomId) -> impl Future<Output = Result<RoomInfo, RoomServiceError>> + Send {
        std::future::ready(self.get(id).ok_or_else(|| Self::not_found(id)))
    }

    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<RoomInfo, RoomServiceError>> + Send {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let found = rooms.values().find(|room| room.code == code).cloned();
        std::future::ready(found.ok_or_else(|| Self::not_found(code)))
    }

    fn update(
        &self,
        id: RoomId,
        patch: &RoomPatch,
    ) -> impl Future<Output = Result<RoomInfo, RoomServiceError>> + Send {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let updated = match rooms.get_mut(&id) {
            Some(room) => {
                if let Some(url) = &patch.youtube_url {
                    room.youtube_url = Some(url.clone());
                }
                Ok(room.clone())
            },
            None => Err(Self::not_found(id)),
        };
        std::future::ready(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomInfo {
        RoomInfo {
            id: RoomId(4),
            code: "abc123".into(),
            name: "Friday".into(),
            owner: None,
            youtube_url: None,
        }
    }

    #[tokio::test]
    async fn memory_service_finds_by_id_and_code() {
        let service = MemoryRoomService::with_room(room());

        assert_eq!(service.lookup(RoomId(4)).await.unwrap().code, "abc123");
        assert_eq!(service.find_by_code("abc123").await.unwrap().id, RoomId(4));
        assert!(matches!(
            service.lookup(RoomId(5)).await,
            Err(RoomServiceError::NotFound { room }) if room == "5"
        ));
    }

    #[tokio::test]
    async fn memory_service_applies_patch() {
        let service = MemoryRoomService::with_room(room());
        let url = "https://youtu.be/dQw4w9WgXcQ";

        let updated = service.update(RoomId(4), &RoomPatch::video_url(url)).await.unwrap();

        assert_eq!(updated.youtube_url.as_deref(), Some(url));
        assert_eq!(service.get(RoomId(4)).unwrap().youtube_url.as_deref(), Some(url));
    }

    #[tokio::test]
    async fn enter_room_maps_lookup_failure_to_unreachable() {
        let service = MemoryRoomService::new();

        let result = enter_room(&service, &RoomSelector::Id(RoomId(9)), "ws://localhost").await;

        assert!(matches!(result, Err(SyncError::RoomUnreachable { room, .. }) if room == "#9"));
    }

    #[tokio::test]
    async fn enter_room_derives_channel_address() {
        let service = MemoryRoomService::with_room(room());

        let (info, address) =
            enter_room(&service, &RoomSelector::Code("abc123".into()), "http://localhost:8000")
                .await
                .unwrap();

        assert_eq!(info.id, RoomId(4));
        assert_eq!(address.as_str(), "ws://localhost:8000/ws/room/abc123/");
    }

    #[test]
    fn http_service_normalises_base() {
        let service = HttpRoomService::new("http://localhost:8000/api").unwrap();
        assert_eq!(service.base().as_str(), "http://localhost:8000/api/");

        assert!(matches!(
            HttpRoomService::new("not a url"),
            Err(RoomServiceError::InvalidBase { .. })
        ));
    }
}
