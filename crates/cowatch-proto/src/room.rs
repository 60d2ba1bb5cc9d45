//! Room identity and channel addressing.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{ProtocolError, Result};

/// Opaque room identifier assigned by the room service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the room a session is bound to.
///
/// Immutable for the lifetime of a room view. The code addresses the channel;
/// the id addresses the room service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomIdentity {
    /// Short invite code, also the channel path segment
    pub code: String,
    /// Room service identifier
    pub id: RoomId,
}

impl RoomIdentity {
    /// Create a room identity.
    pub fn new(code: impl Into<String>, id: RoomId) -> Self {
        Self { code: code.into(), id }
    }
}

/// Room owner as reported by the room service.
///
/// Older services report the owner's numeric user id, newer ones the owner's
/// username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnerRef {
    /// Numeric user id
    Id(u64),
    /// Username
    Username(String),
}

/// Room record returned by a room lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    /// Room service identifier
    pub id: RoomId,
    /// Invite code
    pub code: String,
    /// Display name
    pub name: String,
    /// Owner, if the service reports one
    #[serde(default, alias = "owner_username")]
    pub owner: Option<OwnerRef>,
    /// Current video link. `None` if no video was ever set.
    #[serde(default)]
    pub youtube_url: Option<String>,
}

impl RoomInfo {
    /// Identity used to address this room's channel.
    pub fn identity(&self) -> RoomIdentity {
        RoomIdentity::new(self.code.clone(), self.id)
    }
}

/// Partial room update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPatch {
    /// New video link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
}

impl RoomPatch {
    /// Patch that only replaces the video link.
    pub fn video_url(url: impl Into<String>) -> Self {
        Self { youtube_url: Some(url.into()) }
    }
}

/// WebSocket address of a room's channel: `<base>/ws/room/<code>/`.
///
/// `http`/`https` bases are mapped to `ws`/`wss`. Any path on the base is
/// kept as a prefix.
///
/// # Errors
///
/// - `ProtocolError::InvalidAddress` if the base does not parse, uses an
///   unsupported scheme, or the code is empty or not alphanumeric
pub fn channel_address(base: &str, code: &str) -> Result<Url> {
    let invalid = |reason: &str| ProtocolError::InvalidAddress {
        address: base.to_string(),
        reason: reason.to_string(),
    };

    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("room code must be non-empty and alphanumeric"));
    }

    let mut url = Url::parse(base).map_err(|e| invalid(&e.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        _ => return Err(invalid("scheme must be ws, wss, http or https")),
    };
    url.set_scheme(scheme).map_err(|()| invalid("scheme cannot be changed"))?;

    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{prefix}/ws/room/{code}/"));
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_from_ws_base() {
        let url = channel_address("ws://localhost:8000", "a1b2c3").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/room/a1b2c3/");
    }

    #[test]
    fn address_maps_https_to_wss_and_keeps_prefix() {
        let url = channel_address("https://watch.example.com/api/", "abc").unwrap();
        assert_eq!(url.as_str(), "wss://watch.example.com/api/ws/room/abc/");
    }

    #[test]
    fn address_rejects_bad_code() {
        assert!(channel_address("ws://localhost:8000", "").is_err());
        assert!(channel_address("ws://localhost:8000", "../x").is_err());
    }

    #[test]
    fn address_rejects_unknown_scheme() {
        assert!(matches!(
            channel_address("ftp://localhost", "abc"),
            Err(ProtocolError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn room_info_accepts_owner_username() {
        let info: RoomInfo = serde_json::from_str(
            r#"{"id":7,"name":"Movie night","code":"f00d42","youtube_url":null,"owner_username":"alice","created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(info.id, RoomId(7));
        assert_eq!(info.owner, Some(OwnerRef::Username("alice".into())));
        assert_eq!(info.youtube_url, None);
        assert_eq!(info.identity(), RoomIdentity::new("f00d42", RoomId(7)));
    }

    #[test]
    fn patch_omits_absent_fields() {
        assert_eq!(serde_json::to_string(&RoomPatch::default()).unwrap(), "{}");
        assert_eq!(
            serde_json::to_string(&RoomPatch::video_url("https://youtu.be/x")).unwrap(),
            r#"{"youtube_url":"https://youtu.be/x"}"#
        );
    }
}
