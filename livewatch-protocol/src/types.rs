//! Data model shared between the monitor and its collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Owner (broadcaster) identifier. Stable across live sessions.
pub type OwnerId = i64;

/// One live room as reported by a single room-list poll.
///
/// Rebuilt from scratch on every poll and never stored beyond the tick that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDescriptor {
    /// Broadcaster user id.
    pub owner_id: OwnerId,
    /// Ephemeral id of the current live session.
    pub live_id: String,
    /// Broadcaster nickname.
    pub display_name: String,
    /// Live title.
    pub title: String,
    /// Audience count reported by the platform.
    pub online_count: u64,
}

impl RoomDescriptor {
    pub fn new(owner_id: OwnerId, live_id: impl Into<String>) -> Self {
        Self {
            owner_id,
            live_id: live_id.into(),
            display_name: String::new(),
            title: String::new(),
            online_count: 0,
        }
    }
}

/// A single playable rendition of a live stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    /// Bitrate in kbps.
    pub bitrate: u64,
    /// Pull URL.
    pub url: String,
    /// Human readable quality label (e.g. "高清").
    #[serde(default)]
    pub name: String,
    /// Platform quality key (e.g. "HIGH").
    #[serde(default)]
    pub quality_type: String,
}

impl StreamVariant {
    pub fn new(bitrate: u64, url: impl Into<String>) -> Self {
        Self {
            bitrate,
            url: url.into(),
            name: String::new(),
            quality_type: String::new(),
        }
    }
}

/// Stream quality metadata for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub owner_id: OwnerId,
    pub variants: Vec<StreamVariant>,
}

impl StreamDescriptor {
    pub fn new(owner_id: OwnerId, variants: Vec<StreamVariant>) -> Self {
        Self { owner_id, variants }
    }

    /// Variant with the smallest bitrate. The first one wins on ties.
    pub fn lowest_variant(&self) -> Option<&StreamVariant> {
        let mut lowest: Option<&StreamVariant> = None;
        for variant in &self.variants {
            match lowest {
                Some(current) if variant.bitrate >= current.bitrate => {}
                _ => lowest = Some(variant),
            }
        }
        lowest
    }
}

/// A single cookie carried by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Authenticated credential bundle.
///
/// Built once from the primary login and then only ever shared behind an
/// `Arc`; there are no mutating methods.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub device_id: String,
    pub user_id: i64,
    /// `acfun.midground.api_st`
    pub service_token: String,
    /// `ssecurity`
    pub security_key: String,
    pub cookies: Vec<Cookie>,
}

impl Session {
    /// Render the cookies as a `Cookie` request header value.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Look up a cookie value by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device_id", &self.device_id)
            .field("user_id", &self.user_id)
            .field("service_token", &"<redacted>")
            .field("security_key", &"<redacted>")
            .field("cookies", &self.cookies.len())
            .finish()
    }
}

/// A viewer comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub user_id: i64,
    pub nickname: String,
    pub content: String,
    /// Send time in unix milliseconds.
    pub send_time: i64,
}

/// Events delivered by a room subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A viewer comment (danmaku).
    Comment(Comment),
    /// Periodic audience snapshot.
    Audience { watching: u64 },
}
