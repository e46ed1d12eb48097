//! Push-channel event types.
//!
//! The backend broadcasts computation progress over a websocket-style push
//! channel. Every event carries the owning `user_email`: the channel is
//! multi-tenant and clients filter events for other users before acting on
//! them.

use crate::entities::UniversityStatus;
use crate::identity::{ColumnId, UniversityId};
use serde::{Deserialize, Serialize};

/// Push-channel event envelope.
///
/// Wire shape is `{"event": "...", "data": {...}}` JSON text frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    /// Computation progress for a single university.
    UniversityUpdate(UniversityUpdate),
    /// Session-level notification for the owning user.
    UserUpdate(UserUpdate),
}

impl PushEvent {
    /// Get the event type as a string for logging/debugging.
    pub fn event_type(&self) -> &'static str {
        match self {
            PushEvent::UniversityUpdate(_) => "university_update",
            PushEvent::UserUpdate(_) => "user_update",
        }
    }

    /// The user this event belongs to.
    pub fn user_email(&self) -> &str {
        match self {
            PushEvent::UniversityUpdate(update) => &update.user_email,
            PushEvent::UserUpdate(update) => &update.user_email,
        }
    }
}

/// Progress notification for one university.
///
/// A fully-populated event carries a status, a column id, and the computed
/// value; a bare event carries only the university id and means "something
/// changed, refetch".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversityUpdate {
    pub university_id: UniversityId,
    #[serde(default)]
    pub status: Option<UniversityStatus>,
    #[serde(default)]
    pub column_id: Option<ColumnId>,
    #[serde(default)]
    pub value: Option<String>,
    pub user_email: String,
}

/// Session-level push notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(rename = "type")]
    pub kind: UserUpdateKind,
    #[serde(default)]
    pub university_ids: Option<Vec<UniversityId>>,
    #[serde(default)]
    pub hidden_universities_count: Option<u32>,
    pub user_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserUpdateKind {
    ProcessingStarted,
    SubscriptionReactivated,
}
