//! Meeting records and the normalized provider event payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote attendee response status, owned entirely by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Accepted,
    Declined,
    Tentative,
    NeedsAction,
}

impl EventStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Tentative => "tentative",
            Self::NeedsAction => "needs_action",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "tentative" => Some(Self::Tentative),
            "needs_action" | "needsAction" => Some(Self::NeedsAction),
            _ => None,
        }
    }
}

/// Transcription bot lifecycle state, owned by the bot gateway interaction.
///
/// Reconciliation never overwrites this on an existing record; it only sets
/// the `Pending` default at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Pending,
    BotScheduled,
    BotJoined,
    Transcribing,
    Completed,
    Failed,
}

impl BotStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::BotScheduled => "bot_scheduled",
            Self::BotJoined => "bot_joined",
            Self::Transcribing => "transcribing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "bot_scheduled" => Some(Self::BotScheduled),
            "bot_joined" => Some(Self::BotJoined),
            "transcribing" => Some(Self::Transcribing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// A recording is in flight; the record must be soft-cancelled rather
    /// than deleted when the remote event disappears.
    #[must_use]
    pub fn is_active_recording(self) -> bool {
        matches!(self, Self::BotJoined | Self::Transcribing)
    }
}

/// Stored meeting row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub user_id: String,
    /// Optional grouping, independent of synchronization
    pub project_id: Option<String>,
    /// Natural key for reconciliation, unique per user
    pub remote_event_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub meeting_url: Option<String>,
    pub start_ts: i64,
    pub end_ts: i64,
    pub event_status: EventStatus,
    pub bot_status: BotStatus,
    pub bot_id: Option<String>,
    pub bot_config_json: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Meeting {
    /// Get start time as `DateTime<Utc>`
    #[must_use]
    pub fn start_time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.start_ts, 0)
    }

    /// Get end time as `DateTime<Utc>`
    #[must_use]
    pub fn end_time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.end_ts, 0)
    }
}

/// Normalized remote event produced by a candidate extraction pass.
///
/// Only events with an extractable meeting URL become candidates; everything
/// here is remote-owned and safe to write over an existing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMeeting {
    pub remote_event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub meeting_url: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub event_status: EventStatus,
}

/// Raw provider event, decoded from the wire but not yet normalized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    /// RFC 3339 timestamp, or a bare date for all-day events
    pub start: Option<String>,
    pub end: Option<String>,
    pub attendees: Vec<RemoteAttendee>,
    pub organizer: Option<RemoteOrganizer>,
    pub conference_entry_points: Vec<ConferenceEntryPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAttendee {
    pub email: String,
    /// Provider wire value, e.g. "accepted" / "needsAction"
    pub response_status: Option<String>,
    pub is_self: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteOrganizer {
    pub email: String,
    pub is_self: bool,
}

/// Deployment options for a transcription bot. Serialized into
/// `Meeting::bot_config_json` at schedule time; opaque to reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotJobConfig {
    pub bot_name: Option<String>,
    pub join_offset_minutes: Option<i64>,
    pub language: Option<String>,
}

/// Structured conferencing entry from the provider payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferenceEntryPoint {
    /// "video", "phone", "sip", ...
    pub entry_point_type: String,
    pub uri: String,
}
