//! Google Calendar implementation of the CalendarApi port.
//!
//! Maps provider HTTP status codes to the domain error taxonomy at this
//! boundary: 401 → `AuthExpired`, 410 → `CursorInvalid`, 5xx/429 →
//! `Provider`, client timeouts → `Timeout`. Cancelled events arrive as
//! tombstones in `EventPage::deletions`.

use std::time::Duration;

use async_trait::async_trait;
use quorum_core::{CalendarApi, EventPage, WatchChannel, WindowRange};
use quorum_domain::{
    ConferenceEntryPoint, ProviderConfig, QuorumError, RemoteAttendee, RemoteEvent,
    RemoteOrganizer, Result,
};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const EVENT_FIELDS: &str = "items(id,status,summary,description,location,start,end,attendees,\
                            organizer,conferenceData,hangoutLink),nextPageToken,nextSyncToken";

/// Pagination safety cap for the cursor-mint probe.
const PROBE_PAGE_LIMIT: usize = 50;

/// Google Calendar provider client
pub struct GoogleCalendarApi {
    http: Client,
    api_base: String,
}

impl GoogleCalendarApi {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| QuorumError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, api_base: config.api_base.trim_end_matches('/').to_string() })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.api_base, calendar_id)
    }

    async fn get_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &[(&str, String)],
    ) -> Result<GoogleEventsResponse> {
        let response = self
            .http
            .get(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(crate::errors::InfraError::from)?;

        let response = check_status(response).await?;

        response.json().await.map_err(|e| {
            QuorumError::InvalidInput(format!("failed to parse provider response: {e}"))
        })
    }
}

/// Map a non-success status into the error taxonomy, consuming the body for
/// diagnostics.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => QuorumError::AuthExpired(format!("provider returned 401: {body}")),
        StatusCode::GONE => QuorumError::CursorInvalid,
        StatusCode::TOO_MANY_REQUESTS => {
            QuorumError::Provider(format!("rate limited ({status}): {body}"))
        }
        s if s.is_server_error() => QuorumError::Provider(format!("provider error {status}: {body}")),
        _ => QuorumError::Network(format!("provider returned {status}: {body}")),
    })
}

#[async_trait]
impl CalendarApi for GoogleCalendarApi {
    #[instrument(skip(self, access_token))]
    async fn list_window(
        &self,
        access_token: &str,
        calendar_id: &str,
        range: WindowRange,
        page_token: Option<&str>,
    ) -> Result<EventPage> {
        let mut query = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("timeMin", range.time_min.to_rfc3339()),
            ("timeMax", range.time_max.to_rfc3339()),
            ("timeZone", "UTC".to_string()),
            ("fields", EVENT_FIELDS.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self.get_events(access_token, calendar_id, &query).await?;
        Ok(into_event_page(response))
    }

    #[instrument(skip(self, access_token, sync_token))]
    async fn list_delta(
        &self,
        access_token: &str,
        calendar_id: &str,
        sync_token: &str,
        page_token: Option<&str>,
    ) -> Result<EventPage> {
        let mut query = vec![
            ("syncToken", sync_token.to_string()),
            ("showDeleted", "true".to_string()),
            ("fields", EVENT_FIELDS.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self.get_events(access_token, calendar_id, &query).await?;
        Ok(into_event_page(response))
    }

    /// Minimal probe: page through token-only responses until the provider
    /// hands back `nextSyncToken`.
    #[instrument(skip(self, access_token))]
    async fn mint_cursor(&self, access_token: &str, calendar_id: &str) -> Result<String> {
        let mut page_token: Option<String> = None;

        for _ in 0..PROBE_PAGE_LIMIT {
            let mut query = vec![
                ("showDeleted", "true".to_string()),
                ("fields", "nextPageToken,nextSyncToken".to_string()),
                ("maxResults", "2500".to_string()),
            ];
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self.get_events(access_token, calendar_id, &query).await?;

            if let Some(token) = response.next_sync_token {
                debug!(calendar_id, "minted fresh sync cursor");
                return Ok(token);
            }

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Err(QuorumError::Provider("provider never returned a sync cursor".into()))
    }

    #[instrument(skip(self, access_token, address))]
    async fn create_watch(
        &self,
        access_token: &str,
        calendar_id: &str,
        address: &str,
        ttl_hours: i64,
    ) -> Result<WatchChannel> {
        let channel_id = Uuid::new_v4().to_string();
        let body = json!({
            "id": channel_id.clone(),
            "type": "web_hook",
            "address": address,
            "params": { "ttl": (ttl_hours * 3600).to_string() },
        });

        let response = self
            .http
            .post(format!("{}/watch", self.events_url(calendar_id)))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(crate::errors::InfraError::from)?;

        let response = check_status(response).await?;

        let channel: GoogleWatchResponse = response.json().await.map_err(|e| {
            QuorumError::InvalidInput(format!("failed to parse watch response: {e}"))
        })?;

        let expiration_ts = channel
            .expiration
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .map_or(0, |ms| ms / 1000);

        Ok(WatchChannel {
            subscription_id: channel.id.unwrap_or(channel_id),
            resource_id: channel.resource_id,
            expiration_ts,
        })
    }

    #[instrument(skip(self, access_token))]
    async fn stop_watch(
        &self,
        access_token: &str,
        subscription_id: &str,
        resource_id: &str,
    ) -> Result<()> {
        let body = json!({ "id": subscription_id, "resourceId": resource_id });

        let response = self
            .http
            .post(format!("{}/channels/stop", self.api_base))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(crate::errors::InfraError::from)?;

        // The provider forgets channels on its own; a 404 here means the
        // subscription is already gone, which is the outcome we wanted.
        if response.status() == StatusCode::NOT_FOUND {
            warn!(subscription_id, "watch channel already gone on provider side");
            return Ok(());
        }

        check_status(response).await?;
        Ok(())
    }
}

fn into_event_page(response: GoogleEventsResponse) -> EventPage {
    let mut events = Vec::new();
    let mut deletions = Vec::new();

    for item in response.items {
        if item.status.as_deref() == Some("cancelled") {
            deletions.push(item.id);
            continue;
        }
        events.push(into_remote_event(item));
    }

    EventPage {
        events,
        deletions,
        next_page_token: response.next_page_token,
        next_sync_token: response.next_sync_token,
    }
}

fn into_remote_event(item: GoogleCalendarEvent) -> RemoteEvent {
    let mut conference_entry_points: Vec<ConferenceEntryPoint> = item
        .conference_data
        .map(|data| {
            data.entry_points
                .into_iter()
                .map(|e| ConferenceEntryPoint { entry_point_type: e.entry_point_type, uri: e.uri })
                .collect()
        })
        .unwrap_or_default();

    // A bare hangout link is equivalent to a video entry point
    if let Some(link) = item.hangout_link {
        if !conference_entry_points.iter().any(|e| e.entry_point_type == "video") {
            conference_entry_points
                .push(ConferenceEntryPoint { entry_point_type: "video".to_string(), uri: link });
        }
    }

    RemoteEvent {
        id: item.id,
        summary: item.summary,
        description: item.description,
        location: item.location,
        start: item.start.and_then(|t| t.date_time.or(t.date)),
        end: item.end.and_then(|t| t.date_time.or(t.date)),
        attendees: item
            .attendees
            .unwrap_or_default()
            .into_iter()
            .map(|a| RemoteAttendee {
                email: a.email,
                response_status: a.response_status,
                is_self: a.is_self.unwrap_or(false),
            })
            .collect(),
        organizer: item.organizer.map(|o| RemoteOrganizer {
            email: o.email.unwrap_or_default(),
            is_self: o.is_self.unwrap_or(false),
        }),
        conference_entry_points,
    }
}

#[derive(Debug, Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleCalendarEvent>,
    #[serde(rename = "nextSyncToken")]
    next_sync_token: Option<String>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarEvent {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
    attendees: Option<Vec<GoogleAttendee>>,
    organizer: Option<GoogleOrganizer>,
    #[serde(rename = "conferenceData")]
    conference_data: Option<GoogleConferenceData>,
    #[serde(rename = "hangoutLink")]
    hangout_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventDateTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleAttendee {
    email: String,
    #[serde(rename = "responseStatus")]
    response_status: Option<String>,
    #[serde(rename = "self")]
    is_self: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GoogleOrganizer {
    email: Option<String>,
    #[serde(rename = "self")]
    is_self: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GoogleConferenceData {
    #[serde(rename = "entryPoints", default)]
    entry_points: Vec<GoogleEntryPoint>,
}

#[derive(Debug, Deserialize)]
struct GoogleEntryPoint {
    #[serde(rename = "entryPointType")]
    entry_point_type: String,
    uri: String,
}

#[derive(Debug, Deserialize)]
struct GoogleWatchResponse {
    id: Option<String>,
    #[serde(rename = "resourceId")]
    resource_id: String,
    expiration: Option<String>,
}
