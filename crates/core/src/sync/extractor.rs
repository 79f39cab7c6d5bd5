//! Candidate extraction from raw provider events.
//!
//! Pure and deterministic: no I/O, and absence of a meeting URL is not an
//! error — such events are simply never persisted.

use chrono::Utc;
use once_cell::sync::Lazy;
use quorum_domain::{CandidateMeeting, EventStatus, RemoteEvent};
use regex::Regex;
use tracing::debug;

static MEET_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://meet\.google\.com/[a-z0-9][a-z0-9-]+").unwrap());

static ZOOM_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[\w.-]*zoom\.us/j/\d+(?:\?pwd=[\w.-]+)?").unwrap());

static TEAMS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://teams\.microsoft\.com/l/meetup-join/[^\s<>"']+"#).unwrap()
});

/// Map one raw remote event to a normalized candidate.
///
/// Returns `None` when no meeting URL can be extracted or the event carries
/// no usable time range. `owner_email` is the credential owner's address,
/// used to resolve attendee status when the provider omits a `self` entry.
#[must_use]
pub fn extract(event: &RemoteEvent, owner_email: &str) -> Option<CandidateMeeting> {
    let meeting_url = extract_meeting_url(event)?;

    let start_ts = parse_event_timestamp(event.start.as_deref()?)?;
    let end_ts = parse_event_timestamp(event.end.as_deref()?)?;

    let title = event
        .summary
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Untitled event")
        .to_string();

    Some(CandidateMeeting {
        remote_event_id: event.id.clone(),
        title,
        description: event.description.clone(),
        meeting_url,
        start_ts,
        end_ts,
        event_status: resolve_event_status(event, owner_email),
    })
}

/// Find a meeting URL, in priority order: a structured conferencing entry
/// tagged "video", then vendor URL shapes in the description and location.
fn extract_meeting_url(event: &RemoteEvent) -> Option<String> {
    if let Some(entry) =
        event.conference_entry_points.iter().find(|e| e.entry_point_type == "video")
    {
        return Some(entry.uri.clone());
    }

    let haystacks = [event.description.as_deref(), event.location.as_deref()];
    for text in haystacks.into_iter().flatten() {
        for pattern in [&*MEET_URL, &*ZOOM_URL, &*TEAMS_URL] {
            if let Some(m) = pattern.find(text) {
                return Some(m.as_str().to_string());
            }
        }
    }

    None
}

/// Resolve the credential owner's response status for this event.
///
/// The `self`-flagged attendee wins. With no attendee list, an event the
/// owner organized counts as accepted; anything else stays `needs_action`
/// until the user responds.
fn resolve_event_status(event: &RemoteEvent, owner_email: &str) -> EventStatus {
    if let Some(me) = event.attendees.iter().find(|a| a.is_self) {
        return me
            .response_status
            .as_deref()
            .and_then(EventStatus::parse)
            .unwrap_or(EventStatus::NeedsAction);
    }

    match &event.organizer {
        Some(org) if org.is_self || org.email.eq_ignore_ascii_case(owner_email) => {
            EventStatus::Accepted
        }
        _ => EventStatus::NeedsAction,
    }
}

/// Parse a provider timestamp into epoch seconds.
///
/// Accepts RFC 3339 (timezone-less values are taken as UTC) and bare dates
/// from all-day events, which resolve to midnight UTC.
fn parse_event_timestamp(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }

    let has_explicit_timezone = trimmed.ends_with('Z')
        || trimmed
            .rfind('T')
            .is_some_and(|idx| trimmed[idx + 1..].chars().any(|c| matches!(c, '+' | '-')));

    let candidate = if has_explicit_timezone { trimmed.to_string() } else { format!("{trimmed}Z") };

    match chrono::DateTime::parse_from_rfc3339(&candidate) {
        Ok(dt) => Some(dt.with_timezone(&Utc).timestamp()),
        Err(err) => {
            debug!(value, error = %err, "unparseable event timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use quorum_domain::{ConferenceEntryPoint, RemoteAttendee, RemoteOrganizer};

    use super::*;

    fn base_event() -> RemoteEvent {
        RemoteEvent {
            id: "evt-1".to_string(),
            summary: Some("Design review".to_string()),
            start: Some("2026-03-02T10:00:00Z".to_string()),
            end: Some("2026-03-02T11:00:00Z".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn conference_entry_wins_over_description() {
        let mut event = base_event();
        event.description = Some("join https://zoom.us/j/123456".to_string());
        event.conference_entry_points = vec![ConferenceEntryPoint {
            entry_point_type: "video".to_string(),
            uri: "https://meet.google.com/abc-defg-hij".to_string(),
        }];

        let candidate = extract(&event, "me@example.com").unwrap();
        assert_eq!(candidate.meeting_url, "https://meet.google.com/abc-defg-hij");
    }

    #[test]
    fn phone_entry_points_are_ignored() {
        let mut event = base_event();
        event.conference_entry_points = vec![ConferenceEntryPoint {
            entry_point_type: "phone".to_string(),
            uri: "tel:+1-555-0100".to_string(),
        }];

        assert!(extract(&event, "me@example.com").is_none());
    }

    #[test]
    fn extracts_zoom_url_from_description() {
        let mut event = base_event();
        event.description =
            Some("Agenda attached.\nJoin: https://us02web.zoom.us/j/5551234567?pwd=abcDEF".into());

        let candidate = extract(&event, "me@example.com").unwrap();
        assert_eq!(candidate.meeting_url, "https://us02web.zoom.us/j/5551234567?pwd=abcDEF");
    }

    #[test]
    fn extracts_teams_url_from_location() {
        let mut event = base_event();
        event.location =
            Some("https://teams.microsoft.com/l/meetup-join/19%3ameeting_xyz/0".into());

        let candidate = extract(&event, "me@example.com").unwrap();
        assert!(candidate.meeting_url.starts_with("https://teams.microsoft.com/l/meetup-join/"));
    }

    #[test]
    fn no_url_yields_no_candidate() {
        let mut event = base_event();
        event.description = Some("Lunch at the corner cafe".to_string());
        assert!(extract(&event, "me@example.com").is_none());
    }

    #[test]
    fn self_attendee_response_wins() {
        let mut event = base_event();
        event.description = Some("https://meet.google.com/abc-defg-hij".to_string());
        event.organizer =
            Some(RemoteOrganizer { email: "me@example.com".to_string(), is_self: true });
        event.attendees = vec![RemoteAttendee {
            email: "me@example.com".to_string(),
            response_status: Some("tentative".to_string()),
            is_self: true,
        }];

        let candidate = extract(&event, "me@example.com").unwrap();
        assert_eq!(candidate.event_status, EventStatus::Tentative);
    }

    #[test]
    fn organizer_match_defaults_to_accepted() {
        let mut event = base_event();
        event.description = Some("https://meet.google.com/abc-defg-hij".to_string());
        event.organizer =
            Some(RemoteOrganizer { email: "Me@Example.com".to_string(), is_self: false });

        let candidate = extract(&event, "me@example.com").unwrap();
        assert_eq!(candidate.event_status, EventStatus::Accepted);
    }

    #[test]
    fn unknown_attendance_defaults_to_needs_action() {
        let mut event = base_event();
        event.description = Some("https://meet.google.com/abc-defg-hij".to_string());
        event.organizer =
            Some(RemoteOrganizer { email: "other@example.com".to_string(), is_self: false });

        let candidate = extract(&event, "me@example.com").unwrap();
        assert_eq!(candidate.event_status, EventStatus::NeedsAction);
    }

    #[test]
    fn provider_wire_status_is_normalized() {
        let mut event = base_event();
        event.description = Some("https://meet.google.com/abc-defg-hij".to_string());
        event.attendees = vec![RemoteAttendee {
            email: "me@example.com".to_string(),
            response_status: Some("needsAction".to_string()),
            is_self: true,
        }];

        let candidate = extract(&event, "me@example.com").unwrap();
        assert_eq!(candidate.event_status, EventStatus::NeedsAction);
    }

    #[test]
    fn all_day_dates_resolve_to_midnight_utc() {
        let mut event = base_event();
        event.description = Some("https://meet.google.com/abc-defg-hij".to_string());
        event.start = Some("2026-03-02".to_string());
        event.end = Some("2026-03-03".to_string());

        let candidate = extract(&event, "me@example.com").unwrap();
        assert_eq!(candidate.end_ts - candidate.start_ts, 86_400);
    }

    #[test]
    fn timezone_less_timestamps_are_taken_as_utc() {
        let mut event = base_event();
        event.description = Some("https://meet.google.com/abc-defg-hij".to_string());
        event.start = Some("2026-03-02T10:00:00".to_string());

        let candidate = extract(&event, "me@example.com").unwrap();
        assert_eq!(candidate.start_ts, 1_772_445_600);
    }

    #[test]
    fn unparseable_time_yields_no_candidate() {
        let mut event = base_event();
        event.description = Some("https://meet.google.com/abc-defg-hij".to_string());
        event.start = Some("next tuesday".to_string());

        assert!(extract(&event, "me@example.com").is_none());
    }

    #[test]
    fn blank_title_becomes_untitled() {
        let mut event = base_event();
        event.summary = Some("   ".to_string());
        event.description = Some("https://meet.google.com/abc-defg-hij".to_string());

        let candidate = extract(&event, "me@example.com").unwrap();
        assert_eq!(candidate.title, "Untitled event");
    }
}
