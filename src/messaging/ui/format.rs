//! Timestamp formatting for chat views.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};

/// `HH:MM` in the local time zone.
#[must_use]
pub fn format_time(at: &DateTime<Utc>) -> String {
    format_time_in(at, &Local)
}

/// `HH:MM` in an explicit time zone.
#[must_use]
pub fn format_time_in<Tz>(at: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.with_timezone(tz).format("%H:%M").to_string()
}

/// Coarse age label used by conversation lists.
///
/// Timestamps in the future (clock skew between client and server) read as
/// "just now".
#[must_use]
pub fn relative_label(at: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(*at);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if elapsed.num_hours() < 24 {
        format!("{} h ago", elapsed.num_hours())
    } else {
        at.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset};

    use super::*;

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn time_is_hours_and_minutes() {
        let stamp = at("2024-05-01T09:07:59Z");
        assert_eq!(format_time_in(&stamp, &Utc), "09:07");

        let paris = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(format_time_in(&stamp, &paris), "11:07");
    }

    #[test]
    fn relative_labels() {
        let now = at("2024-05-01T12:00:00Z");
        assert_eq!(relative_label(&now, &now), "just now");
        assert_eq!(relative_label(&(now - Duration::seconds(59)), &now), "just now");
        assert_eq!(relative_label(&(now - Duration::minutes(5)), &now), "5 min ago");
        assert_eq!(relative_label(&(now - Duration::minutes(125)), &now), "2 h ago");
        assert_eq!(relative_label(&(now - Duration::days(3)), &now), "2024-04-28");
        assert_eq!(relative_label(&(now + Duration::minutes(3)), &now), "just now");
    }
}
