//! Date and time labels for rendering a message timeline.
//!
//! Labels are computed in UTC so they are deterministic; the embedding UI
//! converts timestamps to the viewer's timezone before calling in if it
//! wants local grouping.

use chrono::{DateTime, Utc};

use crate::conversation::ViewMessage;

/// One renderable row of a message timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineRow<'a> {
    /// Opens a new day group.
    DayMarker(String),
    /// A message with its clock label.
    Entry(&'a ViewMessage, String),
}

/// Day label for `at`, relative to `today`: "Today", "Yesterday", or the
/// full date ("May 01, 2024").
pub fn day_label_relative_to(at: DateTime<Utc>, today: DateTime<Utc>) -> String {
    let at_day = at.date_naive();
    let today_day = today.date_naive();

    if at_day == today_day {
        "Today".to_string()
    } else if today_day.pred_opt() == Some(at_day) {
        "Yesterday".to_string()
    } else {
        at.format("%B %d, %Y").to_string()
    }
}

/// Day label for `at`, relative to now.
pub fn day_label(at: DateTime<Utc>) -> String {
    day_label_relative_to(at, Utc::now())
}

/// Clock label, 24-hour.
pub fn time_label(at: DateTime<Utc>) -> String {
    at.format("%H:%M").to_string()
}

/// Interleave day markers into a rendered message sequence.
pub fn with_day_markers<'a, I>(messages: I) -> Vec<TimelineRow<'a>>
where
    I: IntoIterator<Item = &'a ViewMessage>,
{
    let mut rows = Vec::new();
    let mut current_day = None;

    for message in messages {
        let day = message.sent_at.date_naive();
        if current_day != Some(day) {
            rows.push(TimelineRow::DayMarker(day_label(message.sent_at)));
            current_day = Some(day);
        }
        rows.push(TimelineRow::Entry(message, time_label(message.sent_at)));
    }
    rows
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use magpie_shared::{Handle, LocalMessageId, MessageBody};

    use crate::conversation::Delivery;

    use super::*;

    fn message_at(at: DateTime<Utc>) -> ViewMessage {
        ViewMessage {
            local_id: LocalMessageId::new(),
            server_id: None,
            sender: Handle::new("quicklion42"),
            recipient: Handle::new("lazytiger7"),
            body: MessageBody::text("hi"),
            sent_at: at,
            read: false,
            delivery: Delivery::Confirmed,
        }
    }

    #[test]
    fn test_day_labels() {
        let today = Utc.with_ymd_and_hms(2024, 5, 3, 10, 0, 0).unwrap();

        let same_day = Utc.with_ymd_and_hms(2024, 5, 3, 23, 59, 0).unwrap();
        assert_eq!(day_label_relative_to(same_day, today), "Today");

        let yesterday = Utc.with_ymd_and_hms(2024, 5, 2, 0, 1, 0).unwrap();
        assert_eq!(day_label_relative_to(yesterday, today), "Yesterday");

        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(day_label_relative_to(earlier, today), "May 01, 2024");
    }

    #[test]
    fn test_time_label_is_24_hour() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 14, 7, 0).unwrap();
        assert_eq!(time_label(at), "14:07");

        let morning = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(time_label(morning), "09:30");
    }

    #[test]
    fn test_with_day_markers_groups_by_day() {
        let messages = vec![
            message_at(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()),
            message_at(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            message_at(Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()),
        ];

        let rows = with_day_markers(messages.iter());
        assert_eq!(rows.len(), 5);

        assert!(matches!(rows[0], TimelineRow::DayMarker(ref label) if label == "May 01, 2024"));
        assert!(matches!(rows[1], TimelineRow::Entry(_, ref t) if t == "09:00"));
        assert!(matches!(rows[2], TimelineRow::Entry(_, ref t) if t == "10:00"));
        assert!(matches!(rows[3], TimelineRow::DayMarker(ref label) if label == "May 02, 2024"));
        assert!(matches!(rows[4], TimelineRow::Entry(_, ref t) if t == "08:00"));
    }

    #[test]
    fn test_empty_timeline_has_no_rows() {
        assert!(with_day_markers(std::iter::empty()).is_empty());
    }
}
