use chrono::{DateTime, Utc};
use chrono_tz::Asia::Tokyo;

use crate::models::LiveEvent;

const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// State transitions that produce a broadcast message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Created,
    Started,
    Ended,
    Imminent,
    TitleChanged,
    Rescheduled,
}

impl Transition {
    pub fn banner(&self) -> &'static str {
        match self {
            Transition::Created => "【通知】新しい配信が追加されました",
            Transition::Started => "【通知】配信が開始されました",
            Transition::Ended => "【通知】配信が終了されました",
            Transition::Imminent => "【通知】配信がもうすぐ開始されます！",
            Transition::TitleChanged => "【通知】タイトルが変更されました",
            Transition::Rescheduled => "【通知】配信開始時刻が変更されました",
        }
    }
}

fn format_tokyo(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Tokyo).format(TIME_FORMAT).to_string()
}

/// Render the broadcast text for a transition. Times are Tokyo-local; a
/// derived end time is marked provisional. `link` appends the calendar
/// download footer (used for created / title-changed / rescheduled).
pub fn render(transition: Transition, event: &LiveEvent, link: Option<&str>) -> String {
    let (start, end) = event.canonical_interval();
    let end_suffix = if event.end_is_provisional() { "(仮)" } else { "" };

    let mut text = format!(
        "{}\nタイトル: {}\nチャンネル: {}\n開始時刻: {}\n終了時刻: {}{}\n配信URL: {}",
        transition.banner(),
        event.canonical_title(),
        event.channel_title,
        format_tokyo(start),
        format_tokyo(end),
        end_suffix,
        event.watch_url(),
    );

    if let Some(url) = link {
        text.push_str(&format!("\nカレンダーに登録: {}", url));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> LiveEvent {
        LiveEvent {
            id: "vid42".to_string(),
            channel_id: "UC0042".to_string(),
            channel_title: "Okayu Ch".to_string(),
            actor: "おかゆ".to_string(),
            title: "雑談".to_string(),
            collaborate: vec![],
            // 2024-05-01 03:00 UTC = 2024-05-01 12:00 JST
            scheduled_start_time: Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap(),
            actual_start_time: None,
            actual_end_time: None,
        }
    }

    #[test]
    fn created_message_with_link() {
        let text = render(Transition::Created, &event(), Some("https://example.com/vid42.ics"));
        assert_eq!(
            text,
            "【通知】新しい配信が追加されました\n\
             タイトル: Okayu Ch: 雑談\n\
             チャンネル: Okayu Ch\n\
             開始時刻: 2024/05/01 12:00:00\n\
             終了時刻: 2024/05/01 13:00:00(仮)\n\
             配信URL: https://www.youtube.com/watch?v=vid42\n\
             カレンダーに登録: https://example.com/vid42.ics"
        );
    }

    #[test]
    fn ended_message_uses_actual_times_without_provisional_mark() {
        let mut ev = event();
        ev.actual_start_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 3, 5, 0).unwrap());
        ev.actual_end_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 4, 30, 0).unwrap());
        let text = render(Transition::Ended, &ev, None);
        assert!(text.starts_with("【通知】配信が終了されました\n"));
        assert!(text.contains("開始時刻: 2024/05/01 12:05:00"));
        assert!(text.contains("終了時刻: 2024/05/01 13:30:00\n"));
        assert!(!text.contains("(仮)"));
        assert!(!text.contains("カレンダーに登録"));
    }

    #[test]
    fn imminent_message_has_no_link_footer() {
        let text = render(Transition::Imminent, &event(), None);
        assert!(text.starts_with("【通知】配信がもうすぐ開始されます！\n"));
        assert!(!text.contains("カレンダーに登録"));
    }

    #[test]
    fn banners_are_distinct() {
        let banners = [
            Transition::Created,
            Transition::Started,
            Transition::Ended,
            Transition::Imminent,
            Transition::TitleChanged,
            Transition::Rescheduled,
        ]
        .map(|t| t.banner());
        for (i, a) in banners.iter().enumerate() {
            for b in banners.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
