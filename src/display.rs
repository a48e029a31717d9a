use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{Draft, FieldKind, Record};

pub const MILESTONE_COMPLETED: &str = "🏆 Milestone completed!";
const BAR_WIDTH: usize = 20;

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Renders a server timestamp relative to `now`. Anything that does not
/// parse is returned as-is.
pub fn relative_time(created_at: &str, now: DateTime<Utc>) -> String {
    let Some(at) = parse_timestamp(created_at) else {
        return created_at.to_string();
    };
    let elapsed = now.signed_duration_since(at);
    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        plural(elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        plural(elapsed.num_hours(), "hour")
    } else if elapsed.num_days() < 7 {
        plural(elapsed.num_days(), "day")
    } else {
        at.format("%b %-d, %Y").to_string()
    }
}

pub fn created_label<D>(record: &Record<D>) -> String {
    relative_time(&record.created_at, Utc::now())
}

/// `[#####               ] 25%`
pub fn progress_bar(percent: i64) -> String {
    let clamped = percent.clamp(0, 100) as usize;
    let filled = clamped * BAR_WIDTH / 100;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        percent
    )
}

pub fn milestone_status<D: Draft>(draft: &D) -> Option<&'static str> {
    draft.is_milestone_completed().then_some(MILESTONE_COMPLETED)
}

pub fn chips(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One `Label: value` line per form field, then the milestone marker,
/// the counters and the author line.
pub fn detail_lines<D: Draft>(record: &Record<D>, now: DateTime<Utc>) -> Vec<String> {
    let fields = &record.fields;
    let mut lines: Vec<String> = D::fields()
        .iter()
        .map(|spec| {
            let value = match spec.kind {
                FieldKind::Percent => fields.percent().map(progress_bar).unwrap_or_default(),
                FieldKind::Tags => fields.tags().map(chips).unwrap_or_default(),
                _ => fields.field_text(spec.key),
            };
            format!("{}: {}", spec.label, value)
        })
        .collect();
    if let Some(marker) = milestone_status(fields) {
        lines.push(marker.to_string());
    }
    lines.extend(fields.stats());
    lines.push(format!(
        "By {} ({}), {}",
        record.author.name,
        record.author.avatar,
        relative_time(&record.created_at, now)
    ));
    lines
}

/// Cuts `text` to at most `max` characters, marking the cut with "...".
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityId, PlanDraft, PostDraft, ProgressDraft, Template};
    use crate::testing::author;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn recent_timestamps_are_relative() {
        assert_eq!(relative_time("2024-06-10T11:59:30Z", now()), "just now");
        assert_eq!(relative_time("2024-06-10T11:59:00Z", now()), "1 minute ago");
        assert_eq!(relative_time("2024-06-10T11:15:00Z", now()), "45 minutes ago");
        assert_eq!(relative_time("2024-06-10T10:00:00+00:00", now()), "2 hours ago");
        assert_eq!(relative_time("2024-06-09 12:00:00", now()), "1 day ago");
        assert_eq!(relative_time("2024-06-06T08:30:00.125", now()), "4 days ago");
    }

    #[test]
    fn old_timestamps_show_the_date() {
        assert_eq!(relative_time("2024-05-01T10:00:00Z", now()), "May 1, 2024");
    }

    #[test]
    fn unparseable_timestamps_are_kept() {
        assert_eq!(relative_time("2 hours ago", now()), "2 hours ago");
        assert_eq!(relative_time("", now()), "");
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0), format!("[{}] 0%", " ".repeat(20)));
        assert_eq!(progress_bar(50), format!("[{}{}] 50%", "#".repeat(10), " ".repeat(10)));
        assert_eq!(progress_bar(100), format!("[{}] 100%", "#".repeat(20)));
    }

    #[test]
    fn milestone_only_at_full_progress() {
        let mut draft = ProgressDraft {
            progress_percent: 100,
            ..Default::default()
        };
        assert_eq!(milestone_status(&draft), Some(MILESTONE_COMPLETED));
        draft.progress_percent = 45;
        assert_eq!(milestone_status(&draft), None);
        assert_eq!(milestone_status(&PlanDraft::default()), None);
    }

    #[test]
    fn progress_details_include_bar_and_milestone() {
        let record = Record {
            id: EntityId::new("7"),
            author: author(),
            created_at: "2024-06-10T09:00:00Z".into(),
            fields: ProgressDraft {
                title: "Completed React Hooks".into(),
                description: "All modules done".into(),
                milestone: "React Mastery".into(),
                progress_percent: 100,
                template: Template::Course,
            },
        };
        let lines = detail_lines(&record, now());
        assert_eq!(lines[0], "Update template: course");
        assert_eq!(lines[1], "Title: Completed React Hooks");
        assert_eq!(lines[4], format!("Progress: {}", progress_bar(100)));
        assert_eq!(lines[5], MILESTONE_COMPLETED);
        assert_eq!(lines[6], "By Alex Johnson (AJ), 3 hours ago");
    }

    #[test]
    fn post_details_render_tags_as_chips() {
        let record = Record {
            id: EntityId::new("8"),
            author: author(),
            created_at: "yesterday".into(),
            fields: PostDraft {
                title: "Tailwind layouts".into(),
                tags: vec!["CSS".into(), "Tailwind".into()],
                ..Default::default()
            },
        };
        let lines = detail_lines(&record, now());
        assert!(lines.contains(&"Tags: #CSS #Tailwind".to_string()));
        assert!(lines.contains(&"Allow comments: yes".to_string()));
        assert_eq!(lines[lines.len() - 2], "0 likes, 0 comments");
        assert_eq!(lines.last().unwrap(), "By Alex Johnson (AJ), yesterday");
    }

    #[test]
    fn plan_details_show_followers() {
        let record = Record {
            id: EntityId::new("9"),
            author: author(),
            created_at: "2024-06-10T11:00:00Z".into(),
            fields: PlanDraft {
                title: "Full Stack React & Spring Boot".into(),
                topics: vec!["React".into(), "Spring Boot".into()],
                followers: 89,
                ..Default::default()
            },
        };
        let lines = detail_lines(&record, now());
        assert!(lines.contains(&"Topics: #React #Spring Boot".to_string()));
        assert_eq!(lines[lines.len() - 2], "89 followers");
    }

    #[test]
    fn chips_and_preview() {
        assert_eq!(chips(&["React".into(), "Hooks".into()]), "#React #Hooks");
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("a longer description", 10), "a longe...");
    }
}
