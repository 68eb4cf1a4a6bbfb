use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }

    /// First eight hex digits, enough to tell tasks apart on a small board.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Status {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl Status {
    /// Column order on the board.
    pub const ALL: [Status; 3] = [Status::Pending, Status::InProgress, Status::Completed];

    pub fn label(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
        }
    }

    /// Moves offered on a card in this status. Starting is only offered
    /// from `Pending`; the store itself accepts any transition.
    pub fn moves(&self) -> &'static [Status] {
        match self {
            Status::Pending => &[Status::InProgress, Status::Completed],
            Status::InProgress => &[Status::Pending, Status::Completed],
            Status::Completed => &[Status::Pending],
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Status::Pending => 0,
            Status::InProgress => 1,
            Status::Completed => 2,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The durable part of a to-do item. Edit drafts are kept by the board,
/// never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub status: Status,
    #[serde(default, with = "due_date")]
    pub due: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub highlighted: bool,
}

impl Task {
    pub fn new(text: &str, due: Option<NaiveDate>) -> Self {
        Task {
            id: TaskId::new(),
            text: text.to_string(),
            status: Status::Pending,
            due,
            created_at: Utc::now(),
            highlighted: false,
        }
    }

    /// A task is overdue once midnight UTC of its due date has passed,
    /// unless it is completed.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        match self.due {
            Some(due) if self.status != Status::Completed => {
                due.and_time(NaiveTime::MIN).and_utc() < now
            }
            _ => false,
        }
    }
}

/// `YYYY-MM-DD` on disk. Older boards stored a missing date as `""`.
mod due_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(due: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match due {
            Some(d) => s.serialize_str(&d.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s.trim(), FORMAT)
                .map(Some)
                .map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn new_task_defaults() {
        let task = Task::new("Buy milk", NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(task.status, Status::Pending);
        assert!(!task.highlighted);
        assert_eq!(task.due, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn overdue_depends_on_status_and_date() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let yesterday = (now - Duration::days(1)).date_naive();
        let tomorrow = (now + Duration::days(1)).date_naive();

        let mut task = Task::new("Report", Some(yesterday));
        assert!(task.is_overdue_at(now));

        task.status = Status::InProgress;
        assert!(task.is_overdue_at(now));

        task.status = Status::Completed;
        assert!(!task.is_overdue_at(now));

        let later = Task::new("Later", Some(tomorrow));
        assert!(!later.is_overdue_at(now));

        let undated = Task::new("Whenever", None);
        assert!(!undated.is_overdue_at(now));
    }

    #[test]
    fn due_today_is_overdue_after_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 1).unwrap();
        let task = Task::new("Today", Some(now.date_naive()));
        assert!(task.is_overdue_at(now));
        assert!(!task.is_overdue_at(Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap()));
    }

    #[test]
    fn status_uses_display_labels_on_disk() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            r#""In Progress""#
        );
        let status: Status = serde_json::from_str(r#""Completed""#).unwrap();
        assert_eq!(status, Status::Completed);
    }

    #[test]
    fn decodes_legacy_record() {
        let json = r#"{
            "id": "6f1c1e0e-9a4b-4c43-8f43-2b0f6c9b7a11",
            "text": "Water plants",
            "status": "Pending",
            "due": "",
            "createdAt": "2024-03-01T09:30:00.000Z",
            "highlighted": true,
            "editing": true,
            "_draft": "Water all the plants"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.text, "Water plants");
        assert_eq!(task.due, None);
        assert!(task.highlighted);
        assert_eq!(task.id.short(), "6f1c1e0e");
    }

    #[test]
    fn due_is_written_as_plain_date() {
        let task = Task::new("Pay rent", NaiveDate::from_ymd_opt(2024, 2, 1));
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["due"], "2024-02-01");
        assert!(value.get("editing").is_none());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn moves_never_include_current_status() {
        for status in Status::ALL {
            assert!(!status.moves().contains(&status));
        }
        assert!(!Status::Completed.moves().contains(&Status::InProgress));
    }
}
