use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: NaiveDate,
    pub habit_id: i64,
    #[serde(default)]
    pub planned: bool,
    #[serde(default)]
    pub completed: bool,
}

impl DailyLog {
    pub fn key(&self) -> (NaiveDate, i64) {
        (self.date, self.habit_id)
    }
}

/// Single-phase answer kept as an append-only audit trail next to the
/// two-phase daily logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitResponse {
    pub habit_id: i64,
    pub completed: bool,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.is_empty()))
}
