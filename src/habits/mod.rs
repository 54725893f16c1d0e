use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{HabitTrackerError, Result};

mod schema;
pub use schema::{DailyLog, Habit, HabitResponse};

pub const HABITS_FILE: &str = "habits.json";
pub const DAILY_LOGS_FILE: &str = "daily_logs.json";
pub const RESPONSES_FILE: &str = "responses.json";

#[derive(Debug, Clone)]
pub struct StorePaths {
    pub habits: PathBuf,
    pub responses: PathBuf,
    pub daily_logs: PathBuf,
}

impl StorePaths {
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            habits: dir.join(HABITS_FILE),
            responses: dir.join(RESPONSES_FILE),
            daily_logs: dir.join(DAILY_LOGS_FILE),
        }
    }
}

#[derive(Default)]
struct StoreState {
    habits: Vec<Habit>,
    next_id: i64,
    daily_logs: Vec<DailyLog>,
    log_index: HashMap<(NaiveDate, i64), usize>,
    responses: Vec<HabitResponse>,
}

impl StoreState {
    // Logs and responses outlive the habit they point at, so their ids are
    // never handed out again.
    fn reserve_id(&mut self, habit_id: i64) {
        self.next_id = self.next_id.max(habit_id.saturating_add(1));
    }

    fn upsert_log<F>(&mut self, date: NaiveDate, habit_id: i64, apply: F) -> DailyLog
    where
        F: FnOnce(&mut DailyLog),
    {
        self.reserve_id(habit_id);
        let idx = match self.log_index.get(&(date, habit_id)) {
            Some(idx) => *idx,
            None => {
                self.daily_logs.push(DailyLog {
                    date,
                    habit_id,
                    planned: false,
                    completed: false,
                });
                let idx = self.daily_logs.len() - 1;
                self.log_index.insert((date, habit_id), idx);
                idx
            }
        };
        let log = &mut self.daily_logs[idx];
        apply(log);
        *log
    }
}

/// Habits, daily plan/review logs and legacy responses, each collection
/// mirrored to its own JSON file.
///
/// Every mutation rewrites the affected file while the write lock is held. If
/// that write fails the caller gets [`HabitTrackerError::Persistence`] but the
/// in-memory change stays visible; it will be flushed by the next successful
/// write to the same collection.
pub struct HabitStore {
    paths: StorePaths,
    state: RwLock<StoreState>,
}

impl HabitStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).map_err(|e| {
            HabitTrackerError::Persistence(format!("{}: {e}", data_dir.display()))
        })?;
        Self::with_paths(StorePaths::in_dir(data_dir))
    }

    pub fn with_paths(paths: StorePaths) -> Result<Self> {
        for path in [&paths.habits, &paths.responses, &paths.daily_logs] {
            ensure_parent_dir(path)?;
        }

        let habits: Vec<Habit> = load_collection(&paths.habits)?;
        let responses: Vec<HabitResponse> = load_collection(&paths.responses)?;
        let stored_logs: Vec<DailyLog> = load_collection(&paths.daily_logs)?;

        let last_id = habits
            .iter()
            .map(|h| h.id)
            .chain(responses.iter().map(|r| r.habit_id))
            .chain(stored_logs.iter().map(|l| l.habit_id))
            .max()
            .unwrap_or(0);

        let mut state = StoreState {
            habits,
            next_id: 1,
            responses,
            ..StoreState::default()
        };
        state.reserve_id(last_id);
        for log in stored_logs {
            if state.log_index.contains_key(&log.key()) {
                tracing::warn!(
                    date = %log.date,
                    habit_id = log.habit_id,
                    "dropping duplicate daily log from {}",
                    paths.daily_logs.display()
                );
                continue;
            }
            state.log_index.insert(log.key(), state.daily_logs.len());
            state.daily_logs.push(log);
        }

        tracing::debug!(
            habits = state.habits.len(),
            daily_logs = state.daily_logs.len(),
            responses = state.responses.len(),
            "habit store loaded"
        );

        Ok(Self {
            paths,
            state: RwLock::new(state),
        })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn add_habit(&self, name: &str, description: &str) -> Result<Habit> {
        let name = name.trim();
        if name.is_empty() {
            return Err(HabitTrackerError::Validation(
                "habit name must not be empty".to_string(),
            ));
        }
        let description = description.trim();

        let mut state = self.write();
        let habit = Habit {
            id: state.next_id,
            name: name.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            created_at: Utc::now(),
        };
        state.habits.push(habit.clone());
        state.next_id += 1;

        persist(&self.paths.habits, &state.habits)?;
        Ok(habit)
    }

    pub fn list_habits(&self) -> Vec<Habit> {
        self.read().habits.clone()
    }

    pub fn habit(&self, id: i64) -> Option<Habit> {
        self.read().habits.iter().find(|h| h.id == id).cloned()
    }

    pub fn delete_habit(&self, id: i64) -> Result<()> {
        let mut state = self.write();
        let Some(pos) = state.habits.iter().position(|h| h.id == id) else {
            return Err(HabitTrackerError::NotFound(id));
        };
        state.habits.remove(pos);
        persist(&self.paths.habits, &state.habits)
    }

    pub fn record_plan(&self, habit_id: i64, planned: bool, date: NaiveDate) -> Result<DailyLog> {
        let mut state = self.write();
        let log = state.upsert_log(date, habit_id, |log| log.planned = planned);
        persist(&self.paths.daily_logs, &state.daily_logs)?;
        Ok(log)
    }

    // A log created here keeps planned=false even when completed=true; the
    // evening flow treats "no morning answer" that way.
    pub fn record_completion(
        &self,
        habit_id: i64,
        completed: bool,
        date: NaiveDate,
    ) -> Result<DailyLog> {
        let mut state = self.write();
        let log = state.upsert_log(date, habit_id, |log| log.completed = completed);
        persist(&self.paths.daily_logs, &state.daily_logs)?;
        Ok(log)
    }

    pub fn record_response(
        &self,
        habit_id: i64,
        completed: bool,
        date: NaiveDate,
    ) -> Result<HabitResponse> {
        let mut state = self.write();
        let response = HabitResponse {
            habit_id,
            completed,
            date,
            timestamp: Utc::now(),
        };
        state.reserve_id(habit_id);
        state.responses.push(response.clone());
        persist(&self.paths.responses, &state.responses)?;
        Ok(response)
    }

    pub fn daily_logs(&self, date: NaiveDate) -> Vec<DailyLog> {
        self.read()
            .daily_logs
            .iter()
            .filter(|log| log.date == date)
            .copied()
            .collect()
    }

    pub fn daily_log(&self, date: NaiveDate, habit_id: i64) -> Option<DailyLog> {
        let state = self.read();
        state
            .log_index
            .get(&(date, habit_id))
            .map(|idx| state.daily_logs[*idx])
    }

    pub fn responses(&self) -> Vec<HabitResponse> {
        self.read().responses.clone()
    }

    // Mutations either complete or return before touching the collections, so
    // a poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                HabitTrackerError::Persistence(format!("{}: {e}", parent.display()))
            })?;
        }
    }
    Ok(())
}

fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(HabitTrackerError::Persistence(format!(
                "{}: {e}",
                path.display()
            )))
        }
    };
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    let items: Option<Vec<T>> = serde_json::from_str(&data)
        .map_err(|e| HabitTrackerError::Persistence(format!("{}: {e}", path.display())))?;
    Ok(items.unwrap_or_default())
}

fn persist<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    write_collection(path, items).inspect_err(|err| {
        tracing::error!("failed to persist {}: {err}", path.display());
    })
}

fn write_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let data = serde_json::to_string_pretty(items)
        .map_err(|e| HabitTrackerError::Serialization(e.to_string()))?;
    write_atomic(path, data.as_bytes())
}

/// Writes `data` next to `path` and renames it into place, so readers see
/// either the old file or the new one.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data)
        .map_err(|e| HabitTrackerError::Persistence(format!("{}: {e}", tmp.display())))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(HabitTrackerError::Persistence(format!(
            "{}: {e}",
            path.display()
        )));
    }
    Ok(())
}
