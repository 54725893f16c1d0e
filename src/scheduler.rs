use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{
    DateTime, Duration as ChronoDuration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{HabitTrackerError, Result};
use crate::interfaces::scheduler::DailyJob;

const MAX_GAP_MINUTES: i64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime {
    pub hour: u32,
    pub minute: u32,
}

impl FromStr for DailyTime {
    type Err = HabitTrackerError;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || HabitTrackerError::InvalidTimeFormat(value.to_string());
        let (hour, minute) = value.split_once(':').ok_or_else(invalid)?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(hour) || hour.len() > 2 || !digits(minute) || minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| HabitTrackerError::InvalidTimezone(name.to_string()))
}

/// First instant strictly after `after` whose wall-clock time in `tz` is
/// `time`. Times skipped by a DST jump fire at the first valid minute after
/// the gap; repeated times fire on their earliest occurrence.
pub fn next_fire_after(tz: Tz, time: DailyTime, after: DateTime<Utc>) -> DateTime<Tz> {
    let local_after = after.with_timezone(&tz);
    let mut day = local_after.date_naive();
    loop {
        if let Some(candidate) = resolve_local(tz, day, time) {
            if candidate > local_after {
                return candidate;
            }
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => return local_after,
        };
    }
}

fn resolve_local(tz: Tz, day: NaiveDate, time: DailyTime) -> Option<DateTime<Tz>> {
    let naive: NaiveDateTime = day.and_hms_opt(time.hour, time.minute, 0)?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => Some(at),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => (1..=MAX_GAP_MINUTES).find_map(|minutes| {
            tz.from_local_datetime(&(naive + ChronoDuration::minutes(minutes)))
                .earliest()
        }),
    }
}

struct Entry {
    time: DailyTime,
    job: Arc<dyn DailyJob>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Fires each registered job once a day at a fixed local time.
pub struct DailyScheduler {
    tz: Tz,
    entries: Vec<Entry>,
    running: Option<Running>,
}

impl DailyScheduler {
    pub fn new(timezone: &str) -> Result<Self> {
        Ok(Self::with_timezone(parse_timezone(timezone)?))
    }

    pub fn with_timezone(tz: Tz) -> Self {
        Self {
            tz,
            entries: Vec::new(),
            running: None,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn schedule(&mut self, time: &str, job: Arc<dyn DailyJob>) -> Result<DailyTime> {
        let time: DailyTime = time.parse()?;
        tracing::info!(
            job = job.name(),
            "scheduling daily job at {time} ({})",
            self.tz.name()
        );
        if let Some(running) = &mut self.running {
            let handle = spawn_timer(self.tz, time, job.clone(), running.shutdown.subscribe());
            running.handles.push(handle);
        }
        self.entries.push(Entry { time, job });
        Ok(time)
    }

    pub fn entries(&self) -> Vec<(String, DailyTime)> {
        self.entries
            .iter()
            .map(|entry| (entry.job.name().to_string(), entry.time))
            .collect()
    }

    pub fn next_runs(&self, now: DateTime<Utc>) -> Vec<(String, DateTime<Tz>)> {
        self.entries
            .iter()
            .map(|entry| {
                (
                    entry.job.name().to_string(),
                    next_fire_after(self.tz, entry.time, now),
                )
            })
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    // Starting twice is a no-op.
    pub fn start(&mut self) {
        if self.running.is_some() {
            tracing::warn!("scheduler already running");
            return;
        }
        let (shutdown, _) = watch::channel(false);
        let handles = self
            .entries
            .iter()
            .map(|entry| {
                spawn_timer(
                    self.tz,
                    entry.time,
                    entry.job.clone(),
                    shutdown.subscribe(),
                )
            })
            .collect();
        self.running = Some(Running { shutdown, handles });
        tracing::info!(jobs = self.entries.len(), "scheduler started");
    }

    /// Stops the timer loops. Jobs that already fired keep running to
    /// completion on their own tasks.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown.send(true);
        for handle in running.handles {
            let _ = handle.await;
        }
        tracing::info!("scheduler stopped");
    }
}

fn spawn_timer(
    tz: Tz,
    time: DailyTime,
    job: Arc<dyn DailyJob>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_fire = Utc::now();
        loop {
            let now = Utc::now().max(last_fire);
            let next = next_fire_after(tz, time, now).with_timezone(&Utc);
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tracing::debug!(job = job.name(), next = %next, "timer armed");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            last_fire = next;
            fire(job.clone());
        }
    })
}

fn fire(job: Arc<dyn DailyJob>) {
    let name = job.name().to_string();
    tracing::info!(job = %name, "running daily job");
    let task = tokio::spawn(async move { job.run().await });
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(())) => tracing::debug!(job = %name, "daily job finished"),
            Ok(Err(err)) => tracing::error!(job = %name, "daily job failed: {err}"),
            Err(err) => tracing::error!(job = %name, "daily job aborted: {err}"),
        }
    });
}
