pub mod bot;
pub mod config;
pub mod daemon;
pub mod error;
pub mod habits;
pub mod identity;
pub mod interfaces;
pub mod scheduler;
pub mod telegram;

pub use crate::bot::HabitBot;
pub use crate::config::Config;
pub use crate::error::{HabitTrackerError, Result};
pub use crate::habits::{DailyLog, Habit, HabitResponse, HabitStore};
pub use crate::scheduler::DailyScheduler;
