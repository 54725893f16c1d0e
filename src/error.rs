use thiserror::Error;

#[derive(Debug, Error)]
pub enum HabitTrackerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("habit with id {0} not found")]
    NotFound(i64),
    #[error("invalid time format '{0}', expected HH:MM")]
    InvalidTimeFormat(String),
    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, HabitTrackerError>;
