use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{HabitTrackerError, Result};
use crate::habits::write_atomic;
use crate::interfaces::gateway::ChatId;

pub const CHAT_FILE: &str = "chat.json";

#[derive(Debug, Serialize, Deserialize)]
struct ChatRecord {
    chat_id: ChatId,
}

/// The one chat this deployment talks to. A configured id always wins;
/// otherwise the first chat that writes to the bot is stored on disk.
pub struct ChatIdentity {
    path: PathBuf,
    configured: Option<ChatId>,
    registered: RwLock<Option<ChatId>>,
}

impl ChatIdentity {
    pub fn load(path: impl AsRef<Path>, configured: Option<ChatId>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let registered = match fs::read_to_string(&path) {
            Ok(data) if data.trim().is_empty() => None,
            Ok(data) => {
                let record: ChatRecord = serde_json::from_str(&data).map_err(|e| {
                    HabitTrackerError::Persistence(format!("{}: {e}", path.display()))
                })?;
                Some(record.chat_id)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(HabitTrackerError::Persistence(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path,
            configured,
            registered: RwLock::new(registered),
        })
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.configured.or_else(|| {
            *self
                .registered
                .read()
                .unwrap_or_else(PoisonError::into_inner)
        })
    }

    /// Returns true when `chat_id` became the registered chat.
    pub fn register(&self, chat_id: ChatId) -> Result<bool> {
        if self.configured.is_some() {
            return Ok(false);
        }
        let mut guard = self
            .registered
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    HabitTrackerError::Persistence(format!("{}: {e}", parent.display()))
                })?;
            }
        }
        let data = serde_json::to_string_pretty(&ChatRecord { chat_id })
            .map_err(|e| HabitTrackerError::Serialization(e.to_string()))?;
        write_atomic(&self.path, data.as_bytes())?;
        *guard = Some(chat_id);
        tracing::info!(chat_id, "registered user chat");
        Ok(true)
    }
}
