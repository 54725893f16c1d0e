use std::fmt;
use std::str::FromStr;

use crate::error::{HabitTrackerError, Result};

const DELIMITER: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Plan,
    Review,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::Review => "review",
        }
    }
}

impl FromStr for Phase {
    type Err = HabitTrackerError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "plan" => Ok(Phase::Plan),
            "review" => Ok(Phase::Review),
            other => Err(HabitTrackerError::Decode(format!("unknown phase '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Yes,
    No,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Yes => "yes",
            Choice::No => "no",
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Choice::Yes)
    }
}

impl FromStr for Choice {
    type Err = HabitTrackerError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "yes" => Ok(Choice::Yes),
            "no" => Ok(Choice::No),
            other => Err(HabitTrackerError::Decode(format!("unknown choice '{other}'"))),
        }
    }
}

/// Payload attached to a prompt button: `<phase>_<choice>_<habit id>`.
///
/// Buttons sent before the phase existed carry `<choice>_<habit id>` and are
/// read as review answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionToken {
    pub phase: Phase,
    pub choice: Choice,
    pub habit_id: i64,
}

impl InteractionToken {
    pub fn new(phase: Phase, choice: Choice, habit_id: i64) -> Self {
        Self {
            phase,
            choice,
            habit_id,
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(raw: &str) -> Result<Self> {
        raw.parse()
    }
}

impl fmt::Display for InteractionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.phase.as_str(),
            self.choice.as_str(),
            self.habit_id
        )
    }
}

impl FromStr for InteractionToken {
    type Err = HabitTrackerError;

    fn from_str(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(DELIMITER).collect();
        let (phase, choice, id) = match parts.as_slice() {
            [phase, choice, id] => (phase.parse()?, *choice, *id),
            [choice, id] => (Phase::Review, *choice, *id),
            _ => {
                return Err(HabitTrackerError::Decode(format!(
                    "unexpected token shape '{raw}'"
                )))
            }
        };
        let choice: Choice = choice.parse()?;
        let habit_id: i64 = id
            .parse()
            .map_err(|_| HabitTrackerError::Decode(format!("invalid habit id in '{raw}'")))?;
        Ok(Self::new(phase, choice, habit_id))
    }
}
