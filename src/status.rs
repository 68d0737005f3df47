use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extractor::Pair;

pub const STATUS_KEY: &str = "status";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Opened,
    Closed,
    Assigned,
    #[default]
    Unknown,
}

impl TaskStatus {
    /// Case-insensitive parse of the accepted status words.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "opened" => Some(TaskStatus::Opened),
            "closed" => Some(TaskStatus::Closed),
            "assigned" => Some(TaskStatus::Assigned),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Opened => "Opened",
            TaskStatus::Closed => "Closed",
            TaskStatus::Assigned => "Assigned",
            TaskStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDecision {
    pub status: TaskStatus,
    pub warnings: Vec<String>,
}

/// Only the first `status` pair counts, valid or not.
pub fn resolve_status(pairs: &[Pair]) -> StatusDecision {
    let Some(pair) = pairs.iter().find(|p| p.key == STATUS_KEY) else {
        return StatusDecision::default();
    };

    match TaskStatus::parse(&pair.value) {
        Some(status) => StatusDecision {
            status,
            warnings: Vec::new(),
        },
        None => StatusDecision {
            status: TaskStatus::Unknown,
            warnings: vec![format!("Invalid status value: '{}'", pair.value)],
        },
    }
}
