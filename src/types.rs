use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct BoardKey {
    pub(crate) name: String,
    pub(crate) id: u64,
}

impl fmt::Display for BoardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <id:{}>", self.name, self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub(crate) struct Board {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) name: String,
}

impl Board {
    pub(crate) fn key(&self) -> BoardKey {
        BoardKey {
            name: self.name.clone(),
            id: self.id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub(crate) enum SprintState {
    Future,
    Active,
    Closed,
    Unknown(String),
}

impl SprintState {
    pub(crate) fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "future" => Self::Future,
            "active" => Self::Active,
            "closed" => Self::Closed,
            _ => Self::Unknown(token.trim().to_string()),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        match self {
            Self::Future => "future",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Unknown(value) => value,
        }
    }
}

impl From<String> for SprintState {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl fmt::Display for SprintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub(crate) struct Sprint {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) state: SprintState,
    #[serde(rename = "originBoardId", default)]
    pub(crate) board_id: Option<u64>,
}

impl Sprint {
    /// Active sprints whose name mentions QA belong to the verification
    /// track and never count as the team's working sprint.
    pub(crate) fn is_working_sprint(&self) -> bool {
        self.state == SprintState::Active && !self.name.to_lowercase().contains("qa")
    }
}

impl fmt::Display for Sprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <id:{}>", self.name, self.id)
    }
}

/// How a user names a sprint on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SprintRef {
    Current,
    Id(u64),
    Name(String),
}

impl SprintRef {
    pub(crate) fn parse(token: &str) -> Self {
        let trimmed = token.trim();
        if trimmed == "current" {
            return Self::Current;
        }
        match trimmed.parse::<u64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(trimmed.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub(crate) struct ScheduleVariable {
    pub(crate) key: String,
    #[serde(default)]
    pub(crate) value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub(crate) struct PipelineSchedule {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(rename = "ref", default)]
    pub(crate) git_ref: String,
    #[serde(default)]
    pub(crate) cron: String,
    #[serde(default)]
    pub(crate) variables: Vec<ScheduleVariable>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct NewSchedule {
    #[serde(rename = "ref")]
    pub(crate) git_ref: String,
    pub(crate) description: String,
    pub(crate) cron: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IssueType {
    Task,
    Bug,
    Feature,
    Support,
    Subtask,
    Epic,
    Story,
}

impl IssueType {
    pub(crate) const NAMES: [&'static str; 7] =
        ["task", "bug", "feature", "support", "subtask", "epic", "story"];

    pub(crate) fn parse(token: &str) -> Option<Self> {
        Some(match token.trim().to_ascii_lowercase().as_str() {
            "task" => Self::Task,
            "bug" => Self::Bug,
            "feature" => Self::Feature,
            "support" => Self::Support,
            "subtask" => Self::Subtask,
            "epic" => Self::Epic,
            "story" => Self::Story,
            _ => return None,
        })
    }

    pub(crate) fn tracker_name(self) -> &'static str {
        match self {
            Self::Task => "Task",
            Self::Bug => "Bug",
            Self::Feature => "New Feature",
            Self::Support => "Support",
            Self::Subtask => "Sub-Task",
            Self::Epic => "Epic",
            Self::Story => "Story",
        }
    }
}
