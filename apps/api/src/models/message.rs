use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who spoke a transcript line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Counselor,
    Client,
}

impl Role {
    /// Speaker label used in prompts and rendered transcripts.
    pub fn label(self) -> &'static str {
        match self {
            Role::Counselor => "カウンセラー",
            Role::Client => "相談者",
        }
    }
}

/// One transcript line. Never edited once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn counselor(content: impl Into<String>) -> Self {
        Self::new(Role::Counselor, content)
    }

    pub fn client(content: impl Into<String>) -> Self {
        Self::new(Role::Client, content)
    }
}
