//! Comment board structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AirdropError, AirdropResult};

/// Longest comment body accepted, in characters
pub const MAX_COMMENT_CHARS: usize = 2000;

/// Moderation outcome of a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    /// Not yet classified
    Pending,
    Approved,
    /// Visible, but marked for manual review
    Flagged,
    /// Hidden from listings
    Rejected,
}

/// Status plus the categories that triggered it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub status: ModerationStatus,
    pub flags: Vec<String>,
}

impl ModerationResult {
    pub fn pending() -> Self {
        Self {
            status: ModerationStatus::Pending,
            flags: Vec::new(),
        }
    }

    pub fn approved() -> Self {
        Self {
            status: ModerationStatus::Approved,
            flags: Vec::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.status != ModerationStatus::Rejected
    }
}

/// A user comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub user_id: u64,
    /// Comment this one replies to
    pub parent_id: Option<u64>,
    pub content: String,
    pub likes: u64,
    pub created_at: DateTime<Utc>,
    pub moderation: ModerationResult,
}

/// Payload for posting a comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub user_id: u64,
    #[serde(default)]
    pub parent_id: Option<u64>,
    pub content: String,
}

impl NewComment {
    pub fn validate(&self) -> AirdropResult<()> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(AirdropError::validation("comment must not be empty"));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(AirdropError::validation(format!(
                "comment exceeds {} characters",
                MAX_COMMENT_CHARS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_comment_without_parent() {
        let new: NewComment =
            serde_json::from_str(r#"{"userId": 1, "content": "gm"}"#).unwrap();
        assert_eq!(new.parent_id, None);
        assert!(new.validate().is_ok());
    }

    #[test]
    fn test_whitespace_comment_rejected() {
        let new = NewComment {
            user_id: 1,
            parent_id: None,
            content: " \n\t".to_string(),
        };
        assert!(new.validate().is_err());
    }

    #[test]
    fn test_overlong_comment_rejected() {
        let new = NewComment {
            user_id: 1,
            parent_id: None,
            content: "a".repeat(MAX_COMMENT_CHARS + 1),
        };
        assert!(new.validate().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_value(ModerationResult::pending()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "pending", "flags": [] }));
    }
}
