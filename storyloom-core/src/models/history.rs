use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable audit record of one block mutation.
///
/// History is append-only and totally ordered per block by commit time.
/// Entries survive hard deletion of their block, so `block_id` may
/// reference a row that no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub block_id: Uuid,
    pub action: HistoryAction,
    pub payload: HistoryPayload,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Edit,
    Delete,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "edit" => Some(Self::Edit),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Before/after state captured by a history entry, enough to reconstruct
/// prior versions by walking the trail backward.
///
/// Serialized untagged: the `action` column already discriminates, and the
/// three field sets are disjoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HistoryPayload {
    Create {
        content: String,
        tags: BTreeSet<String>,
    },
    Edit {
        old_content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_content: Option<String>,
        old_tags: BTreeSet<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_tags: Option<BTreeSet<String>>,
    },
    Delete {
        content: String,
    },
}

impl HistoryPayload {
    pub fn action(&self) -> HistoryAction {
        match self {
            Self::Create { .. } => HistoryAction::Create,
            Self::Edit { .. } => HistoryAction::Edit,
            Self::Delete { .. } => HistoryAction::Delete,
        }
    }
}

/// Number of distinct content versions a trail represents: the create plus
/// every edit that actually changed content (tag-only edits do not count).
pub fn version_count(entries: &[HistoryEntry]) -> usize {
    entries
        .iter()
        .filter(|e| match &e.payload {
            HistoryPayload::Create { .. } => true,
            HistoryPayload::Edit { new_content, .. } => new_content.is_some(),
            HistoryPayload::Delete { .. } => false,
        })
        .count()
}

/// Contents older than the current one, newest first.
///
/// Walks a newest-first trail applying each content-changing edit's
/// `old_content`; the oldest element is the original create content.
pub fn prior_contents(entries_newest_first: &[HistoryEntry]) -> Vec<String> {
    entries_newest_first
        .iter()
        .filter_map(|e| match &e.payload {
            HistoryPayload::Edit {
                old_content,
                new_content: Some(_),
                ..
            } => Some(old_content.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(payload: HistoryPayload) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::new_v4(),
            block_id: Uuid::new_v4(),
            action: payload.action(),
            payload,
            timestamp: Utc::now(),
        }
    }

    fn edit(old: &str, new: Option<&str>) -> HistoryEntry {
        entry(HistoryPayload::Edit {
            old_content: old.into(),
            new_content: new.map(Into::into),
            old_tags: BTreeSet::new(),
            new_tags: None,
        })
    }

    #[test]
    fn payload_json_round_trip_per_action() {
        let payloads = [
            HistoryPayload::Create {
                content: "A".into(),
                tags: BTreeSet::from(["draft".to_string()]),
            },
            HistoryPayload::Edit {
                old_content: "A".into(),
                new_content: Some("B".into()),
                old_tags: BTreeSet::new(),
                new_tags: None,
            },
            HistoryPayload::Delete { content: "B".into() },
        ];
        for payload in payloads {
            let json = serde_json::to_string(&payload).unwrap();
            let back: HistoryPayload = serde_json::from_str(&json).unwrap();
            assert_eq!(back, payload);
            assert_eq!(back.action(), payload.action());
        }
    }

    #[test]
    fn version_count_ignores_tag_only_edits() {
        let entries = vec![
            edit("B", None),
            edit("A", Some("B")),
            entry(HistoryPayload::Create {
                content: "A".into(),
                tags: BTreeSet::new(),
            }),
        ];
        assert_eq!(version_count(&entries), 2);
    }

    #[test]
    fn prior_contents_walks_backward() {
        // Current content is "C"; trail carries B -> C, A -> B, create(A).
        let entries = vec![
            edit("B", Some("C")),
            edit("A", Some("B")),
            entry(HistoryPayload::Create {
                content: "A".into(),
                tags: BTreeSet::new(),
            }),
        ];
        assert_eq!(prior_contents(&entries), vec!["B".to_string(), "A".to_string()]);
    }
}
