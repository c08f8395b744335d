use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Tag appended to direct dependents when their upstream block changes.
pub const STALE_TAG: &str = "needs_regen";

/// Atomic versioned content unit.
///
/// `version` increments by exactly 1 per successful content/tag mutation
/// and never skips or decreases; every bump is paired with a history entry
/// written in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub tab_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub kind: BlockKind,
    pub content: String,
    pub tags: BTreeSet<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Domain kind of a block.
///
/// The closed set covers every kind the writing workflow produces;
/// `Other` keeps the column open for new stages without a schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Logline,
    Concept,
    Outline,
    Scene,
    Character,
    Location,
    Shot,
    ShotBreakdown,
    StyleGuide,
    Cinematography,
    Other(String),
}

impl BlockKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Logline => "logline",
            Self::Concept => "concept",
            Self::Outline => "outline",
            Self::Scene => "scene",
            Self::Character => "character",
            Self::Location => "location",
            Self::Shot => "shot",
            Self::ShotBreakdown => "shot_breakdown",
            Self::StyleGuide => "style_guide",
            Self::Cinematography => "cinematography",
            Self::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "logline" => Self::Logline,
            "concept" => Self::Concept,
            "outline" => Self::Outline,
            "scene" => Self::Scene,
            "character" => Self::Character,
            "location" => Self::Location,
            "shot" => Self::Shot,
            "shot_breakdown" => Self::ShotBreakdown,
            "style_guide" => Self::StyleGuide,
            "cinematography" => Self::Cinematography,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Stored and serialized as the plain string form.
impl Serialize for BlockKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BlockKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockInput {
    pub kind: BlockKind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub parent_id: Option<Uuid>,
}

impl Default for CreateBlockInput {
    fn default() -> Self {
        Self {
            kind: BlockKind::Other(String::new()),
            content: String::new(),
            tags: BTreeSet::new(),
            parent_id: None,
        }
    }
}

/// At least one of `content`/`tags` must be set; `update_block` rejects an
/// empty update with [`crate::StoreError::NothingToUpdate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBlockInput {
    pub content: Option<String>,
    pub tags: Option<BTreeSet<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            BlockKind::Logline,
            BlockKind::ShotBreakdown,
            BlockKind::Other("moodboard".into()),
        ] {
            assert_eq!(BlockKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_parses_as_other() {
        assert_eq!(
            BlockKind::parse("moodboard"),
            BlockKind::Other("moodboard".into())
        );
    }
}
