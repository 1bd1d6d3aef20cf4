//! Nodes of the story tree.

use serde::{Deserialize, Serialize};

use crate::entities::{CharacterId, ContextItemId, NodeId};

/// Structural tier of a node. Only [`NodeTier::Chapter`] owns messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeTier {
    Book,
    Arc,
    Chapter,
    /// Grouping below a chapter. Owns no messages of its own.
    Scene,
}

impl NodeTier {
    /// Whether this is the leaf tier that owns messages.
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeTier::Chapter)
    }
}

/// Editorial status of a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Draft,
    NeedsWork,
    Review,
    Done,
}

/// An entry in the story hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// `None` marks a root.
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(rename = "type")]
    pub tier: NodeTier,
    #[serde(default)]
    pub title: String,
    /// Sibling sort key. Not required to be unique.
    pub order: f64,
    /// When the node takes place, in minutes on the story calendar.
    #[serde(default)]
    pub story_time: Option<i64>,
    #[serde(default)]
    pub active_character_ids: Vec<CharacterId>,
    #[serde(default)]
    pub active_context_item_ids: Vec<ContextItemId>,
    #[serde(default)]
    pub viewpoint_character_id: Option<CharacterId>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub status: Option<ChapterStatus>,
}

impl Node {
    /// Create a node of the given tier.
    pub fn new(id: impl Into<NodeId>, tier: NodeTier, order: f64) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            tier,
            title: String::new(),
            order,
            story_time: None,
            active_character_ids: Vec::new(),
            active_context_item_ids: Vec::new(),
            viewpoint_character_id: None,
            summary: None,
            goal: None,
            status: None,
        }
    }

    pub fn book(id: impl Into<NodeId>, order: f64) -> Self {
        Self::new(id, NodeTier::Book, order)
    }

    pub fn arc(id: impl Into<NodeId>, order: f64) -> Self {
        Self::new(id, NodeTier::Arc, order)
    }

    pub fn chapter(id: impl Into<NodeId>, order: f64) -> Self {
        Self::new(id, NodeTier::Chapter, order)
    }

    pub fn scene(id: impl Into<NodeId>, order: f64) -> Self {
        Self::new(id, NodeTier::Scene, order)
    }

    pub fn with_parent(mut self, parent_id: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_story_time(mut self, story_time: i64) -> Self {
        self.story_time = Some(story_time);
        self
    }

    pub fn with_status(mut self, status: ChapterStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.tier.is_leaf()
    }
}
