//! Messages: the atomic narrative units owned by chapters.

use serde::{Deserialize, Deserializer, Serialize};

use super::BranchOption;
use crate::entities::{MessageId, NodeId};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
    System,
}

/// Message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Normal,
    /// A branch point offering continuations.
    Branch,
    /// A scripted story event.
    Event,
    /// A chapter marker.
    Chapter,
}

/// An atomic narrative unit belonging to one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    /// Owning chapter. Legacy messages may lack one.
    #[serde(default)]
    pub node_id: Option<NodeId>,
    /// Sort key within the owning node.
    pub order: f64,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Opaque state-mutation source.
    #[serde(default)]
    pub script: Option<String>,
    /// A `null` type reads as [`MessageKind::Normal`].
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: MessageKind,
    #[serde(default)]
    pub options: Vec<BranchOption>,
    /// Queries are kept in the tree but never replayed or fed to generation.
    #[serde(default)]
    pub is_query: bool,
}

impl Message {
    /// Create a normal assistant message in `node_id`.
    pub fn new(id: impl Into<MessageId>, node_id: impl Into<NodeId>, order: f64) -> Self {
        Self {
            id: id.into(),
            node_id: Some(node_id.into()),
            order,
            role: Role::Assistant,
            content: String::new(),
            script: None,
            kind: MessageKind::Normal,
            options: Vec::new(),
            is_query: false,
        }
    }

    /// Create a message with no owning node.
    pub fn detached(id: impl Into<MessageId>, order: f64) -> Self {
        Self {
            node_id: None,
            ..Self::new(id, NodeId::new(""), order)
        }
    }

    /// Create a branch message offering `options`.
    pub fn branch(
        id: impl Into<MessageId>,
        node_id: impl Into<NodeId>,
        order: f64,
        options: Vec<BranchOption>,
    ) -> Self {
        Self {
            kind: MessageKind::Branch,
            options,
            ..Self::new(id, node_id, order)
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn as_query(mut self) -> Self {
        self.is_query = true;
        self
    }

    /// Whether this message is a branch point the walker must resolve.
    ///
    /// A branch message without options is walked like a normal message.
    pub fn is_branch_point(&self) -> bool {
        self.kind == MessageKind::Branch && !self.options.is_empty()
    }

    /// Find one of this message's branch options.
    pub fn option(&self, option_id: &str) -> Option<&BranchOption> {
        self.options.iter().find(|o| o.id.as_str() == option_id)
    }

    /// The script source, if non-empty.
    pub fn script_source(&self) -> Option<&str> {
        self.script.as_deref().filter(|s| !s.trim().is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
