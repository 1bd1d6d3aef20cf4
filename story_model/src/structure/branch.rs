//! Branch options and the user's persisted branch choices.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::{MessageId, NodeId, OptionId};

/// One continuation offered by a branch message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOption {
    pub id: OptionId,
    pub label: String,
    pub target_node_id: NodeId,
    pub target_message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BranchOption {
    /// Create an option with a freshly generated id.
    pub fn new(
        label: impl Into<String>,
        target_node_id: impl Into<NodeId>,
        target_message_id: impl Into<MessageId>,
    ) -> Self {
        Self {
            id: OptionId::generate(),
            label: label.into(),
            target_node_id: target_node_id.into(),
            target_message_id: target_message_id.into(),
            description: None,
        }
    }

    /// Create an option with a known id.
    pub fn with_id(
        id: impl Into<OptionId>,
        label: impl Into<String>,
        target_node_id: impl Into<NodeId>,
        target_message_id: impl Into<MessageId>,
    ) -> Self {
        Self {
            id: id.into(),
            ..Self::new(label, target_node_id, target_message_id)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Mapping from branch message to the option the user picked.
///
/// Owned and persisted outside the engine; the engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchChoices(HashMap<MessageId, OptionId>);

impl BranchChoices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a choice, returning the previous one for that branch.
    pub fn choose(
        &mut self,
        branch_id: impl Into<MessageId>,
        option_id: impl Into<OptionId>,
    ) -> Option<OptionId> {
        self.0.insert(branch_id.into(), option_id.into())
    }

    /// A copy of these choices with one extra (hypothetical) entry.
    pub fn with_choice(&self, branch_id: impl Into<MessageId>, option_id: impl Into<OptionId>) -> Self {
        let mut overlay = self.clone();
        overlay.choose(branch_id, option_id);
        overlay
    }

    pub fn clear(&mut self, branch_id: &str) -> Option<OptionId> {
        self.0.remove(branch_id)
    }

    pub fn get(&self, branch_id: &str) -> Option<&OptionId> {
        self.0.get(branch_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MessageId, &OptionId)> {
        self.0.iter()
    }
}

impl<B, O> FromIterator<(B, O)> for BranchChoices
where
    B: Into<MessageId>,
    O: Into<OptionId>,
{
    fn from_iter<I: IntoIterator<Item = (B, O)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(branch, option)| (branch.into(), option.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_option_ids() {
        let a = BranchOption::new("Left", "c2", "m5");
        let b = BranchOption::new("Right", "c3", "m7");
        assert_ne!(a.id, b.id);
        assert_eq!(a.target_node_id, NodeId::from("c2"));
    }

    #[test]
    fn test_overlay_does_not_touch_original() {
        let choices: BranchChoices = [("b1", "a")].into_iter().collect();
        let preview = choices.with_choice("b2", "x");

        assert_eq!(choices.len(), 1);
        assert!(choices.get("b2").is_none());
        assert_eq!(preview.get("b2"), Some(&OptionId::from("x")));
        assert_eq!(preview.get("b1"), Some(&OptionId::from("a")));
    }

    #[test]
    fn test_choose_replaces() {
        let mut choices = BranchChoices::new();
        assert!(choices.choose("b1", "a").is_none());
        assert_eq!(choices.choose("b1", "b"), Some(OptionId::from("a")));
        assert_eq!(choices.clear("b1"), Some(OptionId::from("b")));
        assert!(choices.is_empty());
    }
}
