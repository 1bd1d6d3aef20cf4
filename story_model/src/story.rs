//! The story aggregate: everything one derivation pass reads.

use serde::{Deserialize, Serialize};

use crate::entities::{Character, ContextItem, MessageId, NodeId};
use crate::structure::{BranchChoices, Message, Node};

/// A complete story as handed to the engine by its host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// The bootstrap script; the only script allowed to define functions.
    #[serde(default)]
    pub global_script: Option<String>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub context_items: Vec<ContextItem>,
    #[serde(default)]
    pub branch_choices: BranchChoices,
}

impl Story {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a story from its JSON form.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_global_script(mut self, script: impl Into<String>) -> Self {
        self.global_script = Some(script.into());
        self
    }

    pub fn with_character(mut self, character: Character) -> Self {
        self.characters.push(character);
        self
    }

    pub fn with_context_item(mut self, item: ContextItem) -> Self {
        self.context_items.push(item);
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id.as_str() == id)
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id.as_str() == id)
    }

    pub fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id.as_str() == id)
    }

    /// Messages owned by `node_id`, in input order.
    pub fn messages_in(&self, node_id: &NodeId) -> impl Iterator<Item = &Message> {
        let node_id = node_id.clone();
        self.messages
            .iter()
            .filter(move |m| m.node_id.as_ref() == Some(&node_id))
    }

    pub fn has_message(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::MessageKind;

    #[test]
    fn test_story_from_json() {
        let story = Story::from_json(
            r#"{
                "nodes": [
                    { "id": "b1", "type": "book", "order": 0 },
                    { "id": "c1", "parentId": "b1", "type": "chapter", "order": 0, "storyTime": 100 }
                ],
                "messages": [
                    { "id": "m1", "nodeId": "c1", "order": 0, "script": "data.x = 1;" }
                ],
                "globalScript": "data.y = 2;",
                "branchChoices": { "b": "a" }
            }"#,
        )
        .unwrap();

        assert_eq!(story.nodes.len(), 2);
        assert_eq!(story.node("c1").unwrap().story_time, Some(100));
        assert_eq!(story.message("m1").unwrap().script.as_deref(), Some("data.x = 1;"));
        assert_eq!(story.global_script.as_deref(), Some("data.y = 2;"));
        assert_eq!(story.branch_choices.len(), 1);
        assert!(story.characters.is_empty());
    }

    #[test]
    fn test_story_with_scenes_and_untyped_messages() {
        let story = Story::from_json(
            r#"{
                "nodes": [
                    { "id": "c1", "type": "chapter", "order": 0 },
                    { "id": "s1", "parentId": "c1", "type": "scene", "order": 0 }
                ],
                "messages": [
                    { "id": "m1", "nodeId": "c1", "order": 0, "type": null },
                    { "id": "m2", "nodeId": "c1", "order": 1, "type": "chapter" }
                ]
            }"#,
        )
        .unwrap();

        assert!(!story.node("s1").unwrap().is_leaf());
        assert_eq!(story.message("m1").unwrap().kind, MessageKind::Normal);
        assert_eq!(story.message("m2").unwrap().kind, MessageKind::Chapter);
    }

    #[test]
    fn test_messages_in_node() {
        let story = Story::new()
            .with_node(Node::chapter("c1", 0.0))
            .with_message(Message::new("m1", "c1", 0.0))
            .with_message(Message::new("m2", "c2", 0.0))
            .with_message(Message::new("m3", "c1", 1.0));

        let ids: Vec<_> = story
            .messages_in(&NodeId::from("c1"))
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["m1", "m3"]);
        assert!(story.has_message(&MessageId::from("m2")));
    }
}
