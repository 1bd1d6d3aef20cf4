//! The inputs a cached replay depends on.

use story_model::{CharacterId, ContextItemId, MessageId, NodeId};

use super::StorySource;
use crate::script::ScriptEngine;

/// A comparable copy of every input that can change a replay's outcome.
///
/// Message text, titles and other presentation fields are left out, so editing
/// them does not invalidate the cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFingerprint {
    global_script: Option<String>,
    nodes: Vec<NodeKey>,
    scripts: Vec<ScriptKey>,
    characters: Vec<CharacterKey>,
    context_items: Vec<ContextItemKey>,
}

#[derive(Debug, Clone, PartialEq)]
struct NodeKey {
    id: NodeId,
    parent_id: Option<NodeId>,
    order_bits: u64,
    story_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
struct ScriptKey {
    id: MessageId,
    node_id: Option<NodeId>,
    order_bits: u64,
    source: String,
}

#[derive(Debug, Clone, PartialEq)]
struct CharacterKey {
    id: CharacterId,
    name: String,
    birthdate: Option<i64>,
    is_main_character: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct ContextItemKey {
    id: ContextItemId,
    name: String,
    item_type: &'static str,
    is_global: bool,
}

impl InputFingerprint {
    /// Capture `source` as `engine` would replay it.
    pub fn capture<S: StorySource + ?Sized>(source: &S, engine: &ScriptEngine) -> Self {
        let nodes = source
            .nodes()
            .iter()
            .map(|node| NodeKey {
                id: node.id.clone(),
                parent_id: node.parent_id.clone(),
                order_bits: node.order.to_bits(),
                story_time: node.story_time,
            })
            .collect();

        let scripts = source
            .messages()
            .iter()
            .filter(|message| engine.replays(message))
            .filter_map(|message| {
                Some(ScriptKey {
                    id: message.id.clone(),
                    node_id: message.node_id.clone(),
                    order_bits: message.order.to_bits(),
                    source: message.script_source()?.to_string(),
                })
            })
            .collect();

        let characters = source
            .characters()
            .iter()
            .map(|character| CharacterKey {
                id: character.id.clone(),
                name: character.display_name(),
                birthdate: character.birthdate,
                is_main_character: character.is_main_character,
            })
            .collect();

        let context_items = source
            .context_items()
            .iter()
            .map(|item| ContextItemKey {
                id: item.id.clone(),
                name: item.name.clone(),
                item_type: item.item_type.as_str(),
                is_global: item.is_global,
            })
            .collect();

        Self {
            global_script: source.global_script().map(str::to_string),
            nodes,
            scripts,
            characters,
            context_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::NativeCompiler;
    use story_model::{Character, Message, Node, Role, Story};

    fn story() -> Story {
        Story::new()
            .with_node(Node::chapter("c1", 0.0).with_story_time(10))
            .with_message(Message::new("m1", "c1", 0.0).with_script("tick"))
            .with_message(Message::new("m2", "c1", 1.0).with_content("prose"))
            .with_character(Character::new("Ada").with_id("ada"))
    }

    fn capture(story: &Story) -> InputFingerprint {
        InputFingerprint::capture(story, &ScriptEngine::new(NativeCompiler::new()))
    }

    #[test]
    fn test_prose_edits_do_not_change_fingerprint() {
        let original = story();
        let mut edited = story();
        edited.messages[1].content = "rewritten prose".to_string();
        edited.nodes[0].title = "Renamed".to_string();

        assert_eq!(capture(&original), capture(&edited));
    }

    #[test]
    fn test_replay_inputs_change_fingerprint() {
        let original = capture(&story());

        let mut script = story();
        script.messages[0].script = Some("tock".to_string());
        assert_ne!(capture(&script), original);

        let mut time = story();
        time.nodes[0].story_time = Some(20);
        assert_ne!(capture(&time), original);

        let mut character = story();
        character.characters[0].is_main_character = true;
        assert_ne!(capture(&character), original);

        let global = story().with_global_script("setup");
        assert_ne!(capture(&global), original);
    }

    #[test]
    fn test_non_replayed_scripts_are_ignored() {
        let original = capture(&story());
        let user = story().with_message(
            Message::new("m3", "c1", 2.0)
                .with_script("tick")
                .with_role(Role::User),
        );
        assert_eq!(capture(&user), original);
    }
}
