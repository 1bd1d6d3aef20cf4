//! World state - the accumulated data object scripts build up over the story.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::calendar::TimeFormatter;
use crate::entities::{Character, ContextItem};

/// Reserved key holding the current story time.
pub const CURRENT_TIME_KEY: &str = "currentTime";
/// Reserved key holding the formatted current story date.
pub const CURRENT_DATE_KEY: &str = "currentDate";
/// Key under which character identities are seeded.
pub const CHARACTERS_KEY: &str = "characters";
/// Key under which context item identities are seeded.
pub const CONTEXT_ITEMS_KEY: &str = "contextItems";

/// The world state at one point of the story.
///
/// An arbitrary JSON object. The engine owns [`CURRENT_TIME_KEY`] and
/// [`CURRENT_DATE_KEY`]; every other key belongs to the story's scripts.
/// Clones are deep, so a retained snapshot never shares structure with later states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldState(Map<String, Value>);

impl WorldState {
    /// Create an empty world state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build a state from a JSON value; anything but an object yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop every key.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Replace every key with those of `data`.
    pub fn replace_with(&mut self, data: Map<String, Value>) {
        self.0 = data;
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// The current story time, if set to an integer.
    pub fn current_time(&self) -> Option<i64> {
        self.0.get(CURRENT_TIME_KEY).and_then(Value::as_i64)
    }

    pub fn current_date(&self) -> Option<&str> {
        self.0.get(CURRENT_DATE_KEY).and_then(Value::as_str)
    }

    /// Whether scripts (or the engine) have set `currentTime` at all.
    pub fn has_time(&self) -> bool {
        self.0
            .get(CURRENT_TIME_KEY)
            .is_some_and(|value| !value.is_null())
    }

    /// Set `currentTime` and keep `currentDate` in step with it.
    pub fn set_story_time(&mut self, story_time: i64, formatter: &dyn TimeFormatter) {
        self.0
            .insert(CURRENT_TIME_KEY.to_string(), Value::from(story_time));
        self.0.insert(
            CURRENT_DATE_KEY.to_string(),
            Value::String(formatter.format_time(story_time)),
        );
    }

    /// Key-level differences from `self` (before) to `after`.
    ///
    /// Values are compared by deep equality. A key missing on one side is reported
    /// with `None` on that side. Keys are visited in sorted order.
    pub fn diff(&self, after: &WorldState) -> Vec<StateChange> {
        let mut keys: Vec<&String> = self.0.keys().chain(after.0.keys()).collect();
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .filter_map(|key| {
                let old_value = self.0.get(key);
                let new_value = after.0.get(key);
                (old_value != new_value).then(|| StateChange {
                    key: key.clone(),
                    old_value: old_value.cloned(),
                    new_value: new_value.cloned(),
                })
            })
            .collect()
    }

    /// Seed read-only identity views of characters and context items.
    ///
    /// Characters land under `characters.<display name>` with `name`, `birthdate`
    /// and `isMainCharacter`; context items under `contextItems.<name>` with `name`,
    /// `type` and `isGlobal`. Other keys scripts already stored on those entries are
    /// kept. An empty store leaves its collection untouched.
    pub fn seed_identities(&mut self, characters: &[Character], context_items: &[ContextItem]) {
        if !characters.is_empty() {
            let collection = entry_object(&mut self.0, CHARACTERS_KEY);
            for character in characters {
                let name = character.display_name();
                let entry = entry_object(collection, &name);
                entry.insert("name".to_string(), Value::String(name));
                if let Some(birthdate) = character.birthdate {
                    entry.insert("birthdate".to_string(), Value::from(birthdate));
                }
                entry.insert(
                    "isMainCharacter".to_string(),
                    Value::Bool(character.is_main_character),
                );
            }
        }

        if !context_items.is_empty() {
            let collection = entry_object(&mut self.0, CONTEXT_ITEMS_KEY);
            for item in context_items {
                let entry = entry_object(collection, &item.name);
                entry.insert("name".to_string(), Value::String(item.name.clone()));
                entry.insert(
                    "type".to_string(),
                    Value::String(item.item_type.as_str().to_string()),
                );
                entry.insert("isGlobal".to_string(), Value::Bool(item.is_global));
            }
        }
    }
}

/// The object stored under `name`, replacing any non-object value.
fn entry_object<'a>(collection: &'a mut Map<String, Value>, name: &str) -> &'a mut Map<String, Value> {
    let slot = collection
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just made an object"),
    }
}

impl From<Map<String, Value>> for WorldState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One key-level difference between two world states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub key: String,
    /// `None` when the key did not exist before.
    pub old_value: Option<Value>,
    /// `None` when the key no longer exists.
    pub new_value: Option<Value>,
}
