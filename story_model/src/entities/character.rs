//! Character definitions.

use serde::{Deserialize, Serialize};

use super::CharacterId;

/// A story character, reduced to the fields the state engine reads.
///
/// Everything else about a character (appearance, personality, portraits) is owned
/// by the editing surfaces and never reaches a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    /// Birth date in story time (minutes on the story calendar).
    #[serde(default)]
    pub birthdate: Option<i64>,
    #[serde(default)]
    pub is_main_character: bool,
}

impl Character {
    /// Create a new character with the given first name.
    pub fn new(first_name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::generate(),
            first_name: first_name.into(),
            last_name: None,
            nickname: None,
            birthdate: None,
            is_main_character: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<CharacterId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_birthdate(mut self, birthdate: i64) -> Self {
        self.birthdate = Some(birthdate);
        self
    }

    pub fn as_main_character(mut self) -> Self {
        self.is_main_character = true;
        self
    }

    /// The name scripts use to address this character.
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name.trim(), last),
            _ => self.first_name.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let solo = Character::new("Rey");
        assert_eq!(solo.display_name(), "Rey");

        let full = Character::new("Luke").with_last_name("Skywalker");
        assert_eq!(full.display_name(), "Luke Skywalker");

        let blank_last = Character::new("Finn").with_last_name("  ");
        assert_eq!(blank_last.display_name(), "Finn");
    }

    #[test]
    fn test_camel_case_fields() {
        let character: Character = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "firstName": "Leia",
            "birthdate": -1000,
            "isMainCharacter": true
        }))
        .unwrap();

        assert_eq!(character.id, CharacterId::from("c1"));
        assert_eq!(character.birthdate, Some(-1000));
        assert!(character.is_main_character);
        assert!(character.last_name.is_none());
    }
}
