//! Identifiers and the entity records (characters, context items) scripts can see.

mod character;
mod context_item;

pub use character::*;
pub use context_item::*;

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Create a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a node in the story hierarchy.
    NodeId
);
string_id!(
    /// Identifier of a message.
    MessageId
);
string_id!(
    /// Identifier of a branch option.
    OptionId
);
string_id!(
    /// Identifier of a character.
    CharacterId
);
string_id!(
    /// Identifier of a context item.
    ContextItemId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(MessageId::from("m1"), 1);

        assert_eq!(map.get("m1"), Some(&1));
        assert!(map.get("m2").is_none());
    }

    #[test]
    fn test_transparent_serde() {
        let id = OptionId::new("opt-a");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"opt-a\"");

        let back: OptionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
