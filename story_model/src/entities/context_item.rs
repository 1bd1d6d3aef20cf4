//! Context items: themes, locations, and plot threads.

use serde::{Deserialize, Serialize};

use super::ContextItemId;

/// Kinds of context items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextItemType {
    Theme,
    Location,
    Plot,
}

impl ContextItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextItemType::Theme => "theme",
            ContextItemType::Location => "location",
            ContextItemType::Plot => "plot",
        }
    }
}

/// A piece of reusable story context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextItem {
    pub id: ContextItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub item_type: ContextItemType,
    /// Active in every chapter rather than only where referenced.
    #[serde(default)]
    pub is_global: bool,
}

impl ContextItem {
    pub fn new(name: impl Into<String>, item_type: ContextItemType) -> Self {
        Self {
            id: ContextItemId::generate(),
            name: name.into(),
            description: String::new(),
            item_type,
            is_global: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<ContextItemId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn global(mut self) -> Self {
        self.is_global = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_serialization() {
        let item = ContextItem::new("Tatooine", ContextItemType::Location).global();
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["type"], "location");
        assert_eq!(json["isGlobal"], true);
        assert_eq!(ContextItemType::Plot.as_str(), "plot");
    }
}
