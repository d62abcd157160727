use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named thing as delivered by an evidence source.
///
/// Sources disagree about shape: some send bare strings, some send
/// `{label, uri}` objects, and a few send whatever they have. Every variant
/// reduces to a single label through [`Entity::display_label`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entity {
    Plain(String),
    Labeled {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        uri: Option<String>,
    },
    Other(Value),
}

impl Entity {
    #[must_use]
    pub fn labeled(label: Option<&str>, uri: Option<&str>) -> Self {
        Self::Labeled {
            label: label.map(str::to_string),
            uri: uri.map(str::to_string),
        }
    }

    /// Label, then uri, then empty. Unexpected shapes are stringified.
    #[must_use]
    pub fn display_label(&self) -> String {
        match self {
            Self::Plain(s) => s.clone(),
            Self::Labeled { label, uri } => label
                .iter()
                .chain(uri.iter())
                .find(|s| !s.trim().is_empty())
                .cloned()
                .unwrap_or_default(),
            Self::Other(value) => match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }
}

impl From<&str> for Entity {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

impl From<String> for Entity {
    fn from(value: String) -> Self {
        Self::Plain(value)
    }
}
