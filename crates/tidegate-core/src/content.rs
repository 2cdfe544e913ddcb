//! Content fragments decoded from the upstream event stream.

use serde::{Deserialize, Serialize};

/// Classification of a piece of generated text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    /// Ordinary response content shown to the user.
    #[default]
    Text,
    /// Internal reasoning ("thinking") content.
    Reasoning,
}

impl FragmentKind {
    /// The kind a response starts in before any explicit switch arrives.
    pub fn initial(thinking_enabled: bool) -> Self {
        if thinking_enabled {
            Self::Reasoning
        } else {
            Self::Text
        }
    }

    /// Whether this is reasoning content.
    pub fn is_reasoning(self) -> bool {
        matches!(self, Self::Reasoning)
    }
}

/// One typed piece of generated text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFragment {
    /// The text itself, never empty.
    pub text: String,
    /// Which channel the text belongs to.
    pub kind: FragmentKind,
}

impl ContentFragment {
    /// Build a text fragment.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: FragmentKind::Text,
        }
    }

    /// Build a reasoning fragment.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: FragmentKind::Reasoning,
        }
    }
}
