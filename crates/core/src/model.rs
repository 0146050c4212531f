use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Unknown model: {0}")]
pub struct UnknownModel(pub String);

/// Answer-generation tier. The backend receives [`ModelId::api_name`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    #[default]
    Fast,
    Thorough,
}

impl ModelId {
    pub const ALL: [ModelId; 2] = [ModelId::Fast, ModelId::Thorough];

    pub fn api_name(&self) -> &'static str {
        match self {
            ModelId::Fast => "gemini-2.5-flash",
            ModelId::Thorough => "gemini-2.5-pro",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelId::Fast => "fast",
            ModelId::Thorough => "thorough",
        }
    }

    /// Parse a persisted selector, falling back to the default for anything unrecognised.
    pub fn from_stored(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for ModelId {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ModelId::ALL
            .into_iter()
            .find(|m| s.eq_ignore_ascii_case(m.name()) || s == m.api_name())
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
