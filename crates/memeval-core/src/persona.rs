use serde::{Deserialize, Serialize};

/// A synthetic person the dataset is built around. Loaded once, then
/// only ever borrowed by downstream stages — never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub background: String,
}

impl Persona {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        background: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            background: background.into(),
        }
    }

    /// One-line description used in prompt headers.
    pub fn summary(&self) -> String {
        format!("{} ({})", self.name, self.role)
    }
}
