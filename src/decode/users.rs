/// Workspace user names for rendering people and user mentions
use std::collections::HashMap;

/// Maps user ids to display names
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    names: HashMap<String, String>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory from `(user_id, name)` pairs
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            names: pairs.into_iter().collect(),
        }
    }

    pub fn name_for(&self, user_id: &str) -> Option<&str> {
        self.names.get(user_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
