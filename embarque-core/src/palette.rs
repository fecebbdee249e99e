use serde::{Deserialize, Serialize};

use crate::{OrganizerError, OrganizerResult};

/// Ordered list of tag colors a trip manifest may use. Injected from
/// configuration so the organizer core carries no presentation constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagPalette {
    pub colors: Vec<String>,
}

impl TagPalette {
    pub fn new(colors: Vec<String>) -> Self {
        Self { colors }
    }

    pub fn is_allowed(&self, color: &str) -> bool {
        self.colors.iter().any(|c| c.eq_ignore_ascii_case(color))
    }

    /// Validate an optional color choice. Clearing a tag (None) is always
    /// allowed.
    pub fn check(&self, color: Option<&str>) -> OrganizerResult<()> {
        match color {
            None => Ok(()),
            Some(c) if self.is_allowed(c) => Ok(()),
            Some(c) => Err(OrganizerError::Validation(format!(
                "color '{}' is not in the tag palette",
                c
            ))),
        }
    }
}

impl Default for TagPalette {
    fn default() -> Self {
        Self {
            colors: ["#f44336", "#ff9800", "#ffeb3b", "#4caf50", "#2196f3", "#9c27b0"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}
