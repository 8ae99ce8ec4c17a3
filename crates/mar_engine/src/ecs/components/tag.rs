//! Tag component: a display name used in logs and tooling

use crate::ecs::Component;

/// Human-readable entity name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagComponent {
    /// Entity name
    pub tag: String,
}

impl Default for TagComponent {
    fn default() -> Self {
        Self { tag: "New Entity".to_string() }
    }
}

impl TagComponent {
    /// Create a tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Component for TagComponent {}
