//! Application records persisted through the document store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TagColor {
    #[default]
    Blue,
    Green,
    Red,
    Yellow,
    Purple,
    Gray,
}

impl TagColor {
    pub const ALL: [TagColor; 6] = [
        TagColor::Blue,
        TagColor::Green,
        TagColor::Red,
        TagColor::Yellow,
        TagColor::Purple,
        TagColor::Gray,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            TagColor::Blue => "Blue",
            TagColor::Green => "Green",
            TagColor::Red => "Red",
            TagColor::Yellow => "Yellow",
            TagColor::Purple => "Purple",
            TagColor::Gray => "Gray",
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: TagColor,
}

impl Tag {
    pub fn new(name: impl Into<String>, color: TagColor) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: Uuid,
    pub text: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub tags: BTreeSet<Tag>,
    pub screenshot_path: Option<String>,
    pub order: usize,
}

impl TodoItem {
    pub fn new(
        text: impl Into<String>,
        tags: BTreeSet<Tag>,
        screenshot_path: Option<String>,
        order: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            is_completed: false,
            created_at: Utc::now(),
            tags,
            screenshot_path,
            order,
        }
    }
}
