//! Seeded discussion from TOML (`[discussion]` section)
//!
//! Every [`DiscussionSettings`] field may appear directly in the section.
//! `round_limit` is taken from `[scheduler]` when the discussion is seeded.

use roundtable_domain::DiscussionSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDiscussionConfig {
    pub title: String,
    #[serde(flatten)]
    pub settings: DiscussionSettings,
}

impl Default for FileDiscussionConfig {
    fn default() -> Self {
        Self {
            title: "Roundtable".to_string(),
            settings: DiscussionSettings::default(),
        }
    }
}
