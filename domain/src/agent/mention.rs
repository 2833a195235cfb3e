//! `@name` mention matching.
//!
//! A message mentions an agent when it contains `@Name`, `@"Name"` or
//! `@'Name'`, case-insensitively, as a whole token: `@Ada` does not match an
//! agent called `Adam`, and `mail@ada.dev` is not a mention.

use crate::core::error::DomainError;
use regex::{Regex, RegexBuilder};

/// Compiled mention pattern for one agent display name
#[derive(Debug, Clone)]
pub struct MentionMatcher {
    name: String,
    pattern: Regex,
}

impl MentionMatcher {
    pub fn new(name: &str) -> Result<Self, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyAgentName);
        }
        let escaped = regex::escape(trimmed);
        let source = format!(
            r#"(?:^|[^\w])@(?:"{escaped}"|'{escaped}'|{escaped}(?:$|[^\w]))"#
        );
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| DomainError::InvalidMentionPattern {
                name: trimmed.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: trimmed.to_string(),
            pattern,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mentioned(&self, content: &str) -> bool {
        self.pattern.is_match(content)
    }
}
