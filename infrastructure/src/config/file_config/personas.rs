//! Personas from TOML (`[[personas]]` array)
//!
//! ```toml
//! [[personas]]
//! id = "host"
//! name = "Hana"
//! role = "moderator"
//! prompt = "Keep the discussion focused"
//! auto_reply = true
//! ```

use roundtable_domain::{AgentProfile, AgentRole, Member};
use serde::{Deserialize, Serialize};

fn default_auto_reply() -> bool {
    true
}

/// One configured agent and its membership flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePersona {
    #[serde(flatten)]
    pub profile: AgentProfile,
    #[serde(default = "default_auto_reply")]
    pub auto_reply: bool,
}

impl FilePersona {
    pub fn new(profile: AgentProfile) -> Self {
        Self {
            profile,
            auto_reply: true,
        }
    }

    pub fn to_member(&self) -> Member {
        Member::new(self.profile.id.clone(), self.auto_reply)
    }
}

/// The built-in cast used when no personas are configured
pub fn default_personas() -> Vec<FilePersona> {
    vec![
        FilePersona::new(
            AgentProfile::new("moderator", "Mira", AgentRole::Moderator)
                .with_prompt("Guide the discussion and summarise where it stands"),
        ),
        FilePersona::new(
            AgentProfile::new("pragmatist", "Theo", AgentRole::Participant)
                .with_prompt("Argue for the simplest thing that works")
                .with_expertise(vec!["delivery".to_string()]),
        ),
        FilePersona::new(
            AgentProfile::new("skeptic", "Sana", AgentRole::Participant)
                .with_prompt("Question assumptions and point out risks")
                .with_expertise(vec!["failure modes".to_string()]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_personas_are_valid() {
        let personas = default_personas();
        assert!(personas.iter().all(|p| p.profile.validate().is_ok()));
        assert_eq!(
            personas.iter().filter(|p| p.profile.is_moderator()).count(),
            1
        );
    }

    #[test]
    fn test_to_member_carries_auto_reply() {
        let mut persona = default_personas().remove(1);
        persona.auto_reply = false;
        let member = persona.to_member();
        assert_eq!(member.agent_id.as_str(), "pragmatist");
        assert!(!member.auto_reply);
    }
}
