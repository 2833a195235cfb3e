//! Agent set of the active discussion.

use super::runtime::{AgentEnvironment, AgentRuntime};
use roundtable_domain::{AgentId, AgentProfile, Member};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Result of reconciling the agent set with a member list
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<AgentId>,
    pub removed: Vec<AgentId>,
    pub updated: Vec<AgentId>,
    /// Members without a known profile (or with an unusable one)
    pub skipped: Vec<AgentId>,
}

/// Owns one [`AgentRuntime`] per member of the active discussion
pub struct AgentRegistry {
    env: AgentEnvironment,
    agents: Mutex<BTreeMap<AgentId, Arc<AgentRuntime>>>,
}

impl AgentRegistry {
    pub fn new(env: AgentEnvironment) -> Self {
        Self {
            env,
            agents: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<AgentId, Arc<AgentRuntime>>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the agent set match `members`.
    ///
    /// Runtimes of departed members are stopped, new members get a started
    /// runtime, and existing ones pick up their member's auto-reply flag.
    pub fn sync(&self, members: &[Member], profiles: &[AgentProfile]) -> SyncReport {
        let mut report = SyncReport::default();
        let mut agents = self.lock();

        let wanted: Vec<&AgentId> = members.iter().map(|m| &m.agent_id).collect();
        let departed: Vec<AgentId> = agents
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();
        for id in departed {
            if let Some(agent) = agents.remove(&id) {
                agent.stop();
            }
            report.removed.push(id);
        }

        for member in members {
            if let Some(agent) = agents.get(&member.agent_id) {
                agent.set_auto_reply(member.auto_reply);
                report.updated.push(member.agent_id.clone());
                continue;
            }
            let Some(profile) = profiles.iter().find(|p| p.id == member.agent_id) else {
                warn!(agent_id = %member.agent_id, "No profile for member; skipped");
                report.skipped.push(member.agent_id.clone());
                continue;
            };
            match AgentRuntime::new(profile.clone(), member.auto_reply, self.env.clone()) {
                Ok(agent) => {
                    agent.start();
                    agents.insert(member.agent_id.clone(), Arc::new(agent));
                    report.added.push(member.agent_id.clone());
                }
                Err(e) => {
                    warn!(agent_id = %member.agent_id, error = %e, "Unusable profile; skipped");
                    report.skipped.push(member.agent_id.clone());
                }
            }
        }

        info!(
            discussion_id = %self.env.discussion_id,
            added = report.added.len(),
            removed = report.removed.len(),
            updated = report.updated.len(),
            "Agents synced"
        );
        report
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<AgentRuntime>> {
        self.lock().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<AgentRuntime>> {
        self.lock().values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn pause_all(&self) {
        for agent in self.lock().values() {
            agent.pause();
        }
        debug!(discussion_id = %self.env.discussion_id, "Agents paused");
    }

    pub fn resume_all(&self) {
        for agent in self.lock().values() {
            agent.resume();
        }
        debug!(discussion_id = %self.env.discussion_id, "Agents resumed");
    }

    /// Every agent is neither paused nor generating
    pub fn all_ready(&self) -> bool {
        self.lock().values().all(|agent| agent.is_ready())
    }

    /// Agents currently generating
    pub fn thinking(&self) -> Vec<AgentId> {
        self.lock()
            .values()
            .filter(|agent| agent.is_thinking())
            .map(|agent| agent.id().clone())
            .collect()
    }

    /// Stop and drop every runtime.
    pub fn cleanup(&self) {
        let drained = std::mem::take(&mut *self.lock());
        for agent in drained.values() {
            agent.stop();
        }
        debug!(
            discussion_id = %self.env.discussion_id,
            count = drained.len(),
            "Agents cleaned up"
        );
    }
}

impl Drop for AgentRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{StateStore, Topic};
    use crate::config::{AgentBehavior, SchedulerConfig};
    use crate::scheduler::SpeakScheduler;
    use crate::test_support::{MemoryRepository, ScriptedGeneration, moderator, participant};
    use roundtable_domain::{DiscussionId, DiscussionState};

    fn registry() -> (AgentRegistry, StateStore<DiscussionState>) {
        let state = StateStore::new(DiscussionState::new());
        let env = AgentEnvironment {
            discussion_id: DiscussionId::new("d1"),
            scheduler: SpeakScheduler::new(SchedulerConfig::default()),
            events: Arc::new(Topic::new()),
            repository: Arc::new(MemoryRepository::default()),
            backend: Arc::new(ScriptedGeneration::default()),
            state: state.watch(),
            behavior: AgentBehavior::default(),
        };
        (AgentRegistry::new(env), state)
    }

    fn profiles() -> Vec<AgentProfile> {
        vec![
            moderator("mod", "Morgan"),
            participant("ada", "Ada"),
            participant("bo", "Bo"),
        ]
    }

    #[tokio::test]
    async fn test_sync_adds_removes_and_updates() {
        let (registry, _state) = registry();

        let report = registry.sync(
            &[Member::new("mod", true), Member::new("ada", true)],
            &profiles(),
        );
        assert_eq!(report.added.len(), 2);
        assert_eq!(registry.len(), 2);

        let report = registry.sync(
            &[Member::new("ada", false), Member::new("bo", true)],
            &profiles(),
        );
        assert_eq!(report.removed, vec![AgentId::new("mod")]);
        assert_eq!(report.added, vec![AgentId::new("bo")]);
        assert_eq!(report.updated, vec![AgentId::new("ada")]);
        assert!(!registry.get(&AgentId::new("ada")).unwrap().state().auto_reply);
        assert!(registry.get(&AgentId::new("mod")).is_none());
    }

    #[tokio::test]
    async fn test_members_without_profiles_are_skipped() {
        let (registry, _state) = registry();
        let report = registry.sync(&[Member::new("ghost", true)], &profiles());
        assert_eq!(report.skipped, vec![AgentId::new("ghost")]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_pause_resume_all() {
        let (registry, _state) = registry();
        registry.sync(&[Member::new("ada", true)], &profiles());

        registry.pause_all();
        assert!(!registry.all_ready());
        registry.resume_all();
        assert!(registry.all_ready());
        assert!(registry.thinking().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_empties_the_set() {
        let (registry, _state) = registry();
        registry.sync(&[Member::new("ada", true), Member::new("bo", true)], &profiles());
        let kept = registry.get(&AgentId::new("ada")).unwrap();

        registry.cleanup();
        assert!(registry.is_empty());
        // idempotent
        registry.cleanup();
        assert_eq!(kept.id().as_str(), "ada");
    }
}
