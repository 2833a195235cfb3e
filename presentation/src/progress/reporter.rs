//! Thinking spinners, one per generating agent

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use roundtable_domain::AgentId;
use std::collections::HashMap;
use std::time::Duration;

/// Shows a spinner for every agent that is currently generating
pub struct ThinkingReporter {
    multi: MultiProgress,
    bars: HashMap<AgentId, ProgressBar>,
    enabled: bool,
}

impl ThinkingReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            enabled: true,
        }
    }

    /// Reporter that tracks spinners without drawing anything
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            bars: HashMap::new(),
            enabled: false,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    pub fn start(&mut self, agent_id: &AgentId, message: String) {
        if self.bars.contains_key(agent_id) {
            return;
        }
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_message(message);
        if self.enabled {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        self.bars.insert(agent_id.clone(), pb);
    }

    /// Remove the agent's spinner; false when it had none
    pub fn stop(&mut self, agent_id: &AgentId) -> bool {
        match self.bars.remove(agent_id) {
            Some(pb) => {
                pb.finish_and_clear();
                self.multi.remove(&pb);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, agent_id: &AgentId) -> bool {
        self.bars.contains_key(agent_id)
    }

    pub fn active_count(&self) -> usize {
        self.bars.len()
    }

    /// Run `f` with the spinners hidden so regular output does not tear them
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.multi.suspend(f)
    }

    pub fn clear(&mut self) {
        for (_, pb) in self.bars.drain() {
            pb.finish_and_clear();
        }
        let _ = self.multi.clear();
    }
}

impl Default for ThinkingReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThinkingReporter {
    fn drop(&mut self) {
        self.clear();
    }
}
