//! Agent presence derivation
//!
//! Maintains the set of agent identifiers currently believed active, derived
//! from explicit status frames, roster snapshots, and heuristic inference
//! over response text. This is derived state only: replaying the inbound
//! event stream reconstructs it exactly.

use crate::protocol::AgentStatus;
use tracing::debug;

/// Pseudo-agent used by the backend for system notices; never tracked
const SYSTEM_AGENT: &str = "system";

/// Ordered phrase table for heuristic departure detection
///
/// Phrases are matched as case-insensitive substrings. The table is
/// externalized from the state machine so the rule set can be tested and
/// extended independently.
#[derive(Debug, Clone)]
pub struct DepartureRules {
    phrases: Vec<String>,
}

impl DepartureRules {
    /// Build a rule table from the configured phrase list
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Whether `text` contains any departure phrase
    pub fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.phrases.iter().any(|p| lowered.contains(p))
    }
}

/// Tracks which remote agents are currently present
///
/// Starts empty: presence is only asserted once an explicit status event, a
/// roster snapshot, or a response from the agent has been observed. All
/// mutations are idempotent and the set never holds duplicates.
#[derive(Debug)]
pub struct PresenceTracker {
    /// Insertion-ordered, duplicate-free
    active: Vec<String>,
    rules: DepartureRules,
}

impl PresenceTracker {
    /// Create an empty tracker with the given departure rules
    pub fn new(rules: DepartureRules) -> Self {
        Self {
            active: Vec::new(),
            rules,
        }
    }

    /// Apply an explicit status event; always wins over heuristic inference
    pub fn apply_status(&mut self, agent: &str, status: AgentStatus) {
        match status {
            AgentStatus::Online => self.add(agent),
            AgentStatus::Offline | AgentStatus::Away => self.remove(agent),
        }
    }

    /// Apply a roster snapshot, replacing the entire set
    pub fn apply_roster(&mut self, agents: Vec<String>) {
        self.active.clear();
        for agent in agents {
            self.add(&agent);
        }
    }

    /// Apply heuristic inference over a response: a departure phrase removes
    /// the agent, any other response adds it if absent
    pub fn apply_response(&mut self, agent: &str, text: &str) {
        if agent == SYSTEM_AGENT {
            return;
        }
        if self.rules.matches(text) {
            debug!(agent = %agent, "Departure phrase detected, removing agent");
            self.remove(agent);
        } else {
            self.add(agent);
        }
    }

    /// Current presence set, in first-seen order
    pub fn active(&self) -> &[String] {
        &self.active
    }

    /// Whether the agent is currently present
    pub fn contains(&self, agent: &str) -> bool {
        self.active.iter().any(|a| a == agent)
    }

    fn add(&mut self, agent: &str) {
        if !self.contains(agent) {
            self.active.push(agent.to_string());
        }
    }

    fn remove(&mut self, agent: &str) {
        self.active.retain(|a| a != agent);
    }
}
