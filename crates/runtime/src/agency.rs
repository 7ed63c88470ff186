//! Agency: the registry of live agents
//!
//! Agents live in a `BTreeMap` keyed by id, which gives the dispatch loop
//! its deterministic ascending-id service order for free. Ids are positive
//! and the counter only moves forward; `reset` zeroes both the table and
//! the counter.

use crate::agent::{Agent, AgentState};
use crate::method::Method;
use agerun_core::{MapValue, Value, Version};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Agency {
    agents: BTreeMap<i64, Agent>,
    next_id: i64,
}

impl Default for Agency {
    fn default() -> Self {
        Agency::new()
    }
}

impl Agency {
    pub fn new() -> Self {
        Agency {
            agents: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Allocate an id and create an agent running `method`. The new agent's
    /// queue starts with the implicit wake message.
    pub fn create_agent(&mut self, method: Rc<Method>, context: Option<MapValue>) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(
            agent = id,
            method = method.name(),
            version = %method.version(),
            "agent created"
        );
        self.agents.insert(id, Agent::new(id, method, context));
        id
    }

    /// Re-insert an agent from a persisted snapshot under its original id.
    /// Fails when the id is taken or not positive.
    pub(crate) fn restore_agent(&mut self, id: i64, method: Rc<Method>, memory: MapValue) -> bool {
        if id <= 0 || self.agents.contains_key(&id) {
            return false;
        }
        self.agents.insert(id, Agent::restore(id, method, memory));
        if id >= self.next_id {
            self.next_id = id + 1;
        }
        true
    }

    /// Request agent destruction: mark Exiting and enqueue `__sleep__`.
    /// The dispatch loop performs the actual release.
    pub fn exit_agent(&mut self, id: i64) -> bool {
        match self.agents.get_mut(&id) {
            Some(agent) => agent.begin_exit(),
            None => false,
        }
    }

    /// Enqueue an owned value onto an agent's queue. Id 0 is a successful
    /// no-op that enqueues nothing anywhere.
    pub fn send_to_agent(&mut self, id: i64, message: Value) -> bool {
        if id == 0 {
            return true;
        }
        match self.agents.get_mut(&id) {
            Some(agent) => {
                agent.enqueue(message);
                true
            }
            None => false,
        }
    }

    pub fn agent_exists(&self, id: i64) -> bool {
        self.agents.contains_key(&id)
    }

    pub fn agent_has_messages(&self, id: i64) -> bool {
        self.agents.get(&id).is_some_and(Agent::has_messages)
    }

    pub fn get_agent(&self, id: i64) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn get_agent_memory(&self, id: i64) -> Option<&MapValue> {
        self.agents.get(&id).map(Agent::memory)
    }

    pub fn count_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn agent_ids(&self) -> Vec<i64> {
        self.agents.keys().copied().collect()
    }

    /// Lowest agent id with a non-empty queue; the stable service order of
    /// the dispatch loop.
    pub fn next_agent_with_messages(&self) -> Option<i64> {
        self.agents
            .iter()
            .find(|(_, agent)| agent.has_messages())
            .map(|(id, _)| *id)
    }

    /// Temporarily remove an agent so its memory and the rest of the agency
    /// can be borrowed at once while a message is executed.
    pub(crate) fn detach(&mut self, id: i64) -> Option<Agent> {
        self.agents.remove(&id)
    }

    pub(crate) fn attach(&mut self, agent: Agent) {
        self.agents.insert(agent.id(), agent);
    }

    /// True when any live agent runs (name, version); such a method must
    /// not be unregistered.
    pub fn uses_method(&self, name: &str, version: Version) -> bool {
        self.agents
            .values()
            .any(|agent| agent.method().name() == name && agent.method().version() == version)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    pub(crate) fn set_next_id(&mut self, next_id: i64) {
        if next_id > self.next_id {
            self.next_id = next_id;
        }
    }

    /// Zero the table and the id counter.
    pub fn reset(&mut self) {
        self.agents.clear();
        self.next_id = 1;
    }

    /// Live agents that are not yet exiting.
    pub fn alive_agent_ids(&self) -> Vec<i64> {
        self.agents
            .values()
            .filter(|agent| agent.state() == AgentState::Alive)
            .map(Agent::id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::WAKE_MESSAGE;
    use agerun_core::Log;
    use agerun_lang::InstructionParser;

    fn test_method() -> Rc<Method> {
        let parser = InstructionParser::new(Log::new());
        Rc::new(Method::compile(&parser, "noop", Version::new(1, 0, 0), "send(0, message)").unwrap())
    }

    #[test]
    fn test_ids_are_positive_and_monotonic() {
        let mut agency = Agency::new();
        let a = agency.create_agent(test_method(), None);
        let b = agency.create_agent(test_method(), None);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert!(agency.agent_exists(a));
        assert_eq!(agency.count_agents(), 2);
    }

    #[test]
    fn test_new_agent_queue_head_is_wake() {
        let mut agency = Agency::new();
        let id = agency.create_agent(test_method(), None);
        let agent = agency.get_agent(id).unwrap();
        assert_eq!(
            agent.queue_head(),
            Some(&Value::String(WAKE_MESSAGE.to_string()))
        );
    }

    #[test]
    fn test_send_to_agent_zero_is_noop_success() {
        let mut agency = Agency::new();
        let id = agency.create_agent(test_method(), None);
        assert!(agency.send_to_agent(0, Value::Integer(5)));
        // Nothing was enqueued anywhere.
        assert_eq!(agency.get_agent(id).unwrap().queue_len(), 1);
    }

    #[test]
    fn test_send_to_missing_agent_fails() {
        let mut agency = Agency::new();
        assert!(!agency.send_to_agent(99, Value::Integer(5)));
    }

    #[test]
    fn test_send_appends_in_order() {
        let mut agency = Agency::new();
        let id = agency.create_agent(test_method(), None);
        agency.send_to_agent(id, Value::Integer(1));
        agency.send_to_agent(id, Value::Integer(2));
        let agent = agency.get_agent(id).unwrap();
        assert_eq!(agent.queue_len(), 3); // wake + 2
        assert_eq!(agent.queue_tail(), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_next_agent_with_messages_is_lowest_id() {
        let mut agency = Agency::new();
        let a = agency.create_agent(test_method(), None);
        let b = agency.create_agent(test_method(), None);
        assert_eq!(agency.next_agent_with_messages(), Some(a));
        // Drain a's wake; b still has its own.
        if let Some(mut agent) = agency.detach(a) {
            agent.dequeue();
            agency.attach(agent);
        }
        assert_eq!(agency.next_agent_with_messages(), Some(b));
    }

    #[test]
    fn test_uses_method() {
        let mut agency = Agency::new();
        agency.create_agent(test_method(), None);
        assert!(agency.uses_method("noop", Version::new(1, 0, 0)));
        assert!(!agency.uses_method("noop", Version::new(2, 0, 0)));
        assert!(!agency.uses_method("other", Version::new(1, 0, 0)));
    }

    #[test]
    fn test_reset_zeroes_table_and_counter() {
        let mut agency = Agency::new();
        agency.create_agent(test_method(), None);
        agency.reset();
        assert_eq!(agency.count_agents(), 0);
        let id = agency.create_agent(test_method(), None);
        assert_eq!(id, 1);
    }

    #[test]
    fn test_restore_agent_bumps_counter() {
        let mut agency = Agency::new();
        assert!(agency.restore_agent(7, test_method(), MapValue::new()));
        assert!(!agency.restore_agent(7, test_method(), MapValue::new()));
        let fresh = agency.create_agent(test_method(), None);
        assert_eq!(fresh, 8);
    }
}
