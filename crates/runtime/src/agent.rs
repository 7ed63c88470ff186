//! Agents: id, method reference, memory, context, message queue
//!
//! An agent holds an `Rc` to its registered method, which makes the
//! "method resolves for the agent's entire lifetime" invariant structural;
//! unregistering a method that an agent still runs is refused separately.
//!
//! Lifecycle: creation enqueues the reserved `"__wake__"` string as the
//! first message the agent sees. `exit` marks the agent Exiting and
//! enqueues `"__sleep__"`; the dispatch loop releases the agent once that
//! sleep message has been processed.

use crate::method::Method;
use agerun_core::{MapValue, Value};
use std::collections::VecDeque;
use std::rc::Rc;

/// Reserved lifecycle message delivered at agent creation.
pub const WAKE_MESSAGE: &str = "__wake__";
/// Reserved lifecycle message delivered before an agent is released.
pub const SLEEP_MESSAGE: &str = "__sleep__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Alive,
    /// `exit` was requested; the agent drains its queue and is released
    /// when its `__sleep__` message has been processed.
    Exiting,
}

#[derive(Debug)]
pub struct Agent {
    id: i64,
    method: Rc<Method>,
    memory: MapValue,
    context: Option<MapValue>,
    queue: VecDeque<Value>,
    state: AgentState,
}

impl Agent {
    /// Fresh agent with the implicit wake message queued.
    pub(crate) fn new(id: i64, method: Rc<Method>, context: Option<MapValue>) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(Value::String(WAKE_MESSAGE.to_string()));
        Agent {
            id,
            method,
            memory: MapValue::new(),
            context,
            queue,
            state: AgentState::Alive,
        }
    }

    /// Rebuild an agent from a persisted snapshot: restored memory, empty
    /// queue, no wake message.
    pub(crate) fn restore(id: i64, method: Rc<Method>, memory: MapValue) -> Self {
        Agent {
            id,
            method,
            memory,
            context: None,
            queue: VecDeque::new(),
            state: AgentState::Alive,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn method(&self) -> &Rc<Method> {
        &self.method
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn memory(&self) -> &MapValue {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MapValue {
        &mut self.memory
    }

    pub fn context(&self) -> Option<&MapValue> {
        self.context.as_ref()
    }

    /// Append a message; the queue takes ownership.
    pub fn enqueue(&mut self, message: Value) {
        self.queue.push_back(message);
    }

    /// Pop the oldest message, returning ownership to the caller.
    pub fn dequeue(&mut self) -> Option<Value> {
        self.queue.pop_front()
    }

    pub fn has_messages(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_head(&self) -> Option<&Value> {
        self.queue.front()
    }

    pub fn queue_tail(&self) -> Option<&Value> {
        self.queue.back()
    }

    /// Mark the agent Exiting and enqueue its sleep message. Idempotent in
    /// effect: a second request on an Exiting agent is refused.
    pub fn begin_exit(&mut self) -> bool {
        if self.state == AgentState::Exiting {
            return false;
        }
        self.state = AgentState::Exiting;
        self.enqueue(Value::String(SLEEP_MESSAGE.to_string()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agerun_core::{Log, Version};
    use agerun_lang::InstructionParser;

    fn test_method() -> Rc<Method> {
        let parser = InstructionParser::new(Log::new());
        Rc::new(Method::compile(&parser, "noop", Version::new(1, 0, 0), "send(0, message)").unwrap())
    }

    #[test]
    fn test_new_agent_has_wake_queued() {
        let agent = Agent::new(1, test_method(), None);
        assert_eq!(agent.queue_len(), 1);
        assert_eq!(
            agent.queue_head(),
            Some(&Value::String(WAKE_MESSAGE.to_string()))
        );
        assert_eq!(agent.state(), AgentState::Alive);
    }

    #[test]
    fn test_fifo_order() {
        let mut agent = Agent::new(1, test_method(), None);
        agent.dequeue(); // drop the wake message
        agent.enqueue(Value::Integer(1));
        agent.enqueue(Value::Integer(2));
        agent.enqueue(Value::Integer(3));
        assert_eq!(agent.dequeue(), Some(Value::Integer(1)));
        assert_eq!(agent.dequeue(), Some(Value::Integer(2)));
        assert_eq!(agent.dequeue(), Some(Value::Integer(3)));
        assert_eq!(agent.dequeue(), None);
    }

    #[test]
    fn test_begin_exit_enqueues_sleep_once() {
        let mut agent = Agent::new(1, test_method(), None);
        assert!(agent.begin_exit());
        assert_eq!(agent.state(), AgentState::Exiting);
        assert_eq!(
            agent.queue_tail(),
            Some(&Value::String(SLEEP_MESSAGE.to_string()))
        );
        let len = agent.queue_len();
        assert!(!agent.begin_exit());
        assert_eq!(agent.queue_len(), len);
    }

    #[test]
    fn test_restored_agent_has_no_wake() {
        let mut memory = MapValue::new();
        memory.insert("n", Value::Integer(9));
        let agent = Agent::restore(4, test_method(), memory);
        assert_eq!(agent.queue_len(), 0);
        assert_eq!(agent.memory().get("n"), Some(&Value::Integer(9)));
    }
}
