//! System: initialization, the dispatch loop, and shutdown
//!
//! The `System` owns the methodology, the agency, the shared log, and one
//! reusable instruction parser, and threads them explicitly through every
//! evaluator. Execution is single-threaded and cooperative: nothing
//! advances except through [`System::process_next_message`].
//!
//! Per-agent state machine:
//! ```text
//! [nonexistent] --create--> [alive, queue=[__wake__]]
//! [alive]       --step-->   [alive] (queue may grow/shrink)
//! [alive]       --exit-->   [exiting, queue=[.., __sleep__]]
//! [exiting]     --step-->   [nonexistent] once __sleep__ is processed
//! ```

use crate::agency::Agency;
use crate::agent::{AgentState, SLEEP_MESSAGE};
use crate::evaluator::Executor;
use crate::method::{CompileError, Method};
use crate::methodology::{DuplicateMethod, Methodology, VersionSelector};
use crate::persist;
use agerun_core::{Log, MapValue, Value, Version};
use agerun_lang::InstructionParser;
use std::fmt;
use std::path::{Path, PathBuf};

/// Failure to install a method through the host API.
#[derive(Debug)]
pub enum MethodError {
    Compile(CompileError),
    Duplicate(DuplicateMethod),
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodError::Compile(e) => write!(f, "compile failed: {}", e),
            MethodError::Duplicate(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MethodError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MethodError::Compile(e) => Some(e),
            MethodError::Duplicate(e) => Some(e),
        }
    }
}

/// The embedded runtime. Hosts drive it: `init`, install methods, create
/// agents, `process_all_messages`, `shutdown`.
pub struct System {
    methodology: Methodology,
    agency: Agency,
    log: Log,
    parser: InstructionParser,
    persist_dir: PathBuf,
    initialized: bool,
}

impl Default for System {
    fn default() -> Self {
        System::new()
    }
}

impl System {
    /// System persisting into the current working directory.
    pub fn new() -> Self {
        System::with_persist_dir(".")
    }

    /// System persisting its snapshot files into `dir`.
    pub fn with_persist_dir(dir: impl Into<PathBuf>) -> Self {
        let log = Log::new();
        System {
            methodology: Methodology::new(),
            agency: Agency::new(),
            parser: InstructionParser::new(log.clone()),
            log,
            persist_dir: dir.into(),
            initialized: false,
        }
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn methodology(&self) -> &Methodology {
        &self.methodology
    }

    pub fn agency(&self) -> &Agency {
        &self.agency
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    /// First call resets both registries, reloads any persisted snapshot,
    /// and (when named) creates one bootstrap agent, returning its id.
    /// Subsequent calls return 0 without side effects.
    pub fn init(&mut self, bootstrap: Option<(&str, VersionSelector)>) -> i64 {
        if self.initialized {
            self.log.error("system already initialized");
            return 0;
        }
        self.methodology.reset();
        self.agency.reset();
        self.initialized = true;
        self.load_state();
        match bootstrap {
            Some((name, selector)) => self.create_agent(name, &selector, None),
            None => 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Compile and register a method from source.
    pub fn register_method(
        &mut self,
        name: &str,
        version: Version,
        source: &str,
    ) -> Result<(), MethodError> {
        let method = Method::compile(&self.parser, name, version, source)
            .map_err(MethodError::Compile)?;
        self.methodology
            .register(method)
            .map_err(MethodError::Duplicate)?;
        tracing::debug!(method = name, version = %version, "method registered");
        Ok(())
    }

    /// Create an agent from a registered method; 0 when the method is
    /// unknown.
    pub fn create_agent(
        &mut self,
        name: &str,
        selector: &VersionSelector,
        context: Option<MapValue>,
    ) -> i64 {
        match self.methodology.resolve(name, selector) {
            Some(method) => self.agency.create_agent(method, context),
            None => {
                self.log
                    .error(format!("create: no method '{}' version {}", name, selector));
                0
            }
        }
    }

    /// Enqueue a message for an agent. Id 0 is a successful no-op.
    pub fn send(&mut self, id: i64, message: Value) -> bool {
        self.agency.send_to_agent(id, message)
    }

    /// Request an agent's destruction (deferred to the dispatch loop).
    pub fn exit_agent(&mut self, id: i64) -> bool {
        self.agency.exit_agent(id)
    }

    pub fn agent_exists(&self, id: i64) -> bool {
        self.agency.agent_exists(id)
    }

    pub fn agent_has_messages(&self, id: i64) -> bool {
        self.agency.agent_has_messages(id)
    }

    pub fn get_agent_memory(&self, id: i64) -> Option<&MapValue> {
        self.agency.get_agent_memory(id)
    }

    pub fn count_agents(&self) -> usize {
        self.agency.count_agents()
    }

    /// Service the lowest agent id with a pending message: pop one message
    /// and run the agent's method body against it. Returns whether a
    /// message was processed.
    pub fn process_next_message(&mut self) -> bool {
        let Some(id) = self.agency.next_agent_with_messages() else {
            return false;
        };
        let Some(mut agent) = self.agency.detach(id) else {
            return false;
        };
        let Some(message) = agent.dequeue() else {
            self.agency.attach(agent);
            return false;
        };

        let mut executor = Executor::new(
            &mut self.agency,
            &mut self.methodology,
            &self.parser,
            &self.log,
        );
        executor.run_body(&mut agent, &message);

        let sleep_processed = matches!(&message, Value::String(s) if s == SLEEP_MESSAGE);
        if agent.state() == AgentState::Exiting && sleep_processed {
            tracing::debug!(agent = id, "agent released");
            // Dropping the detached agent drains its queue and frees its
            // memory; the id is never reused.
        } else {
            self.agency.attach(agent);
        }
        true
    }

    /// Drain every queue, counting processed messages. Messages produced by
    /// `send` during processing are serviced by later iterations.
    pub fn process_all_messages(&mut self) -> usize {
        let mut count = 0;
        while self.process_next_message() {
            count += 1;
        }
        count
    }

    /// Deliver `__sleep__` to every live agent and process the queues, then
    /// persist methodology and agency and reset. Safe when uninitialized.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        for id in self.agency.alive_agent_ids() {
            self.agency
                .send_to_agent(id, Value::String(SLEEP_MESSAGE.to_string()));
        }
        self.process_all_messages();
        self.save_state();
        self.methodology.reset();
        self.agency.reset();
        self.initialized = false;
        tracing::debug!("system shut down");
    }

    /// Write the methodology and agency snapshots. Failures are logged, not
    /// fatal.
    pub fn save_state(&self) {
        if let Err(error) = persist::save_methodology(&self.persist_dir, &self.methodology) {
            self.log
                .error(format!("could not save methodology: {}", error));
        }
        if let Err(error) = persist::save_agency(&self.persist_dir, &self.agency) {
            self.log.error(format!("could not save agency: {}", error));
        }
    }

    /// Replace in-memory state with the persisted snapshots. Missing,
    /// mismatched, or malformed files leave the corresponding registry
    /// empty (logged, never fatal).
    pub fn load_state(&mut self) {
        self.methodology =
            match persist::load_methodology(&self.persist_dir, &self.parser, &self.log) {
                Ok(methodology) => methodology,
                Err(error) => {
                    self.log
                        .error(format!("could not load methodology: {}", error));
                    Methodology::new()
                }
            };
        self.agency = match persist::load_agency(&self.persist_dir, &self.methodology, &self.log) {
            Ok(agency) => agency,
            Err(error) => {
                self.log.error(format!("could not load agency: {}", error));
                Agency::new()
            }
        };
    }
}
