//! AgeRun runtime: message-driven agents over a small instruction language
//!
//! Layering:
//! - [`method`]/[`methodology`]: named, versioned, compiled instruction
//!   sequences and their registry.
//! - [`agent`]/[`agency`]: live agents with owned memory, optional context,
//!   and FIFO message queues.
//! - [`evaluator`]: one evaluator per instruction kind, with explicit
//!   handles instead of globals.
//! - [`system`]: init, the single-threaded dispatch loop, shutdown.
//! - [`persist`]: line-oriented text snapshots of both registries.

pub mod agency;
pub mod agent;
pub mod evaluator;
pub mod method;
pub mod methodology;
pub mod persist;
pub mod system;

pub use agency::Agency;
pub use agent::{Agent, AgentState, SLEEP_MESSAGE, WAKE_MESSAGE};
pub use evaluator::Executor;
pub use method::{CompileError, Method};
pub use methodology::{DuplicateMethod, Methodology, VersionSelector};
pub use persist::{AGENCY_FILE, METHODOLOGY_FILE, PersistError};
pub use system::{MethodError, System};

// The data model and front end are part of the public embedding surface.
pub use agerun_core::{ListValue, Log, LogRecord, MapValue, Value, ValueKind, Version};
pub use agerun_lang::{InstructionAst, InstructionParser, ParseError};
