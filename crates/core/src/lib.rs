//! AgeRun core: the data model shared by every layer
//!
//! Key design principles:
//! - Value: what agents talk about (integers, doubles, strings, maps, lists)
//! - Containers own their contents; `Clone` is a structural deep copy
//! - Version: component-wise numeric method versioning
//! - Log: explicit injected error sink, never process-global state

pub mod log;
pub mod value;
pub mod version;

pub use log::{Log, LogRecord};
pub use value::{ListValue, MapValue, Value, ValueKind};
pub use version::{Version, VersionParseError};
