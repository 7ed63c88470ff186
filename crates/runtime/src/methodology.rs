//! Methodology: the registry of methods keyed by (name, version)
//!
//! Versions of one method live in a `BTreeMap`, so "latest" is simply the
//! last entry under the component-wise numeric `Version` ordering, and
//! persistence iterates deterministically.

use crate::method::Method;
use agerun_core::Version;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// How a method reference names its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// Highest registered version.
    Latest,
    Exact(Version),
}

impl VersionSelector {
    /// `"latest"` or a version string such as `"1.0.0"`.
    pub fn parse(text: &str) -> Option<VersionSelector> {
        if text.trim() == "latest" {
            Some(VersionSelector::Latest)
        } else {
            text.parse().ok().map(VersionSelector::Exact)
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => f.write_str("latest"),
            VersionSelector::Exact(v) => write!(f, "{}", v),
        }
    }
}

/// Registration rejected because the (name, version) pair already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMethod {
    pub name: String,
    pub version: Version,
}

impl fmt::Display for DuplicateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method '{}' version {} already registered", self.name, self.version)
    }
}

impl std::error::Error for DuplicateMethod {}

/// Registry of all known methods.
#[derive(Debug, Default)]
pub struct Methodology {
    methods: BTreeMap<String, BTreeMap<Version, Rc<Method>>>,
}

impl Methodology {
    pub fn new() -> Self {
        Methodology::default()
    }

    /// Register a compiled method. Duplicate (name, version) pairs are
    /// rejected; a method is immutable once registered.
    pub fn register(&mut self, method: Method) -> Result<Rc<Method>, DuplicateMethod> {
        let name = method.name().to_string();
        let version = method.version();
        let versions = self.methods.entry(name.clone()).or_default();
        if versions.contains_key(&version) {
            return Err(DuplicateMethod { name, version });
        }
        let method = Rc::new(method);
        versions.insert(version, Rc::clone(&method));
        Ok(method)
    }

    /// Exact (name, version) lookup.
    pub fn get(&self, name: &str, version: Version) -> Option<Rc<Method>> {
        self.methods.get(name)?.get(&version).cloned()
    }

    /// Highest registered version of a method, by component-wise numeric
    /// comparison.
    pub fn latest(&self, name: &str) -> Option<Rc<Method>> {
        let versions = self.methods.get(name)?;
        versions.values().next_back().cloned()
    }

    pub fn resolve(&self, name: &str, selector: &VersionSelector) -> Option<Rc<Method>> {
        match selector {
            VersionSelector::Latest => self.latest(name),
            VersionSelector::Exact(version) => self.get(name, *version),
        }
    }

    pub fn contains(&self, name: &str, version: Version) -> bool {
        self.methods
            .get(name)
            .is_some_and(|versions| versions.contains_key(&version))
    }

    /// Remove a (name, version) entry. Liveness (no agent still running the
    /// method) is the caller's check; the registry only knows registration.
    pub fn unregister(&mut self, name: &str, version: Version) -> bool {
        let Some(versions) = self.methods.get_mut(name) else {
            return false;
        };
        let removed = versions.remove(&version).is_some();
        if versions.is_empty() {
            self.methods.remove(name);
        }
        removed
    }

    pub fn method_count(&self) -> usize {
        self.methods.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// All methods in (name, version) order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<Method>> {
        self.methods.values().flat_map(BTreeMap::values)
    }

    pub fn reset(&mut self) {
        self.methods.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agerun_lang::InstructionParser;
    use agerun_core::Log;

    fn method(name: &str, version: Version) -> Method {
        let parser = InstructionParser::new(Log::new());
        Method::compile(&parser, name, version, "send(0, message)").unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut methodology = Methodology::new();
        methodology.register(method("echo", Version::new(1, 0, 0))).unwrap();
        assert!(methodology.get("echo", Version::new(1, 0, 0)).is_some());
        assert!(methodology.get("echo", Version::new(2, 0, 0)).is_none());
        assert!(methodology.get("other", Version::new(1, 0, 0)).is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut methodology = Methodology::new();
        methodology.register(method("echo", Version::new(1, 0, 0))).unwrap();
        let err = methodology
            .register(method("echo", Version::new(1, 0, 0)))
            .unwrap_err();
        assert_eq!(err.version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_latest_is_numeric_not_lexicographic() {
        let mut methodology = Methodology::new();
        methodology.register(method("m", Version::new(9, 0, 0))).unwrap();
        methodology.register(method("m", Version::new(10, 0, 0))).unwrap();
        methodology.register(method("m", Version::new(2, 5, 0))).unwrap();
        let latest = methodology.latest("m").unwrap();
        assert_eq!(latest.version(), Version::new(10, 0, 0));
    }

    #[test]
    fn test_resolve_selector() {
        let mut methodology = Methodology::new();
        methodology.register(method("m", Version::new(1, 0, 0))).unwrap();
        methodology.register(method("m", Version::new(1, 1, 0))).unwrap();
        let latest = methodology.resolve("m", &VersionSelector::Latest).unwrap();
        assert_eq!(latest.version(), Version::new(1, 1, 0));
        let exact = methodology
            .resolve("m", &VersionSelector::Exact(Version::new(1, 0, 0)))
            .unwrap();
        assert_eq!(exact.version(), Version::new(1, 0, 0));
    }

    #[test]
    fn test_unregister() {
        let mut methodology = Methodology::new();
        methodology.register(method("m", Version::new(1, 0, 0))).unwrap();
        assert!(methodology.unregister("m", Version::new(1, 0, 0)));
        assert!(!methodology.unregister("m", Version::new(1, 0, 0)));
        assert!(methodology.is_empty());
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!(VersionSelector::parse("latest"), Some(VersionSelector::Latest));
        assert_eq!(
            VersionSelector::parse("1.2.3"),
            Some(VersionSelector::Exact(Version::new(1, 2, 3)))
        );
        assert_eq!(VersionSelector::parse("not-a-version"), None);
    }
}
