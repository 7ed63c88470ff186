//! Value: what agents talk about
//!
//! A `Value` is pure data with no identity beyond its contents: integers,
//! doubles, strings, maps, and lists. Containers own their contents, so
//! `Clone` is a structural deep copy with no shared heap state. This is the
//! only currency of the runtime: agent memory, messages, and contexts are
//! all `Value`s.
//!
//! # Why BTreeMap?
//!
//! `MapValue` uses `BTreeMap` (not `HashMap`) for deterministic iteration.
//! The same logical map always serializes to identical bytes, which matters
//! for reproducible snapshots and for stable test output. Maps here are
//! small (agent memories), so the O(log n) lookup is irrelevant.

use std::collections::BTreeMap;
use std::fmt;

/// Discriminant of a [`Value`], used for type checks without matching payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Double,
    String,
    Map,
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Integer => "integer",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Map => "map",
            ValueKind::List => "list",
        };
        f.write_str(name)
    }
}

/// Tagged runtime value.
///
/// Wrong-variant accessors return the typed zero (0, 0.0, "") instead of
/// panicking; a malformed program degrades, it does not abort the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer. Booleans are represented as integer 0/1.
    Integer(i64),

    /// IEEE 754 double precision float.
    Double(f64),

    /// UTF-8 string.
    String(String),

    /// String-keyed map of values. Insertion overwrites (and drops) any
    /// previous value under the same key.
    Map(MapValue),

    /// Ordered list of values.
    List(ListValue),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Map(_) => ValueKind::Map,
            Value::List(_) => ValueKind::List,
        }
    }

    /// Integer payload, or 0 for any other variant.
    pub fn as_integer(&self) -> i64 {
        match self {
            Value::Integer(n) => *n,
            _ => 0,
        }
    }

    /// Double payload, or 0.0 for any other variant.
    pub fn as_double(&self) -> f64 {
        match self {
            Value::Double(d) => *d,
            _ => 0.0,
        }
    }

    /// String payload, or "" for any other variant.
    pub fn as_str(&self) -> &str {
        match self {
            Value::String(s) => s.as_str(),
            _ => "",
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// String rendering for template substitution: integers in decimal,
    /// doubles in shortest round-trip form, strings verbatim. Containers
    /// have no rendering and return `None`.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Integer(n) => Some(n.to_string()),
            Value::Double(d) => Some(d.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Map(_) | Value::List(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<MapValue> for Value {
    fn from(m: MapValue) -> Self {
        Value::Map(m)
    }
}

impl From<ListValue> for Value {
    fn from(l: ListValue) -> Self {
        Value::List(l)
    }
}

/// String-keyed map with dotted-path access.
///
/// A path `a.b.c` names the value under `c` inside the map under `b` inside
/// the map under `a`. Writes create intermediate maps as needed; reads and
/// writes both fail when a path component traverses an existing non-map
/// value (traversal never retypes a value in place).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapValue {
    entries: BTreeMap<String, Value>,
}

impl MapValue {
    pub fn new() -> Self {
        MapValue::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert under a single key, dropping any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Key iteration as a list of string values.
    pub fn key_list(&self) -> ListValue {
        let mut list = ListValue::new();
        for key in self.entries.keys() {
            list.add_last(Value::String(key.clone()));
        }
        list
    }

    /// Walk a dotted path through nested maps. `None` when any component is
    /// missing or the walk reaches a non-map before the last component.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut components = path.split('.');
        let first = components.next()?;
        let mut current = self.entries.get(first)?;
        for component in components {
            current = current.as_map()?.get(component)?;
        }
        Some(current)
    }

    /// Walk a dotted path and hand the value back mutably.
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut components = path.split('.');
        let first = components.next()?;
        let mut current = self.entries.get_mut(first)?;
        for component in components {
            current = match current {
                Value::Map(m) => m.get_mut(component)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Store a value under a dotted path, creating intermediate maps as
    /// needed. On failure (empty path component, or traversal through an
    /// existing non-map) the value is handed back to the caller unchanged.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<(), Value> {
        let components: Vec<&str> = path.split('.').collect();
        if components.iter().any(|c| c.is_empty()) {
            return Err(value);
        }
        // Walk ahead read-only first so a failed write leaves no half-built
        // intermediate maps behind.
        let mut probe: Option<&Value> = None;
        for component in &components[..components.len() - 1] {
            probe = match probe {
                None => self.entries.get(*component),
                Some(Value::Map(m)) => m.get(component),
                Some(_) => return Err(value),
            };
            if probe.is_none() {
                break;
            }
        }
        if let Some(v) = probe {
            if components.len() > 1 && v.as_map().is_none() {
                return Err(value);
            }
        }

        let mut current = &mut self.entries;
        for component in &components[..components.len() - 1] {
            let slot = current
                .entry((*component).to_string())
                .or_insert_with(|| Value::Map(MapValue::new()));
            current = match slot {
                Value::Map(m) => &mut m.entries,
                _ => return Err(value),
            };
        }
        current.insert(components[components.len() - 1].to_string(), value);
        Ok(())
    }
}

/// Ordered list of values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListValue {
    items: Vec<Value>,
}

impl ListValue {
    pub fn new() -> Self {
        ListValue::default()
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&Value> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&Value> {
        self.items.last()
    }

    pub fn add_last(&mut self, value: Value) {
        self.items.push(value);
    }

    pub fn remove_first(&mut self) -> Option<Value> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    pub fn remove_last(&mut self) -> Option<Value> {
        self.items.pop()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }
}

impl FromIterator<Value> for ListValue {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        ListValue {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_zero_accessors() {
        let s = Value::String("hello".to_string());
        assert_eq!(s.as_integer(), 0);
        assert_eq!(s.as_double(), 0.0);
        assert_eq!(s.as_str(), "hello");

        let n = Value::Integer(42);
        assert_eq!(n.as_integer(), 42);
        assert_eq!(n.as_str(), "");
        assert!(n.as_map().is_none());
    }

    #[test]
    fn test_render_scalars() {
        assert_eq!(Value::Integer(-7).render().as_deref(), Some("-7"));
        assert_eq!(Value::Double(2.5).render().as_deref(), Some("2.5"));
        assert_eq!(
            Value::String("x".to_string()).render().as_deref(),
            Some("x")
        );
        assert!(Value::Map(MapValue::new()).render().is_none());
    }

    #[test]
    fn test_map_insert_overwrites() {
        let mut map = MapValue::new();
        map.insert("k", Value::Integer(1));
        map.insert("k", Value::String("two".to_string()));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("k"), Some(&Value::String("two".to_string())));
    }

    #[test]
    fn test_get_path_nested() {
        let mut inner = MapValue::new();
        inner.insert("c", Value::Integer(3));
        let mut mid = MapValue::new();
        mid.insert("b", Value::Map(inner));
        let mut map = MapValue::new();
        map.insert("a", Value::Map(mid));

        assert_eq!(map.get_path("a.b.c"), Some(&Value::Integer(3)));
        assert_eq!(map.get_path("a.b.missing"), None);
        assert_eq!(map.get_path("a.b.c.deeper"), None);
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut map = MapValue::new();
        assert!(map.set_path("a.b.c", Value::Integer(9)).is_ok());
        assert_eq!(map.get_path("a.b.c"), Some(&Value::Integer(9)));
    }

    #[test]
    fn test_set_path_through_non_map_fails() {
        let mut map = MapValue::new();
        map.insert("a", Value::Integer(1));
        let rejected = map.set_path("a.b", Value::Integer(2));
        assert_eq!(rejected, Err(Value::Integer(2)));
        // The existing value is untouched.
        assert_eq!(map.get("a"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_set_path_failure_builds_nothing() {
        let mut map = MapValue::new();
        map.insert("x", Value::Integer(1));
        assert!(map.set_path("a.x.c", Value::Integer(2)).is_ok());
        // A later failing write must not leave partial intermediates.
        let mut map2 = MapValue::new();
        map2.insert("leaf", Value::String("s".to_string()));
        assert!(map2.set_path("a.leaf.q", Value::Integer(1)).is_ok());
        assert!(map2.set_path("leaf.q.r", Value::Integer(1)).is_err());
        assert_eq!(map2.get("leaf"), Some(&Value::String("s".to_string())));
    }

    #[test]
    fn test_deep_copy_is_ownership_distinct() {
        let mut map = MapValue::new();
        map.set_path("a.b", Value::String("orig".to_string()))
            .unwrap();
        let original = Value::Map(map);
        let mut copy = original.clone();
        assert_eq!(original, copy);

        if let Value::Map(m) = &mut copy {
            m.set_path("a.b", Value::String("changed".to_string()))
                .unwrap();
        }
        // Mutating the copy must not reach back into the original.
        if let Value::Map(m) = &original {
            assert_eq!(
                m.get_path("a.b"),
                Some(&Value::String("orig".to_string()))
            );
        }
    }

    #[test]
    fn test_list_order() {
        let mut list = ListValue::new();
        list.add_last(Value::Integer(1));
        list.add_last(Value::Integer(2));
        list.add_last(Value::Integer(3));
        assert_eq!(list.count(), 3);
        assert_eq!(list.first(), Some(&Value::Integer(1)));
        assert_eq!(list.last(), Some(&Value::Integer(3)));
        assert_eq!(list.remove_first(), Some(Value::Integer(1)));
        assert_eq!(list.remove_last(), Some(Value::Integer(3)));
        assert_eq!(list.count(), 1);
    }

    #[test]
    fn test_key_list() {
        let mut map = MapValue::new();
        map.insert("b", Value::Integer(2));
        map.insert("a", Value::Integer(1));
        let keys = map.key_list();
        // BTreeMap iteration order is sorted, so key lists are stable.
        assert_eq!(keys.get(0), Some(&Value::String("a".to_string())));
        assert_eq!(keys.get(1), Some(&Value::String("b".to_string())));
    }
}
