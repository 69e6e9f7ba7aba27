//! Per-query hint map: string keys to string values, with typed getters.
//!
//! Hints carry request-scoped knobs (weighting selection, disable switches,
//! budgets) without widening every function signature on the query path.

use rustc_hash::FxHashMap;

/// Well-known hint keys.
pub mod keys {
    /// Requested weighting name ("fastest", "shortest").
    pub const WEIGHTING: &str = "weighting";
    /// Requested vehicle name ("car", "foot", "bike").
    pub const VEHICLE: &str = "vehicle";
    /// Request asks to bypass the core engine for this query.
    pub const CORE_DISABLE: &str = "core.disable";
    /// Visited-node budget for a single query.
    pub const MAX_VISITED: &str = "max_visited_nodes";
}

#[derive(Debug, Clone, Default)]
pub struct QueryHints {
    map: FxHashMap<String, String>,
}

impl QueryHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &str, value: impl ToString) {
        self.map.insert(key.to_string(), value.to_string());
    }

    /// Builder-style insert for one-liners in tests and call sites.
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.put(key, value);
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.map.get(key).map(String::as_str) {
            Some("true") | Some("1") | Some("yes") => Some(true),
            Some("false") | Some("0") | Some("no") => Some(false),
            _ => None,
        }
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.map.get(key).and_then(|v| v.parse().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
