use serde::{Deserialize, Serialize};
use std::fmt;
use toml::{Table, Value};

/// Parameters of a tree node: a plain structured mapping of numbers, strings, booleans,
/// arrays and nested tables.
///
/// Parameters never reference computed objects, so a tree's shape and parameters can be
/// persisted and rebuilt without any live state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Table);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: Table) -> Self {
        Self(table)
    }

    /// Builder-style insertion, e.g. `Params::new().with("a", 10)`.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.to_string(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Reads a number, accepting both integer and float values.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key)?.as_integer()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key)?.as_bool()
    }

    pub fn get_array(&self, key: &str) -> Option<&[Value]> {
        self.0.get(key)?.as_array().map(Vec::as_slice)
    }

    pub fn get_table(&self, key: &str) -> Option<&Table> {
        self.0.get(key)?.as_table()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_table(&self) -> &Table {
        &self.0
    }

    /// Returns `self` laid over `defaults`: keys present in `self` win, missing keys are
    /// filled from `defaults`. Nested tables are merged recursively.
    pub fn merged_over(&self, defaults: &Params) -> Params {
        Params(merge_tables(&defaults.0, &self.0))
    }
}

fn merge_tables(base: &Table, overlay: &Table) -> Table {
    let mut out = base.clone();
    for (key, value) in overlay {
        let merged = match (out.get(key), value) {
            (Some(Value::Table(b)), Value::Table(o)) => Value::Table(merge_tables(b, o)),
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

impl From<Table> for Params {
    fn from(table: Table) -> Self {
        Self(table)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_read_values() {
        let params = Params::new()
            .with("a", 10)
            .with("scale", 1.5)
            .with("label", "chain A")
            .with("visible", true);
        assert_eq!(params.get_f64("a"), Some(10.0));
        assert_eq!(params.get_i64("a"), Some(10));
        assert_eq!(params.get_f64("scale"), Some(1.5));
        assert_eq!(params.get_i64("scale"), None);
        assert_eq!(params.get_str("label"), Some("chain A"));
        assert_eq!(params.get_bool("visible"), Some(true));
        assert_eq!(params.get_str("missing"), None);
    }

    #[test]
    fn merged_over_fills_missing_keys_from_defaults() {
        let defaults = Params::new().with("index", 0).with("label", "Model");
        let given = Params::new().with("index", 3);
        let merged = given.merged_over(&defaults);
        assert_eq!(merged.get_i64("index"), Some(3));
        assert_eq!(merged.get_str("label"), Some("Model"));
    }

    #[test]
    fn merged_over_merges_nested_tables() {
        let mut inner_default = Table::new();
        inner_default.insert("x".into(), Value::Integer(1));
        inner_default.insert("y".into(), Value::Integer(2));
        let mut inner_given = Table::new();
        inner_given.insert("y".into(), Value::Integer(5));

        let defaults = Params::new().with("offset", inner_default);
        let given = Params::new().with("offset", inner_given);
        let merged = given.merged_over(&defaults);
        let offset = merged.get_table("offset").unwrap();
        assert_eq!(offset.get("x").and_then(Value::as_integer), Some(1));
        assert_eq!(offset.get("y").and_then(Value::as_integer), Some(5));
    }

    #[test]
    fn display_lists_key_value_pairs() {
        let params = Params::new().with("a", 10);
        assert_eq!(params.to_string(), "{a: 10}");
    }
}
