//! Ordered, string-keyed collection of JSON values with dotted-path access.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An insertion-ordered map of JSON values.
///
/// Keys passed to [`get`](Self::get), [`set`](Self::set), [`has`](Self::has)
/// and [`forget`](Self::forget) are dotted paths (`"data.items.0.id"`).
/// A key that exists verbatim (dots included) is used before path traversal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection {
    items: Map<String, Value>,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from any JSON value.
    ///
    /// Maps are taken as-is, list elements are keyed by index, `null` gives an
    /// empty collection and scalars are stored under key `"0"`.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let items = match value {
            Value::Object(map) => map,
            Value::Array(list) => indexed(list),
            Value::Null => Map::new(),
            scalar => indexed(vec![scalar]),
        };
        Self { items }
    }

    /// Value at a dotted path.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.items.get(key) {
            return Some(value);
        }
        let mut segments = key.split('.');
        let first = segments.next()?;
        segments.try_fold(self.items.get(first)?, |current, segment| {
            step(current, segment)
        })
    }

    /// Value at a dotted path, or `default` when absent.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    /// Whether a dotted path resolves to a value.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets the value at a dotted path, creating intermediate maps.
    ///
    /// A non-map value met along the path is replaced by a map.
    pub fn set(&mut self, key: &str, value: Value) {
        let mut segments: Vec<&str> = key.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };
        let mut current = &mut self.items;
        for segment in segments {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(next) = slot else {
                return;
            };
            current = next;
        }
        current.insert(last.to_string(), value);
    }

    /// Removes the value at a dotted path, returning it.
    pub fn forget(&mut self, key: &str) -> Option<Value> {
        if let Some(value) = self.items.shift_remove(key) {
            return Some(value);
        }
        let (parent, last) = key.rsplit_once('.')?;
        let mut segments = parent.split('.');
        let first = segments.next()?;
        let mut current = self.items.get_mut(first)?;
        for segment in segments {
            current = step_mut(current, segment)?;
        }
        match current {
            Value::Object(map) => map.shift_remove(last),
            _ => None,
        }
    }

    /// Top-level keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Top-level values, in order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.values()
    }

    /// Iterates over top-level entries, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.items.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First top-level entry.
    #[must_use]
    pub fn first(&self) -> Option<(&str, &Value)> {
        self.iter().next()
    }

    /// Last top-level entry.
    #[must_use]
    pub fn last(&self) -> Option<(&str, &Value)> {
        self.iter().last()
    }

    /// A new collection keeping only the given dotted keys that exist.
    #[must_use]
    pub fn only(&self, keys: &[&str]) -> Self {
        let mut picked = Self::new();
        for key in keys {
            if let Some(value) = self.get(key) {
                picked.set(key, value.clone());
            }
        }
        picked
    }

    /// A new collection without the given dotted keys.
    #[must_use]
    pub fn except(&self, keys: &[&str]) -> Self {
        let mut rest = self.clone();
        for key in keys {
            rest.forget(key);
        }
        rest
    }

    /// Merges `other` on top of this collection (top-level keys, `other` wins).
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.items.extend(other.items);
        self
    }

    /// Borrow the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.items
    }

    /// The collection as a JSON map value.
    #[must_use]
    pub fn to_array(&self) -> Value {
        Value::Object(self.items.clone())
    }

    /// Consume into the underlying map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.items
    }

    /// Serialize the collection as a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(&self.items).map_err(Into::into)
    }
}

fn indexed(list: Vec<Value>) -> Map<String, Value> {
    list.into_iter()
        .enumerate()
        .map(|(index, value)| (index.to_string(), value))
        .collect()
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(list) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| list.get_mut(i)),
        _ => None,
    }
}

impl From<Map<String, Value>> for Collection {
    fn from(items: Map<String, Value>) -> Self {
        Self { items }
    }
}

impl From<Value> for Collection {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<Collection> for Value {
    fn from(collection: Collection) -> Self {
        Self::Object(collection.items)
    }
}

impl IntoIterator for Collection {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<(String, Value)> for Collection {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Collection {
        Collection::from_value(json!({
            "errcode": 0,
            "data": {"items": [{"id": 7}, {"id": 9}], "total": 2},
            "a.b": "literal"
        }))
    }

    #[test]
    fn dotted_get() {
        let items = sample();
        assert_eq!(items.get("errcode"), Some(&json!(0)));
        assert_eq!(items.get("data.total"), Some(&json!(2)));
        assert_eq!(items.get("data.items.1.id"), Some(&json!(9)));
        assert_eq!(items.get("data.items.5.id"), None);
        assert_eq!(items.get("a.b"), Some(&json!("literal")));
        assert!(items.has("data.items"));
        assert!(!items.has("data.missing"));
    }

    #[test]
    fn dotted_set_creates_maps() {
        let mut items = Collection::new();
        items.set("http.timeout", json!(5.0));
        items.set("http.headers.Accept", json!("application/json"));
        items.set("name", json!("demo"));

        assert_eq!(
            items.to_array(),
            json!({"http": {"timeout": 5.0, "headers": {"Accept": "application/json"}}, "name": "demo"})
        );
    }

    #[test]
    fn forget_nested_and_literal() {
        let mut items = sample();
        assert_eq!(items.forget("data.total"), Some(json!(2)));
        assert_eq!(items.forget("a.b"), Some(json!("literal")));
        assert_eq!(items.forget("data.nope"), None);
        assert!(!items.has("data.total"));
    }

    #[test]
    fn list_and_scalar_sources() {
        let list = Collection::from_value(json!(["x", "y"]));
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["0", "1"]);
        assert_eq!(list.last(), Some(("1", &json!("y"))));

        assert!(Collection::from_value(Value::Null).is_empty());
        assert_eq!(Collection::from_value(json!(3)).get("0"), Some(&json!(3)));
    }

    #[test]
    fn only_except_merge() {
        let items = sample();
        assert_eq!(
            items.only(&["errcode", "data.total"]).to_array(),
            json!({"errcode": 0, "data": {"total": 2}})
        );

        let rest = items.except(&["data", "a.b"]);
        assert_eq!(rest.to_array(), json!({"errcode": 0}));

        let merged = rest.merge(Collection::from_value(json!({"errcode": 1, "ok": true})));
        assert_eq!(merged.to_array(), json!({"errcode": 1, "ok": true}));
    }

    #[test]
    fn keeps_insertion_order() {
        let items = Collection::from_value(json!({"z": 1, "a": 2, "m": 3}));
        assert_eq!(items.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
        assert_eq!(items.to_json().expect("json"), r#"{"z":1,"a":2,"m":3}"#);
    }
}
