//! Query string decoding.
//!
//! JSON:API query parameters use bracketed member names
//! (`filter[title][value]=x`, `page[limit]=10`). They are decoded into a
//! tree of JSON values so that filter, sort and page parsing can work on
//! structured input. `name[]` appends to a list, and objects whose keys are
//! exactly `0..n` become arrays.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Decoded query parameters of one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    pairs: Vec<(String, String)>,
    tree: Map<String, Value>,
}

enum Segment {
    Key(String),
    Push,
}

impl QueryParameters {
    /// Decodes a raw query string (without the leading `?`).
    pub fn parse(query: Option<&str>) -> Self {
        let pairs: Vec<(String, String)> = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        let mut tree = Value::Object(Map::new());
        for (key, value) in &pairs {
            let (name, segments) = split_key(key);
            let mut path = vec![Segment::Key(name)];
            path.extend(segments);
            insert(&mut tree, &path, Value::String(value.clone()));
        }

        let tree = match normalize(tree) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { pairs, tree }
    }

    /// Returns the decoded value of a top-level parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.tree.get(name)
    }

    /// Returns true if the top-level parameter is present.
    pub fn contains(&self, name: &str) -> bool {
        self.tree.contains_key(name)
    }

    /// Returns the top-level parameter names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tree.keys().map(String::as_str)
    }

    /// Returns the raw decoded pairs in request order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Returns the comma-separated include paths, split on `.`.
    pub fn include_paths(&self) -> Vec<String> {
        match self.tree.get("include") {
            Some(Value::String(include)) => include
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the sparse fieldsets, keyed by resource type name.
    pub fn fieldsets(&self) -> BTreeMap<String, Vec<String>> {
        let Some(Value::Object(fields)) = self.tree.get("fields") else {
            return BTreeMap::new();
        };
        fields
            .iter()
            .filter_map(|(type_name, value)| {
                let list = value.as_str()?;
                let names = list
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(String::from)
                    .collect();
                Some((type_name.clone(), names))
            })
            .collect()
    }
}

/// Splits `a[b][]` into `a` and its bracketed segments. Keys with unbalanced
/// brackets are taken literally.
fn split_key(key: &str) -> (String, Vec<Segment>) {
    let Some(open) = key.find('[').filter(|&i| i > 0) else {
        return (key.to_string(), Vec::new());
    };
    let name = key[..open].to_string();
    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return (key.to_string(), Vec::new());
        };
        let segment = &stripped[..close];
        segments.push(if segment.is_empty() {
            Segment::Push
        } else {
            Segment::Key(segment.to_string())
        });
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return (key.to_string(), Vec::new());
    }
    (name, segments)
}

fn insert(node: &mut Value, path: &[Segment], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };
    let key = match segment {
        Segment::Key(key) => key.clone(),
        Segment::Push => map.len().to_string(),
    };
    let child = map.entry(key).or_insert(Value::Null);
    insert(child, rest, value);
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let is_list =
                !map.is_empty() && (0..map.len()).all(|i| map.contains_key(&i.to_string()));
            if is_list {
                let mut items: Vec<(usize, Value)> = map
                    .into_iter()
                    .filter_map(|(key, value)| Some((key.parse().ok()?, normalize(value))))
                    .collect();
                items.sort_by_key(|(index, _)| *index);
                Value::Array(items.into_iter().map(|(_, value)| value).collect())
            } else {
                Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect())
            }
        }
        other => other,
    }
}
