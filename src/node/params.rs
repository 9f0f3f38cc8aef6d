//! Query parameter extraction
//!
//! A node's parameter list is a comma-separated list of dotted paths such as
//! `msg.payload.id,msg.topic`. Each path is walked from a synthetic root
//! `{msg: <message>}` to produce one positional parameter.

use crate::node::message::Message;
use serde_json::Value;

/// One dotted path, split into field segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPath(Vec<String>);

impl ParameterPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl<S: Into<String>> FromIterator<S> for ParameterPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Split `a.b,c.d` into `[["a","b"],["c","d"]]`. Segments are not trimmed.
pub fn parse_paths(list: &str) -> Vec<ParameterPath> {
    list.split(',')
        .map(|path| path.split('.').collect::<ParameterPath>())
        .collect()
}

/// Walk one path through a JSON value.
///
/// Objects are indexed by key, arrays by decimal index; anything else, or a
/// missing key, ends the walk with `None`.
pub fn lookup<'v>(root: &'v Value, path: &ParameterPath) -> Option<&'v Value> {
    path.segments().iter().try_fold(root, |value, field| match value {
        Value::Object(map) => map.get(field),
        Value::Array(items) => field.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolve every path against `{msg: message}`, positionally.
pub fn resolve(message: &Message, paths: &[ParameterPath]) -> Vec<Option<Value>> {
    let mut root = serde_json::Map::new();
    root.insert("msg".to_string(), Value::Object(message.fields().clone()));
    let root = Value::Object(root);

    paths
        .iter()
        .map(|path| lookup(&root, path).cloned())
        .collect()
}
