//! Field addressing for arbitrary JSON documents.
//!
//! A [`FieldSelector`] is a dot-notation path such as `metadata.summary` or
//! `question[*][*].content`. Resolving a [`FieldSelection`] against a document
//! yields [`FieldLocation`]s: concrete key/index paths that each end on a
//! string leaf. The same traversal rules are used by [`get`] and [`set`], so a
//! location resolved from a document can always be written back into a clone
//! of that document.
//!
//! # Selector syntax
//!
//! - `title`: top-level key
//! - `metadata.summary`: nested keys
//! - `items[*].name`: every element of `items`
//! - `items[0].name`: first element only
//! - `[*].title`: every element of a top-level array
//!
//! A key segment that lands on an array fans out over every element, so
//! `items.name` behaves like `items[*].name`. A selector that ends on an
//! array addresses each string inside it.

use crate::error::{ConfigError, WriteBackError};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SelectorStep {
    Key(String),
    AnyIndex,
    Index(usize),
}

/// A parsed dot-notation field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    raw: String,
    steps: Vec<SelectorStep>,
}

impl FieldSelector {
    /// Parse a selector, rejecting syntax the resolver does not understand.
    pub fn parse(path: &str) -> Result<Self, ConfigError> {
        let raw = path.trim();
        let invalid = |reason: &str| ConfigError::InvalidSelector {
            selector: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("empty path"));
        }

        let mut steps = Vec::new();
        for segment in raw.split('.') {
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }

            let (name, mut rest) = match segment.find('[') {
                Some(pos) => segment.split_at(pos),
                None => (segment, ""),
            };
            if name.contains(']') {
                return Err(invalid("unexpected ']'"));
            }
            if !name.is_empty() {
                steps.push(SelectorStep::Key(name.to_string()));
            }

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unclosed '['"))?;
                let inner = &rest[1..close];
                let step = if inner == "*" {
                    SelectorStep::AnyIndex
                } else {
                    inner
                        .parse::<usize>()
                        .map(SelectorStep::Index)
                        .map_err(|_| invalid(&format!("unsupported index '[{}]'", inner)))?
                };
                steps.push(step);

                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("expected '.' or '[' after ']'"));
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Which strings of a document get translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    /// Every string leaf, wherever it is.
    Auto,
    /// Only strings reached by these selectors, in this order.
    Paths(Vec<FieldSelector>),
}

impl FieldSelection {
    pub const AUTO_SENTINEL: &'static str = "auto";

    /// Build a selection from raw paths. No paths, or the single path `auto`,
    /// selects every string leaf.
    pub fn from_paths<S: AsRef<str>>(paths: &[S]) -> Result<Self, ConfigError> {
        let paths: Vec<&str> = paths
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .collect();

        if paths.is_empty()
            || (paths.len() == 1 && paths[0].eq_ignore_ascii_case(Self::AUTO_SENTINEL))
        {
            return Ok(FieldSelection::Auto);
        }

        paths
            .into_iter()
            .map(FieldSelector::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(FieldSelection::Paths)
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, FieldSelection::Auto)
    }
}

impl fmt::Display for FieldSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSelection::Auto => f.write_str("(auto-detect all string fields)"),
            FieldSelection::Paths(selectors) => {
                let joined = selectors
                    .iter()
                    .map(FieldSelector::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                f.write_str(&joined)
            }
        }
    }
}

/// One step of a resolved location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

/// A resolved pointer to a single string leaf of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldLocation(Vec<PathStep>);

impl FieldLocation {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }
}

impl fmt::Display for FieldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(root)");
        }
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathStep::Key(key) => write!(f, ".{}", key)?,
                PathStep::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Resolve a selection against a document.
///
/// Locations come out in a deterministic order: for `Auto`, depth-first with
/// object keys in declared order and array elements by index; for `Paths`,
/// all locations of the first selector, then the second, and so on. A location
/// reached by more than one selector is reported once, at its first position.
pub fn resolve(document: &Value, selection: &FieldSelection) -> Vec<FieldLocation> {
    let mut locations = Vec::new();
    let mut path = Vec::new();

    match selection {
        FieldSelection::Auto => collect_strings(document, &mut path, &mut locations),
        FieldSelection::Paths(selectors) => {
            let mut seen = HashSet::new();
            for selector in selectors {
                let mut hits = Vec::new();
                walk(document, &selector.steps, &mut path, &mut hits);
                for hit in hits {
                    if seen.insert(hit.clone()) {
                        locations.push(hit);
                    }
                }
            }
        }
    }

    locations
}

fn collect_strings(value: &Value, path: &mut Vec<PathStep>, out: &mut Vec<FieldLocation>) {
    match value {
        Value::String(_) => out.push(FieldLocation(path.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(PathStep::Index(index));
                collect_strings(item, path, out);
                path.pop();
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                path.push(PathStep::Key(key.clone()));
                collect_strings(child, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

fn walk(
    value: &Value,
    steps: &[SelectorStep],
    path: &mut Vec<PathStep>,
    out: &mut Vec<FieldLocation>,
) {
    let Some((step, rest)) = steps.split_first() else {
        match value {
            Value::String(_) => out.push(FieldLocation(path.clone())),
            Value::Array(items) => fan_out(items, steps, path, out),
            _ => {}
        }
        return;
    };

    match (step, value) {
        (SelectorStep::Key(key), Value::Object(map)) => {
            if let Some(child) = map.get(key) {
                path.push(PathStep::Key(key.clone()));
                walk(child, rest, path, out);
                path.pop();
            }
        }
        // Implicit wildcard: the key is looked up in every element.
        (SelectorStep::Key(_), Value::Array(items)) => fan_out(items, steps, path, out),
        (SelectorStep::AnyIndex, Value::Array(items)) => fan_out(items, rest, path, out),
        (SelectorStep::Index(index), Value::Array(items)) => {
            if let Some(child) = items.get(*index) {
                path.push(PathStep::Index(*index));
                walk(child, rest, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

fn fan_out(
    items: &[Value],
    steps: &[SelectorStep],
    path: &mut Vec<PathStep>,
    out: &mut Vec<FieldLocation>,
) {
    for (index, item) in items.iter().enumerate() {
        path.push(PathStep::Index(index));
        walk(item, steps, path, out);
        path.pop();
    }
}

/// Read the string at `location`, if the document still has one there.
pub fn get<'a>(document: &'a Value, location: &FieldLocation) -> Option<&'a str> {
    let mut current = document;
    for step in &location.0 {
        current = match (step, current) {
            (PathStep::Key(key), Value::Object(map)) => map.get(key)?,
            (PathStep::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    current.as_str()
}

/// Replace the string at exactly `location`.
///
/// Fails if any step is missing or the target is not a string. Locations
/// produced by [`resolve`] on the same document never fail.
pub fn set(
    document: &mut Value,
    location: &FieldLocation,
    value: impl Into<String>,
) -> Result<(), WriteBackError> {
    let mut current = document;
    for (depth, step) in location.0.iter().enumerate() {
        let next = match (step, current) {
            (PathStep::Key(key), Value::Object(map)) => map.get_mut(key),
            (PathStep::Index(index), Value::Array(items)) => items.get_mut(*index),
            _ => None,
        };
        current = next.ok_or_else(|| WriteBackError {
            location: location.to_string(),
            reason: format!("path step {} does not exist", depth + 1),
        })?;
    }

    match current {
        Value::String(slot) => {
            *slot = value.into();
            Ok(())
        }
        other => Err(WriteBackError {
            location: location.to_string(),
            reason: format!("expected a string, found {}", value_kind(other)),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
