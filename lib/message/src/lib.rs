//! The keyed record passed between every stage of the pipeline.
//!
//! A [`Message`] pairs a field map with a per-instance type table and a
//! [`TypePolicy`] governing how writes to unknown or mismatched fields are
//! handled. The type table and policy are fixed for the lifetime of a
//! `Message`; only the field map changes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod destination;
mod value;

pub use destination::{Destination, DestinationFrequency};
pub use value::{Value, ValueKind};

/// Field name that write errors are appended to under
/// [`TypePolicy::DropWithError`] and [`TypePolicy::Reject`].
pub const ERROR_FIELD: &str = "_logalike_error";

/// Total, enumerated write policy for unknown or mismatched fields (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypePolicy {
    /// Unknown fields are inserted as given.
    #[default]
    Accept,
    /// Unknown fields are stored as their textual form.
    Stringify,
    /// Unknown or mismatched fields are dropped; an error is appended to
    /// [`ERROR_FIELD`].
    DropWithError,
    /// Unknown fields raise an `unknown-field` error; mismatched fields raise
    /// a `type-mismatch` error. Neither is stored.
    Reject,
}

/// Why a strict read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, snafu::Snafu)]
pub enum GetError {
    #[snafu(display("field not found"))]
    NotFound,
    #[snafu(display("field present but of the wrong type"))]
    TypeMismatch,
}

/// An immutable-by-convention keyed record.
///
/// Equality is defined over `(fields, types, policy)` — not identity and not
/// destinations — so tests can compare an expected message against an actual
/// one regardless of how many destinations either carries.
#[derive(Debug, Clone)]
pub struct Message {
    fields: BTreeMap<String, Value>,
    types: BTreeMap<String, ValueKind>,
    policy: TypePolicy,
    destinations: Vec<Destination>,
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields && self.types == other.types && self.policy == other.policy
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    /// A message with an empty type table and [`TypePolicy::Accept`].
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            types: BTreeMap::new(),
            policy: TypePolicy::default(),
            destinations: Vec::new(),
        }
    }

    /// A message constrained by `types`, written to under `policy`.
    pub fn with_types(types: BTreeMap<String, ValueKind>, policy: TypePolicy) -> Self {
        Self {
            fields: BTreeMap::new(),
            types,
            policy,
            destinations: Vec::new(),
        }
    }

    pub fn policy(&self) -> TypePolicy {
        self.policy
    }

    pub fn types(&self) -> &BTreeMap<String, ValueKind> {
        &self.types
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn add_destination(&mut self, destination: Destination) {
        self.destinations.push(destination);
    }

    /// Write `value` to `key`, applying the type policy (§4.E).
    ///
    /// A field absent from the type table is "unknown" to it; a field
    /// present but whose stored kind would differ from the declared one is
    /// "mismatched". Invariant (a) of §3 — every stored field is either
    /// untyped or assignable to its declared type — means a mismatched write
    /// can never be accepted verbatim under any policy: only the unknown
    /// branch varies by policy (accept/stringify/drop-with-error/reject);
    /// the mismatched branch always drops the write and, for
    /// `drop-with-error` and `reject`, records why.
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.types.get(&key) {
            Some(expected) if *expected == value.kind() => {
                self.fields.insert(key, value);
            }
            Some(expected) => self.reject_mismatch(&key, *expected, value.kind()),
            None => self.write_unknown(key, value),
        }
    }

    fn write_unknown(&mut self, key: String, value: Value) {
        match self.policy {
            TypePolicy::Accept => {
                self.fields.insert(key, value);
            }
            TypePolicy::Stringify => {
                self.fields.insert(key, Value::String(value.to_display_string()));
            }
            TypePolicy::DropWithError => {
                self.push_error(format!("unknown-field: {key}"));
            }
            TypePolicy::Reject => {
                self.push_error(format!("unknown-field: {key}"));
            }
        }
    }

    fn reject_mismatch(&mut self, key: &str, expected: ValueKind, actual: ValueKind) {
        match self.policy {
            TypePolicy::Accept | TypePolicy::Stringify => {}
            TypePolicy::DropWithError | TypePolicy::Reject => {
                self.push_error(format!(
                    "type-mismatch: {key} expected {expected:?}, got {actual:?}"
                ));
            }
        }
    }

    fn push_error(&mut self, message: String) {
        let joined = match self.fields.get(ERROR_FIELD) {
            Some(Value::String(existing)) => format!("{existing}; {message}"),
            _ => message,
        };
        self.fields.insert(ERROR_FIELD.to_string(), Value::String(joined));
    }

    /// Remove and return a field, regardless of type table.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Typed read: `None` if absent or of the wrong kind.
    pub fn get(&self, key: &str, kind: ValueKind) -> Option<&Value> {
        self.fields.get(key).filter(|value| value.kind() == kind)
    }

    /// Untyped read of whatever is stored, if anything.
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Strict typed read: fails loudly instead of returning `None`.
    pub fn get_strict(&self, key: &str, kind: ValueKind) -> Result<&Value, GetError> {
        match self.fields.get(key) {
            None => NotFoundSnafu.fail(),
            Some(value) if value.kind() == kind => Ok(value),
            Some(_) => TypeMismatchSnafu.fail(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.get("@timestamp", ValueKind::Timestamp) {
            Some(Value::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }

    /// Serialize the field map to a JSON document for egress.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}
