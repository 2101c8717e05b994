//! Persistence assertions.
//!
//! Assertions are written against the [`InstanceStore`] trait, so a test
//! can point them at its own repository fake. [`MemoryStore`] is a ready-made
//! one keyed by an auto-incremented primary key.
//!
//! A lookup is a JSON value: an object matches instances whose fields equal
//! every given entry (`"pk"` matches the primary key), `null` matches every
//! instance, anything else matches none.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Primary key.
    pub pk: u64,
    /// Field values.
    pub fields: Map<String, Value>,
}

impl Instance {
    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns true if this instance satisfies `lookup`.
    #[must_use]
    pub fn matches(&self, lookup: &Value) -> bool {
        match lookup {
            Value::Null => true,
            Value::Object(conditions) => conditions.iter().all(|(field, expected)| {
                if field == "pk" {
                    expected.as_u64() == Some(self.pk)
                } else {
                    self.fields.get(field) == Some(expected)
                }
            }),
            _ => false,
        }
    }
}

/// Read access to stored instances of one model.
pub trait InstanceStore {
    /// Name used in assertion messages.
    fn model_name(&self) -> &str;

    /// Counts instances matching `lookup`.
    fn count_matching(&self, lookup: &Value) -> usize;

    /// Loads an instance by primary key.
    fn get(&self, pk: u64) -> Option<Instance>;
}

/// An in-memory [`InstanceStore`].
#[derive(Debug)]
pub struct MemoryStore {
    model: String,
    rows: RwLock<BTreeMap<u64, Map<String, Value>>>,
    next_pk: RwLock<u64>,
}

impl MemoryStore {
    /// Creates an empty store for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            rows: RwLock::new(BTreeMap::new()),
            next_pk: RwLock::new(1),
        }
    }

    /// Inserts a row and returns it with its new primary key.
    pub fn create(&self, fields: Map<String, Value>) -> Instance {
        let pk = {
            let mut next = self.next_pk.write();
            let pk = *next;
            *next += 1;
            pk
        };
        self.rows.write().insert(pk, fields.clone());
        tracing::trace!(model = %self.model, pk, "Created instance");
        Instance { pk, fields }
    }

    /// Merges `fields` into an existing row. Returns false when `pk` is unknown.
    pub fn update(&self, pk: u64, fields: Map<String, Value>) -> bool {
        match self.rows.write().get_mut(&pk) {
            Some(row) => {
                row.extend(fields);
                true
            }
            None => false,
        }
    }

    /// Deletes a row. Returns false when `pk` is unknown.
    pub fn delete(&self, pk: u64) -> bool {
        self.rows.write().remove(&pk).is_some()
    }

    /// Deletes every row matching `lookup` and returns how many went.
    pub fn delete_matching(&self, lookup: &Value) -> usize {
        let doomed: Vec<u64> = self.filter(lookup).into_iter().map(|i| i.pk).collect();
        let mut rows = self.rows.write();
        for pk in &doomed {
            rows.remove(pk);
        }
        doomed.len()
    }

    /// Returns the rows matching `lookup`, by ascending primary key.
    #[must_use]
    pub fn filter(&self, lookup: &Value) -> Vec<Instance> {
        self.rows
            .read()
            .iter()
            .map(|(pk, fields)| Instance {
                pk: *pk,
                fields: fields.clone(),
            })
            .filter(|instance| instance.matches(lookup))
            .collect()
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl InstanceStore for MemoryStore {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn count_matching(&self, lookup: &Value) -> usize {
        self.filter(lookup).len()
    }

    fn get(&self, pk: u64) -> Option<Instance> {
        self.rows.read().get(&pk).map(|fields| Instance {
            pk,
            fields: fields.clone(),
        })
    }
}

/// Reloads an instance from `store`; `None` if it was deleted.
#[must_use]
pub fn refresh(store: &dyn InstanceStore, pk: u64) -> Option<Instance> {
    store.get(pk)
}

/// Asserts at least one instance matches `lookup`.
///
/// # Panics
///
/// When nothing matches.
#[track_caller]
pub fn assert_instance_exists(store: &dyn InstanceStore, lookup: &Value) {
    assert!(
        store.count_matching(lookup) > 0,
        "{} instance with {lookup} does not exist",
        store.model_name()
    );
}

/// Asserts no instance matches `lookup`.
///
/// # Panics
///
/// When something matches.
#[track_caller]
pub fn assert_instance_does_not_exist(store: &dyn InstanceStore, lookup: &Value) {
    let count = store.count_matching(lookup);
    assert!(
        count == 0,
        "{} instance with {lookup} exists ({count} found)",
        store.model_name()
    );
}

/// Runs `f` and asserts it increased the number of instances matching `lookup`.
///
/// # Panics
///
/// When the count did not grow.
#[track_caller]
pub fn assert_instance_created<R>(store: &dyn InstanceStore, lookup: &Value, f: impl FnOnce() -> R) -> R {
    let before = store.count_matching(lookup);
    let result = f();
    let after = store.count_matching(lookup);
    assert!(
        after > before,
        "{} instance with {lookup} was not created ({before} before, {after} after)",
        store.model_name()
    );
    result
}

/// Runs `f` and asserts it decreased the number of instances matching `lookup`.
///
/// # Panics
///
/// When the count did not shrink.
#[track_caller]
pub fn assert_instance_deleted<R>(store: &dyn InstanceStore, lookup: &Value, f: impl FnOnce() -> R) -> R {
    let before = store.count_matching(lookup);
    let result = f();
    let after = store.count_matching(lookup);
    assert!(
        after < before,
        "{} instance with {lookup} was not deleted ({before} before, {after} after)",
        store.model_name()
    );
    result
}
