//! Scoped settings overrides.
//!
//! Settings live in a per-thread registry of JSON values, so parallel test
//! threads never see each other's overrides. Every change returns a
//! [`SettingsGuard`] that takes the change back out when dropped,
//! including while a failed assertion unwinds.
//!
//! ```
//! use serde_json::{json, Map};
//! use viewtest::settings;
//!
//! let mut values = Map::new();
//! values.insert("PAGE_SIZE".to_string(), json!(50));
//!
//! {
//!     let _guard = settings::override_settings(values);
//!     assert_eq!(settings::get("PAGE_SIZE"), Some(json!(50)));
//! }
//! assert_eq!(settings::get("PAGE_SIZE"), None);
//! ```

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

/// One `override_settings` or `update_settings` call.
struct Layer {
    id: u64,
    values: Map<String, Value>,
    merge: bool,
}

impl Layer {
    fn apply(&self, key: &str, current: Option<Value>) -> Option<Value> {
        let Some(new) = self.values.get(key) else {
            return current;
        };
        match (current, new) {
            (Some(Value::Object(mut current)), Value::Object(new)) if self.merge => {
                current.extend(new.clone());
                Some(Value::Object(current))
            }
            _ => Some(new.clone()),
        }
    }
}

thread_local! {
    // Oldest first; a key's value is the fold of every layer over it.
    static LAYERS: RefCell<Vec<Layer>> = const { RefCell::new(Vec::new()) };
    static NEXT_LAYER: Cell<u64> = const { Cell::new(0) };
}

fn resolve(layers: &[Layer], key: &str) -> Option<Value> {
    layers.iter().fold(None, |current, layer| layer.apply(key, current))
}

/// Returns the current value of `key`.
#[must_use]
pub fn get(key: &str) -> Option<Value> {
    LAYERS.with(|layers| resolve(&layers.borrow(), key))
}

/// Returns the current value of `key` deserialized as `T`.
///
/// # Errors
///
/// Returns the deserialization error when the value has the wrong shape.
pub fn get_as<T: DeserializeOwned>(key: &str) -> Result<Option<T>, serde_json::Error> {
    get(key).map(serde_json::from_value).transpose()
}

/// Returns a copy of every setting on this thread.
#[must_use]
pub fn snapshot() -> Map<String, Value> {
    LAYERS.with(|layers| {
        let layers = layers.borrow();
        let mut out = Map::new();
        for key in layers.iter().flat_map(|layer| layer.values.keys()) {
            if !out.contains_key(key) {
                if let Some(value) = resolve(&layers, key) {
                    out.insert(key.clone(), value);
                }
            }
        }
        out
    })
}

/// Replaces the given keys until the guard is dropped.
pub fn override_settings(values: Map<String, Value>) -> SettingsGuard {
    push(values, false)
}

/// Like [`override_settings`], but object values are merged key-wise into
/// the current object instead of replacing it.
pub fn update_settings(values: Map<String, Value>) -> SettingsGuard {
    push(values, true)
}

fn push(values: Map<String, Value>, merge: bool) -> SettingsGuard {
    let id = NEXT_LAYER.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    for key in values.keys() {
        tracing::trace!(setting = %key, merge, "Overriding setting");
    }
    LAYERS.with(|layers| layers.borrow_mut().push(Layer { id, values, merge }));
    SettingsGuard {
        id,
        _not_send: PhantomData,
    }
}

/// Removes its overrides on drop.
///
/// Guards may be dropped in any order: each one removes only its own layer
/// and the remaining layers still apply in creation order.
#[must_use = "settings are restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SettingsGuard {
    id: u64,
    // Tied to the thread whose registry it modified.
    _not_send: PhantomData<*const ()>,
}

impl Drop for SettingsGuard {
    fn drop(&mut self) {
        // `try_with` so a guard dropped during thread teardown is a no-op.
        let _ = LAYERS.try_with(|layers| layers.borrow_mut().retain(|layer| layer.id != self.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_override_restores_missing_key() {
        {
            let _guard = override_settings(map(json!({"FEATURE": true})));
            assert_eq!(get("FEATURE"), Some(json!(true)));
        }
        assert_eq!(get("FEATURE"), None);
    }

    #[test]
    fn test_nested_overrides_restore_in_order() {
        let _outer = override_settings(map(json!({"LEVEL": 1})));
        {
            let _inner = override_settings(map(json!({"LEVEL": 2})));
            assert_eq!(get("LEVEL"), Some(json!(2)));
        }
        assert_eq!(get("LEVEL"), Some(json!(1)));
    }

    #[test]
    fn test_guards_dropped_out_of_order() {
        let outer = override_settings(map(json!({"MODE": "outer"})));
        let inner = override_settings(map(json!({"MODE": "inner"})));

        drop(outer);
        assert_eq!(get("MODE"), Some(json!("inner")));
        drop(inner);
        assert_eq!(get("MODE"), None);
    }

    #[test]
    fn test_update_survives_base_drop() {
        let base = override_settings(map(json!({"CACHE": {"backend": "locmem", "timeout": 60}})));
        let update = update_settings(map(json!({"CACHE": {"timeout": 5}})));

        drop(base);
        assert_eq!(get("CACHE"), Some(json!({"timeout": 5})));
        drop(update);
        assert!(snapshot().is_empty());
    }

    #[test]
    fn test_update_merges_objects() {
        let _base = override_settings(map(json!({"CACHE": {"backend": "locmem", "timeout": 60}})));
        {
            let _update = update_settings(map(json!({"CACHE": {"timeout": 5}})));
            assert_eq!(get("CACHE"), Some(json!({"backend": "locmem", "timeout": 5})));
        }
        assert_eq!(get("CACHE"), Some(json!({"backend": "locmem", "timeout": 60})));
    }

    #[test]
    fn test_update_replaces_scalars() {
        let _base = override_settings(map(json!({"DEBUG": false})));
        let _update = update_settings(map(json!({"DEBUG": true, "NEW": "x"})));
        assert_eq!(get("DEBUG"), Some(json!(true)));
        assert_eq!(get("NEW"), Some(json!("x")));
    }

    #[test]
    fn test_get_as() {
        let _guard = override_settings(map(json!({"PAGE_SIZE": 25, "NAME": "x"})));
        assert_eq!(get_as::<u32>("PAGE_SIZE").unwrap(), Some(25));
        assert_eq!(get_as::<u32>("MISSING").unwrap(), None);
        assert!(get_as::<u32>("NAME").is_err());
    }

    #[test]
    fn test_restored_during_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _guard = override_settings(map(json!({"PANICKY": 1})));
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(get("PANICKY"), None);
    }

    #[test]
    fn test_threads_are_isolated() {
        let _guard = override_settings(map(json!({"THREAD": "main"})));
        let seen = std::thread::spawn(|| get("THREAD")).join().unwrap();
        assert_eq!(seen, None);
        assert!(snapshot().contains_key("THREAD"));
    }
}
