use std::collections::BTreeMap;
use std::io;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Errors raised by memento storage.
/// 狀態儲存區可能發生的錯誤。
#[derive(Debug, Error)]
pub enum MementoError {
    #[error("memento IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid memento payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("memento storage is unavailable: {0}")]
    Unavailable(String),
}

/// Small scoped key-value state owned by the host (one instance per workspace).
/// 由宿主提供、以工作區為範圍的鍵值狀態。
///
/// Implementations must offer read-your-writes consistency within a process.
pub trait Memento: Send + Sync {
    /// Raw stored value, `None` when the key is absent.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`; `None` deletes the key.
    fn update(&self, key: &str, value: Option<Value>) -> Result<(), MementoError>;

    /// Keys currently holding a value.
    fn keys(&self) -> Vec<String>;
}

/// Typed accessors layered over any [`Memento`].
pub trait MementoExt: Memento {
    /// Reads and deserialises `key`, falling back to `default` when the key is
    /// absent or holds a value of another shape.
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(value) => match serde_json::from_value(value) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(key, error = %err, "ignoring memento value with unexpected shape");
                    default
                }
            },
            None => default,
        }
    }

    /// Serialises and stores `value` under `key`.
    fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), MementoError> {
        let value = serde_json::to_value(value)?;
        self.update(key, Some(value))
    }

    fn remove(&self, key: &str) -> Result<(), MementoError> {
        self.update(key, None)
    }
}

impl<M: Memento + ?Sized> MementoExt for M {}

/// Process-local memento; nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryMemento {
    values: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryMemento {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Memento for InMemoryMemento {
    fn get(&self, key: &str) -> Option<Value> {
        self.values().get(key).cloned()
    }

    fn update(&self, key: &str, value: Option<Value>) -> Result<(), MementoError> {
        let mut values = self.values();
        match value {
            Some(value) => {
                values.insert(key.to_string(), value);
            }
            None => {
                values.remove(key);
            }
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.values().keys().cloned().collect()
    }
}
