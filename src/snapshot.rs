//! Key/value snapshots of devices.
//!
//! ```text
//!   Device ──serialize()──▶ Snapshot ──▶ SnapshotStore (port)
//!          ◀─deserialize()─          ◀──
//! ```
//!
//! Only fields flagged `Serializable` in the entity's property table are
//! written. `Board::save_snapshots` covers every registered device. Stores are adapters; the engine never persists on its own.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::Described;

/// One field value inside a snapshot or change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Text(String),
    None,
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::None, Into::into)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::None => f.write_str("-"),
        }
    }
}

/// Field name → value.
pub type Snapshot = BTreeMap<String, FieldValue>;

/// An entity whose serializable fields can be captured and restored.
pub trait Persistable: Described {
    /// Key under which the entity is stored.
    fn snapshot_key(&self) -> String;

    /// Capture every field flagged `Serializable`.
    fn serialize(&self) -> Snapshot;

    /// Restore fields present in `snapshot`; unknown keys are ignored.
    fn deserialize(&self, snapshot: &Snapshot);
}

// ───────────────────────────────────────────────────────────────
// Snapshot store port (driven adapter: engine ↔ persistence)
// ───────────────────────────────────────────────────────────────

/// Errors from [`SnapshotStore`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Stored blob failed to decode.
    Corrupted,
    /// Snapshot could not be encoded.
    Encode,
    /// Generic backend failure.
    IoError,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "snapshot corrupted"),
            Self::Encode => write!(f, "snapshot encode failed"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistent snapshot storage.
pub trait SnapshotStore {
    /// Returns `Ok(None)` when nothing is stored under `key`.
    fn load(&self, key: &str) -> Result<Option<Snapshot>, StoreError>;

    fn save(&mut self, key: &str, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Capture `entity` into `store`.
pub fn save_entity<P: Persistable + ?Sized>(
    store: &mut dyn SnapshotStore,
    entity: &P,
) -> Result<(), StoreError> {
    store.save(&entity.snapshot_key(), &entity.serialize())
}

/// Restore `entity` from `store`. Returns false when nothing was stored.
pub fn restore_entity<P: Persistable + ?Sized>(
    store: &dyn SnapshotStore,
    entity: &P,
) -> Result<bool, StoreError> {
    match store.load(&entity.snapshot_key())? {
        Some(snapshot) => {
            entity.deserialize(&snapshot);
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let mut snap = Snapshot::new();
        snap.insert("enabled".into(), FieldValue::Bool(true));
        snap.insert("report_interval".into(), FieldValue::Int(500));
        snap.insert("name".into(), "SW1".into());
        snap.insert("error".into(), FieldValue::from(None::<String>));

        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn accessors() {
        assert_eq!(FieldValue::Int(3).as_int(), Some(3));
        assert_eq!(FieldValue::Int(3).as_bool(), None);
        assert_eq!(FieldValue::from("x").as_text(), Some("x"));
        assert_eq!(FieldValue::None.to_string(), "-");
    }
}
