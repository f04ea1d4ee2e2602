use serde::{Deserialize, Serialize};

use crate::SessionState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub cart_title: String,
    /// Epoch milliseconds.
    pub created_at: Option<u64>,
    /// Epoch milliseconds.
    pub last_accessed: Option<u64>,
}

/// A persisted emulator snapshot. `id` is assigned by the store on first
/// insert and reused on overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub id: Option<i64>,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub data: Vec<u8>,
    pub state: SessionState,
    pub metadata: SaveMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Always insert a new record.
    Create,
    /// Replace the record last saved or loaded, if any.
    Overwrite,
}
