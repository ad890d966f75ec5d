// # State Store Trait
//
// Defines the interface for persisting managed record descriptors.
//
// ## Purpose
//
// The state store remembers, per resource name:
// - The descriptor as it was last reconciled (including the store id)
// - When it was last applied
//
// The engine diffs desired descriptors against this state to decide
// between create, update, replace and delete.
//
// ## Implementations
//
// - In-memory: `MemoryStateStore`
// - File-based: `FileStateStore` (JSON)

use async_trait::async_trait;

use crate::record::RecordDescriptor;

/// State record for a managed resource
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StateRecord {
    /// The descriptor after the last successful (or partial) reconcile
    pub descriptor: RecordDescriptor,
    /// Timestamp of the last apply
    pub last_applied: chrono::DateTime<chrono::Utc>,
}

impl StateRecord {
    /// Create a new state record stamped with the current time
    pub fn new(descriptor: RecordDescriptor) -> Self {
        Self {
            descriptor,
            last_applied: chrono::Utc::now(),
        }
    }
}

/// Trait for state store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the state record for a resource
    ///
    /// # Returns
    ///
    /// - `Ok(Some(StateRecord))`: The stored record
    /// - `Ok(None)`: No record found
    /// - `Err(Error)`: Storage error
    async fn get_record(&self, resource: &str) -> Result<Option<StateRecord>, crate::Error>;

    /// Create or replace the state record for a resource
    async fn set_record(&self, resource: &str, record: &StateRecord)
    -> Result<(), crate::Error>;

    /// Delete a state record
    ///
    /// Deleting a missing record is not an error.
    async fn delete_record(&self, resource: &str) -> Result<(), crate::Error>;

    /// List all resource names in the store
    async fn list_records(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
