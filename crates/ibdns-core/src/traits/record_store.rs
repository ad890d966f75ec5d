// # Record Store Trait
//
// Defines the interface to the remote DNS/IPAM record store.
//
// ## Implementations
//
// - Infoblox WAPI: `ibdns-infoblox` crate
//
// ## Usage
//
// ```rust,ignore
// use ibdns_core::record::{BodyFields, RecordType};
// use ibdns_core::RecordStore;
//
// let body = RecordType::A.build_body(BodyFields {
//     name: "www.example.com".to_string(),
//     value: "10.0.0.5".to_string(),
//     ..BodyFields::default()
// });
// let id = store
//     .create_record(RecordType::A, &body, RecordType::A.return_fields())
//     .await?;
// ```

use async_trait::async_trait;

use crate::record::{RecordBody, RecordType, RemoteRecord};

/// Trait for record store clients
///
/// The reconciler receives an implementation of this trait as its client
/// handle. Every method is a single remote call.
///
/// # Constraints
///
/// - No retry or backoff: a failed call returns its error immediately
/// - No caching: every `get_record` goes to the store
/// - No background tasks
///
/// Transport concerns (authentication, TLS, timeouts) belong to the
/// implementation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record and return its identifier
    ///
    /// # Parameters
    ///
    /// - `record_type`: Which store endpoint to use
    /// - `body`: Type-specific request body
    /// - `return_fields`: Fields the store should include in its response
    async fn create_record(
        &self,
        record_type: RecordType,
        body: &RecordBody,
        return_fields: &[&str],
    ) -> Result<String, crate::Error>;

    /// Fetch a record by identifier
    ///
    /// An empty `return_fields` asks for the store's default field set.
    ///
    /// # Returns
    ///
    /// - `Ok(RemoteRecord)`: The record as reported by the store
    /// - `Err(Error)`: If the record is absent or the request failed
    async fn get_record(
        &self,
        record_type: RecordType,
        id: &str,
        return_fields: &[&str],
    ) -> Result<RemoteRecord, crate::Error>;

    /// Update a record and return its identifier
    ///
    /// Stores may issue a new identifier when certain fields change; the
    /// returned value is the one to keep.
    async fn update_record(
        &self,
        record_type: RecordType,
        id: &str,
        body: &RecordBody,
        return_fields: &[&str],
    ) -> Result<String, crate::Error>;

    /// Delete a record
    async fn delete_record(&self, record_type: RecordType, id: &str) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this store
    ///
    /// # Returns
    ///
    /// A boxed RecordStore trait object
    fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn RecordStore>, crate::Error>;
}
