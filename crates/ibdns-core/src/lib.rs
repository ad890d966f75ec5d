// # ibdns-core
//
// Core library for managing Infoblox DNS records.
//
// ## Architecture Overview
//
// - **RecordDescriptor**: Desired and observed state of one record
// - **RecordType**: The closed set of supported types (A, AAAA, CNAME, HOST)
//   and the per-type request and response handling
// - **RecordStore**: Trait for the remote record store (WAPI client)
// - **Reconciler**: Create/Read/Update/Delete of one descriptor
// - **Engine**: Plans and applies a set of descriptors against stored state
// - **StateStore**: Trait for persisting managed descriptors
// - **StoreRegistry**: Plugin-based registry for record store implementations
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from the HTTP client
// 2. **Plugin-Based**: Stores are registered dynamically, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **No Hidden Retries**: Every remote failure surfaces to the caller

pub mod config;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{IbdnsConfig, ResourcesFile, StateStoreConfig, StoreConfig};
pub use engine::{Action, ApplyReport, Engine, EngineEvent};
pub use error::{Error, Result};
pub use reconciler::Reconciler;
pub use record::{RecordDescriptor, RecordType};
pub use registry::StoreRegistry;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{RecordStore, StateStore};
