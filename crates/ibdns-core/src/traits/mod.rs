//! Core traits for the ibdns system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RecordStore`]: Create, read, update and delete records in the remote store
//! - [`StateStore`]: Persistent state of managed descriptors

pub mod record_store;
pub mod state_store;

pub use record_store::{RecordStore, RecordStoreFactory};
pub use state_store::{StateRecord, StateStore};
