// # Record Reconciler
//
// Maps a record descriptor onto create/read/update/delete calls against a
// `RecordStore` and folds the store's answers back into the descriptor.
//
// ## Operations
//
// - **create**: submit the type-specific body, keep the returned id, then read
// - **read**: fetch by id and refresh the computed fields
// - **update**: confirm existence, submit mutable fields (never `view`),
//   adopt the id the store returns, then read
// - **delete**: confirm existence, then delete
//
// Every operation parses the record type first, so an unknown type fails
// before any remote call. Remote errors are wrapped and returned as-is:
// no retry, no rollback. A create whose trailing read fails leaves the
// remote record in place and the new id on the descriptor.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::record::{BodyFields, RecordDescriptor, RecordType, next_available_ip_directive, split_fqdn};
use crate::traits::RecordStore;

/// Reconciles record descriptors against a record store
///
/// The store handle is injected at construction and shared by every
/// operation. Descriptors are independent of each other; the reconciler
/// keeps no state of its own.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &self.store.store_name())
            .finish()
    }
}

impl Reconciler {
    /// Create a reconciler over the given store
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Name of the underlying store
    pub fn store_name(&self) -> &'static str {
        self.store.store_name()
    }

    /// Create the record described by `desc`
    ///
    /// On success `desc.id` holds the new identifier and the computed
    /// fields reflect the store's view of the record.
    pub async fn create(&self, desc: &mut RecordDescriptor) -> Result<()> {
        let kind = desc.kind()?;

        let value = if desc.next_available_ip && kind.allocates_addresses() {
            next_available_ip_directive(&desc.value)
        } else {
            desc.value.clone()
        };

        let body = kind.build_body(BodyFields {
            name: desc.desired_fqdn(),
            value,
            comment: desc.comment.clone(),
            ttl: desc.ttl,
            view: desc.view.clone(),
        });

        tracing::debug!("Creating {} record: {}", kind, body.name());

        let id = self
            .store
            .create_record(kind, &body, kind.return_fields())
            .await
            .map_err(|e| Error::create(e.to_string()))?;

        tracing::info!("record ID: {}", id);
        desc.id = Some(id);

        self.read(desc).await
    }

    /// Refresh `desc` from the store
    ///
    /// Splits the remote name back into `name` and `domain`, and refreshes
    /// `ttl`, `view` and the type's address field. `value` is overwritten
    /// with the resolved address unless `nextavailableip` is set.
    pub async fn read(&self, desc: &mut RecordDescriptor) -> Result<()> {
        let kind = desc.kind()?;
        let id = self.require_id(desc, kind)?;

        let remote = self
            .store
            .get_record(kind, &id, kind.return_fields())
            .await
            .map_err(|e| self.lookup_error(kind, e))?;

        if let Some(fqdn) = &remote.name {
            let (name, domain) = split_fqdn(fqdn);
            desc.fqdn = Some(fqdn.clone());
            desc.name = name;
            desc.domain = domain;
        }

        kind.apply_remote(&remote, desc);

        desc.record_type = kind.as_str().to_string();
        desc.ttl = remote.ttl;
        if remote.view.is_some() {
            desc.view = remote.view.clone();
        }

        Ok(())
    }

    /// Move the record in `current` towards `desired`
    ///
    /// Only `value`, `ttl` and `comment` may differ; a change to any
    /// immutable field needs a destroy and recreate and is rejected here.
    ///
    /// With `nextavailableip` set, an unchanged `value` resubmits the last
    /// resolved address so the store does not allocate again.
    pub async fn update(
        &self,
        current: &mut RecordDescriptor,
        desired: &RecordDescriptor,
    ) -> Result<()> {
        let kind = current.kind()?;
        if desired.kind()? != kind {
            return Err(Error::invalid_input(format!(
                "record type cannot change from {} to {}; replace the record",
                current.record_type, desired.record_type
            )));
        }
        check_immutable(current, desired)?;

        let id = self.require_id(current, kind)?;

        self.store
            .get_record(kind, &id, &[])
            .await
            .map_err(|e| Error::not_found(format!("Couldn't find record: {}", e)))?;

        let value = if desired.next_available_ip && kind.allocates_addresses() {
            if desired.value != current.value {
                next_available_ip_directive(&desired.value)
            } else {
                kind.resolved_address(current)
                    .unwrap_or(desired.value.as_str())
                    .to_string()
            }
        } else {
            desired.value.clone()
        };

        let body = kind.build_body(BodyFields {
            name: desired.desired_fqdn(),
            value,
            comment: desired.comment.clone(),
            ttl: desired.ttl,
            view: None,
        });

        tracing::debug!("Updating {} record: {} ({})", kind, body.name(), id);

        let new_id = self
            .store
            .update_record(kind, &id, &body, kind.return_fields())
            .await
            .map_err(|e| Error::update(e.to_string()))?;

        if new_id != id {
            tracing::info!("Store issued a new record ID: {} -> {}", id, new_id);
        }

        current.id = Some(new_id);
        current.value = desired.value.clone();
        current.ttl = desired.ttl;
        current.comment = desired.comment.clone();

        self.read(current).await
    }

    /// Delete the record described by `desc`
    ///
    /// The record must still exist: deleting an already-absent record
    /// fails with [`Error::NotFound`]. On success `desc.id` is cleared.
    pub async fn delete(&self, desc: &mut RecordDescriptor) -> Result<()> {
        let kind = desc.kind()?;
        let id = self.require_id(desc, kind)?;

        tracing::info!("Deleting {} record: {}, {}", kind, desc.name, id);

        self.store
            .get_record(kind, &id, &[])
            .await
            .map_err(|e| self.lookup_error(kind, e))?;

        self.store.delete_record(kind, &id).await.map_err(|e| {
            Error::delete(format!("Error deleting {} {} record: {}", self.store_name(), kind, e))
        })?;

        desc.id = None;
        Ok(())
    }

    fn require_id(&self, desc: &RecordDescriptor, kind: RecordType) -> Result<String> {
        desc.id.clone().ok_or_else(|| {
            Error::not_found(format!(
                "{} record {} has no ID; it has not been created",
                kind,
                desc.desired_fqdn()
            ))
        })
    }

    fn lookup_error(&self, kind: RecordType, err: Error) -> Error {
        Error::not_found(format!(
            "Couldn't find {} {} record: {}",
            self.store_name(),
            kind,
            err
        ))
    }
}

/// Reject changes to fields that are fixed after creation
fn check_immutable(current: &RecordDescriptor, desired: &RecordDescriptor) -> Result<()> {
    if current.desired_fqdn() != desired.desired_fqdn() {
        return Err(Error::invalid_input(format!(
            "name cannot change from {} to {}; replace the record",
            current.desired_fqdn(),
            desired.desired_fqdn()
        )));
    }

    if current.next_available_ip != desired.next_available_ip {
        return Err(Error::invalid_input(
            "nextavailableip cannot change; replace the record",
        ));
    }

    if let Some(view) = &desired.view
        && current.view.as_ref() != Some(view)
    {
        return Err(Error::invalid_input(format!(
            "view cannot change to {}; replace the record",
            view
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_check_accepts_mutable_changes() {
        let current = RecordDescriptor::new("A", "www", "example.com", "10.0.0.5")
            .with_view("default");
        let desired = RecordDescriptor::new("a", "www", "example.com", "10.0.0.6")
            .with_ttl(60)
            .with_comment("moved");

        assert!(check_immutable(&current, &desired).is_ok());
    }

    #[test]
    fn immutable_check_compares_full_names() {
        // "foo.bar" + "example.com" reads back as "foo" + "bar.example.com"
        let current = RecordDescriptor::new("A", "foo", "bar.example.com", "10.0.0.5");
        let desired = RecordDescriptor::new("A", "foo.bar", "example.com", "10.0.0.5");
        assert!(check_immutable(&current, &desired).is_ok());

        let renamed = RecordDescriptor::new("A", "bar", "example.com", "10.0.0.5");
        assert!(matches!(
            check_immutable(&current, &renamed),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn immutable_check_rejects_view_and_allocation_changes() {
        let current = RecordDescriptor::new("HOST", "db", "example.com", "10.0.0.0/24")
            .with_next_available_ip(true)
            .with_view("default");

        let other_view = current.clone().with_view("internal");
        assert!(check_immutable(&current, &other_view).is_err());

        let literal = current.clone().with_next_available_ip(false);
        assert!(check_immutable(&current, &literal).is_err());
    }
}
