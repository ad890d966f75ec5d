//! Plan/apply engine
//!
//! The engine diffs desired record descriptors against the state store and
//! drives the [`Reconciler`] to close the gap.
//!
//! ## Architecture
//!
//! ```text
//!  desired records ──┐
//!                    ▼
//!             ┌──────────────┐         ┌──────────────┐
//!             │    Engine    │── ops ─▶│  Reconciler  │──▶ RecordStore
//!             └──────────────┘         └──────────────┘
//!                    │
//!         ┌──────────┴──────────┐
//!         ▼                     ▼
//! ┌─────────────┐       ┌─────────────┐
//! │ StateStore  │       │   Events    │
//! │ (persist)   │       │  (notify)   │
//! └─────────────┘       └─────────────┘
//! ```
//!
//! ## Apply Flow
//!
//! 1. Plan an [`Action`] per resource over desired and stored names
//! 2. Execute actions in name order, one resource at a time
//! 3. Persist state after each resource
//! 4. Collect per-resource failures without stopping the others
//!
//! Remote failures never abort an apply. State store failures do.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::reconciler::Reconciler;
use crate::record::RecordDescriptor;
use crate::traits::{StateRecord, StateStore};

/// Default capacity of the engine event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// What the engine will do with one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Desired and stored agree
    NoOp,
    /// Not yet managed
    Create,
    /// Mutable fields differ
    Update,
    /// Immutable fields differ: delete, then create
    Replace,
    /// Managed but no longer desired
    Delete,
    /// Re-read from the store; produced by refresh, never planned
    Read,
    /// Dropped from state without touching the store; never planned
    Forget,
}

impl Action {
    /// Whether the action touches the record store
    pub fn is_change(self) -> bool {
        !matches!(self, Action::NoOp | Action::Read | Action::Forget)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::NoOp => "no-op",
            Action::Create => "create",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::Delete => "delete",
            Action::Read => "read",
            Action::Forget => "forget",
        };
        f.write_str(s)
    }
}

/// Decide the action for one resource
///
/// `prior` is the descriptor as last reconciled, `desired` the one the
/// user supplied. Type comparison ignores case. A `view` only forces a
/// replace when the desired descriptor names one. Values that are both IP
/// addresses compare as addresses, so `2001:DB8:0::1` matches the
/// `2001:db8::1` the store reports.
pub fn plan(prior: Option<&RecordDescriptor>, desired: Option<&RecordDescriptor>) -> Action {
    match (prior, desired) {
        (None, None) => Action::NoOp,
        (None, Some(_)) => Action::Create,
        (Some(_), None) => Action::Delete,
        (Some(prior), Some(_)) if !prior.is_created() => Action::Create,
        (Some(prior), Some(desired)) => {
            let view_changed = desired
                .view
                .as_ref()
                .is_some_and(|view| prior.view.as_ref() != Some(view));

            if !prior.record_type.eq_ignore_ascii_case(&desired.record_type)
                || prior.desired_fqdn() != desired.desired_fqdn()
                || prior.next_available_ip != desired.next_available_ip
                || view_changed
            {
                Action::Replace
            } else if !same_value(&prior.value, &desired.value)
                || prior.ttl != desired.ttl
                || prior.comment != desired.comment
            {
                Action::Update
            } else {
                Action::NoOp
            }
        }
    }
}

fn same_value(stored: &str, wanted: &str) -> bool {
    match (stored.parse::<IpAddr>(), wanted.parse::<IpAddr>()) {
        (Ok(stored), Ok(wanted)) => stored == wanted,
        _ => stored == wanted,
    }
}

/// Planned action for a named resource
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlannedAction {
    pub resource: String,
    pub action: Action,
}

/// Result of reconciling one resource
#[derive(Debug)]
pub struct ResourceOutcome {
    pub resource: String,
    pub action: Action,
    pub result: Result<()>,
}

/// Per-resource results of an apply, refresh or destroy
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub outcomes: Vec<ResourceOutcome>,
}

impl ApplyReport {
    /// Outcomes that failed
    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Whether every resource succeeded
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Number of resources changed successfully
    pub fn changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action.is_change() && o.result.is_ok())
            .count()
    }

    /// Outcome for a resource, if it was part of the run
    pub fn outcome(&self, resource: &str) -> Option<&ResourceOutcome> {
        self.outcomes.iter().find(|o| o.resource == resource)
    }
}

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A run started
    Started { resources: usize },

    /// Work on a resource started
    ResourceStarted { resource: String, action: Action },

    /// A resource was reconciled
    ResourceSucceeded {
        resource: String,
        action: Action,
        id: Option<String>,
    },

    /// A resource failed; the run continues with the next one
    ResourceFailed {
        resource: String,
        action: Action,
        error: String,
    },

    /// A run finished
    Finished { changed: usize, failed: usize },
}

/// Plan/apply engine over a reconciler and a state store
///
/// Resources are handled one at a time in name order. The engine holds no
/// state of its own beyond the state store.
pub struct Engine {
    reconciler: Reconciler,
    state_store: Box<dyn StateStore>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver). Events are dropped, with a
    /// warning, when the channel is full.
    pub fn new(
        reconciler: Reconciler,
        state_store: Box<dyn StateStore>,
        event_capacity: usize,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (event_tx, rx) = mpsc::channel(event_capacity.max(1));
        let engine = Self {
            reconciler,
            state_store,
            event_tx,
        };
        (engine, rx)
    }

    /// Plan every resource in `desired` and in the state store
    pub async fn plan_all(
        &self,
        desired: &BTreeMap<String, RecordDescriptor>,
    ) -> Result<Vec<PlannedAction>> {
        let mut planned = Vec::new();
        for resource in self.resource_names(desired).await? {
            let prior = self.state_store.get_record(&resource).await?;
            let action = plan(
                prior.as_ref().map(|r| &r.descriptor),
                desired.get(&resource),
            );
            planned.push(PlannedAction { resource, action });
        }
        Ok(planned)
    }

    /// Reconcile the store towards `desired`
    ///
    /// # Returns
    ///
    /// - `Ok(ApplyReport)`: Per-resource outcomes, failures included
    /// - `Err(Error)`: The state store failed
    pub async fn apply(&self, desired: &BTreeMap<String, RecordDescriptor>) -> Result<ApplyReport> {
        let planned = self.plan_all(desired).await?;
        self.emit_event(EngineEvent::Started {
            resources: planned.len(),
        });

        let mut report = ApplyReport::default();
        for PlannedAction { resource, action } in planned {
            if action == Action::NoOp {
                debug!("{}: up to date", resource);
                report.outcomes.push(ResourceOutcome {
                    resource,
                    action,
                    result: Ok(()),
                });
                continue;
            }

            self.emit_event(EngineEvent::ResourceStarted {
                resource: resource.clone(),
                action,
            });

            // An unparseable type must not reach the store, least of all
            // through the delete half of a replace.
            if let Some(Err(e)) = desired.get(&resource).map(RecordDescriptor::kind) {
                self.finish_resource(&mut report, resource, action, Err(e))
                    .await;
                continue;
            }

            let prior = self
                .state_store
                .get_record(&resource)
                .await?
                .map(|r| r.descriptor);

            let result = match (action, prior, desired.get(&resource)) {
                (Action::Create, _, Some(want)) => self.create(&resource, want).await?,
                (Action::Update, Some(prior), Some(want)) => {
                    self.update(&resource, prior, want).await?
                }
                (Action::Replace, Some(prior), Some(want)) => {
                    self.replace(&resource, prior, want).await?
                }
                (Action::Delete, Some(prior), _) => self.delete(&resource, prior).await?,
                (action, _, _) => Err(Error::Other(format!(
                    "{}: inconsistent plan for action {}",
                    resource, action
                ))),
            };

            self.finish_resource(&mut report, resource, action, result)
                .await;
        }

        self.finish(&report).await?;
        Ok(report)
    }

    /// Re-read every managed resource and store what the store reports
    pub async fn refresh(&self) -> Result<ApplyReport> {
        let names = self.state_store.list_records().await?;
        self.emit_event(EngineEvent::Started {
            resources: names.len(),
        });

        let mut report = ApplyReport::default();
        for resource in names {
            let Some(state) = self.state_store.get_record(&resource).await? else {
                continue;
            };

            self.emit_event(EngineEvent::ResourceStarted {
                resource: resource.clone(),
                action: Action::Read,
            });

            let mut desc = state.descriptor;
            let result = match self.reconciler.read(&mut desc).await {
                Ok(()) => {
                    self.persist(&resource, &desc).await?;
                    Ok(())
                }
                Err(e) => Err(e),
            };

            self.finish_resource(&mut report, resource, Action::Read, result)
                .await;
        }

        self.finish(&report).await?;
        Ok(report)
    }

    /// Delete managed resources
    ///
    /// An empty `names` deletes everything in the state store. A name the
    /// state store does not know is reported as a failure.
    pub async fn destroy(&self, names: &[String]) -> Result<ApplyReport> {
        let names = if names.is_empty() {
            self.state_store.list_records().await?
        } else {
            names.to_vec()
        };
        self.emit_event(EngineEvent::Started {
            resources: names.len(),
        });

        let mut report = ApplyReport::default();
        for resource in names {
            self.emit_event(EngineEvent::ResourceStarted {
                resource: resource.clone(),
                action: Action::Delete,
            });

            let result = match self.state_store.get_record(&resource).await? {
                Some(state) => self.delete(&resource, state.descriptor).await?,
                None => Err(Error::not_found(format!(
                    "{} is not a managed resource",
                    resource
                ))),
            };

            self.finish_resource(&mut report, resource, Action::Delete, result)
                .await;
        }

        self.finish(&report).await?;
        Ok(report)
    }

    /// Drop resources from the state store without calling the record store
    ///
    /// For records removed outside ibdns, which `destroy` and `refresh`
    /// can no longer reach. A name the state store does not know is
    /// reported as a failure.
    pub async fn forget(&self, names: &[String]) -> Result<ApplyReport> {
        self.emit_event(EngineEvent::Started {
            resources: names.len(),
        });

        let mut report = ApplyReport::default();
        for resource in names {
            self.emit_event(EngineEvent::ResourceStarted {
                resource: resource.clone(),
                action: Action::Forget,
            });

            let result = match self.state_store.get_record(resource).await? {
                Some(_) => {
                    self.state_store.delete_record(resource).await?;
                    Ok(())
                }
                None => Err(Error::not_found(format!(
                    "{} is not a managed resource",
                    resource
                ))),
            };

            self.finish_resource(&mut report, resource.clone(), Action::Forget, result)
                .await;
        }

        self.finish(&report).await?;
        Ok(report)
    }

    // The outer Result carries state store failures, the inner one remote
    // failures.

    async fn create(&self, resource: &str, desired: &RecordDescriptor) -> Result<Result<()>> {
        let mut desc = desired.clone();
        desc.id = None;

        match self.reconciler.create(&mut desc).await {
            Ok(()) => {
                self.persist(resource, &desc).await?;
                Ok(Ok(()))
            }
            Err(e) => {
                // The record exists remotely once an id was issued
                if desc.is_created() {
                    warn!("{}: created but could not be read back: {}", resource, e);
                    self.persist(resource, &desc).await?;
                }
                Ok(Err(e))
            }
        }
    }

    async fn update(
        &self,
        resource: &str,
        prior: RecordDescriptor,
        desired: &RecordDescriptor,
    ) -> Result<Result<()>> {
        let mut current = prior.clone();

        match self.reconciler.update(&mut current, desired).await {
            Ok(()) => {
                self.persist(resource, &current).await?;
                Ok(Ok(()))
            }
            Err(e) => {
                if current.id != prior.id {
                    warn!("{}: updated but could not be read back: {}", resource, e);
                    self.persist(resource, &current).await?;
                }
                Ok(Err(e))
            }
        }
    }

    async fn replace(
        &self,
        resource: &str,
        prior: RecordDescriptor,
        desired: &RecordDescriptor,
    ) -> Result<Result<()>> {
        if let Err(e) = self.delete(resource, prior).await? {
            return Ok(Err(e));
        }
        self.create(resource, desired).await
    }

    async fn delete(&self, resource: &str, prior: RecordDescriptor) -> Result<Result<()>> {
        let mut desc = prior;
        match self.reconciler.delete(&mut desc).await {
            Ok(()) => {
                self.state_store.delete_record(resource).await?;
                Ok(Ok(()))
            }
            Err(e) => Ok(Err(e)),
        }
    }

    async fn persist(&self, resource: &str, desc: &RecordDescriptor) -> Result<()> {
        self.state_store
            .set_record(resource, &StateRecord::new(desc.clone()))
            .await
    }

    async fn resource_names(
        &self,
        desired: &BTreeMap<String, RecordDescriptor>,
    ) -> Result<BTreeSet<String>> {
        let mut names: BTreeSet<String> = desired.keys().cloned().collect();
        names.extend(self.state_store.list_records().await?);
        Ok(names)
    }

    async fn finish_resource(
        &self,
        report: &mut ApplyReport,
        resource: String,
        action: Action,
        result: Result<()>,
    ) {
        match &result {
            Ok(()) => {
                let id = match self.state_store.get_record(&resource).await {
                    Ok(state) => state.and_then(|s| s.descriptor.id),
                    Err(e) => {
                        warn!("{}: could not read state for id: {}", resource, e);
                        None
                    }
                };
                info!("{}: {} complete", resource, action);
                self.emit_event(EngineEvent::ResourceSucceeded {
                    resource: resource.clone(),
                    action,
                    id,
                });
            }
            Err(e) => {
                error!("{}: {} failed: {}", resource, action, e);
                self.emit_event(EngineEvent::ResourceFailed {
                    resource: resource.clone(),
                    action,
                    error: e.to_string(),
                });
            }
        }

        report.outcomes.push(ResourceOutcome {
            resource,
            action,
            result,
        });
    }

    async fn finish(&self, report: &ApplyReport) -> Result<()> {
        self.state_store.flush().await?;
        self.emit_event(EngineEvent::Finished {
            changed: report.changed(),
            failed: report.failures().count(),
        });
        Ok(())
    }

    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
