use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use forest_common::{Branch, CommandRequest, CommandResponse, Leaf, Species};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::state::{FleetState, parse_leaves};
use crate::dispatch::{Dispatcher, Outcome};
use crate::errors::FleetError;

/// Result of a `refresh()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { seq: u64, count: usize },
    /// A newer refresh had already been applied; this response was dropped.
    Stale { seq: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// The backend accepted the toggle. Carries its copy of the leaf, or
    /// `None` when it sent none and the list was refreshed instead.
    Toggled(Option<Leaf>),
    /// A toggle for this leaf is already in flight; nothing was sent.
    AlreadyBusy,
    Rejected(CommandResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Done(RefreshOutcome),
    Rejected(CommandResponse),
}

/// Arguments of `create_leaf`, in the nested shape the backend reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateLeaf {
    pub name: String,
    pub leaf_type: String,
    pub desc: String,
    pub address: Vec<String>,
    pub branch: Vec<String>,
    pub settings: Value,
}

impl CreateLeaf {
    pub fn new(name: impl Into<String>, leaf_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            leaf_type: leaf_type.into(),
            desc: String::new(),
            address: Vec::new(),
            branch: Vec::new(),
            settings: json!({}),
        }
    }

    pub fn into_request(self) -> CommandRequest {
        CommandRequest::new("create_leaf")
            .arg("name", self.name)
            .arg("leaf_type", self.leaf_type)
            .arg("desc", self.desc)
            .arg(
                "settings",
                json!({
                    "common": {"urls": self.address, "branch": self.branch},
                    "custom": self.settings,
                }),
            )
    }
}

/// Keeps the local leaf list consistent with the backend.
///
/// Clones share the same state. The lock is never held across an `.await`,
/// so each completion applies as one atomic step.
#[derive(Clone)]
pub struct Fleet {
    dispatcher: Dispatcher,
    state: Arc<Mutex<FleetState>>,
}

/// A leaf's busy flag, held for one toggle. Dropping it finishes the toggle
/// with whatever replacement was recorded.
struct BusyLeaf<'a> {
    state: &'a Mutex<FleetState>,
    name: &'a str,
    replacement: Option<Leaf>,
}

impl Drop for BusyLeaf<'_> {
    fn drop(&mut self) {
        // Clear the flag even if another holder panicked.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.finish_toggle(self.name, self.replacement.take());
    }
}

impl Fleet {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            state: Arc::new(Mutex::new(FleetState::new())),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn lock(&self) -> Result<MutexGuard<'_, FleetState>, FleetError> {
        self.state.lock().map_err(|_| FleetError::LockPoisoned)
    }

    pub fn snapshot(&self) -> Result<FleetState, FleetError> {
        Ok(self.lock()?.clone())
    }

    pub fn leaves(&self) -> Result<Vec<Leaf>, FleetError> {
        Ok(self.lock()?.leaves().to_vec())
    }

    pub fn leaf(&self, name: &str) -> Result<Option<Leaf>, FleetError> {
        Ok(self.lock()?.leaf(name).cloned())
    }

    /// Re-fetch the whole leaf list. Responses older than the last applied
    /// refresh are dropped.
    pub async fn refresh(&self) -> Result<RefreshOutcome, FleetError> {
        let seq = self.lock()?.next_refresh_seq();
        let response = self
            .dispatcher
            .send_ok(CommandRequest::new("get_leaves"))
            .await?;
        let payload = response.get("leaves").ok_or_else(|| FleetError::MalformedPayload {
            field: "leaves".to_string(),
            message: "missing".to_string(),
        })?;
        let leaves = parse_leaves(payload)?;
        let count = leaves.len();

        if self.lock()?.apply_refresh(seq, leaves) {
            debug!(seq, count, "fleet refreshed");
            Ok(RefreshOutcome::Applied { seq, count })
        } else {
            debug!(seq, "stale refresh discarded");
            Ok(RefreshOutcome::Stale { seq })
        }
    }

    /// Flip a leaf's `active` flag. At most one toggle per leaf is in flight.
    ///
    /// The busy flag is released however this future ends, including when
    /// the caller drops it before the backend answers.
    pub async fn toggle(&self, name: &str) -> Result<ToggleOutcome, FleetError> {
        let leaf_id = {
            let mut state = self.lock()?;
            if !state.begin_toggle(name)? {
                debug!(leaf = name, "toggle already in flight");
                return Ok(ToggleOutcome::AlreadyBusy);
            }
            state.leaf(name).and_then(|l| l.id.clone())
        };
        let mut busy = BusyLeaf {
            state: &self.state,
            name,
            replacement: None,
        };

        let mut request = CommandRequest::new("toggle_leaf").arg("name", name);
        if let Some(id) = leaf_id {
            request = request.arg("leaf_id", id);
        }
        let response = match self.dispatcher.send(request).await? {
            Outcome::Success(response) => response,
            Outcome::Failure(response) => return Ok(ToggleOutcome::Rejected(response)),
        };

        let replacement = response
            .field::<Leaf>("leaf")
            .map_err(|e| FleetError::MalformedPayload {
                field: "leaf".to_string(),
                message: e.to_string(),
            })?;

        match replacement {
            Some(leaf) => {
                info!(leaf = name, active = leaf.active, "leaf toggled");
                busy.replacement = Some(leaf.clone());
                drop(busy);
                Ok(ToggleOutcome::Toggled(Some(leaf)))
            }
            None => {
                drop(busy);
                self.refresh().await?;
                Ok(ToggleOutcome::Toggled(None))
            }
        }
    }

    /// Move a leaf to another branch, then refresh.
    pub async fn migrate(
        &self,
        name: &str,
        destination: &str,
    ) -> Result<MutationOutcome, FleetError> {
        let request = CommandRequest::new("migrate_leaf")
            .arg("name", name)
            .arg("destination", destination);
        self.mutate(request).await
    }

    /// Create a leaf, then refresh.
    pub async fn create(&self, leaf: CreateLeaf) -> Result<MutationOutcome, FleetError> {
        self.mutate(leaf.into_request()).await
    }

    pub(super) async fn mutate(
        &self,
        request: CommandRequest,
    ) -> Result<MutationOutcome, FleetError> {
        let function = request.function.clone();
        match self.dispatcher.send(request).await? {
            Outcome::Success(_) => {
                info!(%function, "mutation accepted");
                Ok(MutationOutcome::Done(self.refresh().await?))
            }
            Outcome::Failure(response) => Ok(MutationOutcome::Rejected(response)),
        }
    }

    /// Fetch branches and cache them for `migration_targets`.
    pub async fn load_branches(&self) -> Result<Vec<Branch>, FleetError> {
        let response = self
            .dispatcher
            .send_ok(CommandRequest::new("get_branches"))
            .await?;
        let branches: Vec<Branch> = response
            .field("branches")
            .map_err(|e| FleetError::MalformedPayload {
                field: "branches".to_string(),
                message: e.to_string(),
            })?
            .unwrap_or_default();
        self.lock()?.set_branches(branches.clone());
        Ok(branches)
    }

    pub fn migration_targets(&self, name: &str) -> Result<Vec<Branch>, FleetError> {
        self.lock()?.migration_targets(name)
    }

    pub async fn species(&self) -> Result<Vec<Species>, FleetError> {
        let response = self
            .dispatcher
            .send_ok(CommandRequest::new("get_species"))
            .await?;
        Ok(response
            .field("species")
            .map_err(|e| FleetError::MalformedPayload {
                field: "species".to_string(),
                message: e.to_string(),
            })?
            .unwrap_or_default())
    }
}
