use forest_common::{Branch, Leaf};
use serde_json::Value;

use crate::errors::FleetError;

/// The locally displayed fleet: leaves in backend order plus known branches.
///
/// Only [`super::Fleet`] writes to this; everything else reads snapshots.
#[derive(Debug, Clone, Default)]
pub struct FleetState {
    leaves: Vec<Leaf>,
    branches: Vec<Branch>,
    issued_seq: u64,
    applied_seq: u64,
}

impl FleetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn leaf(&self, name: &str) -> Option<&Leaf> {
        self.leaves.iter().find(|l| l.name == name)
    }

    /// Sequence of the last refresh whose response was applied.
    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    /// Stamp a new refresh.
    pub fn next_refresh_seq(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    /// Replace the list with a refresh response.
    ///
    /// Returns false, leaving the list untouched, when a newer refresh was
    /// already applied. Busy flags survive for leaves that are still listed.
    pub fn apply_refresh(&mut self, seq: u64, mut leaves: Vec<Leaf>) -> bool {
        if seq < self.applied_seq {
            return false;
        }
        for leaf in &mut leaves {
            leaf.busy = self.leaf(&leaf.name).is_some_and(|old| old.busy);
        }
        self.leaves = leaves;
        self.applied_seq = seq;
        true
    }

    /// Take the busy lock for a toggle. `Ok(false)` when one is in flight.
    pub fn begin_toggle(&mut self, name: &str) -> Result<bool, FleetError> {
        let leaf = self
            .leaves
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| FleetError::UnknownLeaf {
                name: name.to_string(),
            })?;
        if leaf.busy {
            return Ok(false);
        }
        leaf.busy = true;
        Ok(true)
    }

    /// Release the busy lock, optionally replacing the entry with the
    /// backend's copy.
    pub fn finish_toggle(&mut self, name: &str, replacement: Option<Leaf>) {
        let Some(slot) = self.leaves.iter_mut().find(|l| l.name == name) else {
            return;
        };
        match replacement {
            Some(mut leaf) => {
                leaf.busy = false;
                *slot = leaf;
            }
            None => slot.busy = false,
        }
    }

    pub fn set_branches(&mut self, branches: Vec<Branch>) {
        self.branches = branches;
    }

    /// Branches the named leaf may move to: same `type` only.
    pub fn migration_targets(&self, name: &str) -> Result<Vec<Branch>, FleetError> {
        let leaf = self.leaf(name).ok_or_else(|| FleetError::UnknownLeaf {
            name: name.to_string(),
        })?;
        Ok(self
            .branches
            .iter()
            .filter(|b| b.accepts(leaf))
            .cloned()
            .collect())
    }
}

/// Decode the `leaves` payload: a list, or an object keyed by leaf name.
pub fn parse_leaves(value: &Value) -> Result<Vec<Leaf>, FleetError> {
    let malformed = |message: String| FleetError::MalformedPayload {
        field: "leaves".to_string(),
        message,
    };
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| serde_json::from_value(item.clone()).map_err(|e| malformed(e.to_string())))
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(name, item)| {
                Leaf::from_keyed(name, item.clone()).map_err(|e| malformed(e.to_string()))
            })
            .collect(),
        other => Err(malformed(format!("expected list or object, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(name: &str, kind: &str) -> Leaf {
        let mut leaf = Leaf::new(name);
        leaf.kind = Some(kind.to_string());
        leaf
    }

    fn branch(name: &str, kind: &str) -> Branch {
        serde_json::from_value(json!({"name": name, "type": kind})).unwrap()
    }

    #[test]
    fn stale_refresh_is_discarded() {
        let mut state = FleetState::new();
        let first = state.next_refresh_seq();
        let second = state.next_refresh_seq();

        assert!(state.apply_refresh(second, vec![Leaf::new("new")]));
        assert!(!state.apply_refresh(first, vec![Leaf::new("old")]));
        assert_eq!(state.leaves()[0].name, "new");
        assert_eq!(state.applied_seq(), second);
    }

    #[test]
    fn out_of_order_newer_refresh_still_applies() {
        let mut state = FleetState::new();
        let first = state.next_refresh_seq();
        let second = state.next_refresh_seq();

        assert!(state.apply_refresh(first, vec![Leaf::new("a")]));
        assert!(state.apply_refresh(second, vec![Leaf::new("b")]));
        assert_eq!(state.leaves()[0].name, "b");
    }

    #[test]
    fn refresh_keeps_busy_for_listed_leaves() {
        let mut state = FleetState::new();
        let seq = state.next_refresh_seq();
        state.apply_refresh(seq, vec![Leaf::new("main"), Leaf::new("api")]);
        assert!(state.begin_toggle("main").unwrap());

        let seq = state.next_refresh_seq();
        state.apply_refresh(seq, vec![Leaf::new("api"), Leaf::new("main")]);
        assert!(state.leaf("main").unwrap().busy);
        assert!(!state.leaf("api").unwrap().busy);
    }

    #[test]
    fn toggle_lock_is_exclusive() {
        let mut state = FleetState::new();
        let seq = state.next_refresh_seq();
        state.apply_refresh(seq, vec![Leaf::new("main")]);

        assert!(state.begin_toggle("main").unwrap());
        assert!(!state.begin_toggle("main").unwrap());
        state.finish_toggle("main", None);
        assert!(state.begin_toggle("main").unwrap());
    }

    #[test]
    fn toggle_unknown_leaf_is_error() {
        let mut state = FleetState::new();
        let err = state.begin_toggle("ghost").unwrap_err();
        assert!(matches!(err, FleetError::UnknownLeaf { ref name } if name == "ghost"));
    }

    #[test]
    fn finish_toggle_replaces_entry_and_clears_busy() {
        let mut state = FleetState::new();
        let seq = state.next_refresh_seq();
        let mut main = Leaf::new("main");
        main.active = true;
        state.apply_refresh(seq, vec![main]);
        state.begin_toggle("main").unwrap();

        let mut replacement = Leaf::new("main");
        replacement.busy = true;
        state.finish_toggle("main", Some(replacement));

        let main = state.leaf("main").unwrap();
        assert!(!main.active);
        assert!(!main.busy);
    }

    #[test]
    fn migration_targets_match_leaf_type() {
        let mut state = FleetState::new();
        let seq = state.next_refresh_seq();
        state.apply_refresh(seq, vec![leaf("main", "t1")]);
        state.set_branches(vec![branch("b1", "t1"), branch("b2", "t2"), branch("b3", "t1")]);

        let names: Vec<_> = state
            .migration_targets("main")
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["b1", "b3"]);
    }

    #[test]
    fn parse_leaves_accepts_list() {
        let leaves = parse_leaves(&json!([
            {"name": "main", "active": true},
            {"name": "api", "active": false}
        ]))
        .unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].name, "main");
        assert!(leaves[0].active);
    }

    #[test]
    fn parse_leaves_keyed_object_keeps_backend_order() {
        let leaves = parse_leaves(&json!({
            "zeta": {"active": true},
            "alpha": {"active": false}
        }))
        .unwrap();
        let names: Vec<_> = leaves.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn parse_leaves_rejects_scalar() {
        let err = parse_leaves(&json!("nope")).unwrap_err();
        assert!(matches!(err, FleetError::MalformedPayload { ref field, .. } if field == "leaves"));
    }
}
