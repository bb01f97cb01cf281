//! Fleet reconciliation: the locally displayed list of leaves and the
//! commands that mutate it.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `state` | `FleetState`: leaves, branches, refresh sequencing, busy locks |
//! | `reconciler` | `Fleet`: refresh/toggle/migrate/create over a `Dispatcher` |
//! | `settings` | `Fleet`: leaf settings, species defaults, `forest_status` |

pub mod reconciler;
pub mod settings;
pub mod state;

pub use reconciler::{CreateLeaf, Fleet, MutationOutcome, RefreshOutcome, ToggleOutcome};
pub use state::{FleetState, parse_leaves};
