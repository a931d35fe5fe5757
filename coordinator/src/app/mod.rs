mod handle;
mod runtime;
mod state;

// Re-export a curated surface for consumers of `crate::app`
pub use handle::{Coordinator, CoordinatorError};
pub use state::{Role, RoleRx};
