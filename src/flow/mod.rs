//! Wizard flow state: the data model, its persistent store, and the
//! navigation guard over it.

pub mod guard;
pub mod model;
pub mod store;

pub use guard::{Navigation, RouteGuard, WIZARD_GUARDS, check_navigation};
pub use model::MvpFlowState;
pub use store::{FLOW_STATE_VERSION, FLOW_STORAGE_KEY, FlowStore};
