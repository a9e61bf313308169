pub mod lanes;
pub mod store;
pub mod types;

pub use lanes::{SessionLaneGuard, SessionLaneManager};
pub use store::{SessionMeta, SessionStore, SESSION_TURN_LIMIT};
pub use types::{InvocationStatus, ToolInvocation, Turn, TurnRole};
