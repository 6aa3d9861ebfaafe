// Lifecycle orchestration: engine slot, node registry, tunnel sessions.

pub mod nodes;
pub mod session;
pub mod tunnel;

pub use session::SessionController;
