//! Dispatch core: request lifecycle, the dispatch queue and its consumer,
//! the per-session broadcast pool, and the completion timer.

pub mod handler;
pub mod lifecycle;
pub mod pool;
pub mod queue;
pub mod service;
pub mod timer;

pub use handler::LiftMovedHandler;
pub use lifecycle::RequestLifecycle;
pub use pool::{spawn_pool, Observer, PoolError, PoolHandle, PoolStats};
pub use queue::{DispatchHandler, DispatchQueue};
pub use service::{LiftEngine, LiftService};
pub use timer::{CompletionHandle, CompletionTimer};

#[cfg(test)]
pub(crate) mod test_support;
