//! Abstraction over the route utility for testability.
//!
//! Production code uses [`BsdRouteCmd`](super::route_ops_bsd::BsdRouteCmd).
//! Tests use a stateful fake route table (see `mocks` module).

use async_trait::async_trait;

use crate::shell_command_ext::{self, CombinedOutput};

/// Runs one invocation of the route utility.
///
/// Implementors must be cheaply cloneable so concurrent callers can each hold one.
/// A non-zero exit is not an error at this level: it is reported through
/// [`CombinedOutput::success`] and classified by the executor.
#[async_trait]
pub trait RouteCmdOps: Send + Sync + Clone {
    async fn run(&self, args: &[String]) -> Result<CombinedOutput, shell_command_ext::Error>;
}
