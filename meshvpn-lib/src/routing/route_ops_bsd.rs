//! Route table mutations through the BSD `route` utility.

use async_trait::async_trait;
use tokio::process::Command;

use std::path::PathBuf;

use crate::shell_command_ext::{self, CombinedOutput, ShellCommandExt};

use super::route_ops::RouteCmdOps;

pub const DEFAULT_ROUTE_BINARY: &str = "route";

/// Production [`RouteCmdOps`] spawning the `route` binary.
#[derive(Clone, Debug)]
pub struct BsdRouteCmd {
    binary: PathBuf,
}

impl BsdRouteCmd {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for BsdRouteCmd {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_BINARY)
    }
}

#[async_trait]
impl RouteCmdOps for BsdRouteCmd {
    async fn run(&self, args: &[String]) -> Result<CombinedOutput, shell_command_ext::Error> {
        Command::new(&self.binary).args(args).run_combined().await
    }
}
