//! Kernel route table synchronization for the VPN interface.
//!
//! [`RouteManager`] turns an already decided (prefix, next-hop) pair into a single
//! `route add` / `route delete` invocation and retries it while the kernel reports
//! the transient allocation failure described in [`retry`].

use cidr::errors::NetworkParseError;
use cidr::{IpCidr, IpInet};
use thiserror::Error;

use std::net::IpAddr;

use crate::config::Config;

pub mod nexthop;
pub mod retry;
pub mod route_cmd;
pub mod route_ops;
pub mod route_ops_bsd;

mod mocks;

pub use nexthop::{Action, Nexthop};
pub use retry::{ExecError, RetryPolicy};
pub use route_cmd::RouteCommand;
pub use route_ops::RouteCmdOps;
pub use route_ops_bsd::BsdRouteCmd;

use retry::PolicyError;
use route_cmd::Family;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to {action} route for {prefix}: {source}")]
    Route {
        action: Action,
        prefix: IpCidr,
        #[source]
        source: ExecError,
    },
    #[error("gateway {gateway} is not in the address family of {prefix}")]
    FamilyMismatch { prefix: IpCidr, gateway: IpAddr },
    #[error("Invalid retry policy: {0}")]
    Policy(#[from] PolicyError),
}

/// Parses a CIDR prefix or a bare address (host route), clearing host bits.
pub fn parse_prefix(s: &str) -> Result<IpCidr, NetworkParseError> {
    let inet: IpInet = if s.contains('/') {
        s.parse()?
    } else {
        let host_len = if s.contains(':') { 128 } else { 32 };
        format!("{s}/{host_len}").parse()?
    };
    Ok(inet.network())
}

/// Adds and removes kernel routes.
///
/// Holds no state between calls: every mutation builds its own [`RouteCommand`]
/// and backoff from the immutable policy, so one manager may be shared by
/// concurrent callers. Ordering of mutations to the same prefix is up to them.
#[derive(Clone)]
pub struct RouteManager<R: RouteCmdOps = BsdRouteCmd> {
    vpn_interface: String,
    policy: RetryPolicy,
    route_ops: R,
}

impl RouteManager<BsdRouteCmd> {
    pub fn new(vpn_interface: impl Into<String>, policy: RetryPolicy) -> Result<Self, Error> {
        Self::with_ops(vpn_interface, policy, BsdRouteCmd::default())
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::with_ops(
            config.vpn_interface.clone(),
            config.retry,
            BsdRouteCmd::new(config.route_binary.clone()),
        )
    }
}

impl<R: RouteCmdOps> RouteManager<R> {
    pub fn with_ops(vpn_interface: impl Into<String>, policy: RetryPolicy, route_ops: R) -> Result<Self, Error> {
        policy.validate()?;
        Ok(Self {
            vpn_interface: vpn_interface.into(),
            policy,
            route_ops,
        })
    }

    pub fn vpn_interface(&self) -> &str {
        &self.vpn_interface
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[tracing::instrument(name = "RouteManager::add_route", level = "debug", skip(self), fields(vpn_interface = %self.vpn_interface), err)]
    pub async fn add_route(&self, prefix: IpCidr, nexthop: &Nexthop) -> Result<(), Error> {
        self.route_cmd(Action::Add, prefix, nexthop).await
    }

    #[tracing::instrument(name = "RouteManager::remove_route", level = "debug", skip(self), fields(vpn_interface = %self.vpn_interface), err)]
    pub async fn remove_route(&self, prefix: IpCidr, nexthop: &Nexthop) -> Result<(), Error> {
        self.route_cmd(Action::Delete, prefix, nexthop).await
    }

    async fn route_cmd(&self, action: Action, prefix: IpCidr, nexthop: &Nexthop) -> Result<(), Error> {
        if let Some(gateway) = nexthop.unmapped_gateway() {
            if Family::of(&gateway) != Family::of(&prefix.first_address()) {
                return Err(Error::FamilyMismatch { prefix, gateway });
            }
        }

        let cmd = RouteCommand::new(action, &prefix, nexthop, &self.vpn_interface);
        retry::execute(&self.route_ops, &cmd, &self.policy)
            .await
            .map_err(|source| Error::Route { action, prefix, source })
    }
}
