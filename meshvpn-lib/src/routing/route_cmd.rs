//! Rendering of route table mutations into BSD `route` utility arguments.
//!
//! [`RouteCommand`] is built once per mutation and consumed by the executor in
//! [`retry`](super::retry). Rendering is total: every [`Nexthop`] variant maps
//! to exactly one next-hop argument form.

use cidr::IpCidr;

use std::fmt::{self, Display};
use std::net::IpAddr;

use super::nexthop::{Action, Nexthop};

/// Interface that anchors IPv6 blackhole routes.
pub const LOOPBACK_INTERFACE: &str = "lo0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    Inet,
    Inet6,
}

impl Family {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::Inet,
            IpAddr::V6(_) => Family::Inet6,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Family::Inet => "-inet",
            Family::Inet6 => "-inet6",
        }
    }

    fn host_length(self) -> u8 {
        match self {
            Family::Inet => 32,
            Family::Inet6 => 128,
        }
    }
}

/// Rendered next-hop of a [`RouteCommand`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Gateway(IpAddr),
    Interface(String),
}

/// A single route table mutation in `route` utility form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteCommand {
    action: Action,
    family: Family,
    blackhole: bool,
    destination: String,
    target: Target,
}

impl RouteCommand {
    /// Renders `action` of `prefix` towards `nexthop`.
    ///
    /// IPv6 routes pointing at `vpn_interface` become blackhole routes on
    /// [`LOOPBACK_INTERFACE`]: the kernel refuses interface routes for IPv6 on an
    /// interface without an IPv6 address, and the tunnel carries none.
    pub fn new(action: Action, prefix: &IpCidr, nexthop: &Nexthop, vpn_interface: &str) -> Self {
        let address = prefix.first_address();
        let family = Family::of(&address);

        let destination = if prefix.network_length() == family.host_length() {
            address.to_string()
        } else {
            format!("{}/{}", address, prefix.network_length())
        };

        let blackhole = family == Family::Inet6 && nexthop.is_interface(vpn_interface);

        let target = match nexthop {
            Nexthop::Gateway(addr) => Target::Gateway(addr.to_canonical()),
            Nexthop::Interface(_) if blackhole => Target::Interface(LOOPBACK_INTERFACE.to_string()),
            Nexthop::Interface(name) => Target::Interface(name.clone()),
        };

        Self {
            action,
            family,
            blackhole,
            destination,
            target,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn is_blackhole(&self) -> bool {
        self.blackhole
    }

    /// Bare address for host routes, `network/length` otherwise.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn nexthop_args(&self) -> Vec<String> {
        match &self.target {
            Target::Gateway(addr) => vec![addr.to_string()],
            Target::Interface(name) => vec!["-interface".into(), name.clone()],
        }
    }

    /// Full argument list, e.g. `-n add -inet 10.0.0.0/8 -interface utun100`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-n".into(), self.action.keyword().into()];
        if self.blackhole {
            args.push("-blackhole".into());
        }
        args.push(self.family.flag().into());
        args.push(self.destination.clone());
        args.extend(self.nexthop_args());
        args
    }
}

impl Display for RouteCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "route {}", self.args().join(" "))
    }
}
