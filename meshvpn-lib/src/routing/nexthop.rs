use std::fmt::{self, Display};
use std::net::IpAddr;

/// Kernel route table mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Delete,
}

impl Action {
    /// Keyword understood by the `route` utility.
    pub fn keyword(self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Delete => "delete",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Forwarding target of a route.
///
/// Either a gateway address or an egress interface, never both and never neither.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Nexthop {
    /// Forward to this address. IPv4-mapped IPv6 addresses are accepted and unmapped on use.
    Gateway(IpAddr),
    /// Egress through the named local interface without a forwarding address.
    Interface(String),
}

impl Nexthop {
    pub fn gateway(addr: impl Into<IpAddr>) -> Self {
        Nexthop::Gateway(addr.into())
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Nexthop::Interface(name.into())
    }

    /// Gateway address in the form handed to the kernel.
    pub fn unmapped_gateway(&self) -> Option<IpAddr> {
        match self {
            Nexthop::Gateway(addr) => Some(addr.to_canonical()),
            Nexthop::Interface(_) => None,
        }
    }

    pub fn is_interface(&self, name: &str) -> bool {
        matches!(self, Nexthop::Interface(intf) if intf == name)
    }
}

impl Display for Nexthop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Nexthop::Gateway(addr) => write!(f, "via {}", addr),
            Nexthop::Interface(name) => write!(f, "dev {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn mapped_gateway_is_unmapped() -> anyhow::Result<()> {
        let mapped: Ipv6Addr = "::ffff:192.168.1.1".parse()?;
        let nexthop = Nexthop::gateway(mapped);

        assert_eq!(nexthop.unmapped_gateway(), Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        Ok(())
    }

    #[test]
    fn native_ipv6_gateway_is_kept() -> anyhow::Result<()> {
        let addr: Ipv6Addr = "fd00::1".parse()?;
        assert_eq!(Nexthop::gateway(addr).unmapped_gateway(), Some(IpAddr::V6(addr)));
        Ok(())
    }

    #[test]
    fn interface_has_no_gateway() {
        let nexthop = Nexthop::interface("utun100");
        assert_eq!(nexthop.unmapped_gateway(), None);
        assert!(nexthop.is_interface("utun100"));
        assert!(!nexthop.is_interface("en0"));
    }
}
