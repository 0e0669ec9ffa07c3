use cidr::IpCidr;
use clap::{Args, Parser, Subcommand};

use std::net::IpAddr;
use std::path::PathBuf;

use meshvpn_lib::routing::{self, Action, Nexthop};
use meshvpn_lib::{config, logging};

/// Mesh VPN route control - installs or removes a single kernel route
#[derive(Debug, Parser)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file
    #[arg(
        short,
        long,
        env = config::ENV_VAR,
        default_value = config::DEFAULT_PATH
    )]
    pub config_path: PathBuf,

    /// VPN interface name, overrides the configuration file
    #[arg(long)]
    pub vpn_interface: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, env = logging::ENV_VAR_LOG_FILE)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a route to the kernel routing table
    #[command()]
    Add(RouteArgs),

    /// Remove a route from the kernel routing table
    #[command()]
    Remove(RouteArgs),
}

#[derive(Debug, Args)]
pub struct RouteArgs {
    /// Destination prefix in CIDR notation or a single address
    #[arg(value_parser = routing::parse_prefix)]
    pub prefix: IpCidr,

    #[command(flatten)]
    pub nexthop: NexthopArgs,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct NexthopArgs {
    /// Forward through this gateway address
    #[arg(long)]
    pub via: Option<IpAddr>,

    /// Egress through this interface
    #[arg(long)]
    pub interface: Option<String>,
}

impl NexthopArgs {
    /// `None` only if clap's group check was bypassed.
    pub fn into_nexthop(self) -> Option<Nexthop> {
        match (self.via, self.interface) {
            (Some(gateway), None) => Some(Nexthop::Gateway(gateway)),
            (None, Some(interface)) => Some(Nexthop::Interface(interface)),
            _ => None,
        }
    }
}

impl Command {
    pub fn into_parts(self) -> (Action, RouteArgs) {
        match self {
            Command::Add(args) => (Action::Add, args),
            Command::Remove(args) => (Action::Delete, args),
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
