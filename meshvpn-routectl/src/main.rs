use exitcode::{self, ExitCode};

use std::path::Path;
use std::process;

use meshvpn_lib::config::{self, Config};
use meshvpn_lib::logging;
use meshvpn_lib::routing::{Action, RouteManager};

mod cli;

#[tokio::main]
async fn main() {
    let args = cli::parse();

    match &args.log_file {
        Some(path) => {
            if let Err(e) = logging::setup_log_file(path) {
                eprintln!("Unable to open log file {}: {}", path.display(), e);
                process::exit(exitcode::CANTCREAT);
            }
        }
        None => logging::setup_stderr(),
    }

    let exit = run(args).await;
    process::exit(exit);
}

async fn run(args: cli::Cli) -> ExitCode {
    let config = match load_config(&args.config_path, args.vpn_interface.as_deref()).await {
        Ok(config) => config,
        Err(code) => return code,
    };

    let manager = match RouteManager::from_config(&config) {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "invalid route manager configuration");
            return exitcode::CONFIG;
        }
    };

    let (action, route) = args.command.into_parts();
    let prefix = route.prefix;
    let Some(nexthop) = route.nexthop.into_nexthop() else {
        tracing::error!("exactly one of --via or --interface is required");
        return exitcode::USAGE;
    };

    let res = match action {
        Action::Add => manager.add_route(prefix, &nexthop).await,
        Action::Delete => manager.remove_route(prefix, &nexthop).await,
    };

    match res {
        Ok(()) => {
            tracing::info!(%action, %prefix, %nexthop, "route updated");
            exitcode::OK
        }
        Err(e) => {
            tracing::error!(error = %e, "route update failed");
            exitcode::SOFTWARE
        }
    }
}

async fn load_config(path: &Path, vpn_interface: Option<&str>) -> Result<Config, ExitCode> {
    let mut config = match config::read(path).await {
        Ok(config) => config,
        Err(config::Error::NoFile) if path == Path::new(config::DEFAULT_PATH) => {
            tracing::debug!("no configuration file at default location, using defaults");
            Config::default()
        }
        Err(e @ (config::Error::NoFile | config::Error::IO(_))) => {
            tracing::error!(error = %e, path = %path.display(), "unable to read configuration file");
            return Err(exitcode::NOINPUT);
        }
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "invalid configuration file");
            return Err(exitcode::CONFIG);
        }
    };

    if let Some(name) = vpn_interface {
        config.vpn_interface = name.to_string();
    }
    config.validate().map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        exitcode::CONFIG
    })?;
    Ok(config)
}
