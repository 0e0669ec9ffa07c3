use async_trait::async_trait;
use meshvpn_lib::routing::{RetryPolicy, RouteCmdOps};
use meshvpn_lib::shell_command_ext::{self, CombinedOutput};

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const VPN_INTERFACE: &str = "utun100";
pub const ENOMEM: &str = "route: writing to routing socket: sysctl: cannot allocate memory";

#[derive(Debug, Default)]
pub struct KernelState {
    /// (family flag, destination)
    pub table: BTreeSet<(String, String)>,
    pub calls: Vec<(Instant, Vec<String>)>,
    /// destination -> number of upcoming ENOMEM failures
    pub enomem_for: HashMap<String, u32>,
    pub always_enomem: bool,
    /// Output returned with exit status 1 for every call.
    pub fail_with: Option<String>,
}

impl KernelState {
    pub fn calls_for(&self, destination: &str) -> Vec<Instant> {
        self.calls
            .iter()
            .filter(|(_, args)| args.iter().any(|a| a == destination))
            .map(|(at, _)| *at)
            .collect()
    }
}

/// Minimal kernel route table answering like the BSD `route` utility.
#[derive(Clone, Default)]
pub struct FakeKernel {
    pub state: Arc<Mutex<KernelState>>,
}

fn output(success: bool, text: impl Into<String>) -> CombinedOutput {
    CombinedOutput {
        success,
        status_code: Some(if success { 0 } else { 1 }),
        text: text.into(),
    }
}

#[async_trait]
impl RouteCmdOps for FakeKernel {
    async fn run(&self, args: &[String]) -> Result<CombinedOutput, shell_command_ext::Error> {
        let mut s = self.state.lock().unwrap();
        s.calls.push((Instant::now(), args.to_vec()));

        if s.always_enomem {
            return Ok(output(false, ENOMEM));
        }
        if let Some(text) = s.fail_with.clone() {
            return Ok(output(false, text));
        }

        let rest: Vec<&str> = args.iter().map(String::as_str).filter(|a| *a != "-blackhole").collect();
        let (action, family, destination) = match rest.as_slice() {
            ["-n", action, family, destination, ..] => (*action, family.to_string(), destination.to_string()),
            _ => return Ok(output(false, "usage: route [-dnqtv] command [[modifiers] args]")),
        };

        if let Some(remaining) = s.enomem_for.get_mut(&destination) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(output(false, ENOMEM));
            }
        }

        let key = (family, destination.clone());
        Ok(match action {
            "add" => {
                if s.table.insert(key) {
                    output(true, format!("add net {destination}"))
                } else {
                    output(
                        false,
                        format!("route: writing to routing socket: File exists\nadd net {destination}: File exists"),
                    )
                }
            }
            "delete" => {
                if s.table.remove(&key) {
                    output(true, format!("delete net {destination}"))
                } else {
                    output(
                        false,
                        format!("route: writing to routing socket: not in table\ndelete net {destination}: not in table"),
                    )
                }
            }
            other => output(false, format!("route: {other}: bad command")),
        })
    }
}

pub fn compressed_policy() -> RetryPolicy {
    RetryPolicy {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(40),
        max_elapsed_time: Duration::from_millis(200),
    }
}
