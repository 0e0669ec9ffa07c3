//! Stateful fake of the BSD route utility.
//!
//! Keeps an in-memory route table and answers `add`/`delete` the way `route`
//! does, including its "File exists" and "not in table" failures, so tests can
//! assert on table state rather than call sequences.
//!
//! All mocks use `Arc<Mutex<_>>` for interior mutability in async contexts.

#![cfg(test)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::shell_command_ext::{self, CombinedOutput};

use super::retry::ENOMEM_OUTPUT;
use super::route_ops::RouteCmdOps;

/// Parsed `-n <action> [-blackhole] <family> <destination> <nexthop...>` invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteCall {
    pub action: String,
    pub blackhole: bool,
    pub family: String,
    pub destination: String,
    pub nexthop: Vec<String>,
}

impl RouteCall {
    fn parse(args: &[String]) -> Option<Self> {
        let mut it = args.iter().skip_while(|a| *a == "-n");
        let action = it.next()?.clone();
        let mut next = it.next()?.clone();
        let blackhole = next == "-blackhole";
        if blackhole {
            next = it.next()?.clone();
        }
        let destination = it.next()?.clone();
        Some(Self {
            action,
            blackhole,
            family: next,
            destination,
            nexthop: it.cloned().collect(),
        })
    }

    fn nexthop_label(&self) -> String {
        self.nexthop.last().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct RouteTableState {
    /// (family, destination) -> nexthop arguments
    pub routes: BTreeMap<(String, String), Vec<String>>,
    /// Every invocation in order, including failed ones.
    pub calls: Vec<Vec<String>>,
    /// Number of upcoming calls failing with the kernel allocation error.
    pub enomem_remaining: u32,
    /// Map of action -> output. If set, that action fails permanently with the output.
    pub fail_on: HashMap<String, String>,
}

impl RouteTableState {
    pub fn contains(&self, family: &str, destination: &str) -> bool {
        self.routes.contains_key(&(family.to_string(), destination.to_string()))
    }

    fn apply(&mut self, args: &[String]) -> CombinedOutput {
        self.calls.push(args.to_vec());

        if self.enomem_remaining > 0 {
            self.enomem_remaining -= 1;
            return failure(format!("route: writing to routing socket: {ENOMEM_OUTPUT}\n"));
        }

        let Some(call) = RouteCall::parse(args) else {
            return failure(format!("usage: route [-dnqtv] command [[modifiers] args]: {}\n", args.join(" ")));
        };

        if let Some(msg) = self.fail_on.get(&call.action) {
            return failure(format!("{msg}\n"));
        }

        let key = (call.family.clone(), call.destination.clone());
        match call.action.as_str() {
            "add" if self.routes.contains_key(&key) => failure(format!(
                "route: writing to routing socket: File exists\nadd net {}: gateway {}: File exists\n",
                call.destination,
                call.nexthop.join(" ")
            )),
            "add" => {
                let text = format!("add net {}: gateway {}\n", call.destination, call.nexthop_label());
                self.routes.insert(key, call.nexthop);
                success(text)
            }
            "delete" => match self.routes.remove(&key) {
                Some(_) => success(format!("delete net {}\n", call.destination)),
                None => failure(format!(
                    "route: writing to routing socket: not in table\ndelete net {}: not in table\n",
                    call.destination
                )),
            },
            other => failure(format!("route: {other}: bad command\n")),
        }
    }
}

fn success(text: String) -> CombinedOutput {
    CombinedOutput {
        success: true,
        status_code: Some(0),
        text,
    }
}

fn failure(text: String) -> CombinedOutput {
    CombinedOutput {
        success: false,
        status_code: Some(1),
        text,
    }
}

#[derive(Clone)]
pub struct MockRouteCmdOps {
    pub state: Arc<Mutex<RouteTableState>>,
}

impl MockRouteCmdOps {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RouteTableState::default())),
        }
    }

    pub fn with_state(state: RouteTableState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

#[async_trait]
impl RouteCmdOps for MockRouteCmdOps {
    async fn run(&self, args: &[String]) -> Result<CombinedOutput, shell_command_ext::Error> {
        let mut s = self.state.lock().unwrap();
        Ok(s.apply(args))
    }
}
