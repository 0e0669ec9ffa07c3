use thiserror::Error;
use tokio::process::Command;

use std::future::Future;
use std::io;
use std::process::Output;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}

/// Outcome of a command whose failure is interpreted by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombinedOutput {
    pub success: bool,
    pub status_code: Option<i32>,
    /// stdout followed by stderr, lossily decoded
    pub text: String,
}

impl CombinedOutput {
    pub fn from_output(output: &Output) -> Self {
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Self {
            success: output.status.success(),
            status_code: output.status.code(),
            text,
        }
    }
}

pub trait ShellCommandExt {
    fn run_combined(&mut self) -> impl Future<Output = Result<CombinedOutput, Error>> + Send;
}

impl ShellCommandExt for Command {
    /// Run the command and hand back exit status and combined output without judging it.
    /// Only a failure to spawn or wait on the process is an error here.
    async fn run_combined(&mut self) -> Result<CombinedOutput, Error> {
        let output = self.output().await?;
        Ok(CombinedOutput::from_output(&output))
    }
}
