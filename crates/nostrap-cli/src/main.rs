//! CLI entrypoint for the nostrap bootstrap tool.
//!
//! The binary delegates to [`nostrap_cli::run`], which loads configuration,
//! parses the lifecycle command, and prints the resulting resource state.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    nostrap_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
