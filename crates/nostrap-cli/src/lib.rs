//! Command-line runtime for the nostrap bootstrap tool.
//!
//! The runtime splits leading configuration flags from the lifecycle
//! command, loads layered configuration, and drives one operation of the
//! managed ACL token. Output streams and the configuration loader are
//! injectable so the whole flow can run inside tests.
//!
//! Exit codes: `0` on success (including an absent token), `1` when the
//! operation fails, and `2` for usage or configuration errors.

mod cli;
mod config;
mod errors;
mod output;
mod signals;
mod telemetry;

#[cfg(test)]
mod tests;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};

use nostrap_config::{Config, RetrySettings, StoreBackend};
use nostrap_core::store::{FileStoreFactory, MemoryStoreFactory};
use nostrap_core::{
    AclTokenResource, CancellationToken, HttpClusterClient, Poller, ResourceSpec, RetryPolicy,
    StoreFactory,
};

use cli::{Cli, Command};
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
pub(crate) use errors::AppError;
use signals::SignalGuard;

const CLI_TARGET: &str = "nostrap::cli";

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(help) if !help.use_stderr() => {
            return if write!(stdout, "{}", help.render()).is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| execute(&cli, &config, stdout));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(stderr, &error),
    }
}

fn execute<W: Write>(cli: &Cli, config: &Config, stdout: &mut W) -> Result<(), AppError> {
    telemetry::initialise(config)?;
    let inputs = config.resource_inputs()?;
    let settings = config.retry_settings()?;
    let stores = store_factory(config)?;
    let client = HttpClusterClient::new(config.request_timeout()).map_err(AppError::Client)?;

    let cancel = CancellationToken::new();
    let _signals = SignalGuard::install(cancel.clone()).map_err(AppError::Signals)?;
    let resource = AclTokenResource::new(client, stores).with_poller(poller(settings, cancel));
    let spec = ResourceSpec::new(inputs.address, inputs.ssm_prefix, inputs.aws_region);

    info!(
        target: CLI_TARGET,
        command = ?cli.command,
        store = %config.store_backend(),
        interval_secs = settings.interval.as_secs(),
        "running lifecycle command"
    );
    match cli.command {
        Command::Create => {
            let state = resource.create(&spec)?;
            output::write_state(stdout, &state, cli.show_secret)
        }
        Command::Read => output::write_outcome(stdout, &resource.read(&spec)?, cli.show_secret),
        Command::Update => {
            output::write_outcome(stdout, &resource.update(&spec)?, cli.show_secret)
        }
        Command::Delete => resource.delete(&spec).map_err(AppError::from),
    }
}

fn store_factory(config: &Config) -> Result<Arc<dyn StoreFactory>, AppError> {
    match config.store_backend() {
        StoreBackend::Memory => Ok(Arc::new(MemoryStoreFactory::new())),
        StoreBackend::File => Ok(Arc::new(FileStoreFactory::new(config.store_dir()))),
        #[cfg(feature = "ssm")]
        StoreBackend::Ssm => Ok(Arc::new(nostrap_core::store::SsmStoreFactory)),
        #[cfg(not(feature = "ssm"))]
        backend @ StoreBackend::Ssm => Err(AppError::StoreUnavailable { backend }),
    }
}

fn poller(settings: RetrySettings, cancel: CancellationToken) -> Poller {
    let mut policy = RetryPolicy::unbounded(settings.interval);
    if let Some(attempts) = settings.max_attempts {
        policy = policy.with_max_attempts(attempts);
    }
    if let Some(deadline) = settings.deadline {
        policy = policy.with_deadline(deadline);
    }
    Poller::new(policy).with_cancellation(cancel)
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    if let Err(write_error) = writeln!(stderr, "nostrap: {error}") {
        debug!(target: CLI_TARGET, %write_error, "failed to report error");
    }
    ExitCode::from(error.exit_code())
}
