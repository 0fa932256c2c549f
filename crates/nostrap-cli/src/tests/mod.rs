//! In-process tests for the CLI runtime with a static configuration.

use std::ffi::OsString;
use std::process::ExitCode;

use rstest::{fixture, rstest};

use nostrap_config::{Config, StoreBackend};

use crate::config::ConfigLoader;
use crate::{AppError, run_with_loader};

struct StaticConfigLoader {
    config: Config,
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

struct Outcome {
    exit: ExitCode,
    stdout: String,
    stderr: String,
}

fn invoke(config: Config, args: &[&str]) -> Outcome {
    let loader = StaticConfigLoader { config };
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let argv = std::iter::once("nostrap")
        .chain(args.iter().copied())
        .map(OsString::from);
    let exit = run_with_loader(argv, &mut stdout, &mut stderr, &loader);
    Outcome {
        exit,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    }
}

#[fixture]
fn memory_config() -> Config {
    Config {
        address: Some(String::from("http://127.0.0.1:9")),
        ssm_prefix: Some(String::from("/nomad/acl")),
        aws_region: Some(String::from("eu-west-1")),
        store: Some(StoreBackend::Memory),
        log_filter: Some(String::from("off")),
        ..Config::default()
    }
}

#[rstest]
#[case("read")]
#[case("update")]
fn empty_store_reads_absent(memory_config: Config, #[case] command: &str) {
    let outcome = invoke(memory_config, &[command]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    assert_eq!(outcome.stdout, "absent\n");
}

#[rstest]
fn delete_prints_nothing(memory_config: Config) {
    let outcome = invoke(memory_config, &["delete"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert!(outcome.stdout.is_empty());
}

#[rstest]
fn help_goes_to_stdout(memory_config: Config) {
    let outcome = invoke(memory_config, &["--help"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert!(outcome.stdout.contains("create"));
    assert!(outcome.stderr.is_empty());
}

#[rstest]
fn unknown_command_is_a_usage_error(memory_config: Config) {
    let outcome = invoke(memory_config, &["import"]);

    assert_eq!(outcome.exit, ExitCode::from(2));
    assert!(!outcome.stderr.is_empty());
}

#[rstest]
fn missing_address_names_the_flag(mut memory_config: Config) {
    memory_config.address = None;

    let outcome = invoke(memory_config, &["read"]);

    assert_eq!(outcome.exit, ExitCode::from(2));
    assert!(outcome.stderr.contains("--address"), "stderr: {}", outcome.stderr);
}

#[rstest]
fn zero_interval_is_rejected(mut memory_config: Config) {
    memory_config.poll_interval_secs = Some(0);

    let outcome = invoke(memory_config, &["create"]);

    assert_eq!(outcome.exit, ExitCode::from(2));
    assert!(outcome.stderr.contains("poll interval"));
}

#[rstest]
fn unsupported_scheme_fails_the_operation(mut memory_config: Config) {
    memory_config.address = Some(String::from("ftp://nomad.internal"));

    let outcome = invoke(memory_config, &["create"]);

    assert_eq!(outcome.exit, ExitCode::from(1));
    assert!(outcome.stdout.is_empty());
    assert!(outcome.stderr.starts_with("nostrap: "));
}

#[cfg(not(feature = "ssm"))]
#[rstest]
fn parameter_store_requires_the_feature(mut memory_config: Config) {
    memory_config.store = Some(StoreBackend::Ssm);

    let outcome = invoke(memory_config, &["read"]);

    assert_eq!(outcome.exit, ExitCode::from(2));
    assert!(outcome.stderr.contains("ssm"));
}
