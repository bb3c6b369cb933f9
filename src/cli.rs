//! Command-line surface for running a container.
//!
//! The framework ships no executable of its own; an embedder defines a
//! concrete container and calls [`run_in_command_line`] from its binary. The
//! option set mirrors the run configuration one to one, with the enumerated
//! values taken as integers.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;

use crate::config::{DisplayMessages, RunConfig, RunLevel, RunMode, SharedConfig};
use crate::engine::Container;
use crate::error::Result;

/// Container command line interface.
#[derive(Debug, Parser)]
#[command(about = "Run a process container.")]
pub struct ContainerCli {
    /// Path of a JSON data file merged into the configuration.
    #[arg(short = 'f', long = "data-file", value_name = "PATH")]
    pub data_file: Option<Utf8PathBuf>,

    /// Run mode: 0 terminal, 1 parent terminal, 2 gui.
    #[arg(long = "run-mode", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub run_mode: u8,

    /// Run level: 0 all, 1 pre dependencies only, 2 post dependencies only,
    /// 3 pre and post dependencies only, 4 process only, 5 process and post
    /// dependencies only.
    #[arg(long = "run-level", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=5))]
    pub run_level: u8,

    /// Only run the named processes.
    #[arg(long = "processes-to-run", num_args = 0.., value_name = "NAME")]
    pub processes_to_run: Vec<String>,

    /// Skip the named processes.
    #[arg(long = "processes-to-ignore", num_args = 0.., value_name = "NAME")]
    pub processes_to_ignore: Vec<String>,

    /// Ignore failed ignorable pre dependencies.
    #[arg(long = "ignore-failed-pre-dependencies")]
    pub ignore_failed_pre_dependencies: bool,

    /// Ignore failed ignorable post dependencies.
    #[arg(long = "ignore-failed-post-dependencies")]
    pub ignore_failed_post_dependencies: bool,

    /// Propagate errors instead of converting them to failure messages.
    #[arg(long = "raise-exceptions")]
    pub raise_exceptions: bool,

    /// Display messages: 0 none, 1 all, 2 info, 3 success, 4 warning,
    /// 5 failure.
    #[arg(long = "display-messages", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=5))]
    pub display_messages: u8,

    /// User description recorded for the run.
    #[arg(long = "user-description", value_name = "TEXT")]
    pub user_description: Option<String>,

    /// Description recorded for ignored items.
    #[arg(long = "ignore-description", value_name = "TEXT")]
    pub ignore_description: Option<String>,

    /// Print the container description and exit without running.
    #[arg(long = "display-info")]
    pub display_info: bool,
}

impl ContainerCli {
    /// Convert the parsed options into a run configuration.
    pub fn to_run_config(&self) -> Result<RunConfig> {
        let mut builder = RunConfig::builder()
            .run_mode(RunMode::try_from(self.run_mode)?)
            .run_level(RunLevel::try_from(self.run_level)?)
            .processes_to_run(self.processes_to_run.iter().cloned())
            .processes_to_ignore(self.processes_to_ignore.iter().cloned())
            .ignore_failed_pre_dependencies(self.ignore_failed_pre_dependencies)
            .ignore_failed_post_dependencies(self.ignore_failed_post_dependencies)
            .raise_exceptions(self.raise_exceptions)
            .display_messages(DisplayMessages::try_from(self.display_messages)?);

        if let Some(description) = &self.user_description {
            builder = builder.user_description(description.clone());
        }
        if let Some(description) = &self.ignore_description {
            builder = builder.ignore_description(description.clone());
        }

        Ok(builder.build())
    }
}

/// Parse the process arguments and drive the supplied container through one
/// run. Returns the overall run result.
pub fn run_in_command_line<F>(build: F) -> anyhow::Result<bool>
where
    F: FnOnce(SharedConfig) -> Result<Container>,
{
    let cli = ContainerCli::parse();
    run_parsed(cli, build)
}

/// [`run_in_command_line`] with pre-parsed options, for embedding and tests.
pub fn run_parsed<F>(cli: ContainerCli, build: F) -> anyhow::Result<bool>
where
    F: FnOnce(SharedConfig) -> Result<Container>,
{
    if cli.display_info {
        let config = RunConfig::default().shared();
        let container = build(config).context("failed to build the container")?;
        println!("{}", container.describe());
        return Ok(true);
    }

    let config = cli.to_run_config()?.shared();
    if let Some(path) = &cli.data_file {
        config
            .load_overlay(path)
            .with_context(|| format!("failed to load data file {path}"))?;
    }

    let mut container = build(config).context("failed to build the container")?;
    let result = container.run()?;
    Ok(result)
}
