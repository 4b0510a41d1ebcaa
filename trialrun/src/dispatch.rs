// Copyright (c) The trialrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    errors::to_utf8_path,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use semver::Version;
use std::{io::Write, num::NonZeroUsize, str::FromStr, sync::Arc, time::Duration};
use supports_color::Stream;
use tracing::{info, warn};
use trialrun_runner::{
    condition::EnvSnapshot,
    config::TrialrunConfig,
    list::{Suite, TestList},
    order::{OrderStrategy, RunSeed},
    reporter::{TestReporterBuilder, junit::write_junit_report},
    runner::TestRunnerBuilder,
    temp_dir::TempDirProvider,
    test_filter::{TestFilter, TestFilterBuilder},
};

/// A lifecycle-aware test runner.
///
/// Runs suites of units with before/after hooks, enablement conditions, ordering strategies,
/// repetitions, parameters and timeouts.
#[derive(Debug, Parser)]
#[command(
    version,
    name = "trialrun",
    styles = clap_styles::style(),
    max_term_width = 100
)]
pub struct TrialrunApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl TrialrunApp {
    /// Initializes the output context, including logging.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app against the given root suites.
    ///
    /// Returns the exit code.
    pub fn exec(
        self,
        suites: Vec<Suite>,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        match self.command {
            Command::List { filter, env } => {
                let test_list = TestList::discover(suites, &filter.to_filter())?;
                let colorize = output.color.should_colorize(Stream::Stdout);
                let mut writer = output_writer.stdout_writer();
                test_list
                    .write_human(&mut writer, &env.to_snapshot(), output.verbose, colorize)
                    .and_then(|()| writer.flush())
                    .map_err(ExpectedError::write_test_list_error)?;
            }
            Command::Run(run_opts) => {
                let config = self.config_opts.make_config()?;
                run_opts.exec(&config, suites, output, output_writer)?;
            }
        }
        Ok(0)
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Root directory for config and relative report paths [default: current directory]
    #[arg(long, global = true, value_name = "DIR")]
    workspace_root: Option<Utf8PathBuf>,

    /// Config file [default: workspace-root/.config/trialrun.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn workspace_root(&self) -> Result<Utf8PathBuf> {
        match &self.workspace_root {
            Some(root) => Ok(root.clone()),
            None => {
                let current_dir = std::env::current_dir()
                    .map_err(|error| ExpectedError::CurrentDirFailed { error })?;
                to_utf8_path(current_dir)
            }
        }
    }

    fn make_config(&self) -> Result<TrialrunConfig> {
        let workspace_root = self.workspace_root()?;
        Ok(TrialrunConfig::from_sources(
            workspace_root,
            self.config_file.as_deref(),
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List suites and units
    ///
    /// Units are shown with their number of executions and whether they are eligible to run in
    /// the current environment. Units excluded by filters are only shown with --verbose.
    List {
        #[command(flatten)]
        filter: TestFilterOpts,

        #[command(flatten)]
        env: EnvOpts,
    },

    /// Run units
    Run(RunOpts),
}

#[derive(Debug, Args)]
#[command(next_help_heading = "FILTER OPTIONS")]
struct TestFilterOpts {
    /// Only run units whose identifier matches a filter exactly
    #[arg(long)]
    exact: bool,

    /// Skip units whose identifier contains this pattern
    #[arg(long, value_name = "PATTERN")]
    skip: Vec<String>,

    /// Only run units carrying at least one of these tags
    #[arg(long, value_name = "TAG")]
    tag: Vec<String>,

    /// Skip units carrying this tag
    #[arg(long, value_name = "TAG")]
    exclude_tag: Vec<String>,

    /// Unit identifier filters (substring matches, unless --exact is passed)
    #[arg(help_heading = None, value_name = "FILTERS")]
    filters: Vec<String>,
}

impl TestFilterOpts {
    fn to_filter(&self) -> TestFilter {
        let mut builder = TestFilterBuilder::default();
        for filter in &self.filters {
            if self.exact {
                builder.add_exact_pattern(filter);
            } else {
                builder.add_substring_pattern(filter);
            }
        }
        for pattern in &self.skip {
            builder.add_skip_pattern(pattern);
        }
        for tag in &self.tag {
            builder.add_tag(tag);
        }
        for tag in &self.exclude_tag {
            builder.add_excluded_tag(tag);
        }
        builder.build()
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "ENVIRONMENT OPTIONS")]
struct EnvOpts {
    /// Runtime version that runtime predicates are evaluated against
    #[arg(
        long,
        value_name = "VERSION",
        env = "TRIALRUN_RUNTIME_VERSION",
        default_value = env!("CARGO_PKG_VERSION")
    )]
    runtime_version: Version,
}

impl EnvOpts {
    fn to_snapshot(&self) -> EnvSnapshot {
        EnvSnapshot::from_host(self.runtime_version.clone())
    }
}

#[derive(Debug, Args)]
struct RunOpts {
    /// Config profile to use
    #[arg(long, short = 'P', env = "TRIALRUN_PROFILE")]
    profile: Option<String>,

    #[command(flatten)]
    filter: TestFilterOpts,

    #[command(flatten)]
    env: EnvOpts,

    #[command(flatten)]
    runner_opts: TestRunnerOpts,

    #[command(flatten)]
    reporter_opts: TestReporterOpts,
}

impl RunOpts {
    fn exec(
        self,
        config: &TrialrunConfig,
        suites: Vec<Suite>,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<()> {
        let profile =
            config.profile(self.profile.as_deref().unwrap_or(TrialrunConfig::DEFAULT_PROFILE))?;

        let test_list = TestList::discover(suites, &self.filter.to_filter())?;
        if test_list.matching_count() == 0 {
            return Err(ExpectedError::NoTestsRun);
        }

        let mut runner_builder = self.runner_opts.to_builder();
        runner_builder.apply_profile(&profile);
        let runner = runner_builder.build(&test_list, self.env.to_snapshot())?;
        info!(
            profile = profile.name(),
            "running {} units with seed {} (pass --seed {} to reproduce)",
            test_list.matching_count(),
            runner.seed(),
            runner.seed(),
        );

        let mut reporter = TestReporterBuilder::default()
            .set_colorize(output.color.should_colorize(Stream::Stderr))
            .set_verbose(output.verbose)
            .build(output_writer.reporter_output());
        let report = runner.try_execute(|event| reporter.write_event(&event))?;

        let junit = match &self.reporter_opts.junit {
            Some(path) => Some(profile.junit_at(path)),
            None => profile.junit(),
        };
        if let Some(junit) = junit {
            write_junit_report(&report, &junit)?;
            info!("wrote JUnit report to {}", junit.path());
        }

        if !report.is_success() {
            return Err(ExpectedError::TestRunFailed);
        }
        if report.stats.executed_count() == 0 {
            warn!("every unit was skipped");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "RUNNER OPTIONS")]
struct TestRunnerOpts {
    /// Seed for random ordering [default: from profile, else generated]
    #[arg(long, value_name = "SEED", env = "TRIALRUN_SEED")]
    seed: Option<u64>,

    /// Order for suites that don't declare one: declared, alphanumeric, random, explicit
    /// [default: from profile]
    #[arg(long, value_name = "ORDER", value_parser = OrderStrategy::from_str)]
    order: Option<OrderStrategy>,

    /// Number of root suites to run simultaneously [default: from profile]
    #[arg(long, value_name = "THREADS")]
    suite_threads: Option<NonZeroUsize>,

    /// Report executions running longer than this as slow [default: from profile]
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    slow_timeout: Option<Duration>,

    /// Create scoped temporary directories under this directory [default: system temp dir]
    #[arg(long, value_name = "DIR")]
    temp_dir: Option<Utf8PathBuf>,
}

impl TestRunnerOpts {
    fn to_builder(&self) -> TestRunnerBuilder {
        let mut builder = TestRunnerBuilder::default();
        if let Some(seed) = self.seed {
            builder.set_seed(RunSeed(seed));
        }
        if let Some(order) = self.order {
            builder.set_default_order(order);
        }
        if let Some(suite_threads) = self.suite_threads {
            builder.set_suite_threads(suite_threads);
        }
        if let Some(slow_timeout) = self.slow_timeout {
            builder.set_slow_timeout(slow_timeout);
        }
        if let Some(temp_dir) = &self.temp_dir {
            builder.set_scoped_dir_provider(Arc::new(TempDirProvider::with_base(temp_dir)));
        }
        builder
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "REPORTER OPTIONS")]
struct TestReporterOpts {
    /// Write a JUnit report to this path, relative to the workspace root [default: from profile]
    #[arg(long, value_name = "PATH")]
    junit: Option<Utf8PathBuf>,
}
