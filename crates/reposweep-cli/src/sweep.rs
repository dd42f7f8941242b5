//! Run driver: turns parsed flags into a configured pipeline and runs it.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use log::debug;
use log::error;
use log::info;
use reposweep_core::DestRoot;
use reposweep_core::ExtractionLimits;
use reposweep_core::RunOptions;
use reposweep_core::RunSummary;
use reposweep_core::ScannerConfig;
use reposweep_core::SweepConfig;
use reposweep_core::Target;
use reposweep_core::cancel::ChildRegistry;
use reposweep_core::cancel::InterruptController;
use reposweep_core::cancel::StopSignal;
use reposweep_core::config;
use reposweep_core::feed::FeedStats;
use reposweep_core::feed::feed_lines;
use reposweep_core::feed::feed_targets;
use reposweep_core::pipeline::PipelineContext;
use reposweep_core::pipeline::QueueProducer;
use reposweep_core::pipeline::SweepPipeline;
use reposweep_core::pipeline::WorkerPool;

use crate::cli::Cli;
use crate::error::add_config_context;
use crate::error::convert_target_error;
use crate::output::OutputReporter;

/// Where targets come from.
#[derive(Debug)]
enum Input {
    Single(Target),
    File(PathBuf),
    Stdin,
}

impl Input {
    fn from_cli(cli: &Cli) -> Result<Self> {
        if let Some(repo) = &cli.repo {
            let target = Target::parse(repo).map_err(|e| convert_target_error(&e))?;
            return Ok(Self::Single(target));
        }
        Ok(cli.repos.clone().map_or(Self::Stdin, Self::File))
    }

    fn feed(self, queue: &QueueProducer) -> FeedStats {
        match self {
            Self::Single(target) => feed_targets([target], queue),
            Self::File(path) => match File::open(&path) {
                Ok(file) => feed_lines(BufReader::new(file), queue),
                Err(e) => {
                    error!("could not open {}: {e}", path.display());
                    FeedStats::default()
                }
            },
            Self::Stdin => feed_lines(io::stdin().lock(), queue),
        }
    }
}

/// Builds the run configuration from CLI flags.
///
/// Creates the output directory and reads the scanner config as a side
/// effect, so every startup failure surfaces here.
pub fn build_config(cli: &Cli) -> Result<SweepConfig> {
    let output_dir = match &cli.out_dir {
        Some(dir) => dir.clone(),
        None => add_config_context(config::default_output_dir())?,
    };
    let output_dir = add_config_context(config::prepare_output_dir(&output_dir))?;

    let mut sweep = SweepConfig::new(output_dir);
    sweep.workers = usize::from(cli.threads);
    sweep.mirror = cli.mirror.as_deref().map(config::normalize_mirror);

    let defaults = ExtractionLimits::default();
    sweep.limits = ExtractionLimits {
        max_entries: cli.max_entries,
        max_total_size: cli.max_total_size.unwrap_or(defaults.max_total_size),
        max_depth: cli.max_depth,
    };
    if let Some(max) = cli.max_archive_size {
        sweep.max_archive_bytes = max;
    }

    sweep.options = RunOptions {
        branch: cli.branch.clone(),
        save_repo: cli.save_repo,
        count_files: cli.files,
        file_filter: cli.filter_files,
        github1s: cli.github1s,
    };

    if !cli.no_scan {
        let home = add_config_context(config::home_dir())?;
        let scanner = add_config_context(ScannerConfig::resolve(
            cli.scanner_path.clone(),
            cli.config_path.as_deref(),
            &sweep.output_dir,
            &home,
        ))?;
        debug!(
            "scanner {} with flags {:?}",
            scanner.binary.display(),
            scanner.extra_flags
        );
        sweep.scanner = Some(scanner);
    }

    add_config_context(sweep.validate())?;
    Ok(sweep)
}

/// Runs one sweep and reports every outcome through `reporter`.
pub fn run(cli: &Cli, reporter: Arc<dyn OutputReporter>) -> Result<RunSummary> {
    let input = Input::from_cli(cli)?;
    let sweep = build_config(cli)?;

    if sweep.scanner.is_none() && sweep.mirror.is_none() {
        info!("without scanning, downloads are fast enough to hit GitHub rate limits; consider --mirror");
    }

    let stop = Arc::new(StopSignal::new());
    let children = Arc::new(ChildRegistry::new());
    Arc::new(InterruptController::new(
        Arc::clone(&stop),
        Arc::clone(&children),
    ))
    .install()
    .context("failed to install the interrupt handler")?;

    let root = DestRoot::new(&sweep.output_dir).with_context(|| {
        format!(
            "output directory '{}' is not usable",
            sweep.output_dir.display()
        )
    })?;
    info!("writing results under {}", root.as_path().display());

    let context = Arc::new(PipelineContext::with_signals(sweep.workers, stop, children));
    let pipeline = SweepPipeline::from_config(&sweep, root, Arc::clone(context.children()));

    let summary = WorkerPool::new(context)
        .run(Arc::new(pipeline), Arc::clone(&reporter), move |queue| {
            let stats = input.feed(queue);
            debug!(
                "feed done: {} accepted, {} invalid, {} duplicates",
                stats.accepted, stats.invalid, stats.duplicates
            );
        })
        .context("failed to start the worker pool")?;

    reporter.finish(&summary);
    Ok(summary)
}
