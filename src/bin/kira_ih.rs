use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_image_harvester::app::{
    App, BatchOptions, DownloadRequest, ProgressSink, RetryRequest, RunReport, RunStatus,
};
use kira_image_harvester::config::{ConfigLoader, ResolvedConfig, seconds};
use kira_image_harvester::domain::Layout;
use kira_image_harvester::error::KiraError;
use kira_image_harvester::extract::extract_from_log;
use kira_image_harvester::fetch::{ImageHttpClient, RetryingFetcher, ThreadPause};
use kira_image_harvester::output::{JsonOutput, OutputMode};
use kira_image_harvester::progress::BarProgress;
use kira_image_harvester::store::Store;

#[derive(Parser)]
#[command(name = "kira-ih")]
#[command(about = "Download observation images by species and retry the ones that failed")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Retry only the images listed as failed in a log file")]
    Retry(RetryArgs),
    #[command(about = "Download every image referenced by the source tables")]
    Download(DownloadArgs),
    #[command(about = "Print the image URLs found in a log file")]
    Extract(ExtractArgs),
}

#[derive(Args, Clone)]
struct BatchArgs {
    #[arg(long = "csv", required = true, num_args = 1..)]
    sources: Vec<PathBuf>,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(short, long)]
    delay: Option<f64>,

    #[arg(long)]
    layout: Option<Layout>,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Clone)]
struct RetryArgs {
    #[command(flatten)]
    batch: BatchArgs,

    #[arg(long)]
    error_file: PathBuf,
}

#[derive(Args, Clone)]
struct DownloadArgs {
    #[command(flatten)]
    batch: BatchArgs,
}

#[derive(Args, Clone)]
struct ExtractArgs {
    #[arg(long)]
    error_file: PathBuf,
}

fn main() -> ExitCode {
    match run() {
        Ok(status) if status.aborted_early() => ExitCode::from(3),
        Ok(_) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(kira) = report.downcast_ref::<KiraError>() {
                return ExitCode::from(map_exit_code(kira));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::LogRead { .. }
        | KiraError::SourceRead { .. }
        | KiraError::MissingColumn { .. }
        | KiraError::NoSources
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::InvalidConfig(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<RunStatus> {
    let cli = Cli::parse();

    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let progress = match (output_mode, &cli.command) {
        (OutputMode::Interactive, Commands::Retry(_) | Commands::Download(_)) => {
            BarProgress::new("kira-ih")
        }
        _ => BarProgress::hidden("kira-ih"),
    };

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(progress.log_writer(std::io::stderr))
        .init();

    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Retry(args) => run_retry(args, &config, output_mode, &progress),
        Commands::Download(args) => run_download(args, &config, output_mode, &progress),
        Commands::Extract(args) => run_extract(args),
    }
}

fn sink<'a>(
    output_mode: OutputMode,
    progress: &'a BarProgress,
    label: &str,
) -> &'a dyn ProgressSink {
    match output_mode {
        OutputMode::NonInteractive => &JsonOutput,
        OutputMode::Interactive => {
            progress.set_label(label);
            progress
        }
    }
}

fn run_retry(
    args: RetryArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
    progress: &BarProgress,
) -> miette::Result<RunStatus> {
    let output_dir = args
        .batch
        .output_dir
        .clone()
        .unwrap_or_else(|| config.retry_output_dir.clone());
    let options = batch_options(&args.batch, config, Layout::Flat)?;
    let app = build_app(&output_dir, config)?;
    let request = RetryRequest {
        sources: args.batch.sources,
        log_file: args.error_file,
        options,
    };

    let report = app.retry_failed(&request, sink(output_mode, progress, "Retrying"))?;
    print_report(&report, output_mode)?;
    Ok(report.status)
}

fn run_download(
    args: DownloadArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
    progress: &BarProgress,
) -> miette::Result<RunStatus> {
    let output_dir = args
        .batch
        .output_dir
        .clone()
        .unwrap_or_else(|| config.download_output_dir.clone());
    let options = batch_options(&args.batch, config, Layout::Nested)?;
    let app = build_app(&output_dir, config)?;
    let request = DownloadRequest {
        sources: args.batch.sources,
        options,
    };

    let report = app.download_all(&request, sink(output_mode, progress, "Downloading images"))?;
    print_report(&report, output_mode)?;
    Ok(report.status)
}

fn run_extract(args: ExtractArgs) -> miette::Result<RunStatus> {
    let urls = extract_from_log(&args.error_file)?;
    if urls.is_empty() {
        tracing::error!(log = %args.error_file.display(), "no image URLs found in the log file");
        return Ok(RunStatus::NoFailedUrls);
    }
    for url in &urls {
        println!("{url}");
    }
    Ok(RunStatus::Completed)
}

fn batch_options(
    args: &BatchArgs,
    config: &ResolvedConfig,
    default_layout: Layout,
) -> miette::Result<BatchOptions> {
    let delay = match args.delay {
        Some(secs) => seconds("--delay", secs)?,
        None => config.delay,
    };
    Ok(BatchOptions {
        layout: args.layout.or(config.layout).unwrap_or(default_layout),
        delay,
        dry_run: args.dry_run,
    })
}

fn build_app(
    output_dir: &std::path::Path,
    config: &ResolvedConfig,
) -> miette::Result<App<ImageHttpClient, ThreadPause>> {
    let store = Store::from_path(output_dir)?;
    let client = ImageHttpClient::new(config.retry.timeout)?;
    let fetcher = RetryingFetcher::new(client, ThreadPause, config.retry);
    Ok(App::new(store, fetcher))
}

fn print_report(report: &RunReport, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_report(report).into_diagnostic(),
        OutputMode::Interactive => {
            print_summary(report);
            Ok(())
        }
    }
}

fn print_summary(report: &RunReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    if report.status.aborted_early() {
        println!("{yellow}Nothing to download ({:?}){reset}", report.status);
        return;
    }
    if report.dry_run {
        println!(
            "{yellow}Dry run: {} to download, {} already present in {}{reset}",
            report.tally.planned, report.tally.skipped, report.output_dir
        );
        return;
    }
    println!(
        "{green}Downloaded: {}{reset}  |  {red}Failed: {}{reset}  |  Skipped: {}",
        report.tally.success, report.tally.failure, report.tally.skipped
    );
}
