#![deny(missing_docs)]
//! squadcov command-line interface.
//!
//! Runs the test suite with coverage enabled and reports line coverage per
//! squad.

mod runner;

use clap::{Args, Parser, Subcommand, ValueEnum};
use runner::XcodeArgs;
use squadcov_core::{
    AggregationResult, AppDirs, DEFAULT_DELIMITER, MatchMode, SquadCovError, StdFileSystem,
    WrittenReport, assign_with_mode, load_coverage, load_registry, render_json, render_markdown,
    render_text,
};
use std::future::Future;
use std::path::{Path, PathBuf};

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const DATA_DIR_NAME: &str = ".xctest";

#[derive(Parser)]
#[command(name = "squadcov", version, about = "Squad-based coverage reporting")]
struct Cli {
    /// Directory for test logs, derived data and reports (defaults to ~/.xctest).
    #[arg(long, global = true, env = "SQUADCOV_HOME")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug)]
struct SquadArgs {
    /// Path to the squad registry CSV file.
    #[arg(short, long, value_parser = parse_csv_path)]
    input: PathBuf,
    /// Path to the project directory.
    #[arg(short, long, value_parser = parse_dir_path)]
    path: PathBuf,
    /// Column delimiter of the registry file.
    #[arg(long, default_value_t = DEFAULT_DELIMITER)]
    delimiter: char,
    /// How squad filenames are matched against file paths.
    #[arg(long, value_enum, default_value_t = MatchModeArg::Legacy)]
    match_mode: MatchModeArg,
}

#[derive(Args, Clone, Debug)]
struct OutputArgs {
    /// Output format for the console report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the console report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum MatchModeArg {
    /// Substring match, stopping once a squad has one file per filename.
    Legacy,
    /// Path-segment match, claiming every matching file.
    Strict,
}

impl From<MatchModeArg> for MatchMode {
    fn from(value: MatchModeArg) -> Self {
        match value {
            MatchModeArg::Legacy => MatchMode::Legacy,
            MatchModeArg::Strict => MatchMode::Strict,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tests with coverage, then generate the squad report.
    Test {
        #[command(flatten)]
        squads: SquadArgs,
        #[command(flatten)]
        xcode: XcodeArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Generate the squad report from an existing raw coverage report.
    Report {
        #[command(flatten)]
        squads: SquadArgs,
        /// Raw xccov JSON report (defaults to the one from the last test run).
        #[arg(long)]
        raw_report: Option<PathBuf>,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Show the last generated report again.
    Last {
        #[command(flatten)]
        report: OutputArgs,
    },
}

/// Whether a report was written for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReportOutcome {
    Written(WrittenReport),
    Empty,
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\n\u{26A0}\u{FE0F}  {err}\n");
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
fn main() {}

#[cfg(not(test))]
async fn run(cli: Cli) -> CliResult<()> {
    let dirs = AppDirs::new(resolve_data_dir(cli.data_dir)?);

    match cli.command {
        Commands::Test {
            squads,
            xcode,
            report,
        } => {
            let test_run = async {
                runner::run_tests(&xcode, &squads.path, &dirs).await?;
                generate_report(&squads, &dirs.raw_report(), &dirs, &report).await?;
                CliResult::<()>::Ok(())
            };
            until_cancelled(test_run, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        }
        Commands::Report {
            squads,
            raw_report,
            report,
        } => {
            let raw_report = raw_report.unwrap_or_else(|| dirs.raw_report());
            generate_report(&squads, &raw_report, &dirs, &report).await?;
        }
        Commands::Last { report } => show_last_report(&dirs, &report).await?,
    }

    Ok(())
}

/// Drive `task` until it finishes or `cancel` resolves; cancellation is not an error.
async fn until_cancelled<T, C>(task: T, cancel: C) -> CliResult<bool>
where
    T: Future<Output = CliResult<()>>,
    C: Future<Output = ()>,
{
    tokio::select! {
        result = task => result.map(|()| true),
        () = cancel => {
            println!("\nTest execution cancelled.");
            Ok(false)
        }
    }
}

fn resolve_data_dir(data_dir: Option<PathBuf>) -> CliResult<PathBuf> {
    if let Some(dir) = data_dir {
        return Ok(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .ok_or_else(|| "could not determine home directory, pass --data-dir".into())
}

fn parse_csv_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        Ok(path)
    } else {
        Err("input file must have csv extension".to_string())
    }
}

fn parse_dir_path(value: &str) -> Result<PathBuf, String> {
    let path = Path::new(value);
    if !path.is_dir() {
        return Err(format!("not a directory: {value}"));
    }
    std::path::absolute(path).map_err(|err| format!("invalid path {value}: {err}"))
}

async fn generate_report(
    squads: &SquadArgs,
    raw_report: &Path,
    dirs: &AppDirs,
    output: &OutputArgs,
) -> CliResult<ReportOutcome> {
    let fs = StdFileSystem::new();
    let registry = load_registry(&fs, &squads.input, squads.delimiter)?;
    let coverage = load_coverage(&fs, raw_report, &squads.path)?;
    let result = assign_with_mode(coverage, &registry, squads.match_mode.into());

    if result.is_empty() {
        log::warn!("{}", SquadCovError::EmptyResult);
        eprintln!("\n\u{26A0}\u{FE0F}  Could not generate report.");
        return Ok(ReportOutcome::Empty);
    }

    let written = dirs.write_report(&fs, &result)?;
    emit_report(&result, output).await?;
    println!("\nEnter the following command to view the coverage report in CSV format.");
    println!(">  open {}\n", written.csv.display());
    println!("Enter the following command to view the coverage report in HTML format.");
    println!(">  open {}\n", written.html.display());

    Ok(ReportOutcome::Written(written))
}

async fn show_last_report(dirs: &AppDirs, output: &OutputArgs) -> CliResult<()> {
    let result = dirs.load_last_report(&StdFileSystem::new())?;
    emit_report(&result, output).await
}

async fn emit_report(result: &AggregationResult, output: &OutputArgs) -> CliResult<()> {
    let contents = match output.format {
        OutputFormat::Text => render_text(result),
        OutputFormat::Markdown => render_markdown(result),
        OutputFormat::Json => render_json(result)?,
    };
    emit_output(output, contents).await
}

async fn emit_output(output: &OutputArgs, contents: String) -> CliResult<()> {
    if let Some(path) = &output.report_output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
    } else {
        print!("{contents}");
    }
    Ok(())
}
