//! Test execution through `xcodebuild`, `xcpretty` and `xccov`.

use crate::CliResult;
use clap::Args;
use squadcov_core::{AppDirs, StdFileSystem};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

const DEFAULT_SDK: &str = "iphonesimulator";
const DEFAULT_DESTINATION: &str = "platform=iOS Simulator,name=iPhone 11 Pro";
const FAILURE_TAIL_LINES: usize = 30;
const TEST_LOG_FILE: &str = "xctest.log";
const XCPRETTY_REPORT_FILE: &str = "xcpretty_tests.html";
const RESULT_BUNDLE_EXTENSION: &str = "xcresult";

/// CLI arguments describing how to build and test the project.
#[derive(Args, Clone, Debug)]
pub struct XcodeArgs {
    /// Workspace file, relative to the project directory or absolute.
    #[arg(long, env = "SQUADCOV_WORKSPACE")]
    pub workspace: PathBuf,
    /// Scheme to test.
    #[arg(long, env = "SQUADCOV_SCHEME")]
    pub scheme: String,
    /// SDK to build against.
    #[arg(long, default_value = DEFAULT_SDK)]
    pub sdk: String,
    /// Destination specifier passed to xcodebuild.
    #[arg(long, env = "SQUADCOV_DESTINATION", default_value = DEFAULT_DESTINATION)]
    pub destination: String,
    /// Do not pipe the test output through xcpretty.
    #[arg(long)]
    pub no_xcpretty: bool,
}

/// A program invocation with optional standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
    pub(crate) stdin: Option<Vec<u8>>,
}

impl Invocation {
    fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
        }
    }

    fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = Some(stdin);
        self
    }

    fn display(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcessOutput {
    pub(crate) success: bool,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl ProcessOutput {
    fn merged_output(&self) -> String {
        let mut merged = String::new();
        if !self.stdout.trim().is_empty() {
            merged.push_str(self.stdout.trim_end());
        }
        if !self.stderr.trim().is_empty() {
            if !merged.is_empty() {
                merged.push('\n');
            }
            merged.push_str(self.stderr.trim_end());
        }
        merged
    }
}

/// Runs external programs.
pub(crate) trait ProcessRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a Invocation,
    ) -> Pin<Box<dyn Future<Output = CliResult<ProcessOutput>> + Send + 'a>>;
}

/// Tokio-backed runner used in production.
#[cfg_attr(test, allow(dead_code))]
pub(crate) struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a Invocation,
    ) -> Pin<Box<dyn Future<Output = CliResult<ProcessOutput>> + Send + 'a>> {
        Box::pin(async move {
            use tokio::io::AsyncWriteExt;

            log::debug!("running {}", invocation.display());
            let mut child = tokio::process::Command::new(&invocation.program)
                .args(&invocation.args)
                .stdin(if invocation.stdin.is_some() {
                    Stdio::piped()
                } else {
                    Stdio::null()
                })
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|err| format!("failed to start {}: {err}", invocation.program))?;

            // Stdin is written from its own task while the output is drained.
            let writer = match (invocation.stdin.clone(), child.stdin.take()) {
                (Some(input), Some(mut stdin)) => Some(tokio::spawn(async move {
                    stdin.write_all(&input).await
                })),
                _ => None,
            };

            let output = child.wait_with_output().await?;
            if let Some(writer) = writer {
                if let Err(err) = writer.await? {
                    log::debug!("{} closed its input early: {err}", invocation.program);
                }
            }
            Ok(ProcessOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        })
    }
}

/// Run the test suite with coverage and write the raw coverage report.
#[cfg(not(test))]
pub async fn run_tests(args: &XcodeArgs, project_dir: &Path, dirs: &AppDirs) -> CliResult<()> {
    run_tests_with(args, project_dir, dirs, &TokioProcessRunner).await
}

/// Run the test suite with an injected process runner.
pub(crate) async fn run_tests_with<R: ProcessRunner>(
    args: &XcodeArgs,
    project_dir: &Path,
    dirs: &AppDirs,
    runner: &R,
) -> CliResult<()> {
    let fs = StdFileSystem::new();
    dirs.ensure(&fs)?;
    dirs.reset_run_outputs(&fs)?;

    println!("- Running tests for {}...", args.scheme);
    let build = runner
        .run(&xcodebuild_invocation(args, project_dir, dirs))
        .await?;

    if !args.no_xcpretty {
        let pretty = xcpretty_invocation(dirs).with_stdin(build.stdout.clone().into_bytes());
        match runner.run(&pretty).await {
            Ok(output) => print!("{}", output.stdout),
            Err(err) => log::warn!("xcpretty unavailable: {err}"),
        }
    }

    if !build.success {
        let log_path = dirs.logs().join(TEST_LOG_FILE);
        let full_log = build.merged_output();
        tokio::fs::write(&log_path, &full_log).await?;
        println!("{}", tail_lines(&full_log, FAILURE_TAIL_LINES));
        return Err(format!("test execution failed, see full log at: {}", log_path.display()).into());
    }
    println!("\nTests succeeded! Processing results...");

    let bundle = latest_result_bundle(&dirs.derived_data().join("Logs").join("Test")).await?;
    let coverage = runner.run(&xccov_invocation(&bundle)).await?;
    if !coverage.success {
        return Err(format!("xccov failed:\n{}", coverage.merged_output()).into());
    }
    tokio::fs::write(dirs.raw_report(), coverage.stdout).await?;
    log::info!("raw coverage report written to {}", dirs.raw_report().display());

    Ok(())
}

fn xcodebuild_invocation(args: &XcodeArgs, project_dir: &Path, dirs: &AppDirs) -> Invocation {
    let workspace = project_dir.join(&args.workspace);
    Invocation::new(
        "xcodebuild",
        [
            "test".to_string(),
            "-workspace".to_string(),
            workspace.display().to_string(),
            "-scheme".to_string(),
            args.scheme.clone(),
            "-sdk".to_string(),
            args.sdk.clone(),
            "-destination".to_string(),
            args.destination.clone(),
            "-derivedDataPath".to_string(),
            dirs.derived_data().display().to_string(),
            "-enableCodeCoverage".to_string(),
            "YES".to_string(),
        ],
    )
}

fn xcpretty_invocation(dirs: &AppDirs) -> Invocation {
    let output = dirs.logs().join(XCPRETTY_REPORT_FILE);
    Invocation::new(
        "xcpretty",
        [
            "-t".to_string(),
            "-s".to_string(),
            "-c".to_string(),
            "--report".to_string(),
            "html".to_string(),
            "--output".to_string(),
            output.display().to_string(),
        ],
    )
}

fn xccov_invocation(bundle: &Path) -> Invocation {
    Invocation::new(
        "xcrun",
        [
            "xccov".to_string(),
            "view".to_string(),
            "--report".to_string(),
            "--json".to_string(),
            bundle.display().to_string(),
        ],
    )
}

/// Newest result bundle in `dir`; bundle names embed their timestamp.
async fn latest_result_bundle(dir: &Path) -> CliResult<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|err| format!("no test results in {}: {err}", dir.display()))?;
    let mut bundles = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(RESULT_BUNDLE_EXTENSION) {
            bundles.push(path);
        }
    }
    bundles.sort();
    bundles
        .pop()
        .ok_or_else(|| format!("no .{RESULT_BUNDLE_EXTENSION} bundle in {}", dir.display()).into())
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedRunner {
        outputs: Mutex<Vec<CliResult<ProcessOutput>>>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl ScriptedRunner {
        fn new(mut outputs: Vec<CliResult<ProcessOutput>>) -> Self {
            outputs.reverse();
            Self {
                outputs: Mutex::new(outputs),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn programs(&self) -> Vec<String> {
            self.calls
                .lock()
                .expect("calls lock")
                .iter()
                .map(|call| call.program.clone())
                .collect()
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run<'a>(
            &'a self,
            invocation: &'a Invocation,
        ) -> Pin<Box<dyn Future<Output = CliResult<ProcessOutput>> + Send + 'a>> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(invocation.clone());
            let next = self
                .outputs
                .lock()
                .expect("outputs lock")
                .pop()
                .unwrap_or_else(|| Err("unexpected invocation".into()));
            Box::pin(async move { next })
        }
    }

    fn output(success: bool, stdout: &str) -> CliResult<ProcessOutput> {
        Ok(ProcessOutput {
            success,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn args(no_xcpretty: bool) -> XcodeArgs {
        XcodeArgs {
            workspace: PathBuf::from("App.xcworkspace"),
            scheme: "App-Production".to_string(),
            sdk: DEFAULT_SDK.to_string(),
            destination: DEFAULT_DESTINATION.to_string(),
            no_xcpretty,
        }
    }

    static UNIQUE_COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    fn temp_dirs() -> AppDirs {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let counter = UNIQUE_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        AppDirs::new(std::env::temp_dir().join(format!("squadcov_runner_test_{nanos}_{counter}")))
    }

    #[test]
    fn xcodebuild_invocation_enables_coverage() {
        let dirs = AppDirs::new("/data");
        let invocation = xcodebuild_invocation(&args(false), Path::new("/work/App"), &dirs);
        assert_eq!(invocation.program, "xcodebuild");
        assert_eq!(
            invocation.display(),
            "xcodebuild test -workspace /work/App/App.xcworkspace -scheme App-Production \
             -sdk iphonesimulator -destination platform=iOS Simulator,name=iPhone 11 Pro \
             -derivedDataPath /data/DerivedData -enableCodeCoverage YES"
        );
    }

    #[test]
    fn xccov_invocation_targets_bundle() {
        let invocation = xccov_invocation(Path::new("/data/DerivedData/Logs/Test/Run.xcresult"));
        assert_eq!(
            invocation.args,
            vec![
                "xccov",
                "view",
                "--report",
                "--json",
                "/data/DerivedData/Logs/Test/Run.xcresult"
            ]
        );
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail_lines("a\nb\nc", 2), "b\nc");
        assert_eq!(tail_lines("a", 30), "a");
    }

    #[tokio::test]
    async fn successful_run_writes_raw_report() {
        let dirs = temp_dirs();
        let bundle_dir = dirs.derived_data().join("Logs").join("Test");
        let runner = ScriptedRunner::new(vec![
            output(true, "Test Suite passed"),
            output(true, "pretty"),
            output(true, "{\"lineCoverage\": 0.5, \"targets\": []}"),
        ]);

        run_tests_with(
            &args(false),
            Path::new("/work"),
            &dirs,
            &BundleCreatingRunner {
                inner: &runner,
                bundle_dir: &bundle_dir,
            },
        )
        .await
        .expect("run succeeds");

        assert_eq!(runner.programs(), vec!["xcodebuild", "xcpretty", "xcrun"]);
        let raw = std::fs::read_to_string(dirs.raw_report()).expect("raw report");
        assert!(raw.contains("lineCoverage"));
        {
            let calls = runner.calls.lock().expect("calls lock");
            assert_eq!(calls[1].stdin.as_deref(), Some("Test Suite passed".as_bytes()));
            assert!(calls[2].args[4].ends_with("Run-2.xcresult"));
        }

        std::fs::remove_dir_all(dirs.root()).expect("cleanup");
    }

    #[tokio::test]
    async fn failed_build_writes_log_and_errors() {
        let dirs = temp_dirs();
        let runner = ScriptedRunner::new(vec![output(false, "line 1\nerror: boom")]);

        let error = run_tests_with(&args(true), Path::new("/work"), &dirs, &runner)
            .await
            .expect_err("build fails");

        assert!(error.to_string().contains("test execution failed"));
        assert_eq!(runner.programs(), vec!["xcodebuild"]);
        let log = std::fs::read_to_string(dirs.logs().join(TEST_LOG_FILE)).expect("log");
        assert!(log.contains("error: boom"));

        std::fs::remove_dir_all(dirs.root()).expect("cleanup");
    }

    #[tokio::test]
    async fn missing_result_bundle_is_an_error() {
        let dirs = temp_dirs();
        let runner = ScriptedRunner::new(vec![output(true, "ok")]);

        let error = run_tests_with(&args(true), Path::new("/work"), &dirs, &runner)
            .await
            .expect_err("no bundle");

        assert!(error.to_string().contains("no test results"));
        std::fs::remove_dir_all(dirs.root()).expect("cleanup");
    }

    #[tokio::test]
    async fn xccov_failure_is_reported() {
        let dirs = temp_dirs();
        let bundle_dir = dirs.derived_data().join("Logs").join("Test");
        let runner = ScriptedRunner::new(vec![
            output(true, "ok"),
            Ok(ProcessOutput {
                success: false,
                stdout: String::new(),
                stderr: "invalid bundle".to_string(),
            }),
        ]);

        let error = run_tests_with(
            &args(true),
            Path::new("/work"),
            &dirs,
            &BundleCreatingRunner {
                inner: &runner,
                bundle_dir: &bundle_dir,
            },
        )
        .await
        .expect_err("xccov fails");

        assert!(error.to_string().contains("invalid bundle"));
        assert!(!dirs.raw_report().exists());
        std::fs::remove_dir_all(dirs.root()).expect("cleanup");
    }

    /// Creates result bundles when xcodebuild runs, then delegates.
    struct BundleCreatingRunner<'r> {
        inner: &'r ScriptedRunner,
        bundle_dir: &'r Path,
    }

    impl ProcessRunner for BundleCreatingRunner<'_> {
        fn run<'a>(
            &'a self,
            invocation: &'a Invocation,
        ) -> Pin<Box<dyn Future<Output = CliResult<ProcessOutput>> + Send + 'a>> {
            if invocation.program == "xcodebuild" {
                std::fs::create_dir_all(self.bundle_dir.join("Run-1.xcresult")).expect("bundle 1");
                std::fs::create_dir_all(self.bundle_dir.join("Run-2.xcresult")).expect("bundle 2");
                std::fs::write(self.bundle_dir.join("notes.txt"), "ignored").expect("notes");
            }
            self.inner.run(invocation)
        }
    }
}
