//! rmbench: remote performance regression runner for Redis modules
//!
//! Provisions every terraform setup named by the benchmark definitions,
//! runs the benchmark client, checks the results against the definitions'
//! expectations and tears the setups down again.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rmbench_common::defaults::{
    DEFAULT_BENCHMARK_TIMEOUT, DEFAULT_BENCHMARK_TOOL_URL, DEFAULT_LOCAL_RESULTS_FILE,
    DEFAULT_MODULE_PATH, DEFAULT_PRIVATE_KEY_PATH, DEFAULT_REDIS_MODULE, DEFAULT_RESULTS_BUCKET,
    DEFAULT_TERRAFORM_BIN,
};
use rmbench_runner::check::run_check;
use rmbench_runner::env::{Identity, IdentityOverrides};
use rmbench_runner::interrupt::{Interrupts, watch_interrupts};
use rmbench_runner::{config, orchestrator};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rmbench")]
#[command(about = "Remote performance regression runner for Redis modules")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Arguments for the run command (extracted to reduce enum size)
#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Directory containing benchmark definition files
    #[arg(long, default_value = ".")]
    benchmarks_dir: PathBuf,

    /// Actor recorded on provisioned setups
    #[arg(long, env = "GITHUB_ACTOR")]
    github_actor: Option<String>,

    /// Repository name (or org/repo) recorded on provisioned setups
    #[arg(long, env = "GITHUB_REPOSITORY")]
    github_repo: Option<String>,

    /// Commit sha being benchmarked
    #[arg(long, env = "GITHUB_SHA")]
    github_sha: Option<String>,

    /// Module name, passed to terraform and used as the artifact project
    #[arg(long, default_value = DEFAULT_REDIS_MODULE)]
    redis_module: String,

    /// terraform binary
    #[arg(long, env = "TERRAFORM_BIN_PATH", default_value = DEFAULT_TERRAFORM_BIN)]
    terraform_bin_path: String,

    /// Module build copied to the server
    #[arg(long, default_value = DEFAULT_MODULE_PATH)]
    module_path: PathBuf,

    /// Appended to every setup name before the sha
    #[arg(long, default_value = "")]
    setup_name_suffix: String,

    /// Where EC2_PRIVATE_PEM is written for ssh/scp
    #[arg(long, default_value = DEFAULT_PRIVATE_KEY_PATH)]
    private_key_path: PathBuf,

    /// Local path benchmark results are fetched to
    #[arg(long, default_value = DEFAULT_LOCAL_RESULTS_FILE)]
    results_file: PathBuf,

    /// Download URL of the benchmark client
    #[arg(long, default_value = DEFAULT_BENCHMARK_TOOL_URL)]
    benchmark_tool_url: String,

    /// Benchmark timeout in seconds
    #[arg(long, default_value_t = DEFAULT_BENCHMARK_TIMEOUT)]
    benchmark_timeout: u64,

    /// Upload results files to S3
    #[arg(long)]
    upload_results_s3: bool,

    /// Bucket results are uploaded to
    #[arg(long, default_value = DEFAULT_RESULTS_BUCKET)]
    s3_bucket: String,

    /// Don't tear setups down after the benchmark
    #[arg(long)]
    keep: bool,

    /// Validate definitions and print the plan without provisioning anything
    #[arg(long)]
    dry_run: bool,

    /// Only run the definition with this name (repeatable)
    #[arg(long = "test")]
    tests: Vec<String>,

    /// Output JSON report file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl RunArgs {
    fn identity_overrides(&self) -> IdentityOverrides {
        IdentityOverrides {
            repo: self.github_repo.clone(),
            sha: self.github_sha.clone(),
            actor: self.github_actor.clone(),
        }
    }
}

impl From<RunArgs> for config::RunConfig {
    fn from(args: RunArgs) -> Self {
        Self {
            selection: config::SelectionConfig {
                benchmarks_dir: args.benchmarks_dir,
                tests: args.tests,
            },
            provision: config::ProvisionConfig {
                terraform_bin: args.terraform_bin_path,
                setup_name_suffix: args.setup_name_suffix,
                redis_module: args.redis_module,
            },
            benchmark: config::BenchmarkConfig {
                module_path: args.module_path,
                private_key_path: args.private_key_path,
                results_file: args.results_file,
                benchmark_tool_url: args.benchmark_tool_url,
                benchmark_timeout: args.benchmark_timeout,
            },
            publish: config::PublishConfig {
                upload_results_s3: args.upload_results_s3,
                s3_bucket: args.s3_bucket,
            },
            flags: config::RuntimeFlags {
                keep: args.keep,
                dry_run: args.dry_run,
                output: args.output,
            },
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision, benchmark, validate and tear down every deployment
    Run(Box<RunArgs>),

    /// Validate definitions, and optionally a results file, locally
    Check {
        /// Directory containing benchmark definition files
        #[arg(default_value = ".")]
        benchmarks_dir: PathBuf,

        /// Results file to validate against a definition's expectations
        #[arg(long)]
        results: Option<PathBuf>,

        /// Definition to validate the results against
        #[arg(long)]
        test: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// Cancel `token` on the first Ctrl-C, exit on the second
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        let ended = watch_interrupts(token, || async { tokio::signal::ctrl_c().await.is_ok() }).await;
        if ended == Interrupts::ForceExit {
            std::process::exit(130);
        }
    });
}

async fn run() -> Result<i32> {
    // Filter out bare "--" args that wrappers may pass
    let filtered_args: Vec<String> = std::env::args().filter(|a| a != "--").collect();
    let args = Args::parse_from(filtered_args);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("aws_config=warn".parse()?)
                .add_directive("aws_smithy_runtime=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Run(run_args) => {
            let identity =
                Identity::resolve(run_args.identity_overrides(), &run_args.benchmarks_dir).await;
            info!(
                repo = %identity.repo,
                sha = %identity.sha,
                actor = %identity.actor,
                dir = %run_args.benchmarks_dir.display(),
                dry_run = run_args.dry_run,
                "Starting rmbench run"
            );

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let config: config::RunConfig = (*run_args).into();
            let summary = orchestrator::run_benchmarks(config, identity, cancel).await?;
            Ok(summary.exit_code())
        }

        Command::Check {
            benchmarks_dir,
            results,
            test,
        } => handle_check(benchmarks_dir, results, test),
    }
}

/// Handle the check command
fn handle_check(
    benchmarks_dir: PathBuf,
    results: Option<PathBuf>,
    test: Option<String>,
) -> Result<i32> {
    let report = run_check(&benchmarks_dir, results.as_deref(), test.as_deref())?;

    for definition in &report.definitions {
        println!(
            "{:<30} {} target(s), {} expectation(s)",
            definition.name,
            definition.ci.terraform.len(),
            definition.expectations.len()
        );
    }

    if let Some((name, validation)) = &report.validation {
        println!();
        for outcome in &validation.outcomes {
            let mark = if outcome.passed { "ok  " } else { "FAIL" };
            let actual = outcome
                .actual
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{mark} {} {} {} (actual {actual})",
                outcome.path,
                outcome.comparator.symbol(),
                outcome.expected
            );
        }
        println!(
            "\n{}: {}/{} expectations passed",
            name,
            validation.passed_count(),
            validation.total()
        );
    }

    Ok(if report.passed() { 0 } else { 1 })
}
