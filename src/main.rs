mod format;
mod io;
mod logging;

#[cfg(test)]
mod test_utils;

use clap::Parser;
use format::{
    ArtifactSink, DEFAULT_LOOKAHEAD_CAPACITY, DiagnosticClassifier, IssueExtractor, LogPipeline,
    LookaheadBuffer,
};
use io::{BuildCommand, BuildRunner, RunnerError};
use logging::{LogConfig, init_logging};

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// CLI arguments for the build log runner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Build tool executable to run
    #[arg(value_name = "PROGRAM")]
    program: String,

    /// Arguments passed through to the build tool
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    tool_args: Vec<String>,

    /// Working directory for the build tool (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Directory for run artifacts: raw log and issue index
    #[arg(long, value_name = "DIR", default_value = ".buildlog")]
    log_dir: PathBuf,

    /// Build-system-internal path; diagnostics referencing it are ignored
    #[arg(long, value_name = "PATH")]
    derived_data: Option<String>,

    /// Lookahead buffer capacity in lines
    #[arg(long, value_name = "LINES", default_value_t = DEFAULT_LOOKAHEAD_CAPACITY)]
    lookahead: usize,

    /// Environment overrides for the build tool (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Pass stdout through raw: no buffering, classification or artifacts
    #[arg(long)]
    no_log: bool,

    /// Log level (overrides RUST_LOG env var)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log file path (overrides BUILDLOG_LOG_FILE env var)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

/// Parse repeated KEY=VALUE overrides
fn parse_env_overrides(pairs: &[String]) -> Result<HashMap<String, String>, String> {
    let mut env = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(format!("invalid --env value '{pair}', expected KEY=VALUE"));
        };
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}

/// Assemble the log pipeline and its artifact files
fn create_pipeline(args: &Args, working_dir: &std::path::Path) -> LogPipeline {
    if let Err(e) = std::fs::create_dir_all(&args.log_dir) {
        warn!(
            "Failed to create log directory {}: {}",
            args.log_dir.display(),
            e
        );
    }

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let raw_path = args.log_dir.join(format!("build-{stamp}.log"));
    let issues_path = args.log_dir.join(format!("issues-{stamp}.json"));
    info!("Writing raw log to {}", raw_path.display());

    LogPipeline::new(
        LookaheadBuffer::new(args.lookahead),
        Box::new(DiagnosticClassifier::default()),
        IssueExtractor::new(
            working_dir.to_string_lossy().into_owned(),
            args.derived_data.clone(),
        ),
        Box::new(ArtifactSink::new(raw_path, issues_path)),
    )
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_config =
        LogConfig::from_env().with_overrides(args.log_level.clone(), args.log_file.clone());
    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let working_dir = args.root.clone().unwrap_or_else(|| {
        std::env::current_dir().unwrap_or_else(|e| {
            eprintln!("Failed to get current directory: {e}");
            std::process::exit(1);
        })
    });

    let env = match parse_env_overrides(&args.env) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let mut command = BuildCommand::new(args.program.as_str());
    command.args = args.tool_args.clone();
    command.working_dir = Some(working_dir.clone());
    command.env = env;

    let pipeline = (!args.no_log).then(|| create_pipeline(&args, &working_dir));

    let mut runner = BuildRunner::new(command);

    let cancel = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match runner.run(pipeline).await {
        Ok(output) => {
            if !output.stderr.is_empty() {
                warn!("Build tool wrote to stderr despite succeeding");
            }
            info!("Build finished successfully (exit code {})", output.code);
        }
        Err(RunnerError::BuildFailed { code, stderr }) => {
            if !stderr.is_empty() {
                eprintln!("{stderr}");
            }
            std::process::exit(if code > 0 { code } else { 1 });
        }
        Err(e) => {
            eprintln!("Failed to run build tool: {e}");
            std::process::exit(1);
        }
    }
}
