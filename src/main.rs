//! `podvisor` binary: supervises a sidecar process inside a pod.
//!
//! ```text
//! podvisor --pod <POD_NAME> --namespace <POD_NAMESPACE> -- <command> [args...]
//! ```
//!
//! Exit code: the child's own code on a clean exit, `0` when the child was
//! stopped because its siblings stopped, `1` on any error.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use podvisor::{
    ChildProcess, DEFAULT_GRACEFUL_TIMEOUT, DEFAULT_SELF_CONTAINER, LogWriter, Subscribe,
    Supervisor, SupervisorConfig, TransparentSupervisor,
};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "podvisor",
    version,
    about = "Stops a sidecar process once its pod's other containers have shut down"
)]
struct Cli {
    /// Name of the pod this process runs in.
    #[arg(long, env = "POD_NAME")]
    pod: String,

    /// Namespace of the pod.
    #[arg(long, env = "POD_NAMESPACE")]
    namespace: String,

    /// Graceful window after SIGTERM/SIGINT (e.g. `30s`, `1m 30s`).
    ///
    /// Zero or unparsable values fall back to 30s.
    #[arg(long, env = "PODVISOR_GRACEFUL_TIMEOUT")]
    graceful_timeout: Option<String>,

    /// Container running this process; excluded from readiness evaluation.
    #[arg(long, env = "PODVISOR_SELF_CONTAINER", default_value = DEFAULT_SELF_CONTAINER)]
    self_container: String,

    /// Log output format.
    #[arg(long, env = "PODVISOR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Set to `false` to run the command without supervision (signals are forwarded).
    #[arg(long, env = "PODVISOR_ENABLED")]
    enabled: Option<String>,

    /// Command to supervise, with its arguments.
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    command: Vec<String>,
}

impl Cli {
    fn grace(&self) -> Duration {
        match self.graceful_timeout.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_GRACEFUL_TIMEOUT,
            Some(raw) => match humantime::parse_duration(raw) {
                Ok(d) if !d.is_zero() => d,
                Ok(_) => DEFAULT_GRACEFUL_TIMEOUT,
                Err(err) => {
                    warn!(value = raw, %err, "invalid graceful timeout, using default");
                    DEFAULT_GRACEFUL_TIMEOUT
                }
            },
        }
    }

    fn supervised(&self) -> bool {
        match self.enabled.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(raw) => matches!(raw.to_ascii_lowercase().as_str(), "1" | "t" | "true"),
        }
    }

    fn config(&self) -> SupervisorConfig {
        let mut cfg = SupervisorConfig::new(&self.namespace, &self.pod);
        cfg.graceful_timeout = self.grace();
        cfg.self_container = self.self_container.clone();
        cfg.child_args = self.command.clone();
        cfg
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().flatten_event(true).init(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let cfg = cli.config();
    let process = Arc::new(
        ChildProcess::new(cfg.child_args.clone()).context("invalid child command")?,
    );

    if !cli.supervised() {
        info!(
            pod = %cfg.pod_ref(),
            program = process.program(),
            "starting transparent supervisor"
        );
        let exit = TransparentSupervisor::new(process)
            .run(CancellationToken::new())
            .await?;
        return Ok(exit.exit_code());
    }

    info!(
        pod = %cfg.pod_ref(),
        graceful_timeout = ?cfg.grace(),
        self_container = %cfg.self_container,
        program = process.program(),
        "starting supervisor"
    );

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(cfg)
        .with_process(process)
        .with_subscribers(subs)
        .build()?;

    let outcome = sup.run(CancellationToken::new()).await?;
    Ok(outcome.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(code) => ExitCode::from((code & 0xff) as u8),
        Err(err) => {
            error!(err = format!("{err:#}"), "supervision failed");
            ExitCode::FAILURE
        }
    }
}
