//! seam CLI binary entry point.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Static analysis for Go modules: interfaces, their implementations, and
/// classified call sites.
#[derive(Parser)]
#[command(name = "seam")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory rooted at a go.mod manifest; a trailing `/...` is accepted
    path: PathBuf,

    /// Log filter for diagnostics on stderr (e.g. `warn`, `seam=debug`)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let target = cli.path.display().to_string();
    let code = seam::cli::run_analyze(&target, &mut io::stdout(), &mut io::stderr());
    ExitCode::from(code)
}
