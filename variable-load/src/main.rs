//! Variable load generator for storage systems.
//!
//! Runs one or more [`Workload`](variable_load::Workload)s against a storage backend. Each
//! workload follows its own sinusoidal demand curve, so the backend sees fluctuating load instead
//! of a constant stream:
//!
//! ```text
//! variable-load -c load.yaml --runtime 300 \
//!     --workload "cnt=3 amp=500-1000 period=30-60 shift=0-1 supp=1" \
//!     --workload "cnt=1 amp=2000 period=120 supp=0.3"
//! ```
//!
//! With `--dry-run`, time is accelerated tenfold and no I/O is performed, which is useful to
//! check what a set of workloads would do.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use argh::FromArgs;
use variable_load::config::Config;
use variable_load::observability;

/// Variable load generator for storage systems
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// total run time in seconds
    #[argh(option)]
    runtime: Option<u64>,

    /// accelerate time tenfold and skip all backend I/O
    #[argh(switch)]
    dry_run: bool,

    /// space separated workload parameters, repeat for multiple workloads
    #[argh(option)]
    workload: Vec<String>,

    /// log verbosity from 1 (errors only) to 6 (everything)
    #[argh(option)]
    debug_level: Option<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    let mut config = Config::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(runtime) = args.runtime {
        config.duration = Duration::from_secs(runtime);
    }
    if args.dry_run {
        config.dry_run = true;
    }
    if !args.workload.is_empty() {
        config.workloads = args.workload;
    }
    if let Some(debug_level) = args.debug_level {
        config.logging.level = observability::debug_level(debug_level)
            .with_context(|| format!("invalid debug level {debug_level}, expected 1-6"))?;
    }

    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    variable_load::run(&config).await?;

    Ok(())
}
