use anyhow::{Context, Result};
use deblur_bench::config::Config;
use std::{env, path::PathBuf, sync::Arc};
use structopt::StructOpt;
use tracing::{trace_span, Instrument};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

#[derive(Debug, Clone, StructOpt)]
/// Evaluate deblurring models over meshed experiments
struct Args {
    #[structopt(long, default_value = "bench.json5")]
    /// configuration file
    pub config_file: PathBuf,
    #[structopt(long)]
    /// drop every cached experiment before running
    pub clear_cache: bool,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    // parse arguments
    let Args {
        config_file,
        clear_cache,
    } = Args::from_args();
    let config = Arc::new(
        Config::open(&config_file)
            .with_context(|| format!("failed to load config file '{}'", config_file.display()))?,
    );

    // run experiments
    deblur_bench::start(config, clear_cache)
        .instrument(trace_span!("bench"))
        .await?;

    Ok(())
}
