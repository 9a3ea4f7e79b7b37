mod app;
mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    app::init_tracing(&cli.log_level);

    let config = app::resolve_config(&cli)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let value = rt.block_on(app::run(config, &cli.command))?;
    let output = serde_json::to_string_pretty(&value).context("encoding output")?;
    println!("{output}");
    Ok(())
}
