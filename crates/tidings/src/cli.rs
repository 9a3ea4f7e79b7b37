use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tidings", version, about = "Newsgroup overview reader")]
pub struct Cli {
    #[arg(short, long, value_name = "FILE", help = "TOML connection config")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    #[arg(long, help = "Connect over implicit TLS")]
    pub tls: bool,

    #[arg(short, long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    #[arg(
        short = 'o',
        long = "option",
        value_name = "KEY=VALUE",
        help = "Override a config field"
    )]
    pub options: Vec<String>,

    #[arg(
        short,
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Select a group and print its article counters.
    Group { name: String },
    /// Print the server's overview field list.
    OverviewFormat,
    /// Print overview records for a range of articles.
    Xover {
        group: String,
        #[arg(default_value = "1-")]
        range: String,
    },
    /// Like `xover`, using the compressed XZVER command.
    Xzver {
        group: String,
        #[arg(default_value = "1-")]
        range: String,
    },
}
