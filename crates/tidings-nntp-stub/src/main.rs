use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tidings_nntp_stub::{StubConfig, StubResult, StubServer, load_fixtures};

#[derive(Parser, Debug)]
#[command(
    name = "tidings-nntp-stub",
    about = "Scripted NNTP server serving overview fixtures"
)]
struct Args {
    /// Address to listen on; port 0 picks a free port and logs it.
    #[arg(long, default_value = "127.0.0.1:3119")]
    bind: SocketAddr,

    #[arg(long, default_value = "fixtures/nntp/fixtures-basic.json")]
    fixtures: PathBuf,

    #[arg(long)]
    require_auth: bool,

    #[arg(long, default_value = "test")]
    username: String,

    /// Empty accepts `AUTHINFO USER` alone.
    #[arg(long, default_value = "secret")]
    password: String,

    #[arg(long, default_value_t = 0)]
    disconnect_after: usize,

    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Write replies in chunks of this many bytes.
    #[arg(long, default_value_t = 0)]
    fragment_size: usize,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn stub_config(&self) -> StubConfig {
        StubConfig {
            bind: self.bind,
            require_auth: self.require_auth,
            username: self.username.clone(),
            password: self.password.clone(),
            disconnect_after: self.disconnect_after,
            delay_ms: self.delay_ms,
            fragment_size: self.fragment_size,
        }
    }
}

#[tokio::main]
async fn main() -> StubResult<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let fixtures = load_fixtures(&args.fixtures)?;
    tracing::info!(
        groups = fixtures.groups.len(),
        path = %args.fixtures.display(),
        "fixtures loaded"
    );
    let (_addr, handle) = StubServer::new(args.stub_config(), fixtures).start().await?;
    handle.await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_default_to_plain_unauthenticated_server() {
        let args = Args::try_parse_from(["tidings-nntp-stub"]).expect("parse");
        let config = args.stub_config();
        assert_eq!(config.bind, "127.0.0.1:3119".parse::<SocketAddr>().unwrap());
        assert!(!config.require_auth);
        assert_eq!(config.fragment_size, 0);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn args_map_onto_stub_config() {
        let args = Args::try_parse_from([
            "tidings-nntp-stub",
            "--bind",
            "127.0.0.1:0",
            "--require-auth",
            "--password",
            "",
            "--disconnect-after",
            "3",
            "--fragment-size",
            "1",
        ])
        .expect("parse");
        let config = args.stub_config();
        assert_eq!(config.bind.port(), 0);
        assert!(config.require_auth);
        assert!(config.password.is_empty());
        assert_eq!(config.disconnect_after, 3);
        assert_eq!(config.fragment_size, 1);
    }
}
