use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tidings_nntp::{ClientConfig, Encryption, NntpClient, NntpError, OverviewFormat};

use crate::cli::{Cli, Command};

/// Read a TOML config file; without one every field keeps its default.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
}

/// Layer the command line on top of the file: connection flags first, then
/// `-o KEY=VALUE` options.
pub fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.tls {
        config.encryption = Encryption::Tls;
    }
    if let Some(username) = &cli.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &cli.password {
        config.password = Some(password.clone());
    }
    apply_overrides(&mut config, &cli.options)?;
    Ok(config)
}

pub fn apply_overrides(config: &mut ClientConfig, overrides: &[String]) -> Result<()> {
    for opt in overrides {
        let (key, value) = opt
            .split_once('=')
            .with_context(|| format!("invalid option '{opt}': expected KEY=VALUE"))?;
        let (key, value) = (key.trim(), value.trim());
        let optional = || (!value.is_empty()).then(|| value.to_string());
        match key {
            "host" => config.host = value.to_string(),
            "port" => config.port = parse_value(key, value)?,
            "encryption" => {
                config.encryption = match value.to_ascii_lowercase().as_str() {
                    "none" => Encryption::None,
                    "tls" => Encryption::Tls,
                    _ => bail!("invalid value for encryption: '{value}' (expected none or tls)"),
                }
            }
            "username" => config.username = optional(),
            "password" => config.password = optional(),
            "cert_verification" => config.cert_verification = parse_value(key, value)?,
            "timeout_secs" => {
                config.timeout_secs = match value {
                    "" => None,
                    v => Some(parse_value(key, v)?),
                }
            }
            "dot_unstuffing" => config.dot_unstuffing = parse_value(key, value)?,
            _ => bail!("unknown option '{key}'"),
        }
    }
    Ok(())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value for {key}: '{value}'"))
}

pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Connect, run one subcommand and return its result as JSON.
pub async fn run(config: ClientConfig, command: &Command) -> Result<Value> {
    let mut client = NntpClient::new(config);
    let greeting = client
        .connect_and_authenticate()
        .await
        .with_context(|| format!("connecting to {}:{}", client.config().host, client.config().port))?;
    tracing::info!("server says: {greeting}");

    let result = execute(&mut client, command).await;
    if let Err(e) = client.disconnect().await {
        tracing::warn!("disconnect failed: {e}");
    }
    result
}

async fn execute(client: &mut NntpClient, command: &Command) -> Result<Value> {
    match command {
        Command::Group { name } => {
            let group = client.group(name).await?;
            Ok(serde_json::to_value(group)?)
        }
        Command::OverviewFormat => {
            let format = client.overview_format().await?;
            Ok(format_json(&format))
        }
        Command::Xover { group, range } => {
            client.group(group).await?;
            let format = fetch_format(client).await?;
            let records = client.xover(range, &format).await?;
            Ok(serde_json::to_value(records)?)
        }
        Command::Xzver { group, range } => {
            client.group(group).await?;
            let format = fetch_format(client).await?;
            let records = client.xzver(range, &format).await?;
            Ok(serde_json::to_value(records)?)
        }
    }
}

/// Servers without `LIST OVERVIEW.FMT` use the RFC 3977 default order.
async fn fetch_format(client: &mut NntpClient) -> Result<OverviewFormat> {
    match client.overview_format().await {
        Ok(format) => Ok(format),
        Err(e @ NntpError::Protocol { .. }) => {
            tracing::warn!("falling back to default overview format: {e}");
            Ok(OverviewFormat::default())
        }
        Err(e) => Err(e).context("fetching overview format"),
    }
}

fn format_json(format: &OverviewFormat) -> Value {
    Value::Array(
        format
            .fields()
            .iter()
            .map(|(name, full)| json!({ "name": name, "full": full }))
            .collect(),
    )
}
