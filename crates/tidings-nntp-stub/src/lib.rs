use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub type StubResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const DEFAULT_OVERVIEW_FORMAT: &[&str] = &[
    "Subject:",
    "From:",
    "Date:",
    "Message-ID:",
    "References:",
    ":bytes",
    ":lines",
    "Xref:full",
];

#[derive(Debug, Deserialize, Clone)]
pub struct FixtureConfig {
    pub greeting: Option<String>,
    pub overview_format: Option<Vec<String>>,
    pub groups: BTreeMap<String, GroupConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupConfig {
    pub articles: Vec<ArticleOverview>,
}

/// One article's overview entry; `fields` are joined with tabs after the
/// article number.
#[derive(Debug, Deserialize, Clone)]
pub struct ArticleOverview {
    pub number: u64,
    pub fields: Vec<String>,
}

impl ArticleOverview {
    fn line(&self) -> String {
        let mut line = self.number.to_string();
        for field in &self.fields {
            line.push('\t');
            line.push_str(field);
        }
        line
    }
}

#[derive(Debug, Clone)]
pub struct StubConfig {
    pub bind: SocketAddr,
    pub require_auth: bool,
    pub username: String,
    /// Empty means `AUTHINFO USER` alone is accepted with 281.
    pub password: String,
    /// Drop the connection instead of answering the Nth command (0 = never).
    pub disconnect_after: usize,
    pub delay_ms: u64,
    /// Write replies in chunks of this many bytes (0 = whole replies).
    pub fragment_size: usize,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            require_auth: false,
            username: "test".to_string(),
            password: "secret".to_string(),
            disconnect_after: 0,
            delay_ms: 0,
            fragment_size: 0,
        }
    }
}

#[derive(Debug)]
struct SessionState {
    authenticated: bool,
    current_group: Option<String>,
    commands_seen: usize,
}

#[derive(Clone)]
pub struct StubServer {
    state: Arc<ServerState>,
}

impl StubServer {
    pub fn new(config: StubConfig, fixtures: FixtureConfig) -> Self {
        Self {
            state: Arc::new(ServerState::new(config, fixtures)),
        }
    }

    /// Number of client connections accepted so far.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub async fn serve(self) -> StubResult<()> {
        let listener = TcpListener::bind(self.state.config.bind).await?;
        self.serve_listener(listener).await
    }

    /// Bind the configured address (port 0 picks a free one) and serve in a
    /// background task. Returns the bound address.
    pub async fn start(self) -> StubResult<(SocketAddr, JoinHandle<StubResult<()>>)> {
        let listener = TcpListener::bind(self.state.config.bind).await?;
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "NNTP stub listening");
        let handle = tokio::spawn(self.serve_listener(listener));
        Ok((addr, handle))
    }

    async fn serve_listener(self, listener: TcpListener) -> StubResult<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!(%peer, "client connected");
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                if let Err(err) = handle_client(stream, state).await {
                    tracing::warn!("client error: {err}");
                }
            });
        }
    }
}

struct ServerState {
    config: StubConfig,
    fixtures: FixtureConfig,
    connections: AtomicUsize,
}

impl ServerState {
    fn new(config: StubConfig, fixtures: FixtureConfig) -> Self {
        Self {
            config,
            fixtures,
            connections: AtomicUsize::new(0),
        }
    }
}

pub fn load_fixtures(path: &Path) -> StubResult<FixtureConfig> {
    let data = std::fs::read_to_string(path)?;
    let fixtures = serde_json::from_str(&data)?;
    Ok(fixtures)
}

struct Responder {
    writer: OwnedWriteHalf,
    fragment_size: usize,
}

impl Responder {
    async fn send(&mut self, data: &[u8]) -> StubResult<()> {
        if self.fragment_size == 0 {
            self.writer.write_all(data).await?;
            self.writer.flush().await?;
            return Ok(());
        }
        for chunk in data.chunks(self.fragment_size) {
            self.writer.write_all(chunk).await?;
            self.writer.flush().await?;
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    async fn line(&mut self, line: &str) -> StubResult<()> {
        self.send(format!("{line}\r\n").as_bytes()).await
    }
}

async fn handle_client(stream: TcpStream, state: Arc<ServerState>) -> StubResult<()> {
    state.connections.fetch_add(1, Ordering::SeqCst);
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut out = Responder {
        writer,
        fragment_size: state.config.fragment_size,
    };

    let greeting = state
        .fixtures
        .greeting
        .clone()
        .unwrap_or_else(|| "200 tidings test server ready".to_string());
    out.line(&greeting).await?;

    let mut session = SessionState {
        authenticated: !state.config.require_auth,
        current_group: None,
        commands_seen: 0,
    };

    loop {
        let mut line = String::new();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            break;
        }

        let command_line = line.trim();
        if command_line.is_empty() {
            continue;
        }

        session.commands_seen += 1;
        maybe_delay(&state.config).await;
        if should_disconnect(&state.config, &session) {
            tracing::debug!(command = command_line, "dropping connection");
            return Ok(());
        }

        let mut parts = command_line.split_whitespace();
        let command = parts.next().unwrap_or("").to_uppercase();
        match command.as_str() {
            "QUIT" => {
                out.line("205 closing connection").await?;
                break;
            }
            "AUTHINFO" => {
                handle_authinfo(parts.collect::<Vec<_>>(), &state, &mut session, &mut out).await?;
            }
            "GROUP" => {
                let group = parts.next().unwrap_or("");
                handle_group(group, &state, &mut session, &mut out).await?;
            }
            "LIST" => {
                let keyword = parts.next().unwrap_or("").to_uppercase();
                if keyword == "OVERVIEW.FMT" {
                    handle_overview_format(&state, &mut out).await?;
                } else {
                    out.line("501 syntax error").await?;
                }
            }
            "XOVER" | "XZVER" => {
                let range = parts.next();
                handle_overview(&command, range, &state, &session, &mut out).await?;
            }
            _ => {
                out.line("500 command not recognized").await?;
            }
        }
    }

    Ok(())
}

async fn handle_authinfo(
    args: Vec<&str>,
    state: &Arc<ServerState>,
    session: &mut SessionState,
    out: &mut Responder,
) -> StubResult<()> {
    if args.len() < 2 {
        out.line("501 syntax error").await?;
        return Ok(());
    }

    let verb = args[0].to_uppercase();
    let value = args[1];

    match verb.as_str() {
        "USER" if value != state.config.username => {
            out.line("481 authentication rejected").await?;
        }
        "USER" if state.config.password.is_empty() => {
            session.authenticated = true;
            out.line("281 authentication accepted").await?;
        }
        "USER" => {
            out.line("381 password required").await?;
        }
        "PASS" if value == state.config.password => {
            session.authenticated = true;
            out.line("281 authentication accepted").await?;
        }
        "PASS" => {
            out.line("481 authentication rejected").await?;
        }
        _ => {
            out.line("501 syntax error").await?;
        }
    }

    Ok(())
}

async fn handle_group(
    group: &str,
    state: &Arc<ServerState>,
    session: &mut SessionState,
    out: &mut Responder,
) -> StubResult<()> {
    if !session.authenticated {
        out.line("480 authentication required").await?;
        return Ok(());
    }

    let Some(config) = state.fixtures.groups.get(group) else {
        out.line("411 no such group").await?;
        return Ok(());
    };

    session.current_group = Some(group.to_string());
    let count = config.articles.len();
    let low = config.articles.iter().map(|a| a.number).min().unwrap_or(0);
    let high = config.articles.iter().map(|a| a.number).max().unwrap_or(0);
    out.line(&format!("211 {count} {low} {high} {group}")).await
}

async fn handle_overview_format(state: &Arc<ServerState>, out: &mut Responder) -> StubResult<()> {
    let mut reply = String::from("215 Order of fields in overview database.\r\n");
    match &state.fixtures.overview_format {
        Some(fields) => fields.iter().for_each(|f| push_line(&mut reply, f)),
        None => DEFAULT_OVERVIEW_FORMAT
            .iter()
            .for_each(|f| push_line(&mut reply, f)),
    }
    reply.push_str(".\r\n");
    out.send(reply.as_bytes()).await
}

async fn handle_overview(
    command: &str,
    range: Option<&str>,
    state: &Arc<ServerState>,
    session: &SessionState,
    out: &mut Responder,
) -> StubResult<()> {
    if !session.authenticated {
        out.line("480 authentication required").await?;
        return Ok(());
    }

    let Some(config) = session
        .current_group
        .as_ref()
        .and_then(|group| state.fixtures.groups.get(group))
    else {
        out.line("412 no newsgroup selected").await?;
        return Ok(());
    };

    let Some((low, high)) = range.map_or(Some((0, u64::MAX)), parse_range) else {
        out.line("501 syntax error").await?;
        return Ok(());
    };

    let mut body = String::new();
    let mut matched = 0;
    for article in config
        .articles
        .iter()
        .filter(|a| (low..=high).contains(&a.number))
    {
        push_line(&mut body, &article.line());
        matched += 1;
    }
    if matched == 0 {
        out.line("420 no article(s) selected").await?;
        return Ok(());
    }
    body.push_str(".\r\n");

    if command == "XZVER" {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body.as_bytes())?;
        let mut reply = b"224 compressed overview follows\r\n".to_vec();
        reply.extend(encoder.finish()?);
        out.send(&reply).await
    } else {
        let reply = format!("224 overview information follows\r\n{body}");
        out.send(reply.as_bytes()).await
    }
}

/// Dot-stuff and append one body line.
fn push_line(body: &mut String, line: &str) {
    if line.starts_with('.') {
        body.push('.');
    }
    body.push_str(line);
    body.push_str("\r\n");
}

fn parse_range(range: &str) -> Option<(u64, u64)> {
    match range.split_once('-') {
        Some((low, "")) => Some((low.parse().ok()?, u64::MAX)),
        Some((low, high)) => Some((low.parse().ok()?, high.parse().ok()?)),
        None => {
            let n = range.parse().ok()?;
            Some((n, n))
        }
    }
}

async fn maybe_delay(config: &StubConfig) {
    if config.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(config.delay_ms)).await;
    }
}

fn should_disconnect(config: &StubConfig, session: &SessionState) -> bool {
    config.disconnect_after > 0 && session.commands_seen >= config.disconnect_after
}
