//! Caller-facing NNTP operations built on top of [`CommandChannel`].

use tokio::net::TcpStream;

use crate::channel::{CommandChannel, NntpIo, NntpStream};
use crate::error::NntpError;
use crate::model::{BodyKind, ClientConfig, Encryption, GroupInfo};
use crate::overview::{Overview, OverviewFormat, parse_overview};
use crate::response::{Response, codes};
use crate::tls::{build_tls_config, tls_connect};

pub struct NntpClient {
    config: ClientConfig,
    channel: Option<CommandChannel>,
}

impl NntpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            channel: None,
        }
    }

    /// Wrap an already-established stream and read the server greeting.
    pub async fn from_stream<S>(config: ClientConfig, stream: S) -> Result<(Self, Response), NntpError>
    where
        S: NntpIo + 'static,
    {
        let mut client = Self::new(config);
        let greeting = client
            .attach(NntpStream::Plain(Box::new(stream)))
            .await?;
        Ok((client, greeting))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(|c| !c.is_broken())
    }

    /// Dial the configured server and read its greeting
    /// ([RFC 3977 §5.1](https://datatracker.ietf.org/doc/html/rfc3977#section-5.1)).
    ///
    /// Any previous connection is dropped first, which makes this the way to
    /// recover from a transport failure.
    pub async fn connect(&mut self) -> Result<Response, NntpError> {
        self.channel = None;
        let host = self.config.host.clone();
        let port = self.config.port;
        tracing::debug!(%host, port, encryption = ?self.config.encryption, "connecting");

        let dial = TcpStream::connect((host.as_str(), port));
        let tcp = match self.config.timeout() {
            Some(limit) => tokio::time::timeout(limit, dial)
                .await
                .map_err(|_| NntpError::Timeout)??,
            None => dial.await?,
        };

        let stream = match self.config.encryption {
            Encryption::Tls => {
                let tls_config = build_tls_config(self.config.cert_verification)?;
                NntpStream::Tls(Box::new(tls_connect(tcp, &host, tls_config).await?))
            }
            Encryption::None => NntpStream::Plain(Box::new(tcp)),
        };
        self.attach(stream).await
    }

    /// Connect, then authenticate when a username is configured. Returns the
    /// last response received.
    pub async fn connect_and_authenticate(&mut self) -> Result<Response, NntpError> {
        let greeting = self.connect().await?;
        if self.config.username.is_some() {
            return self.authenticate().await;
        }
        Ok(greeting)
    }

    /// Authenticate with the configured credentials.
    pub async fn authenticate(&mut self) -> Result<Response, NntpError> {
        let username = self
            .config
            .username
            .clone()
            .ok_or(NntpError::UsernameRequired)?;
        let password = self.config.password.clone();
        self.auth_info(&username, password.as_deref()).await
    }

    /// `AUTHINFO USER`/`PASS` exchange ([RFC 4643 §2.3](https://datatracker.ietf.org/doc/html/rfc4643#section-2.3)).
    ///
    /// When the server asks for a password and none is given, fails with
    /// [`NntpError::PasswordRequired`] without sending anything further.
    pub async fn auth_info(
        &mut self,
        username: &str,
        password: Option<&str>,
    ) -> Result<Response, NntpError> {
        let response = self
            .command(&format!("AUTHINFO USER {username}"), BodyKind::None)
            .await?;
        match response.status() {
            codes::AUTH_ACCEPTED => Ok(response),
            codes::PASSWORD_REQUIRED => {
                let password = password.ok_or(NntpError::PasswordRequired)?;
                let response = self
                    .command(&format!("AUTHINFO PASS {password}"), BodyKind::None)
                    .await?;
                match response.status() {
                    codes::AUTH_ACCEPTED => Ok(response),
                    status => Err(NntpError::UnexpectedResponse(
                        status,
                        response.message().to_string(),
                    )),
                }
            }
            status => Err(NntpError::UnexpectedResponse(
                status,
                response.message().to_string(),
            )),
        }
    }

    /// Send `QUIT` and close the transport
    /// ([RFC 3977 §5.4](https://datatracker.ietf.org/doc/html/rfc3977#section-5.4)).
    pub async fn disconnect(&mut self) -> Result<(), NntpError> {
        let Some(mut channel) = self.channel.take() else {
            return Ok(());
        };
        if !channel.is_broken() {
            if let Err(e) = channel.send("QUIT", BodyKind::None).await {
                tracing::debug!("QUIT failed: {e}");
            }
        }
        if let Err(e) = channel.shutdown().await {
            tracing::debug!("shutdown failed: {e}");
        }
        Ok(())
    }

    /// Issue a raw command line and wait for its response.
    pub async fn command(&mut self, line: &str, kind: BodyKind) -> Result<Response, NntpError> {
        self.channel
            .as_mut()
            .ok_or(NntpError::NotConnected)?
            .send(line, kind)
            .await
    }

    /// Select a newsgroup ([RFC 3977 §6.1.1](https://datatracker.ietf.org/doc/html/rfc3977#section-6.1.1)).
    pub async fn group(&mut self, name: &str) -> Result<GroupInfo, NntpError> {
        let response = match self.command(&format!("GROUP {name}"), BodyKind::None).await {
            Err(NntpError::Protocol {
                status: codes::NO_SUCH_GROUP,
                ..
            }) => return Err(NntpError::NoSuchGroup(name.to_string())),
            other => other?,
        };
        if response.status() != codes::GROUP_SELECTED {
            return Err(NntpError::UnexpectedResponse(
                response.status(),
                response.message().to_string(),
            ));
        }
        parse_group_info(response.message(), name)
    }

    /// Fetch the overview format descriptor
    /// ([RFC 3977 §8.4](https://datatracker.ietf.org/doc/html/rfc3977#section-8.4)).
    pub async fn overview_format(&mut self) -> Result<OverviewFormat, NntpError> {
        let response = self.command("LIST OVERVIEW.FMT", BodyKind::Plain).await?;
        if response.status() != codes::LIST_FOLLOWS {
            return Err(NntpError::UnexpectedResponse(
                response.status(),
                response.message().to_string(),
            ));
        }
        Ok(OverviewFormat::from_lines(response.lines()))
    }

    /// `XOVER range` ([RFC 2980 §2.8](https://datatracker.ietf.org/doc/html/rfc2980#section-2.8)).
    pub async fn xover(
        &mut self,
        range: &str,
        format: &OverviewFormat,
    ) -> Result<Vec<Overview>, NntpError> {
        self.overview(&format!("XOVER {range}"), BodyKind::Plain, format)
            .await
    }

    /// `XZVER range`: like `XOVER` with a DEFLATE-compressed body.
    pub async fn xzver(
        &mut self,
        range: &str,
        format: &OverviewFormat,
    ) -> Result<Vec<Overview>, NntpError> {
        self.overview(&format!("XZVER {range}"), BodyKind::Compressed, format)
            .await
    }

    async fn overview(
        &mut self,
        command: &str,
        kind: BodyKind,
        format: &OverviewFormat,
    ) -> Result<Vec<Overview>, NntpError> {
        let response = self.command(command, kind).await?;
        if response.status() != codes::OVERVIEW_FOLLOWS {
            return Err(NntpError::UnexpectedResponse(
                response.status(),
                response.message().to_string(),
            ));
        }
        Ok(parse_overview(response.lines(), format))
    }

    async fn attach(&mut self, stream: NntpStream) -> Result<Response, NntpError> {
        let mut channel = CommandChannel::new(stream)
            .with_timeout(self.config.timeout())
            .with_unstuffing(self.config.dot_unstuffing);
        let greeting = channel.greeting().await?;
        tracing::debug!(status = greeting.status(), "connected: {}", greeting.message());
        self.channel = Some(channel);
        Ok(greeting)
    }
}

fn parse_group_info(message: &str, requested: &str) -> Result<GroupInfo, NntpError> {
    let mut parts = message.split_whitespace();
    let mut number = || -> Result<u64, NntpError> {
        parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| {
                NntpError::UnexpectedResponse(codes::GROUP_SELECTED, message.to_string())
            })
    };
    let count = number()?;
    let first = number()?;
    let last = number()?;
    let name = parts.next().unwrap_or(requested).to_string();
    Ok(GroupInfo {
        name,
        count,
        first,
        last,
    })
}
