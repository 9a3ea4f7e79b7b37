//! Command issuance over a single transport connection.
//!
//! NNTP is strictly request/response ([RFC 3977 §3.5](https://datatracker.ietf.org/doc/html/rfc3977#section-3.5)
//! allows pipelining, but this client never does): one command is in flight
//! at a time and each gets its own [`ResponseDecoder`], dropped as soon as the
//! response or an error has been delivered.

use std::borrow::Cow;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::decoder::ResponseDecoder;
use crate::error::NntpError;
use crate::model::BodyKind;
use crate::response::Response;

pub trait NntpIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> NntpIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

const READ_BUF_SIZE: usize = 8192;

pub enum NntpStream {
    Plain(Box<dyn NntpIo>),
    Tls(Box<TlsStream<TcpStream>>),
}

impl NntpStream {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            NntpStream::Plain(s) => s.read(buf).await,
            NntpStream::Tls(s) => s.read(buf).await,
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            NntpStream::Plain(s) => {
                s.write_all(data).await?;
                s.flush().await
            }
            NntpStream::Tls(s) => {
                s.write_all(data).await?;
                s.flush().await
            }
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            NntpStream::Plain(s) => s.shutdown().await,
            NntpStream::Tls(s) => s.shutdown().await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChannelState {
    Ready,
    InFlight(String),
    Broken,
}

pub struct CommandChannel {
    stream: NntpStream,
    state: ChannelState,
    read_buf: Vec<u8>,
    timeout: Option<Duration>,
    unstuff: bool,
}

impl CommandChannel {
    pub fn new(stream: NntpStream) -> Self {
        Self {
            stream,
            state: ChannelState::Ready,
            read_buf: vec![0u8; READ_BUF_SIZE],
            timeout: None,
            unstuff: false,
        }
    }

    /// Limit how long a single read may wait for the server.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_unstuffing(mut self, unstuff: bool) -> Self {
        self.unstuff = unstuff;
        self
    }

    /// True once a transport failure, an abandoned command or a failed body
    /// response has left the connection in an unknown state. Only
    /// reconnecting helps.
    pub fn is_broken(&self) -> bool {
        matches!(self.state, ChannelState::Broken)
    }

    /// Read the unsolicited greeting sent on connect
    /// ([RFC 3977 §5.1](https://datatracker.ietf.org/doc/html/rfc3977#section-5.1)).
    pub async fn greeting(&mut self) -> Result<Response, NntpError> {
        self.exchange(None, BodyKind::None).await
    }

    /// Write `command` followed by CRLF and decode its response.
    ///
    /// A status of 400 or above is returned as [`NntpError::Protocol`]; the
    /// channel stays usable. Transport failures, and any decoding failure of a
    /// command that expects a body, poison the channel: every later call
    /// fails with [`NntpError::ConnectionBroken`].
    pub async fn send(&mut self, command: &str, kind: BodyKind) -> Result<Response, NntpError> {
        if command.contains(['\r', '\n']) {
            return Err(NntpError::Framing(format!(
                "command contains a line terminator: {:?}",
                redact(command)
            )));
        }
        self.exchange(Some(command), kind).await
    }

    pub async fn shutdown(&mut self) -> Result<(), NntpError> {
        self.stream.shutdown().await?;
        self.state = ChannelState::Broken;
        Ok(())
    }

    async fn exchange(
        &mut self,
        command: Option<&str>,
        kind: BodyKind,
    ) -> Result<Response, NntpError> {
        self.begin(command.map_or(Cow::Borrowed("<greeting>"), redact))?;

        let result = self.run(command, kind).await;
        match &result {
            Err(e) if e.is_transport() => {
                tracing::warn!("connection unusable: {e}");
                self.state = ChannelState::Broken;
            }
            // An unknown amount of this command's body may still be unread.
            Err(e) if kind.expects_body() => {
                tracing::warn!("connection unusable after failed body response: {e}");
                self.state = ChannelState::Broken;
            }
            _ => self.state = ChannelState::Ready,
        }

        let response = result?;
        if response.is_failure() {
            return Err(NntpError::Protocol {
                status: response.status(),
                message: response.message().to_string(),
            });
        }
        Ok(response)
    }

    fn begin(&mut self, label: Cow<'_, str>) -> Result<(), NntpError> {
        let previous = std::mem::replace(
            &mut self.state,
            ChannelState::InFlight(label.into_owned()),
        );
        match previous {
            ChannelState::Ready => Ok(()),
            ChannelState::Broken => {
                self.state = ChannelState::Broken;
                Err(NntpError::ConnectionBroken)
            }
            // The future driving `previous` was dropped mid-response.
            ChannelState::InFlight(previous) => {
                self.state = ChannelState::Broken;
                Err(NntpError::CommandInFlight(previous))
            }
        }
    }

    async fn run(&mut self, command: Option<&str>, kind: BodyKind) -> Result<Response, NntpError> {
        if let Some(command) = command {
            tracing::debug!(command = %redact(command), "sending command");
            self.stream
                .write_all(format!("{command}\r\n").as_bytes())
                .await?;
        }

        let mut decoder = ResponseDecoder::new(kind).with_unstuffing(self.unstuff);
        loop {
            let n = self.read_fragment().await?;
            if n == 0 {
                return Err(NntpError::ConnectionClosed);
            }
            tracing::trace!(bytes = n, "received fragment");
            if let Some(response) = decoder.feed(&self.read_buf[..n])? {
                tracing::debug!(
                    status = response.status(),
                    lines = response.lines().len(),
                    "response complete"
                );
                return Ok(response);
            }
        }
    }

    async fn read_fragment(&mut self) -> Result<usize, NntpError> {
        let read = self.stream.read(&mut self.read_buf);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| NntpError::Timeout)?
                .map_err(NntpError::from),
            None => Ok(read.await?),
        }
    }
}

fn redact(command: &str) -> Cow<'_, str> {
    let upper = command.to_ascii_uppercase();
    if upper.starts_with("AUTHINFO PASS") {
        Cow::Borrowed("AUTHINFO PASS ****")
    } else {
        Cow::Borrowed(command)
    }
}
