use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection options for a single news server.
///
/// Every field has a default, so a partial config (or none at all) still
/// describes `localhost:119` without encryption or credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub encryption: Encryption,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cert_verification: bool,
    pub timeout_secs: Option<u64>,
    pub dot_unstuffing: bool,
}

impl ClientConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 119,
            encryption: Encryption::None,
            username: None,
            password: None,
            cert_verification: true,
            timeout_secs: None,
            dot_unstuffing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    #[default]
    None,
    Tls,
}

/// What the issuing command expects to follow its status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Single-line response.
    None,
    /// Dot-terminated multi-line body.
    Plain,
    /// DEFLATE-compressed multi-line body, as sent for `XZVER`.
    Compressed,
}

impl BodyKind {
    pub fn expects_body(self) -> bool {
        !matches!(self, BodyKind::None)
    }
}

/// Result of selecting a newsgroup ([RFC 3977 §6.1.1](https://datatracker.ietf.org/doc/html/rfc3977#section-6.1.1)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    pub count: u64,
    pub first: u64,
    pub last: u64,
}
