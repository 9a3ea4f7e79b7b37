//! NNTP client for newsgroup overview retrieval.
//!
//! Implements the subset of NNTP needed to browse overview data:
//! - Connection and greeting ([RFC 3977 §5.1](https://datatracker.ietf.org/doc/html/rfc3977#section-5.1)),
//!   plain or over implicit TLS ([RFC 4642](https://datatracker.ietf.org/doc/html/rfc4642))
//! - Authentication via AUTHINFO USER/PASS ([RFC 4643 §2.3](https://datatracker.ietf.org/doc/html/rfc4643#section-2.3))
//! - GROUP and LIST OVERVIEW.FMT ([RFC 3977 §6.1.1, §8.4](https://datatracker.ietf.org/doc/html/rfc3977#section-8.4))
//! - XOVER ([RFC 2980 §2.8](https://datatracker.ietf.org/doc/html/rfc2980#section-2.8)) and its
//!   DEFLATE-compressed variant XZVER
//!
//! Responses are decoded by I/O-free stages ([`ResponseDecoder`],
//! [`LineFramer`], [`InflateStage`]) that a [`CommandChannel`] feeds with
//! whatever fragments the transport delivers.

mod channel;
mod client;
mod decoder;
mod error;
mod framer;
mod inflate;
mod model;
mod overview;
mod response;
mod tls;

pub use crate::channel::{CommandChannel, NntpIo, NntpStream};
pub use crate::client::NntpClient;
pub use crate::decoder::ResponseDecoder;
pub use crate::error::NntpError;
pub use crate::framer::{BODY_TERMINATOR, LineFramer};
pub use crate::inflate::InflateStage;
pub use crate::model::{BodyKind, ClientConfig, Encryption, GroupInfo};
pub use crate::overview::{Overview, OverviewFormat, parse_overview};
pub use crate::response::{MAX_STATUS_LINE, Response, codes, format_status_line, parse_status_line};
pub use crate::tls::build_tls_config;
