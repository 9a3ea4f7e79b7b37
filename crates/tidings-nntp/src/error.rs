use thiserror::Error;

#[derive(Debug, Error)]
pub enum NntpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("connection is unusable after a transport failure; reconnect first")]
    ConnectionBroken,

    #[error("not connected")]
    NotConnected,

    #[error("command {0:?} was abandoned before its response arrived")]
    CommandInFlight(String),

    #[error("Connection timed out")]
    Timeout,

    #[error("Invalid response given: {0:?}")]
    MalformedStatusLine(String),

    #[error("Invalid status code given: {0}")]
    InvalidStatusCode(u16),

    #[error("An error received: {message} [{status}]")]
    Protocol { status: u16, message: String },

    #[error("Unexpected response {0}: {1}")]
    UnexpectedResponse(u16, String),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("No such group: {0}")]
    NoSuchGroup(String),

    #[error("Username is required")]
    UsernameRequired,

    #[error("Password is required")]
    PasswordRequired,
}

impl NntpError {
    /// Errors after which the connection can no longer carry commands.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            NntpError::Io(_)
                | NntpError::TlsError(_)
                | NntpError::ConnectionClosed
                | NntpError::ConnectionBroken
                | NntpError::CommandInFlight(_)
                | NntpError::Timeout
        )
    }

    /// Status code carried by a server-side failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            NntpError::Protocol { status, .. } => Some(*status),
            NntpError::UnexpectedResponse(status, _) => Some(*status),
            NntpError::InvalidStatusCode(status) => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_classified() {
        let io = NntpError::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(io.is_transport());
        assert!(NntpError::ConnectionClosed.is_transport());
        assert!(NntpError::Timeout.is_transport());
        assert!(!NntpError::MalformedStatusLine("oops".into()).is_transport());
        assert!(
            !NntpError::Protocol {
                status: 411,
                message: "no such group".into()
            }
            .is_transport()
        );
    }

    #[test]
    fn protocol_error_message_includes_status() {
        let err = NntpError::Protocol {
            status: 502,
            message: "permission denied".into(),
        };
        assert_eq!(err.to_string(), "An error received: permission denied [502]");
        assert_eq!(err.status(), Some(502));
    }
}
