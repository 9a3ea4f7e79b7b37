//! Response values and status-line parsing.
//!
//! Response codes are defined in [RFC 3977 §3.2](https://datatracker.ietf.org/doc/html/rfc3977#section-3.2).

use std::fmt;

use crate::error::NntpError;

/// Longest status line accepted before its terminator, CRLF included
/// ([RFC 3977 §3.1](https://datatracker.ietf.org/doc/html/rfc3977#section-3.1)).
pub const MAX_STATUS_LINE: usize = 512;

pub const CRLF: &[u8] = b"\r\n";

/// Status codes this client reacts to.
pub mod codes {
    pub const POSTING_ALLOWED: u16 = 200;
    pub const POSTING_PROHIBITED: u16 = 201;
    pub const CLOSING_CONNECTION: u16 = 205;
    pub const GROUP_SELECTED: u16 = 211;
    pub const LIST_FOLLOWS: u16 = 215;
    pub const OVERVIEW_FOLLOWS: u16 = 224;
    pub const AUTH_ACCEPTED: u16 = 281;
    pub const PASSWORD_REQUIRED: u16 = 381;
    pub const NO_SUCH_GROUP: u16 = 411;
    pub const AUTH_REJECTED: u16 = 481;
}

/// A complete server response: status line plus, for multi-line commands,
/// every body line received before the terminator.
///
/// Values are only built once the whole response has arrived and are never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    message: String,
    lines: Vec<String>,
}

impl Response {
    pub fn new(status: u16, message: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            status,
            message: message.into(),
            lines,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_continuation(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_failure(&self) -> bool {
        self.status >= 400
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

/// Parse a status line: three digits, one space, then the message text.
///
/// Surrounding whitespace (including the line terminator) is ignored. The
/// message must be non-empty and the code must lie in `100..599`.
pub fn parse_status_line(line: &str) -> Result<(u16, String), NntpError> {
    let trimmed = line.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() < 5 || !bytes[..3].iter().all(u8::is_ascii_digit) || bytes[3] != b' ' {
        return Err(NntpError::MalformedStatusLine(line.to_string()));
    }

    let status = bytes[..3]
        .iter()
        .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));
    if !(100..599).contains(&status) {
        return Err(NntpError::InvalidStatusCode(status));
    }

    Ok((status, trimmed[4..].to_string()))
}

pub fn format_status_line(status: u16, message: &str) -> String {
    format!("{status} {message}\r\n")
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_code_and_message() {
        let (status, message) = parse_status_line("200 server ready - posting allowed\r\n").unwrap();
        assert_eq!(status, 200);
        assert_eq!(message, "server ready - posting allowed");
    }

    #[test]
    fn keeps_inner_spacing_of_message() {
        let (status, message) = parse_status_line("211 5 1 10 alt.test").unwrap();
        assert_eq!(status, 211);
        assert_eq!(message, "5 1 10 alt.test");
    }

    #[test]
    fn rejects_line_without_digits() {
        let err = parse_status_line("oops").expect_err("should fail");
        assert!(matches!(err, NntpError::MalformedStatusLine(_)));
    }

    #[test]
    fn rejects_wrong_digit_count() {
        for line in ["20 ready", "2000 ready", "2x0 ready"] {
            let err = parse_status_line(line).expect_err(line);
            assert!(matches!(err, NntpError::MalformedStatusLine(_)), "{line}");
        }
    }

    #[test]
    fn rejects_missing_separator_or_message() {
        for line in ["200", "200 ", "200-ready", "200\tready"] {
            let err = parse_status_line(line).expect_err(line);
            assert!(matches!(err, NntpError::MalformedStatusLine(_)), "{line}");
        }
    }

    #[test]
    fn rejects_out_of_range_codes() {
        for (line, code) in [("099 low", 99), ("000 zero", 0), ("599 edge", 599), ("600 high", 600)] {
            match parse_status_line(line) {
                Err(NntpError::InvalidStatusCode(got)) => assert_eq!(got, code),
                other => panic!("unexpected result for {line}: {other:?}"),
            }
        }
    }

    #[test]
    fn response_classification() {
        assert!(Response::new(211, "ok", Vec::new()).is_success());
        assert!(Response::new(381, "more", Vec::new()).is_continuation());
        assert!(Response::new(411, "no", Vec::new()).is_failure());
        assert_eq!(Response::new(205, "bye", Vec::new()).to_string(), "205 bye");
    }

    #[test]
    fn find_crlf_locates_first_terminator() {
        assert_eq!(find_crlf(b"200 ok\r\nrest\r\n"), Some(6));
        assert_eq!(find_crlf(b"200 ok\r"), None);
        assert_eq!(find_crlf(b""), None);
    }

    proptest! {
        #[test]
        fn status_line_round_trips(
            status in 100u16..599,
            message in "[!-~]([ -~]{0,60}[!-~])?",
        ) {
            let line = format_status_line(status, &message);
            let (parsed_status, parsed_message) = parse_status_line(&line).unwrap();
            prop_assert_eq!(parsed_status, status);
            prop_assert_eq!(parsed_message, message);
        }

        #[test]
        fn out_of_range_codes_never_parse(
            status in prop_oneof![0u16..100, 599u16..1000],
            message in "[a-z]{1,10}",
        ) {
            let line = format!("{status:03} {message}");
            prop_assert!(matches!(
                parse_status_line(&line),
                Err(NntpError::InvalidStatusCode(code)) if code == status
            ));
        }
    }
}
