//! Multi-line body framing ([RFC 3977 §3.1.1](https://datatracker.ietf.org/doc/html/rfc3977#section-3.1.1)).
//!
//! Bytes arrive in arbitrary fragments; the framer buffers them until the
//! `CRLF . CRLF` terminator is seen, then yields every body line once.

use crate::error::NntpError;
use crate::response::CRLF;

/// End-of-body sentinel, including the terminator of the last body line.
pub const BODY_TERMINATOR: &[u8] = b"\r\n.\r\n";

#[derive(Debug)]
enum State {
    Collecting,
    Done,
}

#[derive(Debug)]
pub struct LineFramer {
    state: State,
    // Starts with the status line's CRLF so an empty body is `CRLF . CRLF`.
    buf: Vec<u8>,
    unstuff: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            state: State::Collecting,
            buf: CRLF.to_vec(),
            unstuff: false,
        }
    }

    /// Strip the leading dot of dot-stuffed lines (`..x` becomes `.x`).
    pub fn with_unstuffing(mut self, unstuff: bool) -> Self {
        self.unstuff = unstuff;
        self
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Append a fragment. Returns the complete body once the terminator has
    /// been observed, possibly straddling earlier fragments.
    ///
    /// A framer terminates exactly once; feeding it afterwards is an error.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Option<Vec<String>>, NntpError> {
        if self.is_done() {
            return Err(NntpError::Framing("body framer fed after terminator".into()));
        }

        let search_from = self.buf.len().saturating_sub(BODY_TERMINATOR.len() - 1);
        self.buf.extend_from_slice(fragment);
        tracing::trace!(fragment = fragment.len(), buffered = self.buf.len(), "body fragment");

        let Some(offset) = self.buf[search_from..]
            .windows(BODY_TERMINATOR.len())
            .position(|w| w == BODY_TERMINATOR)
        else {
            return Ok(None);
        };
        let end = search_from + offset;

        let excess = self.buf.len() - (end + BODY_TERMINATOR.len());
        if excess > 0 {
            tracing::warn!(bytes = excess, "discarding data after body terminator");
        }

        let lines = if end == 0 {
            Vec::new()
        } else {
            split_lines(&self.buf[CRLF.len()..end])
                .map(|line| self.decode_line(line))
                .collect()
        };

        self.state = State::Done;
        self.buf = Vec::new();
        Ok(Some(lines))
    }

    fn decode_line(&self, line: &[u8]) -> String {
        let line = if self.unstuff && line.starts_with(b"..") {
            &line[1..]
        } else {
            line
        };
        String::from_utf8_lossy(line).into_owned()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

fn split_lines(body: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(body);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.windows(CRLF.len()).position(|w| w == CRLF) {
            Some(pos) => {
                rest = Some(&current[pos + CRLF.len()..]);
                Some(&current[..pos])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame_all(fragments: &[&[u8]]) -> Option<Vec<String>> {
        let mut framer = LineFramer::new();
        for fragment in fragments {
            if let Some(lines) = framer.feed(fragment).unwrap() {
                return Some(lines);
            }
        }
        None
    }

    #[test]
    fn frames_single_fragment_body() {
        let lines = frame_all(&[b"L1\r\nL2\r\n.\r\n"]).unwrap();
        assert_eq!(lines, vec!["L1", "L2"]);
    }

    #[test]
    fn empty_body_has_no_lines() {
        let lines = frame_all(&[b".\r\n"]).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn single_blank_line_is_preserved() {
        let lines = frame_all(&[b"\r\n.\r\n"]).unwrap();
        assert_eq!(lines, vec![""]);
    }

    #[test]
    fn terminator_split_across_fragments() {
        let lines = frame_all(&[b"hello\r", b"\n.", b"\r", b"\n"]).unwrap();
        assert_eq!(lines, vec!["hello"]);
    }

    #[test]
    fn one_byte_fragments() {
        let body = b"a\r\nbb\r\n\r\nccc\r\n.\r\n";
        let fragments: Vec<&[u8]> = body.chunks(1).collect();
        let lines = frame_all(&fragments).unwrap();
        assert_eq!(lines, vec!["a", "bb", "", "ccc"]);
    }

    #[test]
    fn incomplete_body_yields_nothing() {
        assert_eq!(frame_all(&[b"L1\r\nL2\r\n."]), None);
        assert_eq!(frame_all(&[b"L1\r\n"]), None);
    }

    #[test]
    fn dot_line_inside_text_is_not_a_terminator() {
        let lines = frame_all(&[b"a.\r\n.b\r\n.\r\n"]).unwrap();
        assert_eq!(lines, vec!["a.", ".b"]);
    }

    #[test]
    fn stuffed_dots_are_kept_by_default() {
        let lines = frame_all(&[b"..dot\r\n.\r\n"]).unwrap();
        assert_eq!(lines, vec!["..dot"]);
    }

    #[test]
    fn unstuffing_strips_one_leading_dot() {
        let mut framer = LineFramer::new().with_unstuffing(true);
        let lines = framer
            .feed(b"..single\r\n...double\r\n..\r\nplain\r\n.\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(lines, vec![".single", "..double", ".", "plain"]);
    }

    #[test]
    fn bytes_after_terminator_are_dropped() {
        let lines = frame_all(&[b"x\r\n.\r\n205 stray\r\n"]).unwrap();
        assert_eq!(lines, vec!["x"]);
    }

    #[test]
    fn feeding_after_completion_fails() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b".\r\n").unwrap().is_some());
        assert!(framer.is_done());
        assert!(framer.feed(b"more\r\n").is_err());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let lines = frame_all(&[b"caf\xe9\r\n.\r\n"]).unwrap();
        assert_eq!(lines, vec!["caf\u{fffd}"]);
    }

    fn body_lines() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec("[a-zA-Z0-9 \t:<>@.-]{0,20}", 0..8).prop_map(|lines| {
            lines
                .into_iter()
                .map(|line| {
                    if line.starts_with('.') {
                        format!("x{line}")
                    } else {
                        line
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn fragmentation_does_not_change_lines(
            lines in body_lines(),
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..12),
        ) {
            let mut body = Vec::new();
            for line in &lines {
                body.extend_from_slice(line.as_bytes());
                body.extend_from_slice(b"\r\n");
            }
            body.extend_from_slice(b".\r\n");

            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(body.len() + 1)).collect();
            points.push(0);
            points.push(body.len());
            points.sort_unstable();
            points.dedup();

            let mut framer = LineFramer::new();
            let mut result = None;
            for window in points.windows(2) {
                let fragment = &body[window[0]..window[1]];
                if let Some(framed) = framer.feed(fragment).unwrap() {
                    result = Some(framed);
                    break;
                }
            }

            prop_assert_eq!(result, Some(lines));
        }
    }
}
