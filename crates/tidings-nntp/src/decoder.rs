//! Per-command response decoding without I/O.
//!
//! A [`ResponseDecoder`] is created for one command, fed transport
//! fragments as they arrive and yields exactly one [`Response`] (or an
//! error). The status line is always read as plain text. Multi-line bodies
//! are handed to a [`LineFramer`]; compressed bodies pass through an
//! [`InflateStage`] first.

use crate::error::NntpError;
use crate::framer::LineFramer;
use crate::inflate::InflateStage;
use crate::model::BodyKind;
use crate::response::{CRLF, MAX_STATUS_LINE, Response, find_crlf, parse_status_line};

#[derive(Debug)]
enum State {
    StatusLine {
        buf: Vec<u8>,
    },
    Body {
        status: u16,
        message: String,
        inflate: Option<Box<InflateStage>>,
        framer: LineFramer,
    },
    Done,
}

pub struct ResponseDecoder {
    kind: BodyKind,
    state: State,
    unstuff: bool,
}

impl ResponseDecoder {
    pub fn new(kind: BodyKind) -> Self {
        Self {
            kind,
            state: State::StatusLine { buf: Vec::new() },
            unstuff: false,
        }
    }

    pub fn with_unstuffing(mut self, unstuff: bool) -> Self {
        self.unstuff = unstuff;
        self
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Feed one transport fragment.
    ///
    /// Returns `Ok(None)` while more input is needed and `Ok(Some(_))` once
    /// the response is complete. After a response or an error the decoder
    /// is finished and rejects further input.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Option<Response>, NntpError> {
        let result = self.consume(fragment);
        if result.is_err() {
            self.state = State::Done;
        }
        result
    }

    fn consume(&mut self, data: &[u8]) -> Result<Option<Response>, NntpError> {
        match &mut self.state {
            State::Done => Err(NntpError::Framing("response already complete".into())),

            State::StatusLine { buf } => {
                buf.extend_from_slice(data);
                let Some(pos) = find_crlf(buf) else {
                    if buf.len() >= MAX_STATUS_LINE {
                        return Err(NntpError::MalformedStatusLine(
                            String::from_utf8_lossy(buf).into_owned(),
                        ));
                    }
                    return Ok(None);
                };
                let rest = buf.split_off(pos + CRLF.len());
                let line = String::from_utf8_lossy(&buf[..pos]).into_owned();
                let (status, message) = parse_status_line(&line)?;

                // Servers send no body after a failure status.
                if !self.kind.expects_body() || status >= 400 {
                    if !rest.is_empty() {
                        tracing::warn!(
                            status,
                            bytes = rest.len(),
                            "discarding data after single-line response"
                        );
                    }
                    self.state = State::Done;
                    return Ok(Some(Response::new(status, message, Vec::new())));
                }

                let inflate = match self.kind {
                    BodyKind::Compressed => Some(Box::new(InflateStage::new())),
                    BodyKind::None | BodyKind::Plain => None,
                };
                self.state = State::Body {
                    status,
                    message,
                    inflate,
                    framer: LineFramer::new().with_unstuffing(self.unstuff),
                };
                if rest.is_empty() {
                    return Ok(None);
                }
                self.consume(&rest)
            }

            State::Body {
                status,
                message,
                inflate,
                framer,
            } => {
                let lines = match inflate {
                    Some(stage) => framer.feed(&stage.feed(data)?)?,
                    None => framer.feed(data)?,
                };
                let Some(lines) = lines else {
                    return Ok(None);
                };
                let response = Response::new(*status, std::mem::take(message), lines);
                self.state = State::Done;
                Ok(Some(response))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use proptest::prelude::*;

    use super::*;

    fn decode(kind: BodyKind, fragments: &[&[u8]]) -> Result<Option<Response>, NntpError> {
        let mut decoder = ResponseDecoder::new(kind);
        for fragment in fragments {
            if let Some(response) = decoder.feed(fragment)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    #[test]
    fn single_line_response() {
        let response = decode(BodyKind::None, &[b"200 server ready\r\n"]).unwrap().unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.message(), "server ready");
        assert!(response.lines().is_empty());
    }

    #[test]
    fn status_line_split_across_fragments() {
        let response = decode(BodyKind::None, &[b"2", b"11 5 1 10 ", b"alt.test\r", b"\n"])
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), 211);
        assert_eq!(response.message(), "5 1 10 alt.test");
    }

    #[test]
    fn status_and_body_in_one_fragment() {
        let response = decode(
            BodyKind::Plain,
            &[b"215 Order of fields follows\r\nSubject:\r\nFrom:\r\n.\r\n"],
        )
        .unwrap()
        .unwrap();
        assert_eq!(response.status(), 215);
        assert_eq!(response.lines(), ["Subject:", "From:"]);
    }

    #[test]
    fn body_arrives_after_status() {
        let mut decoder = ResponseDecoder::new(BodyKind::Plain);
        assert!(decoder.feed(b"224 overview follows\r\n").unwrap().is_none());
        assert!(decoder.feed(b"1\tSubj\r\n").unwrap().is_none());
        let response = decoder.feed(b".\r\n").unwrap().unwrap();
        assert_eq!(response.lines(), ["1\tSubj"]);
        assert!(decoder.is_complete());
    }

    #[test]
    fn failure_status_skips_body() {
        let response = decode(
            BodyKind::Plain,
            &[b"411 no such group\r\nlooks like\r\na body\r\n.\r\n"],
        )
        .unwrap()
        .unwrap();
        assert_eq!(response.status(), 411);
        assert!(response.lines().is_empty());
    }

    #[test]
    fn malformed_status_line_fails() {
        let err = decode(BodyKind::Plain, &[b"hello world\r\n"]).expect_err("malformed");
        assert!(matches!(err, NntpError::MalformedStatusLine(_)));
    }

    #[test]
    fn invalid_status_code_fails() {
        let err = decode(BodyKind::None, &[b"700 strange\r\n"]).expect_err("invalid");
        assert!(matches!(err, NntpError::InvalidStatusCode(700)));
    }

    #[test]
    fn decoder_is_finished_after_error() {
        let mut decoder = ResponseDecoder::new(BodyKind::None);
        assert!(decoder.feed(b"bad\r\n").is_err());
        assert!(decoder.is_complete());
        assert!(matches!(
            decoder.feed(b"200 ok\r\n"),
            Err(NntpError::Framing(_))
        ));
    }

    #[test]
    fn overlong_status_line_fails() {
        let line = vec![b'x'; MAX_STATUS_LINE + 10];
        let err = decode(BodyKind::None, &[line.as_slice()]).expect_err("too long");
        assert!(matches!(err, NntpError::MalformedStatusLine(_)));
    }

    #[test]
    fn unstuffing_is_forwarded_to_framer() {
        let mut decoder = ResponseDecoder::new(BodyKind::Plain).with_unstuffing(true);
        let response = decoder
            .feed(b"222 body follows\r\n..leading dot\r\n.\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(response.lines(), [".leading dot"]);
    }

    fn compressed_response(body: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body).unwrap();
        let mut wire = b"224 compressed data follows\r\n".to_vec();
        wire.extend(encoder.finish().unwrap());
        wire
    }

    #[test]
    fn compressed_body_one_byte_fragments_matches_single_fragment() {
        let wire = compressed_response(b"L1\r\nL2\r\n.\r\n");

        let whole = decode(BodyKind::Compressed, &[&wire]).unwrap().unwrap();
        let fragments: Vec<&[u8]> = wire.chunks(1).collect();
        let split = decode(BodyKind::Compressed, &fragments).unwrap().unwrap();

        assert_eq!(whole.lines(), ["L1", "L2"]);
        assert_eq!(whole, split);
        assert_eq!(split.message(), "compressed data follows");
    }

    #[test]
    fn compressed_command_failure_status() {
        let response = decode(BodyKind::Compressed, &[b"420 no article(s) selected\r\n"])
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), 420);
        assert!(response.lines().is_empty());
    }

    #[test]
    fn compressed_command_failure_ignores_trailing_bytes() {
        let response = decode(
            BodyKind::Compressed,
            &[b"420 no article(s) selected\r\nx\r\n.\r\n"],
        )
        .unwrap()
        .unwrap();
        assert_eq!(response.status(), 420);
        assert!(response.lines().is_empty());
    }

    #[test]
    fn compressed_command_malformed_status_line() {
        let err = decode(BodyKind::Compressed, &[b"garbage\r\n\x07\x00\x00\x00"])
            .expect_err("malformed");
        assert!(matches!(err, NntpError::MalformedStatusLine(_)));
    }

    #[test]
    fn compressed_status_line_is_parsed_before_payload_arrives() {
        let wire = compressed_response(b"1\tSubj\r\n.\r\n");
        let split = wire.iter().position(|&b| b == b'\n').unwrap() + 1;

        let mut decoder = ResponseDecoder::new(BodyKind::Compressed);
        assert!(decoder.feed(&wire[..split]).unwrap().is_none());
        let response = decoder.feed(&wire[split..]).unwrap().unwrap();
        assert_eq!(response.status(), 224);
        assert_eq!(response.lines(), ["1\tSubj"]);
    }

    #[test]
    fn corrupt_compressed_body_fails() {
        let err = decode(
            BodyKind::Compressed,
            &[b"224 compressed data follows\r\n", b"\x07\x00\x00\x00"],
        )
        .expect_err("corrupt");
        assert!(matches!(err, NntpError::Decompression(_)));
    }

    proptest! {
        #[test]
        fn any_fragmentation_yields_same_response(
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..16),
        ) {
            let wire: &[u8] = b"224 overview follows\r\n1\tSubj\tFrom\r\n2\tRe: Subj\tOther\r\n.\r\n";
            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(wire.len() + 1)).collect();
            points.extend([0, wire.len()]);
            points.sort_unstable();
            points.dedup();

            let fragments: Vec<&[u8]> = points.windows(2).map(|w| &wire[w[0]..w[1]]).collect();
            let response = decode(BodyKind::Plain, &fragments).unwrap().unwrap();
            prop_assert_eq!(response.status(), 224);
            prop_assert_eq!(response.lines(), ["1\tSubj\tFrom", "2\tRe: Subj\tOther"]);
        }
    }
}
