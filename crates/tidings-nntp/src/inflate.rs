//! Inflation of compressed overview bodies (`XZVER`).
//!
//! The server sends an uncompressed status line followed directly by a
//! DEFLATE stream whose plaintext is an ordinary dot-terminated body. The
//! decoder parses the status line itself and only hands this stage the
//! compressed payload, which is inflated one fragment at a time.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::NntpError;
use crate::framer::BODY_TERMINATOR;
use crate::response::CRLF;

const INFLATE_BUF_SIZE: usize = 8192;

#[derive(Debug)]
pub struct InflateStage {
    done: bool,
    pending: Vec<u8>,
    decompress: Option<Decompress>,
    finished: bool,
    out_buf: Vec<u8>,
    // Last bytes of plaintext, prefixed with the status line's CRLF.
    tail: Vec<u8>,
}

impl InflateStage {
    pub fn new() -> Self {
        Self {
            done: false,
            pending: Vec::new(),
            decompress: None,
            finished: false,
            out_buf: vec![0u8; INFLATE_BUF_SIZE],
            tail: CRLF.to_vec(),
        }
    }

    /// True once the inflated plaintext has ended with the body terminator.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume a fragment of compressed payload and return the plaintext it
    /// unlocks. Input arriving after the body is complete is ignored.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Vec<u8>, NntpError> {
        let mut plain = Vec::new();
        if self.done {
            if !fragment.is_empty() {
                tracing::debug!(bytes = fragment.len(), "ignoring input after compressed body");
            }
            return Ok(plain);
        }
        self.pending.extend_from_slice(fragment);
        self.inflate_pending(&mut plain)?;
        Ok(plain)
    }

    fn inflate_pending(&mut self, plain: &mut Vec<u8>) -> Result<(), NntpError> {
        if self.decompress.is_none() {
            // A zlib header needs two bytes to recognise.
            if self.pending.len() < 2 {
                return Ok(());
            }
            self.decompress = Some(Decompress::new(has_zlib_header(&self.pending)));
        }
        let Some(decompress) = self.decompress.as_mut() else {
            return Ok(());
        };

        let mut consumed_total = 0;
        while !self.finished {
            let before_in = decompress.total_in();
            let before_out = decompress.total_out();

            let status = decompress
                .decompress(
                    &self.pending[consumed_total..],
                    &mut self.out_buf,
                    FlushDecompress::None,
                )
                .map_err(|e| NntpError::Decompression(e.to_string()))?;

            let consumed = (decompress.total_in() - before_in) as usize;
            let produced = (decompress.total_out() - before_out) as usize;
            consumed_total += consumed;
            plain.extend_from_slice(&self.out_buf[..produced]);

            if status == Status::StreamEnd {
                self.finished = true;
            } else if consumed == 0 && produced == 0 {
                break;
            }
        }
        self.pending.drain(..consumed_total);
        let (compressed, inflated) = (decompress.total_in(), decompress.total_out());

        self.track_tail(plain);
        if self.tail.ends_with(BODY_TERMINATOR) {
            tracing::trace!(compressed, inflated, "compressed body complete");
            self.done = true;
            self.pending = Vec::new();
            return Ok(());
        }

        if self.finished {
            return Err(NntpError::Decompression(
                "compressed body ended without terminator".into(),
            ));
        }
        Ok(())
    }

    fn track_tail(&mut self, inflated: &[u8]) {
        self.tail.extend_from_slice(inflated);
        let keep = BODY_TERMINATOR.len();
        if self.tail.len() > keep {
            self.tail.drain(..self.tail.len() - keep);
        }
    }
}

impl Default for InflateStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Recognise an RFC 1950 zlib header; anything else is treated as raw
/// RFC 1951 DEFLATE data.
fn has_zlib_header(data: &[u8]) -> bool {
    let (cmf, flg) = (data[0], data[1]);
    cmf & 0x0f == 8 && cmf >> 4 <= 7 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}
